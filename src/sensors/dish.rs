//! Camera-based dish fill estimate.
//!
//! A fresh picture of the dish is compared against a reference picture of a
//! full dish.  The comparison builds a banded histogram of the per-channel
//! absolute difference (bin `256·band + diff`, three bands) and takes
//!
//! ```text
//! rms = sqrt( Σ count[i] · i²  /  (width · height) )
//! ```
//!
//! The band offset keeps the metric from reaching zero: identical pictures
//! score `sqrt(256² + 512²) ≈ 572`.  The score is bucketed into five levels.
//!
//! | rms         | dish |
//! |-------------|------|
//! | < 580       | 100  |
//! | 580 – 610   | 75   |
//! | 610 – 660   | 50   |
//! | 660 – 680   | 25   |
//! | ≥ 680       | 0    |

use std::path::Path;

use image::RgbImage;

use crate::error::SensorError;

const BANDS: usize = 3;
const BINS: usize = 256 * BANDS;

/// Upper bounds (exclusive) of each bucket, fullest first.
const THRESHOLDS: [(f64, u8); 4] = [(580.0, 100), (610.0, 75), (660.0, 50), (680.0, 25)];

/// Banded RMS difference between two same-sized RGB images.
pub fn banded_rms(reference: &RgbImage, sample: &RgbImage) -> Result<f64, SensorError> {
    if reference.dimensions() != sample.dimensions() {
        return Err(SensorError::ImageSizeMismatch);
    }
    let (w, h) = reference.dimensions();
    let pixels = u64::from(w) * u64::from(h);
    if pixels == 0 {
        return Err(SensorError::ImageDecodeFailed);
    }

    let mut histogram = [0u64; BINS];
    for (a, b) in reference.pixels().zip(sample.pixels()) {
        for band in 0..BANDS {
            let diff = a.0[band].abs_diff(b.0[band]) as usize;
            histogram[256 * band + diff] += 1;
        }
    }

    let sum_of_squares: f64 = histogram
        .iter()
        .enumerate()
        .map(|(idx, &count)| count as f64 * (idx as f64).powi(2))
        .sum();

    Ok((sum_of_squares / pixels as f64).sqrt())
}

/// Bucket a banded RMS score into a dish percentage.
pub fn dish_percent(rms: f64) -> u8 {
    THRESHOLDS
        .iter()
        .find(|(limit, _)| rms < *limit)
        .map_or(0, |&(_, pct)| pct)
}

/// Load both pictures and score them.
pub fn compare_files(reference: &Path, sample: &Path) -> Result<f64, SensorError> {
    let reference = load_rgb(reference)?;
    let sample = load_rgb(sample)?;
    banded_rms(&reference, &sample)
}

fn load_rgb(path: &Path) -> Result<RgbImage, SensorError> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|_| SensorError::ImageDecodeFailed)
}
