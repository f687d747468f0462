//! Sensor subsystem: drivers and the aggregating [`SensorReader`].
//!
//! The reader owns the optional distance sensor and camera and turns their
//! raw readings into [`FillLevel`]s.  A missing or failing sensor yields
//! `Unknown`, never an error, so a flaky part cannot stall the control loop.

pub mod dish;
pub mod distance;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};

use crate::app::events::{DishImage, FillLevel};
use crate::app::ports::{CameraPort, DistancePort};
use crate::config::FeederConfig;

/// Result of a dish check.  `image` holds the freshly captured picture, if
/// the capture succeeded, even when it could not be scored.
#[derive(Debug, Clone, PartialEq)]
pub struct DishReading {
    pub level: FillLevel,
    pub image: Option<DishImage>,
}

/// Map a distance reading onto a hopper percentage.
///
/// `empty_cm` (food surface far from the sensor) is 0 %, `full_cm` is
/// 100 %, linear in between and clamped outside.
pub fn hopper_percent(distance_cm: f32, empty_cm: f32, full_cm: f32) -> u8 {
    let span = empty_cm - full_cm;
    if span <= 0.0 || !distance_cm.is_finite() {
        return 0;
    }
    let pct = (empty_cm - distance_cm) / span * 100.0;
    pct.clamp(0.0, 100.0).round() as u8
}

pub struct SensorReader {
    distance: Option<Box<dyn DistancePort>>,
    camera: Option<Box<dyn CameraPort>>,
    empty_cm: f32,
    full_cm: f32,
    full_image: PathBuf,
    compare_image: PathBuf,
    camera_timeout: Duration,
}

impl SensorReader {
    /// Construct a reader.  Pass in pre-built drivers (built in main where
    /// hardware ownership is established).
    pub fn new(
        config: &FeederConfig,
        distance: Option<Box<dyn DistancePort>>,
        camera: Option<Box<dyn CameraPort>>,
    ) -> Self {
        Self {
            distance,
            camera,
            empty_cm: config.hopper_empty_distance_cm,
            full_cm: config.hopper_full_distance_cm,
            full_image: config.full_dish_image.clone(),
            compare_image: config.compare_dish_image.clone(),
            camera_timeout: config.camera_timeout(),
        }
    }

    pub fn has_distance(&self) -> bool {
        self.distance.is_some()
    }

    pub fn has_camera(&self) -> bool {
        self.camera.is_some()
    }

    /// Current hopper fill.
    pub fn hopper_level(&mut self) -> FillLevel {
        let Some(sensor) = self.distance.as_deref_mut() else {
            return FillLevel::Unknown;
        };
        match sensor.distance_cm() {
            Ok(cm) => {
                let pct = hopper_percent(cm, self.empty_cm, self.full_cm);
                info!("Hopper: distance {:.1} cm, {}% full", cm, pct);
                FillLevel::percent(pct)
            }
            Err(e) => {
                warn!("Hopper: distance read failed: {}", e);
                FillLevel::Unknown
            }
        }
    }

    /// Capture a fresh dish picture and score it against the reference.
    ///
    /// The reference is captured first if it does not exist yet.  Each
    /// capture is time-boxed by the configured camera timeout.
    pub fn dish_level(&mut self) -> DishReading {
        let unknown = DishReading { level: FillLevel::Unknown, image: None };
        let Some(camera) = self.camera.as_deref_mut() else {
            return unknown;
        };

        if !self.full_image.exists() {
            info!("Dish: no reference picture, capturing {}", self.full_image.display());
            ensure_parent(&self.full_image);
            if let Err(e) = camera.capture(&self.full_image, self.camera_timeout) {
                warn!("Dish: reference capture failed: {}", e);
                return unknown;
            }
        }

        ensure_parent(&self.compare_image);
        // A stale picture must not be mistaken for a fresh one.
        let _ = fs::remove_file(&self.compare_image);
        if let Err(e) = camera.capture(&self.compare_image, self.camera_timeout) {
            warn!("Dish: capture failed: {}", e);
            return unknown;
        }

        let image = read_image(&self.compare_image);
        match dish::compare_files(&self.full_image, &self.compare_image) {
            Ok(rms) => {
                let pct = dish::dish_percent(rms);
                info!("Dish: rms {:.1}, {}% full", rms, pct);
                DishReading { level: FillLevel::percent(pct), image }
            }
            Err(e) => {
                warn!("Dish: comparison failed: {}", e);
                DishReading { level: FillLevel::Unknown, image }
            }
        }
    }
}

fn read_image(path: &Path) -> Option<DishImage> {
    match fs::read(path) {
        Ok(bytes) => Some(DishImage {
            file_name: path
                .file_name()
                .map_or_else(|| "dish.jpg".to_string(), |n| n.to_string_lossy().into_owned()),
            bytes,
        }),
        Err(e) => {
            warn!("Dish: cannot read {}: {}", path.display(), e);
            None
        }
    }
}

fn ensure_parent(path: &Path) {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(dir) {
            warn!("Dish: cannot create {}: {}", dir.display(), e);
        }
    }
}
