//! Dish camera driven through the `fswebcam` CLI.
//!
//! Each capture spawns one process that writes a JPEG to the requested
//! path.  The process is polled until it exits or the time box runs out;
//! a stuck USB camera is killed rather than allowed to stall the loop.

use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::app::ports::CameraPort;
use crate::error::SensorError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct FswebcamCamera {
    program: String,
    args: Vec<String>,
}

impl FswebcamCamera {
    /// `fswebcam --no-banner <path>`.
    pub fn new() -> Self {
        Self::with_command("fswebcam", ["--no-banner"])
    }

    /// Use another capture program.  The output path is appended as the
    /// last argument.
    pub fn with_command<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for FswebcamCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraPort for FswebcamCamera {
    fn capture(&mut self, path: &Path, timeout: Duration) -> Result<(), SensorError> {
        debug!("Camera: capturing {}", path.display());
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                warn!("Camera: cannot start {}: {}", self.program, e);
                SensorError::CaptureFailed
            })?;

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= timeout => {
                    warn!("Camera: no picture after {} s, killing capture", timeout.as_secs());
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(SensorError::CaptureTimeout);
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    warn!("Camera: wait failed: {}", e);
                    let _ = child.kill();
                    return Err(SensorError::CaptureFailed);
                }
            }
        };

        if !status.success() {
            warn!("Camera: {} exited with {}", self.program, status);
            return Err(SensorError::CaptureFailed);
        }
        if !path.exists() {
            warn!("Camera: {} wrote no file", self.program);
            return Err(SensorError::CaptureFailed);
        }
        Ok(())
    }
}
