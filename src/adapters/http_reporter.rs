//! HTTP status reporter.
//!
//! Implements [`StatusReporter`] by queueing snapshots into a bounded
//! `embassy-sync` channel drained by one worker thread.  The control loop
//! only ever does a non-blocking `try_send`; the worker does the HTTP.
//!
//! ```text
//! ┌──────────────┐  Job::Upload  ┌───────────────┐  POST /api/PetFeeder
//! │ Control Loop │──────────────▶│ Report worker │─────────────────────▶ backend
//! │ try_send     │  (depth 8)    │ block_on(recv)│  bearer, timeout
//! └──────────────┘               └───────────────┘
//! ```
//!
//! One worker means uploads leave in the order they were queued, so each
//! snapshot still lines up with the feed that produced it.  Failures are
//! logged and dropped; nothing is retried.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, error, info, warn};
use reqwest::blocking::{Client, multipart};
use serde::Serialize;

use crate::app::events::{DishImage, SnapshotKind, StatusSnapshot};
use crate::app::ports::StatusReporter;
use crate::config::FeederConfig;
use crate::error::CommsError;

/// Pending uploads before new snapshots are dropped.
const REPORT_DEPTH: usize = 8;

/// Backend endpoint, relative to the configured base URL.
const STATUS_PATH: &str = "/api/PetFeeder";

/// Multipart field name of the dish picture.
const IMAGE_FIELD: &str = "FeederImage";

enum Job {
    Upload { snapshot: StatusSnapshot, image: Option<DishImage> },
    Stop,
}

type JobQueue = Channel<CriticalSectionRawMutex, Job, REPORT_DEPTH>;

/// Body of a status upload.  Unknown levels are omitted.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusPayload {
    #[serde(rename = "LastFillTimeUtc", skip_serializing_if = "Option::is_none")]
    pub last_fill_time_utc: Option<String>,
    #[serde(rename = "TriggeredAtUtc")]
    pub triggered_at_utc: String,
    #[serde(rename = "PercentHopperFull", skip_serializing_if = "Option::is_none")]
    pub percent_hopper_full: Option<String>,
    #[serde(rename = "PercentDishFull", skip_serializing_if = "Option::is_none")]
    pub percent_dish_full: Option<String>,
}

impl StatusPayload {
    pub fn from_snapshot(snapshot: &StatusSnapshot) -> Self {
        Self {
            last_fill_time_utc: (snapshot.kind == SnapshotKind::Fill)
                .then(|| iso8601(snapshot.taken_at)),
            triggered_at_utc: iso8601(snapshot.triggered_at),
            percent_hopper_full: snapshot.hopper.as_percent().map(|p| p.to_string()),
            percent_dish_full: snapshot.dish.as_percent().map(|p| p.to_string()),
        }
    }

    /// The same fields as `(name, value)` pairs, for multipart bodies.
    fn fields(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::with_capacity(4);
        if let Some(v) = &self.last_fill_time_utc {
            out.push(("LastFillTimeUtc", v.clone()));
        }
        out.push(("TriggeredAtUtc", self.triggered_at_utc.clone()));
        if let Some(v) = &self.percent_hopper_full {
            out.push(("PercentHopperFull", v.clone()));
        }
        if let Some(v) = &self.percent_dish_full {
            out.push(("PercentDishFull", v.clone()));
        }
        out
    }
}

fn iso8601(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Backend connection settings.
#[derive(Clone)]
pub struct ReporterSettings {
    pub url: String,
    pub token: String,
    pub timeout: Duration,
}

impl ReporterSettings {
    /// `None` when no API token is configured.
    pub fn from_config(config: &FeederConfig) -> Option<Self> {
        let token = config.api_token.clone()?;
        Some(Self {
            url: format!("{}{}", config.backend_url.trim_end_matches('/'), STATUS_PATH),
            token,
            timeout: config.report_timeout(),
        })
    }
}

pub struct HttpStatusReporter {
    queue: Option<Arc<JobQueue>>,
}

impl HttpStatusReporter {
    /// Start the worker.  Without a token the reporter is a logged no-op.
    pub fn spawn(config: &FeederConfig) -> Self {
        match ReporterSettings::from_config(config) {
            Some(settings) => Self::with_settings(settings),
            None => {
                info!("Reporter: no API token, status reporting disabled");
                Self::disabled()
            }
        }
    }

    pub fn with_settings(settings: ReporterSettings) -> Self {
        let queue = Arc::new(JobQueue::new());
        let worker_queue = queue.clone();
        let spawned = thread::Builder::new()
            .name("status-reporter".into())
            .spawn(move || worker(&worker_queue, &settings));

        match spawned {
            Ok(_) => Self { queue: Some(queue) },
            Err(e) => {
                error!("Reporter: cannot start worker: {}", e);
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { queue: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.queue.is_some()
    }
}

impl StatusReporter for HttpStatusReporter {
    fn report(&mut self, snapshot: StatusSnapshot, image: Option<DishImage>) {
        let Some(queue) = &self.queue else {
            debug!("Reporter: disabled, {:?} snapshot not sent", snapshot.kind);
            return;
        };
        if queue.try_send(Job::Upload { snapshot, image }).is_err() {
            warn!("Reporter: {}, snapshot dropped", CommsError::QueueFull);
        }
    }
}

impl Drop for HttpStatusReporter {
    fn drop(&mut self) {
        // The worker finishes what is queued, then exits.
        if let Some(queue) = &self.queue {
            let _ = queue.try_send(Job::Stop);
        }
    }
}

fn worker(queue: &JobQueue, settings: &ReporterSettings) {
    let client = match Client::builder().timeout(settings.timeout).build() {
        Ok(c) => c,
        Err(e) => {
            error!("Reporter: HTTP client init failed: {}", e);
            return;
        }
    };

    loop {
        match futures_lite::future::block_on(queue.receive()) {
            Job::Upload { snapshot, image } => match post(&client, settings, &snapshot, image) {
                Ok(status) => {
                    info!("Reporter: posted {:?} status, HTTP {}", snapshot.kind, status);
                }
                Err(e) => error!("Reporter: posting {:?} status failed: {}", snapshot.kind, e),
            },
            Job::Stop => {
                debug!("Reporter: worker stopping");
                return;
            }
        }
    }
}

fn image_form(payload: &StatusPayload, image: DishImage) -> Result<multipart::Form, CommsError> {
    let mut form = multipart::Form::new();
    for (name, value) in payload.fields() {
        form = form.text(name, value);
    }
    let mime = mime_for(&image.file_name);
    let part = multipart::Part::bytes(image.bytes)
        .file_name(image.file_name)
        .mime_str(mime)
        .map_err(|e| {
            warn!("Reporter: cannot attach image: {}", e);
            CommsError::HttpFailed
        })?;
    Ok(form.part(IMAGE_FIELD, part))
}

fn mime_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else {
        "image/jpeg"
    }
}

fn post(
    client: &Client,
    settings: &ReporterSettings,
    snapshot: &StatusSnapshot,
    image: Option<DishImage>,
) -> Result<u16, CommsError> {
    let payload = StatusPayload::from_snapshot(snapshot);
    let request = client.post(&settings.url).bearer_auth(&settings.token);

    let request = match image {
        Some(image) => request.multipart(image_form(&payload, image)?),
        None => request.json(&payload),
    };

    let response = request.send().map_err(|e| {
        debug!("Reporter: request error: {}", e);
        CommsError::HttpFailed
    })?;

    let status = response.status();
    if status.is_success() {
        Ok(status.as_u16())
    } else {
        Err(CommsError::HttpStatus(status.as_u16()))
    }
}
