//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter            | Implements      | Connects to                    |
//! |--------------------|-----------------|--------------------------------|
//! | `command_listener` | (CommandInbox)  | TCP, newline-delimited JSON    |
//! | `config_file`      | ConfigPort      | JSON file on disk              |
//! | `hardware`         | ServoPort       | rppal GPIO / software PWM      |
//! |                    | ButtonPort      | rppal GPIO input               |
//! |                    | DistancePort    | HC-SR04 on rppal GPIO          |
//! |                    | CameraPort      | `fswebcam` process             |
//! | `http_reporter`    | StatusReporter  | backend REST API (reqwest)     |
//! | `log_sink`         | EventSink       | `log` facade                   |
//! | `logger`           | `log::Log`      | console + rotating log files   |
//! | `time`             | Clock           | `Instant` + system wall clock  |

pub mod command_listener;
pub mod config_file;
#[cfg(feature = "rpi")]
pub mod hardware;
pub mod http_reporter;
pub mod log_sink;
pub mod logger;
pub mod time;
