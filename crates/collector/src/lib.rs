//! TCP ingestion server for module usage notifications.
//!
//! Clients open a connection, send `<user> NUL <command>` and close it. The
//! server classifies the command and records the event in a usage store. It
//! never answers, and drops anything it cannot decode.
//!
//! The same binary also runs one-shot bulk loads, see [`oneshot`].

pub mod config;
pub mod error;
pub mod frame;
pub mod listener;
pub mod oneshot;

pub use config::{Config, Mode};
pub use error::{CollectorError, Result};
pub use frame::{Frame, MAX_FRAME_BYTES};
pub use listener::{serve, source_ip};
