//! Shared types for the module usage collector.
//!
//! Every other crate in the workspace speaks in terms of these:
//! - [`RawEvent`] is one "user ran command X" notification
//! - [`ModuleIdentity`] is what the classifier derives from a command
//! - [`Category`] selects which aggregate tables a module's usage lands in

mod types;

pub use types::{Category, ModuleIdentity, RawEvent};
