//! Module classification for executed commands.
//!
//! Turns a command line such as `/software/hgi/softpack/installs/team/env-scripts/python`
//! into a [`ModuleIdentity`] (here `softpack:team/env`), or `None` when the
//! command does not belong to any tracked module.
//!
//! Classification is pure and total: every string maps to exactly one answer,
//! and the same rules always give the same answer.

pub mod classify;
pub mod error;
pub mod rules;

pub use classify::{Classifier, directory_of};
pub use common::{Category, ModuleIdentity};
pub use error::{ClassifierError, Result};
pub use rules::{ClassifierRules, PackageManagerRoot};
