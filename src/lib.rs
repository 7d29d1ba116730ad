//! # plugcheck
//!
//! Batch-test framework plugins against a chosen framework build.
//!
//! For every plugin installed under `node_modules`, plugcheck rewrites the
//! framework pin in the plugin's `package.json`, installs the plugin's
//! dependencies and runs its test suite, then reports which plugins pass.
//!
//! ## Quick Start
//!
//! ```bash
//! # Test every dependency of ./package.json against the framework's main branch
//! plugcheck
//!
//! # Test two plugins against a fork, four at a time
//! plugcheck -F github:me/fastify#fix -j 4 fastify-cors fastify-static
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app;
pub mod core;

pub use app::App;
pub use core::{
    Config, ConfigError, JobOutcome, JobResult, LogLevel, ManifestError, ManifestPatcher,
    RunConfig, RunSummary, Scheduler, SkipList,
};

/// Version of plugcheck.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const APP_NAME: &str = "plugcheck";
