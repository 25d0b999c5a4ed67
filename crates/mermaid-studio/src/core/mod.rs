//! Core types shared across the studio
//!
//! Errors, configuration, logging, diagram kinds and the activity log live
//! here; the pipeline components build on top of them.

mod activity;
mod config;
mod error;
mod kind;
pub mod logging;

pub use activity::*;
pub use config::*;
pub use error::*;
pub use kind::*;
pub use logging::*;
