//! # partscan Common Library
//!
//! Shared code for the partscan intake service and its tooling:
//! - Error type
//! - Configuration loading and root folder resolution
//! - Part records and scan counters that cross the event boundary
//! - Event types (IntakeEvent enum) and the broadcast EventBus

pub mod config;
pub mod error;
pub mod events;
pub mod parts;

pub use error::{Error, Result};
pub use parts::{CodeType, ResolvedPart, ScanCounts};
