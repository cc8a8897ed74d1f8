//! Test Helper Utilities
//!
//! Shared utilities for testing partscan-intake

#![allow(dead_code)]

pub mod fake_catalog;
pub mod fake_mouser;
pub mod log_capture;

pub use fake_catalog::ScriptedCatalog;
pub use fake_mouser::FakeMouser;
pub use log_capture::{capture_logs, LogCapture};

use partscan_common::events::IntakeEvent;
use partscan_common::CodeType;
use partscan_intake::frame::{DetectedCode, Frame};
use tokio::sync::broadcast;

/// One-code frame holding a QR payload
pub fn qr_frame(payload: &str) -> Frame {
    Frame::Decoded(vec![DetectedCode::new(CodeType::Qr, payload)])
}

/// Drain every event currently buffered on a receiver
pub fn drain(rx: &mut broadcast::Receiver<IntakeEvent>) -> Vec<IntakeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
