//! Event types for the partscan event system
//!
//! The intake pipeline publishes every outward-facing outcome on an
//! [`EventBus`]; presentation collaborators (the SSE endpoint, a GUI shell,
//! tests) subscribe and render.

use crate::parts::{CodeType, ResolvedPart, ScanCounts};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Intake event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IntakeEvent {
    /// A payload was admitted as NEW
    CodeScanned {
        payload: String,
        code_type: CodeType,
        timestamp: DateTime<Utc>,
    },

    /// A part number resolved to catalog data
    ///
    /// `replay` is set when the data is re-displayed from cache after the
    /// rearm window elapsed.
    PartFound {
        part: ResolvedPart,
        replay: bool,
        timestamp: DateTime<Utc>,
    },

    /// A scan produced no catalog match
    ///
    /// `part_number` is `None` when the payload carried no usable `pm` field.
    PartNotFound {
        part_number: Option<String>,
        quantity: Option<String>,
        replay: bool,
        timestamp: DateTime<Utc>,
    },

    /// Session counters changed
    CountsUpdated {
        counts: ScanCounts,
        timestamp: DateTime<Utc>,
    },
}

impl IntakeEvent {
    /// Variant name, used as the SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            IntakeEvent::CodeScanned { .. } => "CodeScanned",
            IntakeEvent::PartFound { .. } => "PartFound",
            IntakeEvent::PartNotFound { .. } => "PartNotFound",
            IntakeEvent::CountsUpdated { .. } => "CountsUpdated",
        }
    }

    /// Build the terminal outcome event for a resolved part
    pub fn for_part(part: ResolvedPart, replay: bool, timestamp: DateTime<Utc>) -> Self {
        if part.found {
            IntakeEvent::PartFound {
                part,
                replay,
                timestamp,
            }
        } else {
            IntakeEvent::PartNotFound {
                part_number: Some(part.part_number),
                quantity: Some(part.quantity),
                replay,
                timestamp,
            }
        }
    }
}

/// Central event distribution bus
///
/// Wraps a `tokio::sync::broadcast` channel. Slow subscribers lag and lose
/// the oldest events rather than blocking publishers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<IntakeEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    ///
    /// # Examples
    ///
    /// ```
    /// use partscan_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<IntakeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: IntakeEvent,
    ) -> Result<usize, broadcast::error::SendError<IntakeEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Presentation is optional; the pipeline never depends on anyone
    /// listening.
    pub fn emit_lossy(&self, event: IntakeEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("No event subscribers");
        }
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
