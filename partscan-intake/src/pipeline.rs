//! Pipeline orchestrator
//!
//! Consumes frames strictly one at a time. Per frame:
//!
//! `RECEIVED → DECODED → {no codes: DONE} | {per-code loop}`
//!
//! Per code:
//!
//! `PARSE → ADMIT-CHECK → NEW: resolve (cache or remote), count
//!                       | REPEAT_EXPIRED: replay from cache only
//!                       | REPEAT_WITHIN_WINDOW: skip`
//!
//! Cache misses are resolved on background enrichment tasks so a slow
//! catalog never stalls frame processing; the task emits the FOUND or
//! NOT_FOUND event when it completes. The dedup window is owned by the
//! pipeline and never shared.

use crate::dedup::{Admission, DedupWindow, DEFAULT_REARM_WINDOW};
use crate::frame::{CodeDecoder, DetectedCode, Frame, FrameFeed};
use crate::payload::{self, PartQuery, PayloadFields, QUANTITY_KEY};
use crate::resolver::PartResolver;
use crate::store::CacheStore;
use chrono::{DateTime, Utc};
use partscan_common::events::{EventBus, IntakeEvent};
use partscan_common::{CodeType, ResolvedPart, ScanCounts};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Pipeline tuning
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum time before a repeated payload is reported again
    pub rearm_window: Duration,
    /// How long shutdown waits for outstanding enrichment tasks
    pub shutdown_grace: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rearm_window: DEFAULT_REARM_WINDOW,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Session counters
///
/// `total_scanned` counts NEW admissions; `found`/`not_found` count the
/// terminal outcome of NEW QR codes. Replays never touch them.
#[derive(Debug, Default)]
pub struct ScanCounters {
    total_scanned: AtomicU64,
    found: AtomicU64,
    not_found: AtomicU64,
}

impl ScanCounters {
    pub fn snapshot(&self) -> ScanCounts {
        ScanCounts {
            total_scanned: self.total_scanned.load(Ordering::Relaxed),
            found: self.found.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
        }
    }

    fn record_scanned(&self) {
        self.total_scanned.fetch_add(1, Ordering::Relaxed);
    }

    fn record_outcome(&self, found: bool) {
        if found {
            self.found.fetch_add(1, Ordering::Relaxed);
        } else {
            self.not_found.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Per-code result of processing a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeOutcome {
    Found(ResolvedPart),
    NotFound {
        part_number: Option<String>,
        quantity: Option<String>,
    },
    /// Nothing to report for this sighting
    Skipped,
    /// Remote lookup dispatched; the outcome event follows when it completes
    Pending { part_number: String },
}

impl CodeOutcome {
    fn for_part(part: ResolvedPart) -> Self {
        if part.found {
            CodeOutcome::Found(part)
        } else {
            CodeOutcome::NotFound {
                part_number: Some(part.part_number),
                quantity: Some(part.quantity),
            }
        }
    }
}

/// Frame-processing consumer
pub struct Pipeline {
    decoder: Arc<dyn CodeDecoder>,
    window: DedupWindow,
    store: Arc<CacheStore>,
    resolver: Arc<PartResolver>,
    events: EventBus,
    counters: Arc<ScanCounters>,
    enrichment: JoinSet<()>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Build a pipeline whose dedup window is seeded from the store
    pub fn new(
        decoder: Arc<dyn CodeDecoder>,
        store: Arc<CacheStore>,
        resolver: Arc<PartResolver>,
        events: EventBus,
        counters: Arc<ScanCounters>,
        config: PipelineConfig,
    ) -> Self {
        let window = DedupWindow::with_seen(config.rearm_window, store.seen_payloads());
        Self {
            decoder,
            window,
            store,
            resolver,
            events,
            counters,
            enrichment: JoinSet::new(),
            config,
        }
    }

    pub fn counters(&self) -> ScanCounts {
        self.counters.snapshot()
    }

    pub fn window(&self) -> &DedupWindow {
        &self.window
    }

    /// Number of enrichment tasks not yet joined
    pub fn pending_enrichments(&self) -> usize {
        self.enrichment.len()
    }

    /// Run one frame through decode, dedup and resolution
    ///
    /// Must be called from within a Tokio runtime; cache misses spawn
    /// enrichment tasks.
    pub fn process_frame(&mut self, frame: &Frame, now: DateTime<Utc>) -> Vec<CodeOutcome> {
        let decoded;
        let codes: &[DetectedCode] = match frame {
            Frame::Image(image) => {
                decoded = self.decoder.decode(image);
                &decoded
            }
            Frame::Decoded(codes) => codes,
        };

        if codes.is_empty() {
            trace!("No codes in frame");
            return Vec::new();
        }

        codes
            .iter()
            .map(|code| self.process_code(code, now))
            .collect()
    }

    fn process_code(&mut self, code: &DetectedCode, now: DateTime<Utc>) -> CodeOutcome {
        let payload = code.payload_text().into_owned();

        // A blank payload cannot be stored as a distinct code
        if payload.trim().is_empty() {
            debug!(code_type = %code.code_type, "Ignoring blank payload");
            return CodeOutcome::Skipped;
        }

        match self.window.admit(&payload, code.code_type, now) {
            Admission::RepeatWithinWindow => CodeOutcome::Skipped,
            Admission::RepeatExpired => self.replay(&payload, code.code_type, now),
            Admission::New => {
                info!(payload = %payload, code_type = %code.code_type, "New code scanned");
                self.store.append_seen(&payload);
                self.counters.record_scanned();
                self.events.emit_lossy(IntakeEvent::CodeScanned {
                    payload: payload.clone(),
                    code_type: code.code_type,
                    timestamp: now,
                });

                let outcome = self.resolve_new(&payload, code.code_type, now);
                self.emit_counts(now);
                outcome
            }
        }
    }

    fn resolve_new(&mut self, payload: &str, code_type: CodeType, now: DateTime<Utc>) -> CodeOutcome {
        if code_type != CodeType::Qr {
            return CodeOutcome::Skipped;
        }

        let fields = parse_fields(payload);
        let Some(query) = PartQuery::from_fields(&fields) else {
            let quantity = fields.get(QUANTITY_KEY).cloned();
            warn!(payload = %payload, "QR payload carries no part number");
            self.counters.record_outcome(false);
            self.events.emit_lossy(IntakeEvent::PartNotFound {
                part_number: None,
                quantity: quantity.clone(),
                replay: false,
                timestamp: now,
            });
            return CodeOutcome::NotFound {
                part_number: None,
                quantity,
            };
        };

        if let Some(part) = self.resolver.cached(&query.part_number) {
            debug!(part_number = %part.part_number, "Resolved from cache");
            self.counters.record_outcome(part.found);
            self.events
                .emit_lossy(IntakeEvent::for_part(part.clone(), false, now));
            return CodeOutcome::for_part(part);
        }

        let part_number = query.part_number.clone();
        let resolver = Arc::clone(&self.resolver);
        let counters = Arc::clone(&self.counters);
        let events = self.events.clone();

        self.enrichment.spawn(async move {
            let part = resolver
                .resolve(&query.part_number, query.quantity_or_empty())
                .await;
            counters.record_outcome(part.found);
            events.emit_lossy(IntakeEvent::for_part(part, false, now));
            events.emit_lossy(IntakeEvent::CountsUpdated {
                counts: counters.snapshot(),
                timestamp: now,
            });
        });

        CodeOutcome::Pending { part_number }
    }

    fn replay(&mut self, payload: &str, code_type: CodeType, now: DateTime<Utc>) -> CodeOutcome {
        if code_type != CodeType::Qr {
            return CodeOutcome::Skipped;
        }

        let Some(query) = PartQuery::from_fields(&parse_fields(payload)) else {
            return CodeOutcome::Skipped;
        };

        match self.resolver.cached(&query.part_number) {
            Some(part) => {
                debug!(part_number = %part.part_number, "Replaying cached part");
                self.events.emit_lossy(IntakeEvent::for_part(part.clone(), true, now));
                CodeOutcome::for_part(part)
            }
            None => {
                debug!(part_number = %query.part_number, "No cached data to replay yet");
                CodeOutcome::Skipped
            }
        }
    }

    fn emit_counts(&self, now: DateTime<Utc>) {
        self.events.emit_lossy(IntakeEvent::CountsUpdated {
            counts: self.counters.snapshot(),
            timestamp: now,
        });
    }

    /// Wait for every outstanding enrichment task
    pub async fn settle(&mut self) {
        while let Some(result) = self.enrichment.join_next().await {
            if let Err(e) = result {
                warn!("Enrichment task failed: {}", e);
            }
        }
    }

    /// Consume frames until the feed closes or `cancel` fires
    pub async fn run(mut self, mut feed: FrameFeed, cancel: CancellationToken) {
        info!(
            rearm_window_secs = self.window.window().as_secs(),
            known_codes = self.window.seen_count(),
            "Pipeline started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                frame = feed.next() => match frame {
                    Some(frame) => {
                        self.process_frame(&frame, Utc::now());
                    }
                    None => break,
                },
                Some(result) = self.enrichment.join_next(), if !self.enrichment.is_empty() => {
                    if let Err(e) = result {
                        warn!("Enrichment task failed: {}", e);
                    }
                }
            }
        }

        self.shutdown().await;
    }

    async fn shutdown(mut self) {
        let pending = self.enrichment.len();
        if pending > 0 {
            info!(pending, "Waiting for enrichment tasks");
            if tokio::time::timeout(self.config.shutdown_grace, self.settle())
                .await
                .is_err()
            {
                warn!(
                    abandoned = self.enrichment.len(),
                    "Abandoning enrichment tasks at shutdown"
                );
            }
        }

        info!(counts = ?self.counters.snapshot(), "Pipeline stopped");
    }
}

fn parse_fields(payload: &str) -> PayloadFields {
    payload::parse(payload).unwrap_or_else(|e| {
        warn!(payload = %payload, "Unparseable QR payload: {}", e);
        PayloadFields::new()
    })
}
