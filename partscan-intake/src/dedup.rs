//! Dedup / rate window
//!
//! A code held in front of the camera is decoded on every frame. The window
//! decides which sightings are worth acting on: the first sighting of a
//! payload is NEW, later sightings are suppressed until the rearm window
//! elapses, after which the payload is reported again as REPEAT_EXPIRED.
//!
//! Only the single frame-processing consumer touches the window, so it
//! carries no locking.

use chrono::{DateTime, Utc};
use partscan_common::CodeType;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Default rearm window
pub const DEFAULT_REARM_WINDOW: Duration = Duration::from_secs(20);

/// Admission decision for one sighting of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Admission {
    /// Never admitted before; record and resolve it
    New,
    /// Seen within the rearm window; ignore this sighting
    RepeatWithinWindow,
    /// Seen before, window elapsed; replay cached data only
    RepeatExpired,
}

/// A payload sighted during this session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedCode {
    pub payload: String,
    pub code_type: CodeType,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Time-windowed memory of admitted payloads
#[derive(Debug)]
pub struct DedupWindow {
    window: Duration,
    /// Every payload ever admitted as NEW, including earlier sessions
    seen: HashSet<String>,
    /// Time of the last NEW/REPEAT_EXPIRED admission per payload
    last_admitted: HashMap<String, DateTime<Utc>>,
    /// Sightings in this session
    codes: HashMap<String, ScannedCode>,
}

impl DedupWindow {
    pub fn new(window: Duration) -> Self {
        Self::with_seen(window, std::iter::empty())
    }

    /// Window seeded with payloads admitted in earlier sessions
    ///
    /// Those payloads have no admission timestamp, so their first sighting
    /// in this session is REPEAT_EXPIRED rather than NEW.
    pub fn with_seen(window: Duration, seen: impl IntoIterator<Item = String>) -> Self {
        Self {
            window,
            seen: seen.into_iter().collect(),
            last_admitted: HashMap::new(),
            codes: HashMap::new(),
        }
    }

    /// Decide what to do with a sighting of `payload` at `now`
    pub fn admit(&mut self, payload: &str, code_type: CodeType, now: DateTime<Utc>) -> Admission {
        self.codes
            .entry(payload.to_string())
            .and_modify(|code| code.last_seen_at = now)
            .or_insert_with(|| ScannedCode {
                payload: payload.to_string(),
                code_type,
                first_seen_at: now,
                last_seen_at: now,
            });

        if self.seen.insert(payload.to_string()) {
            self.last_admitted.insert(payload.to_string(), now);
            return Admission::New;
        }

        if let Some(last) = self.last_admitted.get(payload) {
            // A clock step backwards counts as "still within the window"
            let elapsed = now
                .signed_duration_since(*last)
                .to_std()
                .unwrap_or(Duration::ZERO);
            if elapsed < self.window {
                return Admission::RepeatWithinWindow;
            }
        }

        self.last_admitted.insert(payload.to_string(), now);
        Admission::RepeatExpired
    }

    pub fn is_seen(&self, payload: &str) -> bool {
        self.seen.contains(payload)
    }

    /// Number of distinct payloads ever admitted
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Session record for a payload, if sighted this session
    pub fn code(&self, payload: &str) -> Option<&ScannedCode> {
        self.codes.get(payload)
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new(DEFAULT_REARM_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_new_then_within_then_expired() {
        let mut window = DedupWindow::default();
        let payload = "{pm:R1-100K,qty:10}";

        assert_eq!(window.admit(payload, CodeType::Qr, at(0)), Admission::New);
        assert_eq!(
            window.admit(payload, CodeType::Qr, at(1)),
            Admission::RepeatWithinWindow
        );
        assert_eq!(
            window.admit(payload, CodeType::Qr, at(25)),
            Admission::RepeatExpired
        );
    }

    #[test]
    fn test_window_rearms_after_expired_admission() {
        let mut window = DedupWindow::new(Duration::from_secs(20));
        let payload = "A";

        window.admit(payload, CodeType::Barcode, at(0));
        assert_eq!(window.admit(payload, CodeType::Barcode, at(20)), Admission::RepeatExpired);
        // Rearmed at t=20
        assert_eq!(
            window.admit(payload, CodeType::Barcode, at(39)),
            Admission::RepeatWithinWindow
        );
        assert_eq!(window.admit(payload, CodeType::Barcode, at(40)), Admission::RepeatExpired);
    }

    #[test]
    fn test_continuous_sightings_do_not_extend_window() {
        let mut window = DedupWindow::new(Duration::from_secs(20));
        let payload = "held-in-view";

        window.admit(payload, CodeType::Qr, at(0));
        for t in 1..20 {
            assert_eq!(
                window.admit(payload, CodeType::Qr, at(t)),
                Admission::RepeatWithinWindow
            );
        }
        assert_eq!(window.admit(payload, CodeType::Qr, at(20)), Admission::RepeatExpired);
    }

    #[test]
    fn test_payload_identity_is_exact() {
        let mut window = DedupWindow::default();
        assert_eq!(window.admit("{pm:X,qty:1}", CodeType::Qr, at(0)), Admission::New);
        assert_eq!(window.admit("{pm:X,qty:2}", CodeType::Qr, at(0)), Admission::New);
        assert_eq!(window.admit("{pm:X,qty:1} ", CodeType::Qr, at(0)), Admission::New);
        assert_eq!(window.seen_count(), 3);
    }

    #[test]
    fn test_seeded_payload_is_repeat_expired() {
        let mut window =
            DedupWindow::with_seen(DEFAULT_REARM_WINDOW, vec!["old".to_string()]);

        assert!(window.is_seen("old"));
        assert_eq!(window.admit("old", CodeType::Qr, at(0)), Admission::RepeatExpired);
        assert_eq!(
            window.admit("old", CodeType::Qr, at(5)),
            Admission::RepeatWithinWindow
        );
    }

    #[test]
    fn test_sighting_timestamps() {
        let mut window = DedupWindow::default();
        window.admit("P", CodeType::Qr, at(0));
        window.admit("P", CodeType::Qr, at(3));
        window.admit("P", CodeType::Qr, at(7));

        let code = window.code("P").unwrap();
        assert_eq!(code.first_seen_at, at(0));
        assert_eq!(code.last_seen_at, at(7));
        assert_eq!(code.code_type, CodeType::Qr);
        assert!(window.code("Q").is_none());
    }

    #[test]
    fn test_clock_step_back_stays_within_window() {
        let mut window = DedupWindow::default();
        window.admit("P", CodeType::Qr, at(100));
        assert_eq!(
            window.admit("P", CodeType::Qr, at(50)),
            Admission::RepeatWithinWindow
        );
    }
}
