//! HTTP API handlers for partscan-intake
//!
//! REST endpoints for the cache and counters, scan submission, and an SSE
//! stream of intake events for presentation clients.

pub mod health;
pub mod parts;
pub mod scans;
pub mod sse;

pub use health::health_routes;
pub use parts::parts_routes;
pub use scans::scan_routes;
pub use sse::event_stream;
