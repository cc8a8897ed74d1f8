//! In-process catalog double
//!
//! Answers from a fixed table of known parts and counts every call.

use async_trait::async_trait;
use partscan_intake::catalog::{CatalogError, CatalogPart, CatalogResponse, PartCatalog};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub struct ScriptedCatalog {
    known: HashMap<String, String>,
    calls: AtomicUsize,
    queried: Mutex<Vec<String>>,
    delay: Duration,
    offline: bool,
}

impl ScriptedCatalog {
    pub fn new() -> Self {
        Self {
            known: HashMap::new(),
            calls: AtomicUsize::new(0),
            queried: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            offline: false,
        }
    }

    /// Register a part the catalog will find
    pub fn with_part(mut self, part_number: &str, description: &str) -> Self {
        self.known
            .insert(part_number.to_string(), description.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every request with a transport error
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl PartCatalog for ScriptedCatalog {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn search(&self, part_number: &str) -> Result<CatalogResponse, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queried.lock().unwrap().push(part_number.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.offline {
            return Err(CatalogError::Network("connection refused".to_string()));
        }

        let parts = match self.known.get(part_number) {
            Some(description) => vec![CatalogPart {
                manufacturer_part_number: Some(part_number.to_string()),
                description: Some(description.clone()),
                data_sheet_url: Some(format!("https://example.com/{}.pdf", part_number)),
                image_path: Some(format!("https://example.com/{}.jpg", part_number)),
                ..Default::default()
            }],
            None => Vec::new(),
        };

        Ok(CatalogResponse::with_parts(parts))
    }
}
