//! Part resolver: local cache first, remote catalog on a miss
//!
//! Every resolution ends in a cached [`ResolvedPart`], including failures:
//! a zero-match response, an error response and a transport failure all
//! produce a `found = false` record so the same unknown part number is
//! never queried twice.
//!
//! At most one catalog request is outstanding per part number. Concurrent
//! callers for the same part number share one in-flight lookup through a
//! per-key `OnceCell`; the store's keyed insert covers the remaining race
//! with callers that arrive after the lookup finished.

use crate::catalog::{CatalogPart, PartCatalog};
use crate::store::CacheStore;
use partscan_common::ResolvedPart;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

type InFlight = HashMap<String, Arc<OnceCell<ResolvedPart>>>;

pub struct PartResolver {
    store: Arc<CacheStore>,
    catalog: Arc<dyn PartCatalog>,
    in_flight: Mutex<InFlight>,
}

impl PartResolver {
    pub fn new(store: Arc<CacheStore>, catalog: Arc<dyn PartCatalog>) -> Self {
        Self {
            store,
            catalog,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Cached record only; never touches the catalog
    pub fn cached(&self, part_number: &str) -> Option<ResolvedPart> {
        self.store.get_part(part_number)
    }

    /// Resolve a part number, querying the catalog only on a cache miss
    pub async fn resolve(&self, part_number: &str, quantity: &str) -> ResolvedPart {
        if let Some(part) = self.store.get_part(part_number) {
            debug!(part_number = %part_number, found = part.found, "Part cache hit");
            return part;
        }

        let cell = Arc::clone(
            self.in_flight()
                .entry(part_number.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        );

        let part = cell
            .get_or_init(|| self.fetch_and_store(part_number, quantity))
            .await
            .clone();

        let mut in_flight = self.in_flight();
        if in_flight
            .get(part_number)
            .is_some_and(|current| Arc::ptr_eq(current, &cell))
        {
            in_flight.remove(part_number);
        }

        part
    }

    /// Number of part numbers with a lookup in progress
    pub fn in_flight_count(&self) -> usize {
        self.in_flight().len()
    }

    fn in_flight(&self) -> MutexGuard<'_, InFlight> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch_and_store(&self, part_number: &str, quantity: &str) -> ResolvedPart {
        // Resolved by another path since the cache check
        if let Some(part) = self.store.get_part(part_number) {
            return part;
        }

        let part = self.lookup_remote(part_number, quantity).await;
        self.store_blocking(part).await
    }

    /// Insert on the blocking pool; the append does synchronous file IO
    async fn store_blocking(&self, part: ResolvedPart) -> ResolvedPart {
        let store = Arc::clone(&self.store);
        let fallback = part.clone();
        match tokio::task::spawn_blocking(move || store.append_resolved(part)).await {
            Ok(outcome) => outcome.record,
            Err(e) => {
                error!(part_number = %fallback.part_number, "Part append task failed: {}", e);
                fallback
            }
        }
    }

    async fn lookup_remote(&self, part_number: &str, quantity: &str) -> ResolvedPart {
        info!(
            part_number = %part_number,
            catalog = self.catalog.name(),
            "Looking up part in remote catalog"
        );

        match self.catalog.search(part_number).await {
            Ok(response) => match response.first_match() {
                Some(found) => {
                    info!(part_number = %part_number, "Catalog match found");
                    part_from_match(part_number, quantity, found)
                }
                None => {
                    info!(
                        part_number = %part_number,
                        errors = response.errors.len(),
                        "No catalog match"
                    );
                    ResolvedPart::not_found(part_number, quantity)
                }
            },
            Err(e) => {
                warn!(
                    part_number = %part_number,
                    "Catalog lookup failed, recording part as not found: {}", e
                );
                ResolvedPart::not_found(part_number, quantity)
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn part_from_match(part_number: &str, quantity: &str, found: &CatalogPart) -> ResolvedPart {
    ResolvedPart {
        part_number: part_number.to_string(),
        quantity: quantity.to_string(),
        description: non_empty(&found.description),
        datasheet_url: non_empty(&found.data_sheet_url),
        image_path: non_empty(&found.image_path),
        found: true,
    }
}
