//! In-memory mirror of the peripherals reported by the native stack.

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::identifier::peripheral_id_from_id;
use crate::model::{AdvertisementData, Peripheral};

/// Cached peripherals and their latest advertisements.
#[derive(Default)]
pub struct EntityStore {
    /// Peripherals by identifier.
    peripherals: RwLock<HashMap<String, Peripheral>>,
    /// Latest advertisement per peripheral identifier.
    advertisements: RwLock<HashMap<String, AdvertisementData>>,
}

impl EntityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a snapshot into the cached peripheral with the same identifier.
    ///
    /// A peripheral seen for the first time is stamped with the current
    /// time. Discovery timestamp, advertisement data and RSSI are kept
    /// unless the snapshot carries replacements.
    pub fn upsert_peripheral(&self, snapshot: Peripheral) -> Peripheral {
        let mut peripherals = self.peripherals.write();

        let merged = match peripherals.remove(&snapshot.id) {
            Some(existing) => existing.merge(snapshot),
            None => {
                debug!("Caching new peripheral {}", snapshot.id);
                Peripheral {
                    discovery_timestamp: snapshot.discovery_timestamp.or_else(|| Some(Utc::now())),
                    ..snapshot
                }
            }
        };

        trace!("Peripheral {} is {}", merged.id, merged.state);
        peripherals.insert(merged.id.clone(), merged.clone());
        merged
    }

    /// Apply `update` to a cached peripheral in place.
    ///
    /// A peripheral not seen before is cached as a bare snapshot first.
    pub fn modify_peripheral<F>(&self, peripheral_id: &str, update: F) -> Peripheral
    where
        F: FnOnce(&mut Peripheral),
    {
        let mut peripherals = self.peripherals.write();

        let peripheral = peripherals
            .entry(peripheral_id.to_string())
            .or_insert_with(|| {
                debug!("Caching new peripheral {}", peripheral_id);
                Peripheral {
                    discovery_timestamp: Some(Utc::now()),
                    ..Peripheral::new(peripheral_id)
                }
            });
        update(peripheral);
        peripheral.clone()
    }

    /// Replace the advertisement recorded for a peripheral.
    pub fn upsert_advertisement(&self, peripheral_id: &str, data: AdvertisementData) {
        self.advertisements
            .write()
            .insert(peripheral_id.to_string(), data);
    }

    /// Latest advertisement recorded for a peripheral.
    pub fn advertisement(&self, peripheral_id: &str) -> Option<AdvertisementData> {
        self.advertisements.read().get(peripheral_id).cloned()
    }

    /// All cached peripherals. Iteration order is unspecified.
    pub fn get_all(&self) -> HashMap<String, Peripheral> {
        self.peripherals.read().clone()
    }

    /// Cached peripheral owning any composite identifier.
    pub fn get(&self, id: &str) -> Option<Peripheral> {
        self.peripherals
            .read()
            .get(peripheral_id_from_id(id))
            .cloned()
    }

    /// Drop every cached peripheral.
    pub fn invalidate_all(&self) {
        let mut peripherals = self.peripherals.write();
        debug!("Invalidating {} cached peripherals", peripherals.len());
        peripherals.clear();
    }

    /// Number of cached peripherals.
    pub fn len(&self) -> usize {
        self.peripherals.read().len()
    }

    /// Check if no peripherals are cached.
    pub fn is_empty(&self) -> bool {
        self.peripherals.read().is_empty()
    }
}
