//! The resource log: an append-only record of every resource movement.
//!
//! The [`ResourceLog`] struct is the in-memory log for one engine run. Each
//! phase appends [`ResourceLogEntry`] values through the typed `record_*`
//! methods; the commit stage turns them into inserts.
//!
//! # Design
//!
//! - **Append-only**: entries are never modified or deleted.
//! - **Attributed**: every entry names exactly one village.
//! - **Unsigned**: quantities are the magnitude moved; the log type says
//!   which direction.

use chrono::{DateTime, Utc};

use hegemon_types::{ResourceKind, ResourceLogEntry, ResourceLogType, VillageId};

// ---------------------------------------------------------------------------
// ResourceLog
// ---------------------------------------------------------------------------

/// The append-only log of resource movements for one run.
#[derive(Debug, Default, Clone)]
pub struct ResourceLog {
    /// All entries, in insertion order.
    entries: Vec<ResourceLogEntry>,
}

impl ResourceLog {
    /// Create a new empty log.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Return the number of entries in the log.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return whether the log has no entries.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record one movement.
    pub fn record(
        &mut self,
        village_id: VillageId,
        resource: ResourceKind,
        log_type: ResourceLogType,
        quantity: u64,
        logged_at: DateTime<Utc>,
    ) {
        self.entries.push(ResourceLogEntry {
            village_id,
            resource,
            log_type,
            quantity,
            logged_at,
        });
    }

    /// Record resources produced for a village.
    pub fn record_production(
        &mut self,
        village_id: VillageId,
        resource: ResourceKind,
        quantity: u64,
        logged_at: DateTime<Utc>,
    ) {
        self.record(village_id, resource, ResourceLogType::Production, quantity, logged_at)
    }

    /// Record resources credited to a village's stores.
    pub fn record_collection(
        &mut self,
        village_id: VillageId,
        resource: ResourceKind,
        quantity: u64,
        logged_at: DateTime<Utc>,
    ) {
        self.record(village_id, resource, ResourceLogType::Collection, quantity, logged_at)
    }

    /// Record resources lost to storage decay.
    pub fn record_decay(
        &mut self,
        village_id: VillageId,
        resource: ResourceKind,
        quantity: u64,
        logged_at: DateTime<Utc>,
    ) {
        self.record(village_id, resource, ResourceLogType::Decay, quantity, logged_at)
    }

    /// Record resources charged as upgrade upkeep.
    pub fn record_upkeep(
        &mut self,
        village_id: VillageId,
        resource: ResourceKind,
        quantity: u64,
        logged_at: DateTime<Utc>,
    ) {
        self.record(
            village_id,
            resource,
            ResourceLogType::UpgradeUpkeep,
            quantity,
            logged_at,
        )
    }

    /// Return all entries in insertion order.
    pub fn entries(&self) -> &[ResourceLogEntry] {
        &self.entries
    }

    /// Consume the log, returning its entries.
    pub fn into_entries(self) -> Vec<ResourceLogEntry> {
        self.entries
    }

    /// Sum of quantities for one village, resource and log type.
    pub fn total(
        &self,
        village_id: VillageId,
        resource: ResourceKind,
        log_type: ResourceLogType,
    ) -> u64 {
        self.entries
            .iter()
            .filter(|e| e.village_id == village_id && e.resource == resource && e.log_type == log_type)
            .fold(0_u64, |acc, e| acc.saturating_add(e.quantity))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn new_log_is_empty() {
        let log = ResourceLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn record_preserves_insertion_order() {
        let mut log = ResourceLog::new();
        let now = Utc::now();
        log.record_upkeep(VillageId(1), ResourceKind::Food, 4, now);
        log.record_decay(VillageId(1), ResourceKind::Materials, 2, now);
        log.record_production(VillageId(2), ResourceKind::Wealth, 9, now);

        let types: Vec<ResourceLogType> = log.entries().iter().map(|e| e.log_type).collect();
        assert_eq!(
            types,
            vec![
                ResourceLogType::UpgradeUpkeep,
                ResourceLogType::Decay,
                ResourceLogType::Production,
            ]
        );
    }

    #[test]
    fn record_appends_the_new_entry() {
        let mut log = ResourceLog::new();
        log.record_collection(VillageId(3), ResourceKind::Food, 11, Utc::now());
        let entry = log.entries().last().unwrap();
        assert_eq!(entry.village_id, VillageId(3));
        assert_eq!(entry.quantity, 11);
        assert_eq!(entry.log_type, ResourceLogType::Collection);
    }

    #[test]
    fn zero_quantities_are_recorded() {
        let mut log = ResourceLog::new();
        log.record_upkeep(VillageId(1), ResourceKind::Wealth, 0, Utc::now());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn totals_filter_by_village_resource_and_type() {
        let mut log = ResourceLog::new();
        let now = Utc::now();
        log.record_production(VillageId(1), ResourceKind::Food, 5, now);
        log.record_production(VillageId(1), ResourceKind::Food, 7, now);
        log.record_collection(VillageId(1), ResourceKind::Food, 5, now);
        log.record_production(VillageId(2), ResourceKind::Food, 100, now);

        assert_eq!(
            log.total(VillageId(1), ResourceKind::Food, ResourceLogType::Production),
            12
        );
        assert_eq!(
            log.total(VillageId(2), ResourceKind::Food, ResourceLogType::Production),
            100
        );
        assert_eq!(
            log.total(VillageId(1), ResourceKind::Wealth, ResourceLogType::Production),
            0
        );
    }
}
