//! Typed mutation records and the ordered batch a run commits.
//!
//! Every write a pipeline intends to make is appended to a
//! [`MutationBatch`] as a [`Mutation`]. The batch is either handed to the
//! store to apply atomically, or rendered as a trace in dry-run mode. Both
//! paths see the same list.

use core::fmt;

use chrono::{DateTime, Utc};

use hegemon_types::{
    Building, CaravanId, NewCaravan, RegionLocation, RegionLocationId, RelationId,
    ResourceBundle, ResourceLogEntry, Upgrade, Village, VillageId,
};

/// Printed before a dry-run trace.
pub const DRY_RUN_BEGIN: &str = "Debug running...";

/// Printed after a dry-run trace.
pub const DRY_RUN_END: &str = "Debug complete";

/// Printed after a committed run.
pub const RUN_COMPLETE: &str = "Script complete";

/// One intended write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Overwrite a village's resource balances.
    VillageResources {
        /// The village.
        village_id: VillageId,
        /// New balances.
        resources: ResourceBundle,
    },

    /// Overwrite a village's aggregate scores.
    VillageScores {
        /// The village.
        village_id: VillageId,
        /// New research score.
        research_score: i64,
        /// New construction score.
        construction_score: i64,
    },

    /// Overwrite an upgrade's status and progress fields.
    Upgrade(Upgrade),

    /// Overwrite a building's tier, status, progress fields, and health.
    Building(Building),

    /// Overwrite a location's accrued count, stability, defense, and health.
    RegionLocation {
        /// The location.
        location_id: RegionLocationId,
        /// New accrued resource count.
        resource_count: u64,
        /// New stability.
        stability: i32,
        /// New defense.
        defense: i32,
        /// New health.
        health: i64,
    },

    /// Overwrite only a location's accrued count.
    LocationResourceCount {
        /// The location.
        location_id: RegionLocationId,
        /// New accrued resource count.
        resource_count: u64,
    },

    /// Append a resource log entry.
    ResourceLog(ResourceLogEntry),

    /// Create a caravan.
    InsertCaravan(NewCaravan),

    /// Delete a settled caravan.
    DeleteCaravan(CaravanId),

    /// Close a relation.
    EndRelation {
        /// The relation.
        relation_id: RelationId,
        /// When it ended.
        ended_at: DateTime<Utc>,
    },

    /// Hand a location to a new occupant.
    TransferLocation {
        /// The location.
        location_id: RegionLocationId,
        /// The new occupant.
        occupying_village_id: VillageId,
    },
}

impl Mutation {
    /// A resource-balance write reflecting the village's current balances.
    pub fn village_resources(village: &Village) -> Self {
        Self::VillageResources {
            village_id: village.id,
            resources: village.resources.clone(),
        }
    }

    /// A score write reflecting the village's current scores.
    pub const fn village_scores(village: &Village) -> Self {
        Self::VillageScores {
            village_id: village.id,
            research_score: village.research_score,
            construction_score: village.construction_score,
        }
    }

    /// A location write reflecting the location's current state.
    pub const fn region_location(location: &RegionLocation) -> Self {
        Self::RegionLocation {
            location_id: location.id,
            resource_count: location.resource_count,
            stability: location.stability,
            defense: location.defense,
            health: location.health,
        }
    }

    /// Short name of the mutation kind, used in summaries.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::VillageResources { .. } => "village_resources",
            Self::VillageScores { .. } => "village_scores",
            Self::Upgrade(_) => "upgrade",
            Self::Building(_) => "building",
            Self::RegionLocation { .. } => "region_location",
            Self::LocationResourceCount { .. } => "location_resource_count",
            Self::ResourceLog(_) => "resource_log",
            Self::InsertCaravan(_) => "insert_caravan",
            Self::DeleteCaravan(_) => "delete_caravan",
            Self::EndRelation { .. } => "end_relation",
            Self::TransferLocation { .. } => "transfer_location",
        }
    }
}

fn progress_text<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "null".to_owned(), |v| v.to_string())
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VillageResources {
                village_id,
                resources,
            } => write!(
                f,
                "UPDATE villages SET resources = {} WHERE village_id = {village_id}",
                resources.to_payload()
            ),
            Self::VillageScores {
                village_id,
                research_score,
                construction_score,
            } => write!(
                f,
                "UPDATE villages SET research_score = {research_score}, \
                 construction_score = {construction_score} WHERE village_id = {village_id}"
            ),
            Self::Upgrade(u) => write!(
                f,
                "UPDATE village_upgrades SET status = '{}', research_progress = {}, \
                 research_progress_required = {}, research_progress_last_updated = {}, \
                 research_boosted = {} WHERE village_id = {} AND id = {}",
                u.status.as_str(),
                progress_text(u.research_progress),
                progress_text(u.research_progress_required),
                progress_text(u.research_progress_last_updated.map(|t| t.timestamp())),
                u.research_boosted,
                u.village_id,
                u.id
            ),
            Self::Building(b) => write!(
                f,
                "UPDATE village_buildings SET status = '{}', tier = {}, construction_progress = {}, \
                 construction_progress_required = {}, construction_progress_last_updated = {}, \
                 construction_boosted = {}, health = {} WHERE village_id = {} AND id = {}",
                b.status.as_str(),
                b.tier,
                progress_text(b.construction_progress),
                progress_text(b.construction_progress_required),
                progress_text(b.construction_progress_last_updated.map(|t| t.timestamp())),
                b.construction_boosted,
                b.health,
                b.village_id,
                b.id
            ),
            Self::RegionLocation {
                location_id,
                resource_count,
                stability,
                defense,
                health,
            } => write!(
                f,
                "UPDATE region_locations SET resource_count = {resource_count}, health = {health}, \
                 defense = {defense}, stability = {stability} WHERE region_location_id = {location_id}"
            ),
            Self::LocationResourceCount {
                location_id,
                resource_count,
            } => write!(
                f,
                "UPDATE region_locations SET resource_count = {resource_count} \
                 WHERE region_location_id = {location_id}"
            ),
            Self::ResourceLog(e) => write!(
                f,
                "INSERT INTO resource_logs (village_id, resource_id, type, quantity, time) \
                 VALUES ({}, {}, {}, {}, {})",
                e.village_id,
                e.resource.code(),
                e.log_type.code(),
                e.quantity,
                e.logged_at.timestamp()
            ),
            Self::InsertCaravan(c) => write!(
                f,
                "INSERT INTO caravans (start_time, travel_time, region_id, village_id, \
                 caravan_type, resources, name) VALUES ({}, {}, {}, {}, {}, '{}', '{}')",
                c.start_time.timestamp(),
                c.travel_time_ms,
                c.region_id,
                c.village_id,
                c.kind.code(),
                c.resources.to_payload(),
                c.name
            ),
            Self::DeleteCaravan(id) => write!(f, "DELETE FROM caravans WHERE id = {id}"),
            Self::EndRelation {
                relation_id,
                ended_at,
            } => write!(
                f,
                "UPDATE village_relations SET relation_end = {} WHERE relation_id = {relation_id}",
                ended_at.timestamp()
            ),
            Self::TransferLocation {
                location_id,
                occupying_village_id,
            } => write!(
                f,
                "UPDATE region_locations SET occupying_village_id = {occupying_village_id} \
                 WHERE region_location_id = {location_id}"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// An ordered list of mutations applied as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationBatch {
    mutations: Vec<Mutation>,
}

impl MutationBatch {
    /// Create an empty batch.
    pub const fn new() -> Self {
        Self {
            mutations: Vec::new(),
        }
    }

    /// Append one mutation.
    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    /// Number of mutations.
    pub const fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Whether the batch is empty.
    pub const fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Mutations in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Mutation> {
        self.mutations.iter()
    }

    /// Number of mutations of one kind.
    pub fn count_of(&self, kind: &str) -> usize {
        self.mutations.iter().filter(|m| m.kind() == kind).count()
    }
}

impl Extend<Mutation> for MutationBatch {
    fn extend<I: IntoIterator<Item = Mutation>>(&mut self, iter: I) {
        self.mutations.extend(iter);
    }
}

impl IntoIterator for MutationBatch {
    type Item = Mutation;
    type IntoIter = std::vec::IntoIter<Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.into_iter()
    }
}

/// The dry-run trace: every mutation on its own line between the markers.
impl fmt::Display for MutationBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{DRY_RUN_BEGIN}")?;
        for mutation in &self.mutations {
            writeln!(f, "{mutation}")?;
        }
        write!(f, "{DRY_RUN_END}")
    }
}
