//! Error types for the `hegemon-world` crate.
//!
//! Every variant is a data-integrity error: a reference in the loaded
//! snapshot that does not resolve, or a structural rule the snapshot breaks.
//! They are reported before any phase runs, never papered over with zeros.

use hegemon_types::{CaravanId, RegionId, RegionLocationId, RelationId, VillageId};

/// Errors that can occur building or validating the world state.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A referenced village does not exist.
    #[error("village not found: {0}")]
    MissingVillage(VillageId),

    /// A referenced region does not exist.
    #[error("region not found: {0}")]
    MissingRegion(RegionId),

    /// A region location does not exist.
    #[error("region location not found: {0}")]
    MissingLocation(RegionLocationId),

    /// A relation does not exist.
    #[error("relation not found: {0}")]
    MissingRelation(RelationId),

    /// A castle or town has no occupying village.
    #[error("region location {0} has no occupant")]
    MissingOccupant(RegionLocationId),

    /// A region has more than one castle.
    #[error("region {region} has more than one castle ({first} and {second})")]
    DuplicateCastle {
        /// The region.
        region: RegionId,
        /// The first castle found.
        first: RegionLocationId,
        /// The second castle found.
        second: RegionLocationId,
    },

    /// A relation references a village that does not exist.
    #[error("relation {relation} references missing village {village}")]
    DanglingRelation {
        /// The relation.
        relation: RelationId,
        /// The missing village.
        village: VillageId,
    },

    /// A caravan references a region or village that does not exist.
    #[error("caravan {0} references a missing region or village")]
    DanglingCaravan(CaravanId),

    /// An upgrade or building is attached to the wrong village.
    #[error("village {village} holds an entry owned by village {owner}")]
    ForeignOwnership {
        /// The village holding the entry.
        village: VillageId,
        /// The owner recorded on the entry.
        owner: VillageId,
    },

    /// Two entities of the same kind share an identifier.
    #[error("duplicate {kind} id {id}")]
    Duplicate {
        /// Entity kind.
        kind: &'static str,
        /// Raw identifier.
        id: i64,
    },
}
