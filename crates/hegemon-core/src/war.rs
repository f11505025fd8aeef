//! War victory evaluator trait and default implementation.
//!
//! Once per hourly tick, after decay and before base production, the engine
//! hands every active war to a [`VictoryEvaluator`]. The evaluator decides
//! whether either side has won and returns the writes that close the war.
//! The win condition itself is not part of the tick engine.
//!
//! Returned mutations are merged into the run's batch in the order the
//! wars were evaluated. They do not alter the in-memory working set, so the
//! territorial pass later in the same tick still sees pre-victory
//! occupants.

use chrono::{DateTime, Utc};

use hegemon_types::{Relation, RelationId};
use hegemon_world::WorldState;

use crate::mutation::Mutation;

/// Errors a victory evaluator can report for one war.
#[derive(Debug, thiserror::Error)]
pub enum VictoryError {
    /// The war references state the evaluator cannot resolve.
    #[error("war {relation} cannot be evaluated: {reason}")]
    Unresolvable {
        /// The war.
        relation: RelationId,
        /// Why evaluation failed.
        reason: String,
    },

    /// An internal error in the evaluator.
    #[error("victory evaluator error: {message}")]
    Internal {
        /// Description of the error.
        message: String,
    },
}

/// A source of war-closing writes.
///
/// [`evaluate`] is called once per active war per tick. Returning an empty
/// list means the war continues.
///
/// [`evaluate`]: VictoryEvaluator::evaluate
pub trait VictoryEvaluator {
    /// Evaluate one active war.
    ///
    /// # Errors
    ///
    /// Returns [`VictoryError`] if this war cannot be evaluated. The tick
    /// records the failure and continues with the remaining wars.
    fn evaluate(
        &self,
        war: &Relation,
        world: &WorldState,
        now: DateTime<Utc>,
    ) -> Result<Vec<Mutation>, VictoryError>;
}

/// An evaluator under which no war is ever won.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVictory;

impl NoVictory {
    /// Create a new evaluator.
    pub const fn new() -> Self {
        Self
    }
}

impl VictoryEvaluator for NoVictory {
    fn evaluate(
        &self,
        _war: &Relation,
        _world: &WorldState,
        _now: DateTime<Utc>,
    ) -> Result<Vec<Mutation>, VictoryError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hegemon_types::{RelationKind, VillageId};

    use super::*;

    #[test]
    fn no_victory_returns_nothing() {
        let war = Relation {
            id: RelationId(1),
            village1_id: VillageId(1),
            village2_id: VillageId(2),
            kind: RelationKind::War,
            relation_start: Utc::now(),
            relation_end: None,
        };
        let writes = NoVictory::new()
            .evaluate(&war, &WorldState::new(), Utc::now())
            .unwrap();
        assert!(writes.is_empty());
    }
}
