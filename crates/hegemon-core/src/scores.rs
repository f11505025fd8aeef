//! Aggregate research and construction scores.
//!
//! A village's scores are recomputed whenever research or construction
//! completes. The [`ScoreCalculator`] trait is the seam; [`CatalogScores`]
//! derives both scores from the game catalog.

use hegemon_types::{UpgradeStatus, Village};

use crate::catalog::{Catalog, CatalogError};

/// Errors computing a score.
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    /// A catalog lookup failed.
    #[error("score lookup failed: {source}")]
    Catalog {
        /// The underlying catalog error.
        #[from]
        source: CatalogError,
    },
}

/// Computes a village's aggregate scores.
pub trait ScoreCalculator {
    /// Research score after a research completion.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreError`] if an upgrade cannot be scored.
    fn research_score(&self, village: &Village) -> Result<i64, ScoreError>;

    /// Construction score after a construction completion.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreError`] if a building cannot be scored.
    fn construction_score(&self, village: &Village) -> Result<i64, ScoreError>;
}

/// Scores summed from catalog entries.
///
/// Research score sums the catalog score of every upgrade whose research
/// has finished, whatever its activation state. Construction score sums
/// each building's score at its current tier.
#[derive(Debug, Clone, Copy)]
pub struct CatalogScores<'a> {
    catalog: &'a Catalog,
}

impl<'a> CatalogScores<'a> {
    /// Create a calculator over a catalog.
    pub const fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }
}

impl ScoreCalculator for CatalogScores<'_> {
    fn research_score(&self, village: &Village) -> Result<i64, ScoreError> {
        let mut score: i64 = 0;
        for upgrade in &village.upgrades {
            if upgrade.status == UpgradeStatus::Researching {
                continue;
            }
            score = score.saturating_add(self.catalog.upgrade(&upgrade.key)?.research_score);
        }
        Ok(score)
    }

    fn construction_score(&self, village: &Village) -> Result<i64, ScoreError> {
        let mut score: i64 = 0;
        for building in &village.buildings {
            score = score.saturating_add(
                self.catalog
                    .construction_score(&building.key, building.tier)?,
            );
        }
        Ok(score)
    }
}
