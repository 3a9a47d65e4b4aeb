mod collective_metadata;
mod rank_zero;
mod stragglers;
mod unbalanced;

pub use collective_metadata::{detect_collective_metadata, shared_small_offsets};
pub use rank_zero::{detect_rank_zero, diagnose, Dominance, ExceededFlags, RankZeroDiagnosis};
pub use stragglers::straggler_rows;
pub use unbalanced::{detect_unbalanced, unbalanced_ranks};

use crate::models::{Api, BottleneckFinding, IOPhase, NormalizedAccess, StragglerRow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of one detector: the finding, if any, plus the ranks per API and
/// the row positions (into the analyzed table) that triggered it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub finding: Option<BottleneckFinding>,
    pub ranks: BTreeMap<Api, Vec<u32>>,
    pub rows: Vec<usize>,
}

impl Detection {
    pub fn fired(&self) -> bool {
        self.finding.is_some()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct DetectorSelection {
    pub rank_zero: bool,
    pub unbalanced: bool,
    pub stragglers: bool,
    pub collective_metadata: bool,
}

impl Default for DetectorSelection {
    fn default() -> Self {
        Self {
            rank_zero: true,
            unbalanced: true,
            stragglers: true,
            collective_metadata: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectorReport {
    pub rank_zero: Option<Detection>,
    pub unbalanced: Option<Detection>,
    pub collective_metadata: Option<Detection>,
    pub stragglers: Vec<StragglerRow>,
}

impl DetectorReport {
    // Findings in code order
    pub fn findings(&self) -> Vec<BottleneckFinding> {
        [&self.rank_zero, &self.unbalanced, &self.collective_metadata]
            .into_iter()
            .flatten()
            .filter_map(|d| d.finding.clone())
            .collect()
    }
}

pub fn run_detectors(
    table: &[NormalizedAccess],
    phases: &[IOPhase],
    selection: &DetectorSelection,
) -> DetectorReport {
    DetectorReport {
        rank_zero: selection.rank_zero.then(|| detect_rank_zero(table)),
        unbalanced: selection.unbalanced.then(|| detect_unbalanced(table)),
        collective_metadata: selection
            .collective_metadata
            .then(|| detect_collective_metadata(table)),
        stragglers: if selection.stragglers {
            straggler_rows(phases)
        } else {
            Vec::new()
        },
    }
}
