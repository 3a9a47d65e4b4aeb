use super::Detection;
use crate::models::{Api, BottleneckFinding, NormalizedAccess, Operation, CODE_UNBALANCED};
use crate::utils::constants::UNBALANCED_Z_SCORE;
use crate::utils::{mean, population_std_dev, round_time};
use std::collections::{BTreeMap, BTreeSet};

const RECOMMENDATIONS: [&str; 4] = [
    "Consider better balancing the data transfer between the application ranks",
    "Consider tuning the stripe size and count to better distribute the data",
    "Consider using MPI-IO collective operations to aggregate requests across ranks",
    "If the application uses netCDF and HDF5, double check the need to set NO_FILL values",
];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RankLoad {
    pub reads: f64,
    pub writes: f64,
    pub bytes: f64,
    pub duration: f64,
}

impl RankLoad {
    fn metrics(&self) -> [f64; 4] {
        [self.reads, self.writes, self.bytes, self.duration]
    }
}

pub fn rank_loads(table: &[NormalizedAccess], api: Api) -> BTreeMap<u32, RankLoad> {
    let mut loads: BTreeMap<u32, RankLoad> = BTreeMap::new();
    for access in table.iter().filter(|a| a.api == api) {
        let load = loads.entry(access.rank).or_default();
        match access.operation {
            Operation::Read => load.reads += 1.0,
            Operation::Write => load.writes += 1.0,
        }
        load.bytes += access.size as f64;
        load.duration += round_time(access.duration());
    }
    loads
}

// Positions whose value lies strictly above mean + z * stddev
fn above_band(values: &[f64]) -> BTreeSet<usize> {
    let (Some(avg), Some(sd)) = (mean(values), population_std_dev(values)) else {
        return BTreeSet::new();
    };
    let limit = avg + UNBALANCED_Z_SCORE * sd;
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v > limit)
        .map(|(idx, _)| idx)
        .collect()
}

/// Ranks of one API that sit above the population band on read count, write
/// count, bytes and accumulated duration at the same time. Needs at least two
/// ranks.
pub fn unbalanced_ranks(table: &[NormalizedAccess], api: Api) -> Vec<u32> {
    let loads = rank_loads(table, api);
    if loads.len() < 2 {
        return Vec::new();
    }

    let ranks: Vec<u32> = loads.keys().copied().collect();
    let per_metric: Vec<Vec<f64>> = (0..4)
        .map(|m| loads.values().map(|load| load.metrics()[m]).collect())
        .collect();

    let mut selected: Option<BTreeSet<usize>> = None;
    for values in &per_metric {
        let above = above_band(values);
        selected = Some(match selected {
            None => above,
            Some(prev) => prev.intersection(&above).copied().collect(),
        });
    }

    selected
        .unwrap_or_default()
        .into_iter()
        .map(|idx| ranks[idx])
        .collect()
}

pub fn detect_unbalanced(table: &[NormalizedAccess]) -> Detection {
    let mut ranks: BTreeMap<Api, Vec<u32>> = BTreeMap::new();
    for api in Api::ALL {
        let flagged = unbalanced_ranks(table, api);
        if !flagged.is_empty() {
            ranks.insert(api, flagged);
        }
    }
    if ranks.is_empty() {
        return Detection::default();
    }

    let listing: Vec<String> = ranks
        .iter()
        .map(|(api, flagged)| {
            let ids: Vec<String> = flagged.iter().map(u32::to_string).collect();
            format!("{} rank(s) {}", api, ids.join(", "))
        })
        .collect();
    let issue = format!(
        "Detected unbalanced workload between the ranks ({})",
        listing.join("; ")
    );

    let rows = table
        .iter()
        .enumerate()
        .filter(|(_, a)| ranks.get(&a.api).is_some_and(|r| r.contains(&a.rank)))
        .map(|(idx, _)| idx)
        .collect();

    Detection {
        finding: Some(BottleneckFinding::new(CODE_UNBALANCED, issue, &RECOMMENDATIONS)),
        ranks,
        rows,
    }
}
