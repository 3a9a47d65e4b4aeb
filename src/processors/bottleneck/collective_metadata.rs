use super::Detection;
use crate::models::{Api, BottleneckFinding, NormalizedAccess, CODE_COLLECTIVE_METADATA};
use crate::utils::constants::METADATA_MAX_REQUEST_SIZE;
use std::collections::{BTreeMap, BTreeSet};

const RECOMMENDATIONS: [&str; 2] = [
    "Consider using collective metadata operations (e.g. H5Pset_coll_metadata_write and H5Pset_all_coll_metadata_ops in HDF5)",
    "Consider reading shared metadata on a single rank and broadcasting it",
];

/// Offsets hit by small POSIX requests from (almost) every rank.
///
/// Small requests landing on the same offset from at least `ranks - 1` ranks
/// usually come from every process independently reading or updating the same
/// file metadata. Never fewer than two requests per offset.
pub fn shared_small_offsets(table: &[NormalizedAccess]) -> BTreeMap<u64, usize> {
    let ranks: BTreeSet<u32> = table
        .iter()
        .filter(|a| a.api == Api::Posix)
        .map(|a| a.rank)
        .collect();
    if ranks.len() < 2 {
        return BTreeMap::new();
    }

    let mut per_offset: BTreeMap<u64, usize> = BTreeMap::new();
    for access in table
        .iter()
        .filter(|a| a.api == Api::Posix && a.size < METADATA_MAX_REQUEST_SIZE)
    {
        *per_offset.entry(access.offset).or_insert(0) += 1;
    }

    let required = (ranks.len() - 1).max(2);
    per_offset.retain(|_, count| *count >= required);
    per_offset
}

pub fn detect_collective_metadata(table: &[NormalizedAccess]) -> Detection {
    let offsets = shared_small_offsets(table);
    if offsets.is_empty() {
        return Detection::default();
    }

    let rows: Vec<usize> = table
        .iter()
        .enumerate()
        .filter(|(_, a)| {
            a.api == Api::Posix && a.size < METADATA_MAX_REQUEST_SIZE && offsets.contains_key(&a.offset)
        })
        .map(|(idx, _)| idx)
        .collect();
    let ranks: Vec<u32> = rows
        .iter()
        .map(|&idx| table[idx].rank)
        .collect::<BTreeSet<u32>>()
        .into_iter()
        .collect();

    let issue = format!(
        "Detected {} small POSIX request(s) issued by {} rank(s) on {} shared offset(s), likely independent metadata operations",
        rows.len(),
        ranks.len(),
        offsets.len()
    );

    Detection {
        finding: Some(BottleneckFinding::new(
            CODE_COLLECTIVE_METADATA,
            issue,
            &RECOMMENDATIONS,
        )),
        ranks: BTreeMap::from([(Api::Posix, ranks)]),
        rows,
    }
}
