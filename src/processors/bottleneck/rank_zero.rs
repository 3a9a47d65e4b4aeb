use super::Detection;
use crate::models::{Api, BottleneckFinding, NormalizedAccess, Operation, CODE_RANK_ZERO};
use std::collections::{BTreeMap, BTreeSet};

const RECOMMENDATIONS: [&str; 1] = ["Consider using MPI-IO collective"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Workload {
    pub reads: u64,
    pub writes: u64,
    pub bytes: u64,
}

impl Workload {
    fn add(&mut self, access: &NormalizedAccess) {
        match access.operation {
            Operation::Read => self.reads += 1,
            Operation::Write => self.writes += 1,
        }
        self.bytes += access.size;
    }
}

/// Metrics on which some other rank was seen doing more than rank 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExceededFlags {
    pub read: bool,
    pub write: bool,
    pub bytes: bool,
}

impl ExceededFlags {
    pub fn all(&self) -> bool {
        self.read && self.write && self.bytes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dominance {
    AllMetrics,
    ReadOnly,
    WriteOnly,
    Volume,
}

impl Dominance {
    pub fn describe(&self) -> &'static str {
        match self {
            Dominance::AllMetrics => "read and write operations",
            Dominance::ReadOnly => "read operations",
            Dominance::WriteOnly => "write operations",
            Dominance::Volume => "transferred bytes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankZeroDiagnosis {
    pub api: Api,
    pub flags: ExceededFlags,
    pub dominance: Dominance,
}

pub type Workloads = BTreeMap<Api, BTreeMap<u32, Workload>>;

pub fn workloads(table: &[NormalizedAccess]) -> Workloads {
    let mut loads: Workloads = BTreeMap::new();
    for access in table {
        loads
            .entry(access.api)
            .or_default()
            .entry(access.rank)
            .or_default()
            .add(access);
    }
    loads
}

/// Walks the non-zero ranks in increasing order and records, per API, which
/// metrics some rank pushed above rank 0. An API whose flags are all set is no
/// longer compared, and the walk ends once both APIs are saturated. An API that
/// never appears in the table keeps its flags clear, so it also keeps the walk
/// going.
pub fn scan_exceeded(loads: &Workloads) -> BTreeMap<Api, ExceededFlags> {
    let mut flags: BTreeMap<Api, ExceededFlags> =
        Api::ALL.iter().map(|&api| (api, ExceededFlags::default())).collect();

    let ranks: BTreeSet<u32> = loads
        .values()
        .flat_map(|per_rank| per_rank.keys().copied())
        .filter(|&rank| rank != 0)
        .collect();

    for rank in ranks {
        if flags.values().all(ExceededFlags::all) {
            break;
        }

        for (api, api_flags) in flags.iter_mut() {
            if api_flags.all() {
                continue;
            }
            let Some(per_rank) = loads.get(api) else {
                continue;
            };
            let Some(other) = per_rank.get(&rank) else {
                continue;
            };
            let baseline = per_rank.get(&0).copied().unwrap_or_default();

            api_flags.read |= other.reads > baseline.reads;
            api_flags.write |= other.writes > baseline.writes;
            api_flags.bytes |= other.bytes > baseline.bytes;
        }
    }

    flags
}

/// A metric counts against rank 0 when no other rank exceeded it and rank 0
/// actually did some of it.
pub fn classify(flags: ExceededFlags, rank_zero: Workload) -> Option<Dominance> {
    let read = !flags.read && rank_zero.reads > 0;
    let write = !flags.write && rank_zero.writes > 0;
    let bytes = !flags.bytes && rank_zero.bytes > 0;

    match (read, write, bytes) {
        (true, true, _) => Some(Dominance::AllMetrics),
        (true, false, _) => Some(Dominance::ReadOnly),
        (false, true, _) => Some(Dominance::WriteOnly),
        (false, false, true) => Some(Dominance::Volume),
        (false, false, false) => None,
    }
}

pub fn diagnose(table: &[NormalizedAccess]) -> Vec<RankZeroDiagnosis> {
    let loads = workloads(table);
    let flags = scan_exceeded(&loads);

    let mut diagnoses = Vec::new();
    for (api, per_rank) in &loads {
        // Nothing to compare against without a rank 0 and at least one peer
        let Some(&rank_zero) = per_rank.get(&0) else {
            continue;
        };
        if per_rank.len() < 2 {
            continue;
        }
        let api_flags = flags.get(api).copied().unwrap_or_default();
        if let Some(dominance) = classify(api_flags, rank_zero) {
            diagnoses.push(RankZeroDiagnosis {
                api: *api,
                flags: api_flags,
                dominance,
            });
        }
    }
    diagnoses
}

pub fn detect_rank_zero(table: &[NormalizedAccess]) -> Detection {
    let diagnoses = diagnose(table);
    if diagnoses.is_empty() {
        return Detection::default();
    }

    let apis: Vec<String> = diagnoses
        .iter()
        .map(|d| format!("{} ({})", d.api, d.dominance.describe()))
        .collect();
    let issue = format!("Rank 0 is issuing a lot of I/O requests for {}", apis.join(" and "));

    let flagged: BTreeSet<Api> = diagnoses.iter().map(|d| d.api).collect();
    let rows = table
        .iter()
        .enumerate()
        .filter(|(_, a)| a.rank == 0 && flagged.contains(&a.api))
        .map(|(idx, _)| idx)
        .collect();

    Detection {
        finding: Some(BottleneckFinding::new(CODE_RANK_ZERO, issue, &RECOMMENDATIONS)),
        ranks: flagged.into_iter().map(|api| (api, vec![0])).collect(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(api: Api, rank: u32, operation: Operation, size: u64) -> NormalizedAccess {
        NormalizedAccess {
            file_id: 1,
            api,
            rank,
            operation,
            segment: 0,
            offset: 0,
            size,
            start: 0.0,
            end: 1.0,
            osts: vec![],
        }
    }

    fn repeat(api: Api, rank: u32, operation: Operation, size: u64, count: usize) -> Vec<NormalizedAccess> {
        (0..count).map(|_| access(api, rank, operation, size)).collect()
    }

    #[test]
    fn test_rank_zero_writing_ten_times_more_is_write_dominated() {
        let mut table = repeat(Api::Posix, 0, Operation::Write, 1024, 100);
        for rank in 1..4 {
            table.extend(repeat(Api::Posix, rank, Operation::Write, 1024, 10));
        }

        let diagnoses = diagnose(&table);
        assert_eq!(diagnoses.len(), 1);
        assert_eq!(diagnoses[0].api, Api::Posix);
        assert_eq!(diagnoses[0].dominance, Dominance::WriteOnly);

        let detection = detect_rank_zero(&table);
        let finding = detection.finding.unwrap();
        assert_eq!(finding.code, "D01");
        assert_eq!(finding.severity_level, 1);
        assert!(finding.issue_description.starts_with("Rank 0 is issuing a lot of I/O requests for POSIX"));
        assert_eq!(finding.recommendations, vec!["Consider using MPI-IO collective".to_string()]);
        assert_eq!(detection.ranks.get(&Api::Posix), Some(&vec![0]));
        assert_eq!(detection.rows.len(), 100);
    }

    #[test]
    fn test_balanced_ranks_not_flagged() {
        let mut table = Vec::new();
        for rank in 0..4 {
            table.extend(repeat(Api::Posix, rank, Operation::Write, 1024, 10 + rank as usize));
            table.extend(repeat(Api::Posix, rank, Operation::Read, 1024, 10 + rank as usize));
        }
        assert!(diagnose(&table).is_empty());
        assert!(detect_rank_zero(&table).finding.is_none());
    }

    #[test]
    fn test_all_metrics_dominated() {
        let mut table = repeat(Api::MpiIo, 0, Operation::Write, 4096, 20);
        table.extend(repeat(Api::MpiIo, 0, Operation::Read, 4096, 20));
        table.extend(repeat(Api::MpiIo, 1, Operation::Write, 4096, 2));
        table.extend(repeat(Api::MpiIo, 1, Operation::Read, 4096, 2));

        let diagnoses = diagnose(&table);
        assert_eq!(diagnoses[0].api, Api::MpiIo);
        assert_eq!(diagnoses[0].dominance, Dominance::AllMetrics);
        assert_eq!(diagnoses[0].flags, ExceededFlags::default());
    }

    #[test]
    fn test_volume_only_when_counts_exceeded() {
        // rank 1 issues more requests, rank 0 moves more bytes
        let mut table = repeat(Api::Posix, 0, Operation::Write, 1 << 20, 2);
        table.extend(repeat(Api::Posix, 0, Operation::Read, 1 << 20, 2));
        table.extend(repeat(Api::Posix, 1, Operation::Write, 16, 5));
        table.extend(repeat(Api::Posix, 1, Operation::Read, 16, 5));

        let diagnoses = diagnose(&table);
        assert_eq!(diagnoses[0].dominance, Dominance::Volume);
    }

    #[test]
    fn test_api_without_rank_zero_or_peers_skipped() {
        let mut table = repeat(Api::Posix, 1, Operation::Write, 10, 5);
        table.extend(repeat(Api::Posix, 2, Operation::Write, 10, 5));
        table.extend(repeat(Api::MpiIo, 0, Operation::Write, 10, 50));
        assert!(diagnose(&table).is_empty());
    }

    #[test]
    fn test_scan_keeps_flags_once_set() {
        let mut table = repeat(Api::Posix, 0, Operation::Write, 10, 5);
        table.extend(repeat(Api::Posix, 1, Operation::Write, 10, 6));
        table.extend(repeat(Api::Posix, 2, Operation::Write, 10, 1));

        let flags = scan_exceeded(&workloads(&table));
        let posix = flags[&Api::Posix];
        assert!(posix.write);
        assert!(posix.bytes);
        assert!(!posix.read);
        assert_eq!(flags[&Api::MpiIo], ExceededFlags::default());
    }
}
