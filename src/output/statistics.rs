use crate::models::{Api, NormalizedAccess, Operation};
use std::cmp::Ordering;
use std::collections::BTreeMap;

// Request-size bins, upper bound inclusive
pub const SIZE_BINS: [(u64, &str); 10] = [
    (100, "0-100"),
    (1024, "101-1K"),
    (10 * 1024, "1K-10K"),
    (100 * 1024, "10K-100K"),
    (1024 * 1024, "100K-1M"),
    (4 * 1024 * 1024, "1M-4M"),
    (10 * 1024 * 1024, "4M-10M"),
    (100 * 1024 * 1024, "10M-100M"),
    (1024 * 1024 * 1024, "100M-1G"),
    (u64::MAX, "1G+"),
];

pub fn size_bin(size: u64) -> usize {
    SIZE_BINS
        .iter()
        .position(|&(upper, _)| size <= upper)
        .unwrap_or(SIZE_BINS.len() - 1)
}

// Helper for duration statistics
#[derive(Default)]
struct LatencyStats {
    values: Vec<f64>,
    sum: f64,
}

impl LatencyStats {
    fn add(&mut self, value: f64) {
        self.values.push(value);
        self.sum += value;
    }

    fn avg(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum / self.values.len() as f64
        }
    }

    fn sorted(&self) -> Vec<f64> {
        let mut sorted = self.values.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        sorted
    }

    fn median(sorted: &[f64]) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }

    fn std_dev(&self) -> f64 {
        if self.values.len() <= 1 {
            return 0.0;
        }
        let avg = self.avg();
        let variance = self
            .values
            .iter()
            .map(|&v| {
                let diff = avg - v;
                diff * diff
            })
            .sum::<f64>()
            / (self.values.len() - 1) as f64;
        variance.sqrt()
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        let idx = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
        sorted[idx]
    }

    fn summary(&self) -> DurationSummary {
        let sorted = self.sorted();
        DurationSummary {
            count: self.values.len(),
            min: sorted.first().copied().unwrap_or(0.0),
            max: sorted.last().copied().unwrap_or(0.0),
            avg: self.avg(),
            median: Self::median(&sorted),
            std_dev: self.std_dev(),
            p99: Self::percentile(&sorted, 99.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DurationSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub median: f64,
    pub std_dev: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationStatistics {
    pub requests: usize,
    pub bytes: u64,
    pub duration: DurationSummary,
    pub size_bins: [usize; SIZE_BINS.len()],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceStatistics {
    pub ranks: BTreeMap<Api, usize>,
    pub operations: BTreeMap<(Api, Operation), OperationStatistics>,
    pub ost_requests: BTreeMap<u64, usize>,
}

pub fn compute_statistics(table: &[NormalizedAccess]) -> TraceStatistics {
    let mut stats = TraceStatistics::default();
    let mut durations: BTreeMap<(Api, Operation), LatencyStats> = BTreeMap::new();
    let mut ranks: BTreeMap<Api, std::collections::BTreeSet<u32>> = BTreeMap::new();

    for access in table {
        let key = (access.api, access.operation);
        let op_stats = stats.operations.entry(key).or_default();
        op_stats.requests += 1;
        op_stats.bytes += access.size;
        op_stats.size_bins[size_bin(access.size)] += 1;
        durations.entry(key).or_default().add(access.duration());
        ranks.entry(access.api).or_default().insert(access.rank);

        for ost in &access.osts {
            *stats.ost_requests.entry(*ost).or_insert(0) += 1;
        }
    }

    for (key, latency) in durations {
        if let Some(op_stats) = stats.operations.get_mut(&key) {
            op_stats.duration = latency.summary();
        }
    }
    stats.ranks = ranks.into_iter().map(|(api, set)| (api, set.len())).collect();
    stats
}

pub fn print_trace_statistics(file_id: u64, file_name: &str, table: &[NormalizedAccess]) {
    let stats = compute_statistics(table);

    println!("\n[File {file_id}: {file_name}]");
    println!("Total requests: {}", table.len());

    for (api, rank_count) in &stats.ranks {
        println!("\n{api} ({rank_count} rank(s))");
        println!(
            "{:<6} {:>10} {:>14} {:>10} {:>10} {:>10} {:>10}",
            "op", "requests", "bytes", "avg(s)", "median(s)", "stddev(s)", "p99(s)"
        );
        for operation in [Operation::Read, Operation::Write] {
            let Some(op_stats) = stats.operations.get(&(*api, operation)) else {
                continue;
            };
            println!(
                "{:<6} {:>10} {:>14} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
                operation.as_str(),
                op_stats.requests,
                op_stats.bytes,
                op_stats.duration.avg,
                op_stats.duration.median,
                op_stats.duration.std_dev,
                op_stats.duration.p99
            );
        }

        println!("Request size distribution:");
        for operation in [Operation::Read, Operation::Write] {
            let Some(op_stats) = stats.operations.get(&(*api, operation)) else {
                continue;
            };
            let bins: Vec<String> = SIZE_BINS
                .iter()
                .zip(op_stats.size_bins.iter())
                .filter(|(_, count)| **count > 0)
                .map(|((_, label), count)| format!("{label}: {count}"))
                .collect();
            println!("  {:<6} {}", operation.as_str(), bins.join(", "));
        }
    }

    if !stats.ost_requests.is_empty() {
        println!("\nOST usage (requests touching each target):");
        for (ost, count) in &stats.ost_requests {
            println!("  OST {ost:>5}: {count}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(api: Api, rank: u32, operation: Operation, size: u64, duration: f64, osts: Vec<u64>) -> NormalizedAccess {
        NormalizedAccess {
            file_id: 1,
            api,
            rank,
            operation,
            segment: 0,
            offset: 0,
            size,
            start: 1.0,
            end: 1.0 + duration,
            osts,
        }
    }

    #[test]
    fn test_size_bins() {
        assert_eq!(SIZE_BINS[size_bin(0)].1, "0-100");
        assert_eq!(SIZE_BINS[size_bin(100)].1, "0-100");
        assert_eq!(SIZE_BINS[size_bin(101)].1, "101-1K");
        assert_eq!(SIZE_BINS[size_bin(1024 * 1024)].1, "100K-1M");
        assert_eq!(SIZE_BINS[size_bin(4 * 1024 * 1024 + 1)].1, "4M-10M");
        assert_eq!(SIZE_BINS[size_bin(u64::MAX)].1, "1G+");
    }

    #[test]
    fn test_compute_statistics() {
        let table = vec![
            access(Api::Posix, 0, Operation::Write, 1 << 20, 0.5, vec![10, 11]),
            access(Api::Posix, 1, Operation::Write, 1 << 20, 1.5, vec![11]),
            access(Api::Posix, 1, Operation::Read, 64, 0.25, vec![10]),
            access(Api::MpiIo, 0, Operation::Write, 2 << 20, 2.0, vec![]),
        ];
        let stats = compute_statistics(&table);

        assert_eq!(stats.ranks[&Api::Posix], 2);
        assert_eq!(stats.ranks[&Api::MpiIo], 1);

        let writes = &stats.operations[&(Api::Posix, Operation::Write)];
        assert_eq!(writes.requests, 2);
        assert_eq!(writes.bytes, 2 << 20);
        assert_eq!(writes.duration.avg, 1.0);
        assert_eq!(writes.duration.median, 1.0);
        assert_eq!(writes.duration.max, 1.5);
        assert_eq!(writes.size_bins[size_bin(1 << 20)], 2);

        let reads = &stats.operations[&(Api::Posix, Operation::Read)];
        assert_eq!(reads.size_bins[0], 1);
        assert_eq!(reads.duration.std_dev, 0.0);

        assert_eq!(stats.ost_requests[&10], 2);
        assert_eq!(stats.ost_requests[&11], 2);
    }
}
