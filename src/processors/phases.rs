use crate::models::{Api, IOPhase, NormalizedAccess, Operation, OperationMix};
use crate::utils::{mean, round_time};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

/// Union of `[start, end]` intervals. Overlapping and touching intervals are
/// merged; the result is sorted and pairwise disjoint.
pub fn envelope<I>(intervals: I) -> Vec<Interval>
where
    I: IntoIterator<Item = Interval>,
{
    let mut sorted: Vec<Interval> = intervals.into_iter().collect();
    sorted.sort_by(|a, b| {
        a.start
            .partial_cmp(&b.start)
            .unwrap_or(Ordering::Equal)
            .then(a.end.partial_cmp(&b.end).unwrap_or(Ordering::Equal))
    });

    let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len() / 4 + 1);
    for interval in sorted {
        match merged.last_mut() {
            Some(last) if interval.start <= last.end => {
                last.end = last.end.max(interval.end);
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// Mean idle gap between consecutive envelopes; 0 when there is no gap to measure.
pub fn idle_threshold(envelopes: &[Interval]) -> f64 {
    if envelopes.len() < 2 {
        return 0.0;
    }
    let gaps: Vec<f64> = envelopes.windows(2).map(|w| w[1].start - w[0].end).collect();
    mean(&gaps).unwrap_or(0.0)
}

// Greedy left-to-right merge of envelopes separated by at most `threshold`
pub fn merge_envelopes(envelopes: &[Interval], threshold: f64) -> Vec<Interval> {
    let mut merged = Vec::new();
    let mut iter = envelopes.iter();
    let Some(first) = iter.next() else {
        return merged;
    };

    let mut current = *first;
    for next in iter {
        if next.start - current.end <= threshold {
            current.end = current.end.max(next.end);
        } else {
            merged.push(current);
            current = *next;
        }
    }
    merged.push(current);
    merged
}

#[derive(Default)]
struct PhaseAccumulator<'a> {
    has_read: bool,
    has_write: bool,
    fastest: Option<&'a NormalizedAccess>,
    slowest: Option<&'a NormalizedAccess>,
}

impl<'a> PhaseAccumulator<'a> {
    fn add(&mut self, access: &'a NormalizedAccess) {
        match access.operation {
            Operation::Read => self.has_read = true,
            Operation::Write => self.has_write = true,
        }

        // Ties on end time go to the lowest rank
        let faster = match self.fastest {
            None => true,
            Some(f) => access.end < f.end || (access.end == f.end && access.rank < f.rank),
        };
        if faster {
            self.fastest = Some(access);
        }

        let slower = match self.slowest {
            None => true,
            Some(s) => access.end > s.end || (access.end == s.end && access.rank < s.rank),
        };
        if slower {
            self.slowest = Some(access);
        }
    }

    fn finish(self, index: usize, api: Api, window: Interval, threshold: f64) -> Option<IOPhase> {
        let operation = OperationMix::from_flags(self.has_read, self.has_write)?;
        let fastest = self.fastest?;
        let slowest = self.slowest?;

        Some(IOPhase {
            index,
            api,
            operation,
            start: window.start,
            end: window.end,
            duration: round_time(window.end - window.start),
            fastest_rank: fastest.rank,
            fastest_rank_start: fastest.start,
            fastest_rank_end: fastest.end,
            fastest_rank_duration: round_time(fastest.duration()),
            slowest_rank: slowest.rank,
            slowest_rank_start: slowest.start,
            slowest_rank_end: slowest.end,
            slowest_rank_duration: round_time(slowest.duration()),
            threshold,
        })
    }
}

fn detect_api_phases(api: Api, rows: &[&NormalizedAccess]) -> Vec<IOPhase> {
    let envelopes = envelope(rows.iter().map(|a| Interval::new(a.start, a.end)));
    let threshold = idle_threshold(&envelopes);
    let windows = merge_envelopes(&envelopes, threshold);

    let mut accumulators: Vec<PhaseAccumulator> =
        windows.iter().map(|_| PhaseAccumulator::default()).collect();

    // Phases are disjoint and sorted, so a row can only belong to the last phase
    // starting at or before it
    for &access in rows {
        let candidate = windows.partition_point(|w| w.start <= access.start);
        if candidate == 0 {
            continue;
        }
        let idx = candidate - 1;
        if access.is_within(windows[idx].start, windows[idx].end) {
            accumulators[idx].add(access);
        }
    }

    let mut phases = Vec::with_capacity(windows.len());
    for (window, accumulator) in windows.into_iter().zip(accumulators) {
        if let Some(phase) = accumulator.finish(phases.len(), api, window, threshold) {
            phases.push(phase);
        }
    }
    phases
}

/// Splits the activity of each API into I/O phases.
///
/// Phases of one API are disjoint, ordered by start and indexed from 0. An API
/// without rows produces no phases. Phases are not clipped to any analysis
/// window; the caller filters the table beforehand.
pub fn detect_phases(table: &[NormalizedAccess]) -> Vec<IOPhase> {
    let mut phases = Vec::new();
    for api in Api::ALL {
        let rows: Vec<&NormalizedAccess> = table.iter().filter(|a| a.api == api).collect();
        if rows.is_empty() {
            continue;
        }
        let detected = detect_api_phases(api, &rows);
        crate::log_debug!(
            "{}: {} phase(s) from {} access(es), idle threshold {:.4}s",
            api,
            detected.len(),
            rows.len(),
            detected.first().map(|p| p.threshold).unwrap_or(0.0)
        );
        phases.extend(detected);
    }
    phases
}
