use crate::models::{AnalysisWindow, SnapshotWindow, TraceSummary};

/// One unit of analysis for a traced file: the whole trace, or a time slice
/// of it when the file is too large to analyze at once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChunkRequest {
    Whole,
    Snapshot(SnapshotWindow),
}

impl ChunkRequest {
    // Operator window narrowed to this chunk
    pub fn window(&self, base: &AnalysisWindow) -> AnalysisWindow {
        match self {
            ChunkRequest::Whole => *base,
            ChunkRequest::Snapshot(snapshot) => base.within_snapshot(snapshot),
        }
    }

    pub fn snapshot(&self) -> Option<&SnapshotWindow> {
        match self {
            ChunkRequest::Whole => None,
            ChunkRequest::Snapshot(snapshot) => Some(snapshot),
        }
    }
}

/// Lazily yields the chunk requests for one file. The shell pulls requests
/// one at a time, so it can stop (or ask the operator) between chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPlan {
    chunks: usize,
    next: usize,
    runtime: f64,
}

impl ChunkPlan {
    pub fn from_summary(summary: &TraceSummary, threshold: u64) -> Self {
        let threshold = threshold.max(1);
        let chunks = if summary.total_logs <= threshold {
            1
        } else {
            summary.total_logs.div_ceil(threshold) as usize
        };
        Self {
            chunks,
            next: 0,
            runtime: summary.runtime,
        }
    }

    pub fn is_chunked(&self) -> bool {
        self.chunks > 1
    }

    pub fn len(&self) -> usize {
        self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.chunks == 0
    }

    fn slice(&self, index: usize) -> SnapshotWindow {
        let width = self.runtime / self.chunks as f64;
        let end = if index + 1 == self.chunks {
            self.runtime
        } else {
            width * (index + 1) as f64
        };
        SnapshotWindow {
            index,
            start: width * index as f64,
            end,
            last: index + 1 == self.chunks,
        }
    }
}

impl Iterator for ChunkPlan {
    type Item = ChunkRequest;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.chunks {
            return None;
        }
        let index = self.next;
        self.next += 1;
        if self.chunks == 1 {
            Some(ChunkRequest::Whole)
        } else {
            Some(ChunkRequest::Snapshot(self.slice(index)))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.chunks - self.next;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(total_logs: u64, runtime: f64) -> TraceSummary {
        TraceSummary { total_logs, runtime }
    }

    #[test]
    fn test_small_trace_is_one_request() {
        let plan = ChunkPlan::from_summary(&summary(20_000_000, 50.0), 20_000_000);
        assert!(!plan.is_chunked());
        assert_eq!(plan.collect::<Vec<_>>(), vec![ChunkRequest::Whole]);

        let empty = ChunkPlan::from_summary(&TraceSummary::default(), 20_000_000);
        assert_eq!(empty.count(), 1);
    }

    #[test]
    fn test_large_trace_is_sliced_evenly() {
        let plan = ChunkPlan::from_summary(&summary(50, 30.0), 20);
        assert!(plan.is_chunked());
        assert_eq!(plan.len(), 3);

        let snapshots: Vec<SnapshotWindow> = plan
            .filter_map(|request| request.snapshot().copied())
            .collect();
        assert_eq!(
            snapshots,
            vec![
                SnapshotWindow { index: 0, start: 0.0, end: 10.0, last: false },
                SnapshotWindow { index: 1, start: 10.0, end: 20.0, last: false },
                SnapshotWindow { index: 2, start: 20.0, end: 30.0, last: true },
            ]
        );
    }

    #[test]
    fn test_request_window_keeps_rank_bounds() {
        let base = AnalysisWindow {
            from_rank: Some(2),
            ..Default::default()
        };
        assert_eq!(ChunkRequest::Whole.window(&base), base);

        let request = ChunkRequest::Snapshot(SnapshotWindow {
            index: 1,
            start: 10.0,
            end: 20.0,
            last: false,
        });
        let window = request.window(&base);
        assert_eq!(window.start, Some(10.0));
        assert_eq!(window.end, Some(20.0));
        assert_eq!(window.from_rank, Some(2));
        assert_eq!(window.label(), "s10_e20_n2");
    }
}
