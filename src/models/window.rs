use serde::{Deserialize, Serialize};

// Rank/time restriction applied before phase detection and diagnosis.
// Bounds are inclusive; None means unbounded.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
#[serde(default)]
pub struct AnalysisWindow {
    pub start: Option<f64>, // seconds from job start
    pub end: Option<f64>,
    pub from_rank: Option<u32>,
    pub to_rank: Option<u32>,
}

impl AnalysisWindow {
    pub fn is_time_filter_active(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    pub fn is_rank_filter_active(&self) -> bool {
        self.from_rank.is_some() || self.to_rank.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.is_time_filter_active() || self.is_rank_filter_active()
    }

    pub fn includes_rank(&self, rank: u32) -> bool {
        self.from_rank.map_or(true, |from| rank >= from) && self.to_rank.map_or(true, |to| rank <= to)
    }

    pub fn includes_interval(&self, start: f64, end: f64) -> bool {
        self.start.map_or(true, |s| start >= s) && self.end.map_or(true, |e| end <= e)
    }

    // Narrow this window to a snapshot's time slice
    pub fn within_snapshot(&self, snapshot: &SnapshotWindow) -> AnalysisWindow {
        AnalysisWindow {
            start: Some(self.start.map_or(snapshot.start, |s| s.max(snapshot.start))),
            end: Some(self.end.map_or(snapshot.end, |e| e.min(snapshot.end))),
            ..*self
        }
    }

    // Stable text form, used in partition keys and artifact names
    pub fn label(&self) -> String {
        if !self.is_active() {
            return "all".to_string();
        }
        let mut parts = Vec::new();
        if let Some(s) = self.start {
            parts.push(format!("s{s}"));
        }
        if let Some(e) = self.end {
            parts.push(format!("e{e}"));
        }
        if let Some(r) = self.from_rank {
            parts.push(format!("n{r}"));
        }
        if let Some(r) = self.to_rank {
            parts.push(format!("m{r}"));
        }
        parts.join("_")
    }
}

// Time-only slice of a large trace, produced by chunk planning.
// Accesses belong to the slice their start time falls in: [start, end),
// with the first slice open below and the last one closed above, so the
// slices of a plan partition the table.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SnapshotWindow {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub last: bool,
}

impl SnapshotWindow {
    pub fn contains_start(&self, start: f64) -> bool {
        let after_start = self.index == 0 || start >= self.start;
        let before_end = if self.last { true } else { start < self.end };
        after_start && before_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window_includes_everything() {
        let window = AnalysisWindow::default();
        assert!(!window.is_active());
        assert!(window.includes_rank(1024));
        assert!(window.includes_interval(-1.0, 1e9));
        assert_eq!(window.label(), "all");
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let window = AnalysisWindow {
            start: Some(1.0),
            end: Some(2.0),
            from_rank: Some(2),
            to_rank: Some(4),
        };
        assert!(window.includes_interval(1.0, 2.0));
        assert!(!window.includes_interval(0.9999, 2.0));
        assert!(window.includes_rank(2) && window.includes_rank(4));
        assert!(!window.includes_rank(5));
        assert_eq!(window.label(), "s1_e2_n2_m4");
    }

    #[test]
    fn test_within_snapshot_intersects_time_bounds() {
        let window = AnalysisWindow {
            start: Some(5.0),
            ..Default::default()
        };
        let snapshot = SnapshotWindow {
            index: 0,
            start: 0.0,
            end: 10.0,
            last: false,
        };
        let narrowed = window.within_snapshot(&snapshot);
        assert_eq!(narrowed.start, Some(5.0));
        assert_eq!(narrowed.end, Some(10.0));
    }

    #[test]
    fn test_snapshot_membership_is_half_open() {
        let first = SnapshotWindow { index: 0, start: 0.0, end: 1.0, last: false };
        let middle = SnapshotWindow { index: 1, start: 1.0, end: 2.0, last: false };
        let last = SnapshotWindow { index: 2, start: 2.0, end: 3.0, last: true };

        assert!(first.contains_start(-0.5));
        assert!(first.contains_start(0.999));
        assert!(!first.contains_start(1.0));
        assert!(middle.contains_start(1.0));
        assert!(!middle.contains_start(2.0));
        assert!(last.contains_start(2.0));
        assert!(last.contains_start(3.0));
        assert!(last.contains_start(4.0));
    }
}
