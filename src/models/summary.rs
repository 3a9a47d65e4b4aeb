use crate::models::NormalizedAccess;
use serde::{Deserialize, Serialize};

// Row count and end-of-activity time of one traced file
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct TraceSummary {
    pub total_logs: u64,
    pub runtime: f64,
}

impl TraceSummary {
    pub fn from_table(table: &[NormalizedAccess]) -> Self {
        Self {
            total_logs: table.len() as u64,
            runtime: table.iter().map(|a| a.end).fold(0.0, f64::max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Api, Operation};

    #[test]
    fn test_summary_from_table() {
        assert_eq!(TraceSummary::from_table(&[]), TraceSummary::default());

        let access = |end: f64| NormalizedAccess {
            file_id: 1,
            api: Api::Posix,
            rank: 0,
            operation: Operation::Read,
            segment: 0,
            offset: 0,
            size: 1,
            start: 0.0,
            end,
            osts: vec![],
        };
        let summary = TraceSummary::from_table(&[access(2.5), access(7.25), access(1.0)]);
        assert_eq!(summary.total_logs, 3);
        assert_eq!(summary.runtime, 7.25);
    }
}
