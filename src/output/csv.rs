use crate::error::Result;
use crate::models::{IOPhase, NormalizedAccess, StragglerRow};
use csv::Writer;
use std::fs::File;
use std::path::Path;

// The list column is flattened to `;`-joined ids
fn join_osts(osts: &[u64]) -> String {
    osts.iter().map(u64::to_string).collect::<Vec<_>>().join(";")
}

/// CSV export of the normalized table
pub fn save_accesses_to_csv(table: &[NormalizedAccess], path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = Writer::from_writer(file);

    writer.write_record([
        "file_id",
        "api",
        "rank",
        "operation",
        "segment",
        "offset",
        "size",
        "start",
        "end",
        "osts",
    ])?;

    for access in table {
        writer.write_record(&[
            access.file_id.to_string(),
            access.api.to_string(),
            access.rank.to_string(),
            access.operation.to_string(),
            access.segment.to_string(),
            access.offset.to_string(),
            access.size.to_string(),
            access.start.to_string(),
            access.end.to_string(),
            join_osts(&access.osts),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn save_phases_to_csv(phases: &[IOPhase], path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = Writer::from_writer(file);

    writer.write_record([
        "index",
        "api",
        "operation",
        "start",
        "end",
        "duration",
        "fastest_rank",
        "fastest_rank_start",
        "fastest_rank_end",
        "fastest_rank_duration",
        "slowest_rank",
        "slowest_rank_start",
        "slowest_rank_end",
        "slowest_rank_duration",
        "threshold",
    ])?;

    for phase in phases {
        writer.write_record(&[
            phase.index.to_string(),
            phase.api.to_string(),
            phase.operation.to_string(),
            phase.start.to_string(),
            phase.end.to_string(),
            phase.duration.to_string(),
            phase.fastest_rank.to_string(),
            phase.fastest_rank_start.to_string(),
            phase.fastest_rank_end.to_string(),
            phase.fastest_rank_duration.to_string(),
            phase.slowest_rank.to_string(),
            phase.slowest_rank_start.to_string(),
            phase.slowest_rank_end.to_string(),
            phase.slowest_rank_duration.to_string(),
            phase.threshold.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn save_stragglers_to_csv(rows: &[StragglerRow], path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = Writer::from_writer(file);

    writer.write_record(["api", "rank", "start", "end", "duration", "role"])?;
    for row in rows {
        writer.write_record(&[
            row.api.to_string(),
            row.rank.to_string(),
            row.start.to_string(),
            row.end.to_string(),
            row.duration.to_string(),
            row.role.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Api, Operation, StragglerRole};

    #[test]
    fn test_accesses_csv_joins_osts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accesses.csv");
        let table = vec![NormalizedAccess {
            file_id: 3,
            api: Api::Posix,
            rank: 1,
            operation: Operation::Write,
            segment: 0,
            offset: 0,
            size: 1048576,
            start: 0.0,
            end: 1.5,
            osts: vec![10, 11, 12, 13],
        }];
        save_accesses_to_csv(&table, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("file_id,api,rank,operation,segment,offset,size,start,end,osts")
        );
        assert_eq!(lines.next(), Some("3,POSIX,1,write,0,0,1048576,0,1.5,10;11;12;13"));
    }

    #[test]
    fn test_stragglers_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stragglers.csv");
        let rows = vec![StragglerRow {
            api: Api::MpiIo,
            rank: 4,
            start: 0.5,
            end: 2.0,
            duration: 1.5,
            role: StragglerRole::Slowest,
        }];
        save_stragglers_to_csv(&rows, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().nth(1), Some("MPIIO,4,0.5,2,1.5,slowest"));
    }
}
