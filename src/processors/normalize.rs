use crate::models::{Api, FileTrace, NormalizedAccess, Operation, RawAccess};
use crate::processors::striping::osts_for;
use crate::utils::round_time;
use std::collections::HashMap;
use std::fmt;

// Writes are flattened before reads inside each rank record
const OPERATION_ORDER: [Operation; 2] = [Operation::Write, Operation::Read];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NegativeOffset,
    NegativeLength,
    NonFiniteTime,
    EndBeforeStart,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::NegativeOffset => "negative offset",
            RejectReason::NegativeLength => "negative length",
            RejectReason::NonFiniteTime => "non-finite timestamp",
            RejectReason::EndBeforeStart => "end time before start time",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordRejection {
    pub access: RawAccess,
    pub segment: u64,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeOutcome {
    pub accesses: Vec<NormalizedAccess>,
    pub rejected: Vec<RecordRejection>,
}

fn validate(raw: &RawAccess) -> Result<(u64, u64), RejectReason> {
    if raw.offset < 0 {
        return Err(RejectReason::NegativeOffset);
    }
    if raw.length < 0 {
        return Err(RejectReason::NegativeLength);
    }
    if !raw.start_time.is_finite() || !raw.end_time.is_finite() {
        return Err(RejectReason::NonFiniteTime);
    }
    if raw.end_time < raw.start_time {
        return Err(RejectReason::EndBeforeStart);
    }
    Ok((raw.offset as u64, raw.length as u64))
}

/// Flattens the per-rank segment lists of one file into the normalized table.
///
/// Row order is POSIX before MPIIO, then rank records as received, then writes
/// before reads. `segment` is the position of the segment inside its
/// (rank, API, operation) list; when a rank has several records for the same API
/// the positions continue across them. Rejected segments keep their position so
/// surviving rows still point at the segment they came from.
pub fn normalize_file(trace: &FileTrace) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();
    outcome.accesses.reserve(trace.segment_count());

    for api in Api::ALL {
        let mut positions: HashMap<(u32, Operation), u64> = HashMap::new();

        for record in trace.records(api) {
            for operation in OPERATION_ORDER {
                let next = positions.entry((record.rank, operation)).or_insert(0);

                for segment in record.segments(operation) {
                    let position = *next;
                    *next += 1;

                    let raw = RawAccess::from_segment(trace.file_id, api, record.rank, operation, segment);
                    match validate(&raw) {
                        Ok((offset, size)) => {
                            let osts = trace
                                .stripe
                                .as_ref()
                                .map(|layout| osts_for(layout, offset, size))
                                .unwrap_or_default();
                            outcome.accesses.push(NormalizedAccess {
                                file_id: trace.file_id,
                                api,
                                rank: record.rank,
                                operation,
                                segment: position,
                                offset,
                                size,
                                start: round_time(raw.start_time),
                                end: round_time(raw.end_time),
                                osts,
                            });
                        }
                        Err(reason) => outcome.rejected.push(RecordRejection {
                            access: raw,
                            segment: position,
                            reason,
                        }),
                    }
                }
            }
        }
    }

    if !outcome.rejected.is_empty() {
        crate::log_warning!(
            "file {}: rejected {} malformed segment(s), first: rank {} {} {} segment {} ({})",
            trace.file_id,
            outcome.rejected.len(),
            outcome.rejected[0].access.rank,
            outcome.rejected[0].access.api,
            outcome.rejected[0].access.operation,
            outcome.rejected[0].segment,
            outcome.rejected[0].reason
        );
    }

    outcome
}
