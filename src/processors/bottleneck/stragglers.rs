use crate::models::{IOPhase, StragglerRole, StragglerRow};
use crate::utils::round_time;

/// Two rows per phase, fastest first, describing the rank that finished first
/// and the rank that finished last. The rows are diagnostic only and do not
/// produce a finding.
pub fn straggler_rows(phases: &[IOPhase]) -> Vec<StragglerRow> {
    let mut rows = Vec::with_capacity(phases.len() * 2);
    for phase in phases {
        rows.push(StragglerRow {
            api: phase.api,
            rank: phase.fastest_rank,
            start: phase.fastest_rank_start,
            end: phase.fastest_rank_end,
            duration: round_time(phase.fastest_rank_end - phase.fastest_rank_start),
            role: StragglerRole::Fastest,
        });
        rows.push(StragglerRow {
            api: phase.api,
            rank: phase.slowest_rank,
            start: phase.slowest_rank_start,
            end: phase.slowest_rank_end,
            duration: round_time(phase.slowest_rank_end - phase.slowest_rank_start),
            role: StragglerRole::Slowest,
        });
    }
    rows
}
