use crate::models::StripeLayout;

/// Storage targets touched by the byte range `[offset, offset + length]` under
/// round-robin striping, in the order they are visited.
///
/// The walk starts on the stripe holding `offset` and moves from stripe boundary
/// to stripe boundary until it passes the end of the range. A single access can
/// never touch more targets than the layout has, so the result is capped at
/// `stripe_count` entries. A zero-length access maps to exactly one target.
pub fn osts_for(layout: &StripeLayout, offset: u64, length: u64) -> Vec<u64> {
    let stripe_size = layout.stripe_size();
    let ost_ids = layout.ost_ids();
    let stripe_count = ost_ids.len();
    if stripe_size == 0 || stripe_count == 0 {
        return Vec::new();
    }

    let end = offset.saturating_add(length);
    let mut idx = ((offset / stripe_size) % stripe_count as u64) as usize;
    let mut cur = offset;
    let mut osts = Vec::with_capacity(stripe_count.min(64));

    loop {
        osts.push(ost_ids[idx]);
        if osts.len() == stripe_count {
            break;
        }

        cur = match (cur / stripe_size + 1).checked_mul(stripe_size) {
            Some(next) => next,
            None => break,
        };
        idx = (idx + 1) % stripe_count;

        if cur > end {
            break;
        }
    }

    osts
}
