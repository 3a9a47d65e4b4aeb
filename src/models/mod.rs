mod access;
mod api;
mod finding;
mod phase;
mod stripe;
mod summary;
mod trace;
mod window;

pub use access::{NormalizedAccess, RankRecord, RawAccess, RawSegment};
pub use api::{Api, Operation};
pub use finding::{
    BottleneckFinding, FindingsDocument, StragglerRole, StragglerRow, CODE_COLLECTIVE_METADATA,
    CODE_RANK_ZERO, CODE_UNBALANCED, LEVEL_WARNING,
};
pub use phase::{IOPhase, OperationMix};
pub use stripe::{RawStripeLayout, StripeLayout};
pub use summary::TraceSummary;
pub use trace::{FileTrace, TraceInput};
pub use window::{AnalysisWindow, SnapshotWindow};
