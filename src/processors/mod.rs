pub mod bottleneck;
mod normalize;
mod phases;
mod striping;

pub use bottleneck::{run_detectors, Detection, DetectorReport, DetectorSelection};
pub use normalize::{normalize_file, NormalizeOutcome, RecordRejection, RejectReason};
pub use phases::{detect_phases, envelope, idle_threshold, merge_envelopes, Interval};
pub use striping::osts_for;
