use crate::models::{Api, Operation};
use serde::{Deserialize, Serialize};

// One traced segment as emitted by the trace reader. Values are kept signed/float
// so malformed input can be detected instead of wrapping.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RawSegment {
    pub offset: i64,
    pub length: i64,
    pub start_time: f64,
    pub end_time: f64,
}

// Per-rank DXT record: the segment lists of one rank for one file and API
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RankRecord {
    pub rank: u32,
    #[serde(default)]
    pub write_segments: Vec<RawSegment>,
    #[serde(default)]
    pub read_segments: Vec<RawSegment>,
}

impl RankRecord {
    pub fn new(rank: u32) -> Self {
        Self {
            rank,
            ..Default::default()
        }
    }

    pub fn segments(&self, operation: Operation) -> &[RawSegment] {
        match operation {
            Operation::Read => &self.read_segments,
            Operation::Write => &self.write_segments,
        }
    }

    pub fn push(&mut self, operation: Operation, segment: RawSegment) {
        match operation {
            Operation::Read => self.read_segments.push(segment),
            Operation::Write => self.write_segments.push(segment),
        }
    }

    pub fn segment_count(&self) -> usize {
        self.read_segments.len() + self.write_segments.len()
    }
}

// Flattened raw access, before validation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawAccess {
    pub file_id: u64,
    pub api: Api,
    pub rank: u32,
    pub operation: Operation,
    pub offset: i64,
    pub length: i64,
    pub start_time: f64,
    pub end_time: f64,
}

impl RawAccess {
    pub fn from_segment(
        file_id: u64,
        api: Api,
        rank: u32,
        operation: Operation,
        segment: &RawSegment,
    ) -> Self {
        Self {
            file_id,
            api,
            rank,
            operation,
            offset: segment.offset,
            length: segment.length,
            start_time: segment.start_time,
            end_time: segment.end_time,
        }
    }
}

// Row of the normalized table. Column order of the persisted table follows field order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NormalizedAccess {
    pub file_id: u64,
    pub api: Api,
    pub rank: u32,
    pub operation: Operation,
    pub segment: u64,
    pub offset: u64,
    pub size: u64,
    pub start: f64,
    pub end: f64,
    pub osts: Vec<u64>,
}

impl NormalizedAccess {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_within(&self, start: f64, end: f64) -> bool {
        self.start >= start && self.end <= end
    }
}
