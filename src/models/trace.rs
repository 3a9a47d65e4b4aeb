use crate::models::{Api, RankRecord, StripeLayout};
use std::collections::BTreeMap;

// Everything the trace reader knows about one traced file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileTrace {
    pub file_id: u64,
    pub file_name: String,
    pub stripe: Option<StripeLayout>,
    pub posix: Vec<RankRecord>,
    pub mpiio: Vec<RankRecord>,
}

impl FileTrace {
    pub fn new(file_id: u64, file_name: impl Into<String>) -> Self {
        Self {
            file_id,
            file_name: file_name.into(),
            ..Default::default()
        }
    }

    pub fn records(&self, api: Api) -> &[RankRecord] {
        match api {
            Api::Posix => &self.posix,
            Api::MpiIo => &self.mpiio,
        }
    }

    pub fn records_mut(&mut self, api: Api) -> &mut Vec<RankRecord> {
        match api {
            Api::Posix => &mut self.posix,
            Api::MpiIo => &mut self.mpiio,
        }
    }

    // Segment count across both APIs, before validation
    pub fn segment_count(&self) -> usize {
        self.posix
            .iter()
            .chain(self.mpiio.iter())
            .map(RankRecord::segment_count)
            .sum()
    }
}

// Decoded trace: one entry per traced file id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceInput {
    pub files: BTreeMap<u64, FileTrace>,
}

impl TraceInput {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn file_names(&self) -> Vec<(u64, &str)> {
        self.files
            .values()
            .map(|f| (f.file_id, f.file_name.as_str()))
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.files
            .values()
            .map(|f| f.posix.len() + f.mpiio.len())
            .sum()
    }
}
