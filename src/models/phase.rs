use crate::models::Api;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMix {
    #[serde(rename = "read")]
    Read,
    #[serde(rename = "write")]
    Write,
    #[serde(rename = "read&write")]
    ReadWrite,
}

impl OperationMix {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMix::Read => "read",
            OperationMix::Write => "write",
            OperationMix::ReadWrite => "read&write",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "read" => Some(OperationMix::Read),
            "write" => Some(OperationMix::Write),
            "read&write" => Some(OperationMix::ReadWrite),
            _ => None,
        }
    }

    pub fn from_flags(has_read: bool, has_write: bool) -> Option<Self> {
        match (has_read, has_write) {
            (true, true) => Some(OperationMix::ReadWrite),
            (true, false) => Some(OperationMix::Read),
            (false, true) => Some(OperationMix::Write),
            (false, false) => None,
        }
    }
}

impl fmt::Display for OperationMix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A period of sustained aggregate I/O activity for one API.
///
/// `threshold` is the idle-gap threshold used to merge activity into phases and
/// is identical for every phase of the same API.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IOPhase {
    pub index: usize,
    pub api: Api,
    pub operation: OperationMix,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub fastest_rank: u32,
    pub fastest_rank_start: f64,
    pub fastest_rank_end: f64,
    pub fastest_rank_duration: f64,
    pub slowest_rank: u32,
    pub slowest_rank_start: f64,
    pub slowest_rank_end: f64,
    pub slowest_rank_duration: f64,
    pub threshold: f64,
}
