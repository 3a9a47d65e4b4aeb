use crate::models::Api;
use serde::{Deserialize, Serialize};
use std::fmt;

// Stable codes consumed verbatim by the report generator
pub const CODE_RANK_ZERO: &str = "D01";
pub const CODE_UNBALANCED: &str = "D02";
pub const CODE_COLLECTIVE_METADATA: &str = "D04";

pub const LEVEL_WARNING: u8 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BottleneckFinding {
    pub code: String,
    #[serde(rename = "level")]
    pub severity_level: u8,
    #[serde(rename = "issue")]
    pub issue_description: String,
    pub recommendations: Vec<String>,
}

impl BottleneckFinding {
    pub fn new(code: &str, issue: impl Into<String>, recommendations: &[&str]) -> Self {
        Self {
            code: code.to_string(),
            severity_level: LEVEL_WARNING,
            issue_description: issue.into(),
            recommendations: recommendations.iter().map(|r| r.to_string()).collect(),
        }
    }
}

// Findings document handed to the report generator: {"dxt": [...]}
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FindingsDocument {
    pub dxt: Vec<BottleneckFinding>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StragglerRole {
    Fastest,
    Slowest,
}

impl StragglerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StragglerRole::Fastest => "fastest",
            StragglerRole::Slowest => "slowest",
        }
    }
}

impl fmt::Display for StragglerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StragglerRow {
    pub api: Api,
    pub rank: u32,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub role: StragglerRole,
}
