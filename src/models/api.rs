use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Instrumented I/O interface a record was captured from
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Api {
    #[serde(rename = "POSIX")]
    Posix,
    #[serde(rename = "MPIIO")]
    MpiIo,
    // Darshan also traces STDIO and HDF5, but DXT only records these two
}

impl Api {
    pub const ALL: [Api; 2] = [Api::Posix, Api::MpiIo];

    pub fn as_str(&self) -> &'static str {
        match self {
            Api::Posix => "POSIX",
            Api::MpiIo => "MPIIO",
        }
    }

    // DXT module name as printed by darshan-dxt-parser
    pub fn module_name(&self) -> &'static str {
        match self {
            Api::Posix => "X_POSIX",
            Api::MpiIo => "X_MPIIO",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_uppercase().trim_start_matches("X_").trim_start_matches("DXT_") {
            "POSIX" => Some(Api::Posix),
            "MPIIO" | "MPI-IO" => Some(Api::MpiIo),
            _ => None,
        }
    }
}

impl FromStr for Api {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Api::parse_str(s).ok_or_else(|| format!("Unknown API: {s}"))
    }
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Write,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Write => "write",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "read" | "rd" => Some(Operation::Read),
            "write" | "wt" => Some(Operation::Write),
            _ => None,
        }
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::parse_str(s).ok_or_else(|| format!("Unknown operation: {s}"))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_parse_accepts_module_prefixes() {
        assert_eq!(Api::parse_str("X_POSIX"), Some(Api::Posix));
        assert_eq!(Api::parse_str("DXT_MPIIO"), Some(Api::MpiIo));
        assert_eq!(Api::parse_str("mpiio"), Some(Api::MpiIo));
        assert_eq!(Api::parse_str("STDIO"), None);
    }

    #[test]
    fn test_operation_round_trip_names() {
        for op in [Operation::Read, Operation::Write] {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
        assert!("append".parse::<Operation>().is_err());
    }
}
