mod dxt;
mod json;

pub use dxt::{parse_dxt_text, DxtLine, DxtParseOutcome};
pub use json::{parse_trace_json, FileEntry, ModuleRecord, TraceDocument};

use crate::error::Result;
use crate::models::TraceInput;
use crate::utils::read_trace_bytes;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    DxtText,
    Json,
}

impl TraceFormat {
    // `.json` (optionally gzipped) is a trace document, anything else a DXT text dump
    pub fn from_path(path: &Path) -> Self {
        let name = path.to_string_lossy().to_lowercase();
        let name = name
            .strip_suffix(".gz")
            .or_else(|| name.strip_suffix(".gzip"))
            .unwrap_or(&name);
        if name.ends_with(".json") {
            TraceFormat::Json
        } else {
            TraceFormat::DxtText
        }
    }
}

#[derive(Debug, Default)]
pub struct ParsedTrace {
    pub input: TraceInput,
    pub malformed_lines: usize,
}

pub fn parse_trace(path: &Path) -> Result<ParsedTrace> {
    let start_time = Instant::now();
    crate::log!("Reading trace {}", path.display());

    let bytes = read_trace_bytes(path)?;
    let parsed = match TraceFormat::from_path(path) {
        TraceFormat::Json => ParsedTrace {
            input: parse_trace_json(&bytes)?,
            malformed_lines: 0,
        },
        TraceFormat::DxtText => {
            let outcome = parse_dxt_text(&bytes);
            ParsedTrace {
                input: outcome.input,
                malformed_lines: outcome.malformed.len(),
            }
        }
    };

    crate::log!(
        "Trace {} decoded: {} file(s), {} segment(s) in {:.2}s",
        path.display(),
        parsed.input.files.len(),
        parsed
            .input
            .files
            .values()
            .map(|f| f.segment_count())
            .sum::<usize>(),
        start_time.elapsed().as_secs_f64()
    );
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(TraceFormat::from_path(Path::new("run.json")), TraceFormat::Json);
        assert_eq!(TraceFormat::from_path(Path::new("run.JSON.gz")), TraceFormat::Json);
        assert_eq!(TraceFormat::from_path(Path::new("run.darshan.txt")), TraceFormat::DxtText);
        assert_eq!(TraceFormat::from_path(Path::new("run.dxt.gz")), TraceFormat::DxtText);
    }

    #[test]
    fn test_parse_trace_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();

        let text = dir.path().join("app.dxt");
        std::fs::write(
            &text,
            "# DXT, file_id: 3, file_name: /data/x\n X_POSIX 0 write 0 0 8 0.0 0.1\n",
        )
        .unwrap();
        let parsed = parse_trace(&text).unwrap();
        assert_eq!(parsed.input.files[&3].posix.len(), 1);
        assert_eq!(parsed.malformed_lines, 0);

        let json = dir.path().join("app.json");
        std::fs::write(&json, r#"{"files":[{"file_id":5,"file_name":"/data/y"}]}"#).unwrap();
        let parsed = parse_trace(&json).unwrap();
        assert_eq!(parsed.input.file_names(), vec![(5, "/data/y")]);

        assert!(parse_trace(&dir.path().join("missing.dxt")).is_err());
    }
}
