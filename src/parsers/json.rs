use crate::error::Result;
use crate::log_warning;
use crate::models::{Api, FileTrace, RankRecord, RawStripeLayout, StripeLayout, TraceInput};
use serde::{Deserialize, Serialize};

/// Per-rank record tagged by the Darshan module that captured it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "module")]
pub enum ModuleRecord {
    #[serde(rename = "DXT_POSIX", alias = "X_POSIX")]
    Posix(RankRecord),
    #[serde(rename = "DXT_MPIIO", alias = "X_MPIIO")]
    MpiIo(RankRecord),
}

impl ModuleRecord {
    pub fn api(&self) -> Api {
        match self {
            ModuleRecord::Posix(_) => Api::Posix,
            ModuleRecord::MpiIo(_) => Api::MpiIo,
        }
    }

    pub fn into_record(self) -> RankRecord {
        match self {
            ModuleRecord::Posix(record) | ModuleRecord::MpiIo(record) => record,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub file_id: u64,
    #[serde(default)]
    pub file_name: String,
    // Validated per file in `into_input`
    #[serde(default)]
    pub stripe: Option<RawStripeLayout>,
    #[serde(default)]
    pub records: Vec<ModuleRecord>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TraceDocument {
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

impl TraceDocument {
    /// Folds the entries into a trace. Entries repeating a file id add their
    /// records to the first one; the first valid stripe layout seen wins.
    /// An invalid layout is logged and leaves the file without OST lists.
    pub fn into_input(self) -> TraceInput {
        let mut input = TraceInput::default();
        for entry in self.files {
            let file = input
                .files
                .entry(entry.file_id)
                .or_insert_with(|| FileTrace::new(entry.file_id, entry.file_name.clone()));
            if file.file_name.is_empty() {
                file.file_name = entry.file_name;
            }
            if file.stripe.is_none() {
                if let Some(raw) = entry.stripe {
                    match StripeLayout::new(raw.stripe_size, raw.stripe_count, raw.ost_ids) {
                        Ok(layout) => file.stripe = Some(layout),
                        Err(e) => log_warning!("File {}: ignoring stripe layout: {e}", entry.file_id),
                    }
                }
            }
            for record in entry.records {
                let api = record.api();
                file.records_mut(api).push(record.into_record());
            }
        }
        input
    }
}

pub fn parse_trace_json(data: &[u8]) -> Result<TraceInput> {
    let document: TraceDocument = serde_json::from_slice(data)?;
    Ok(document.into_input())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;

    const DOCUMENT: &str = r#"{
        "files": [
            {
                "file_id": 9,
                "file_name": "/lustre/ckpt.h5",
                "stripe": {"stripe_size": 1048576, "stripe_count": 2, "ost_ids": [4, 5]},
                "records": [
                    {
                        "module": "DXT_POSIX",
                        "rank": 0,
                        "write_segments": [
                            {"offset": 0, "length": 1048576, "start_time": 0.1, "end_time": 0.2}
                        ]
                    },
                    {
                        "module": "DXT_MPIIO",
                        "rank": 0,
                        "read_segments": [
                            {"offset": 0, "length": 10, "start_time": 0.3, "end_time": 0.31}
                        ]
                    }
                ]
            },
            {
                "file_id": 9,
                "records": [
                    {"module": "DXT_POSIX", "rank": 1, "write_segments": []}
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_trace_document() {
        let input = parse_trace_json(DOCUMENT.as_bytes()).unwrap();
        assert_eq!(input.files.len(), 1);

        let file = &input.files[&9];
        assert_eq!(file.file_name, "/lustre/ckpt.h5");
        assert_eq!(file.stripe.as_ref().unwrap().ost_ids(), &[4, 5]);
        assert_eq!(file.posix.len(), 2);
        assert_eq!(file.posix[0].write_segments[0].length, 1048576);
        assert_eq!(file.posix[1].rank, 1);
        assert_eq!(file.mpiio.len(), 1);
        assert_eq!(file.mpiio[0].read_segments.len(), 1);
    }

    #[test]
    fn test_unknown_module_rejected() {
        let unknown = r#"{"files":[{"file_id":1,"records":[{"module":"DXT_STDIO","rank":0}]}]}"#;
        assert!(matches!(parse_trace_json(unknown.as_bytes()), Err(AnalysisError::Json(_))));
    }

    #[test]
    fn test_bad_stripe_only_affects_its_file() {
        let document = r#"{"files":[
            {"file_id":1,
             "stripe":{"stripe_size":65536,"stripe_count":1,"ost_ids":[2]},
             "records":[{"module":"DXT_POSIX","rank":0,
                "write_segments":[{"offset":0,"length":10,"start_time":0.0,"end_time":0.1}]}]},
            {"file_id":2,
             "stripe":{"stripe_size":-65536,"stripe_count":1,"ost_ids":[3]},
             "records":[{"module":"DXT_POSIX","rank":0,
                "read_segments":[{"offset":0,"length":10,"start_time":0.2,"end_time":0.3}]}]},
            {"file_id":3,
             "stripe":{"stripe_size":0,"stripe_count":1,"ost_ids":[4]}}
        ]}"#;
        let input = parse_trace_json(document.as_bytes()).unwrap();
        assert_eq!(input.files.len(), 3);
        assert_eq!(input.files[&1].stripe.as_ref().unwrap().ost_ids(), &[2]);
        assert!(input.files[&2].stripe.is_none());
        assert_eq!(input.files[&2].posix[0].read_segments.len(), 1);
        assert!(input.files[&3].stripe.is_none());
    }

    #[test]
    fn test_empty_document() {
        assert!(parse_trace_json(b"{}").unwrap().is_empty());
        assert_eq!(parse_trace_json(br#"{"files":[]}"#).unwrap().record_count(), 0);
    }
}
