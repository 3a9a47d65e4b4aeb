// darshan-dxt-parser text output

use crate::error::{AnalysisError, Result};
use crate::models::{Api, FileTrace, Operation, RankRecord, RawSegment, StripeLayout, TraceInput};
use lazy_static::lazy_static;
use memchr::{memchr_iter, memmem};
use rayon::prelude::*;
use regex::Regex;
use std::collections::HashMap;
use std::time::Instant;

lazy_static! {
    static ref FILE_HEADER_RE: Regex =
        Regex::new(r"^#\s*DXT,\s*file_id:\s*(?P<file_id>\d+),\s*file_name:\s*(?P<file_name>.*?)\s*$").unwrap();
    static ref STRIPE_HEADER_RE: Regex = Regex::new(
        r"Lustre stripe_size:\s*(?P<stripe_size>[-+]?[0-9.eE+-]+),\s*Lustre stripe_count:\s*(?P<stripe_count>[-+]?\d+)"
    )
    .unwrap();
    static ref OST_HEADER_RE: Regex = Regex::new(r"Lustre OST obdidx:\s*(?P<ids>[\d\s]*)$").unwrap();
}

/// One data line of the DXT text dump, decoded once per API and layout.
#[derive(Debug, Clone, PartialEq)]
pub enum DxtLine {
    /// `X_POSIX rank op segment offset length start end [OST ...]`
    Posix {
        rank: u32,
        operation: Operation,
        segment: u64,
        raw: RawSegment,
    },
    /// `X_MPIIO rank op segment offset length start end`
    MpiIo {
        rank: u32,
        operation: Operation,
        segment: u64,
        raw: RawSegment,
    },
    /// `X_MPIIO rank op offset length start end`, written by older Darshan releases
    MpiIoLegacy {
        rank: u32,
        operation: Operation,
        raw: RawSegment,
    },
}

fn malformed(line: usize, reason: impl Into<String>) -> AnalysisError {
    AnalysisError::MalformedLine {
        line,
        reason: reason.into(),
    }
}

fn field<T: std::str::FromStr>(tokens: &[&str], idx: usize, name: &str, line: usize) -> Result<T> {
    let token = tokens
        .get(idx)
        .ok_or_else(|| malformed(line, format!("missing {name}")))?;
    token
        .parse::<T>()
        .map_err(|_| malformed(line, format!("invalid {name} '{token}'")))
}

fn raw_segment(tokens: &[&str], first: usize, line: usize) -> Result<RawSegment> {
    Ok(RawSegment {
        offset: field(tokens, first, "offset", line)?,
        length: field(tokens, first + 1, "length", line)?,
        start_time: field(tokens, first + 2, "start time", line)?,
        end_time: field(tokens, first + 3, "end time", line)?,
    })
}

impl DxtLine {
    /// Decodes a data line. `Ok(None)` for lines that are not DXT records.
    pub fn parse(text: &str, line: usize) -> Result<Option<Self>> {
        // The bracketed OST list is derived again from the stripe layout
        let body = match text.find('[') {
            Some(pos) => &text[..pos],
            None => text,
        };
        let tokens: Vec<&str> = body.split_ascii_whitespace().collect();
        let Some(&module) = tokens.first() else {
            return Ok(None);
        };
        let Some(api) = Api::ALL.into_iter().find(|api| api.module_name() == module) else {
            return Ok(None);
        };

        let rank: u32 = field(&tokens, 1, "rank", line)?;
        let op_token = tokens.get(2).copied().unwrap_or_default();
        let operation = Operation::parse_str(op_token)
            .ok_or_else(|| malformed(line, format!("invalid operation '{op_token}'")))?;

        match (api, tokens.len()) {
            (Api::Posix, 8) => Ok(Some(DxtLine::Posix {
                rank,
                operation,
                segment: field(&tokens, 3, "segment", line)?,
                raw: raw_segment(&tokens, 4, line)?,
            })),
            (Api::MpiIo, 8) => Ok(Some(DxtLine::MpiIo {
                rank,
                operation,
                segment: field(&tokens, 3, "segment", line)?,
                raw: raw_segment(&tokens, 4, line)?,
            })),
            (Api::MpiIo, 7) => Ok(Some(DxtLine::MpiIoLegacy {
                rank,
                operation,
                raw: raw_segment(&tokens, 3, line)?,
            })),
            (_, count) => Err(malformed(line, format!("unexpected field count {count} for {module}"))),
        }
    }

    pub fn api(&self) -> Api {
        match self {
            DxtLine::Posix { .. } => Api::Posix,
            DxtLine::MpiIo { .. } | DxtLine::MpiIoLegacy { .. } => Api::MpiIo,
        }
    }

    pub fn rank(&self) -> u32 {
        match self {
            DxtLine::Posix { rank, .. } | DxtLine::MpiIo { rank, .. } | DxtLine::MpiIoLegacy { rank, .. } => *rank,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            DxtLine::Posix { operation, .. }
            | DxtLine::MpiIo { operation, .. }
            | DxtLine::MpiIoLegacy { operation, .. } => *operation,
        }
    }

    pub fn raw(&self) -> RawSegment {
        match self {
            DxtLine::Posix { raw, .. } | DxtLine::MpiIo { raw, .. } | DxtLine::MpiIoLegacy { raw, .. } => *raw,
        }
    }
}

#[derive(Debug, Default)]
pub struct DxtParseOutcome {
    pub input: TraceInput,
    pub malformed: Vec<AnalysisError>,
}

#[derive(Default)]
struct Section {
    file: Option<FileTrace>,
    records: HashMap<(Api, u32), usize>,
    pending_stripe: Option<(f64, i64)>,
    malformed: Vec<AnalysisError>,
}

impl Section {
    fn header(&mut self, text: &str) {
        if let Some(caps) = FILE_HEADER_RE.captures(text) {
            if let Ok(file_id) = caps["file_id"].parse::<u64>() {
                self.file = Some(FileTrace::new(file_id, &caps["file_name"]));
            }
        } else if let Some(caps) = STRIPE_HEADER_RE.captures(text) {
            let size = caps["stripe_size"].parse::<f64>().unwrap_or(f64::NAN);
            let count = caps["stripe_count"].parse::<i64>().unwrap_or(0);
            self.pending_stripe = Some((size, count));
        } else if let Some(caps) = OST_HEADER_RE.captures(text) {
            let ids: Vec<u64> = caps["ids"]
                .split_ascii_whitespace()
                .filter_map(|id| id.parse().ok())
                .collect();
            let (Some((size, count)), Some(file)) = (self.pending_stripe.take(), self.file.as_mut()) else {
                return;
            };
            if file.stripe.is_some() {
                return;
            }
            match StripeLayout::new(size, count, ids) {
                Ok(layout) => file.stripe = Some(layout),
                Err(e) => crate::log_warning!("file {}: ignoring stripe layout: {}", file.file_id, e),
            }
        }
    }

    fn data(&mut self, line: DxtLine, line_no: usize) {
        let Some(file) = self.file.as_mut() else {
            self.malformed.push(malformed(line_no, "data line before any file header"));
            return;
        };
        let (api, rank) = (line.api(), line.rank());
        let records = file.records_mut(api);
        let idx = *self.records.entry((api, rank)).or_insert_with(|| {
            records.push(RankRecord::new(rank));
            records.len() - 1
        });
        records[idx].push(line.operation(), line.raw());
    }
}

fn line_spans(data: &[u8]) -> Vec<(usize, usize)> {
    let mut spans = Vec::with_capacity(data.len() / 96 + 1);
    let mut start = 0;
    for newline in memchr_iter(b'\n', data) {
        spans.push((start, newline));
        start = newline + 1;
    }
    if start < data.len() {
        spans.push((start, data.len()));
    }
    spans
}

fn parse_section(data: &[u8], spans: &[(usize, usize)], first_line: usize) -> Section {
    let mut section = Section::default();
    for (offset, &(start, end)) in spans.iter().enumerate() {
        let line_no = first_line + offset + 1;
        let Ok(text) = std::str::from_utf8(&data[start..end]) else {
            section.malformed.push(malformed(line_no, "invalid UTF-8"));
            continue;
        };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if text.starts_with('#') {
            section.header(text);
            continue;
        }
        match DxtLine::parse(text, line_no) {
            Ok(Some(line)) => section.data(line, line_no),
            Ok(None) => {}
            Err(e) => section.malformed.push(e),
        }
    }
    section
}

fn merge_section(
    input: &mut TraceInput,
    index: &mut HashMap<(u64, Api, u32), usize>,
    mut section: FileTrace,
) {
    let file_id = section.file_id;
    let target = input
        .files
        .entry(file_id)
        .or_insert_with(|| FileTrace::new(file_id, section.file_name.clone()));
    if target.stripe.is_none() {
        target.stripe = section.stripe.take();
    }

    for api in Api::ALL {
        for record in std::mem::take(section.records_mut(api)) {
            let records = target.records_mut(api);
            match index.get(&(file_id, api, record.rank)) {
                Some(&idx) => {
                    records[idx].write_segments.extend(record.write_segments);
                    records[idx].read_segments.extend(record.read_segments);
                }
                None => {
                    index.insert((file_id, api, record.rank), records.len());
                    records.push(record);
                }
            }
        }
    }
}

/// Parses a DXT text dump.
///
/// The dump is split at every `file_id` header; sections are decoded in
/// parallel and merged back in file order, so records of one rank keep the
/// order their segments appear in. Malformed data lines are skipped and
/// returned alongside the decoded trace.
pub fn parse_dxt_text(data: &[u8]) -> DxtParseOutcome {
    let start_time = Instant::now();
    let spans = line_spans(data);

    let header = memmem::Finder::new(b"file_id:");
    let mut section_starts: Vec<usize> = spans
        .iter()
        .enumerate()
        .filter(|(_, span)| {
            let line = &data[span.0..span.1];
            line.starts_with(b"#") && header.find(line).is_some()
        })
        .map(|(idx, _)| idx)
        .collect();
    if section_starts.first() != Some(&0) {
        section_starts.insert(0, 0);
    }
    section_starts.push(spans.len());

    let sections: Vec<Section> = section_starts
        .par_windows(2)
        .map(|w| parse_section(data, &spans[w[0]..w[1]], w[0]))
        .collect();

    let mut outcome = DxtParseOutcome::default();
    let mut index = HashMap::new();
    for section in sections {
        outcome.malformed.extend(section.malformed);
        if let Some(file) = section.file {
            merge_section(&mut outcome.input, &mut index, file);
        }
    }

    crate::log!(
        "Parsed {} lines into {} file(s), {} rank record(s) in {:.2}s",
        spans.len(),
        outcome.input.files.len(),
        outcome.input.record_count(),
        start_time.elapsed().as_secs_f64()
    );
    if !outcome.malformed.is_empty() {
        crate::log_warning!("Skipped {} malformed line(s)", outcome.malformed.len());
        for error in outcome.malformed.iter().take(5) {
            crate::log_debug!("  {}", error);
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# darshan log version: 3.41
# DXT, file_id: 4242, file_name: /lustre/run/out.dat
# DXT, rank: 0, hostname: nid00001
# DXT, write_count: 2, read_count: 1
# DXT, mnt_pt: /lustre, fs_type: lustre
# DXT, Lustre stripe_size: 65536, Lustre stripe_count: 4
# DXT, Lustre OST obdidx: 10 11 12 13
# Module    Rank  Wt/Rd  Segment          Offset       Length    Start(s)      End(s)  [OST]
 X_POSIX       0  write        0               0      1048576      0.0010      0.0200  [ 10]  [ 11]
 X_POSIX       0  write        1         1048576        65536      0.0200      0.0300  [ 10]
 X_POSIX       0   read        0               0         4096      0.0400      0.0410  [ 10]

# DXT, file_id: 4242, file_name: /lustre/run/out.dat
# DXT, rank: 1, hostname: nid00002
 X_POSIX       1  write        0         2097152      1048576      0.0010      0.0250  [ 12]
 X_MPIIO       1  write        0         2097152      1048576      0.0005      0.0260
 X_MPIIO       1  write          3145728      1048576      0.0300      0.0400

# DXT, file_id: 77, file_name: /home/user/input.cfg
 X_POSIX       3   read        0               0          512      1.5000      1.5001
";

    #[test]
    fn test_parse_posix_and_both_mpiio_layouts() {
        let posix = DxtLine::parse(" X_POSIX 2 write 5 100 200 0.5 0.6 [ 3] [ 4]", 1)
            .unwrap()
            .unwrap();
        assert_eq!(posix.api(), Api::Posix);
        assert_eq!(posix.rank(), 2);
        assert_eq!(posix.operation(), Operation::Write);
        assert_eq!(posix.raw().offset, 100);
        assert_eq!(posix.raw().length, 200);

        let current = DxtLine::parse("X_MPIIO 1 read 0 10 20 0.1 0.2", 2).unwrap().unwrap();
        assert!(matches!(current, DxtLine::MpiIo { segment: 0, .. }));

        let legacy = DxtLine::parse("X_MPIIO 1 read 10 20 0.1 0.2", 3).unwrap().unwrap();
        assert!(matches!(legacy, DxtLine::MpiIoLegacy { .. }));
        assert_eq!(legacy.raw().start_time, 0.1);
    }

    #[test]
    fn test_non_records_and_bad_lines() {
        assert_eq!(DxtLine::parse("total bytes: 12", 1).unwrap(), None);
        assert_eq!(DxtLine::parse("", 1).unwrap(), None);
        assert!(matches!(
            DxtLine::parse("X_POSIX 0 write 0 0 10 0.1", 9),
            Err(AnalysisError::MalformedLine { line: 9, .. })
        ));
        assert!(DxtLine::parse("X_POSIX 0 append 0 0 10 0.1 0.2", 1).is_err());
        assert!(DxtLine::parse("X_POSIX x write 0 0 10 0.1 0.2", 1).is_err());
        // negative values decode and are rejected later by validation
        let negative = DxtLine::parse("X_POSIX 0 write 0 -1 -10 0.1 0.2", 1).unwrap().unwrap();
        assert_eq!(negative.raw().offset, -1);
    }

    #[test]
    fn test_parse_text_dump() {
        let outcome = parse_dxt_text(SAMPLE.as_bytes());
        assert!(outcome.malformed.is_empty());

        let input = &outcome.input;
        assert_eq!(input.file_names(), vec![(77, "/home/user/input.cfg"), (4242, "/lustre/run/out.dat")]);

        let out = &input.files[&4242];
        let layout = out.stripe.as_ref().unwrap();
        assert_eq!(layout.stripe_size(), 65536);
        assert_eq!(layout.ost_ids(), &[10, 11, 12, 13]);

        assert_eq!(out.posix.len(), 2);
        assert_eq!(out.posix[0].rank, 0);
        assert_eq!(out.posix[0].write_segments.len(), 2);
        assert_eq!(out.posix[0].read_segments.len(), 1);
        assert_eq!(out.posix[1].rank, 1);
        assert_eq!(out.mpiio.len(), 1);
        assert_eq!(out.mpiio[0].write_segments.len(), 2);
        assert_eq!(out.mpiio[0].write_segments[1].offset, 3145728);

        let cfg = &input.files[&77];
        assert!(cfg.stripe.is_none());
        assert_eq!(cfg.posix[0].rank, 3);
    }

    #[test]
    fn test_data_before_header_and_bad_stripe_reported() {
        let text = "\
 X_POSIX 0 write 0 0 10 0.1 0.2
# DXT, file_id: 1, file_name: /tmp/a
# DXT, Lustre stripe_size: 65536, Lustre stripe_count: 4
# DXT, Lustre OST obdidx: 10 11
 X_POSIX 0 write 0 0 10 0.1 0.2
 X_POSIX 0 write 1 10 10 0.2
";
        let outcome = parse_dxt_text(text.as_bytes());
        assert_eq!(outcome.malformed.len(), 2);
        assert!(matches!(outcome.malformed[0], AnalysisError::MalformedLine { line: 1, .. }));
        assert!(matches!(outcome.malformed[1], AnalysisError::MalformedLine { line: 6, .. }));

        let file = &outcome.input.files[&1];
        assert!(file.stripe.is_none());
        assert_eq!(file.posix[0].write_segments.len(), 1);
    }

    #[test]
    fn test_empty_dump() {
        let outcome = parse_dxt_text(b"");
        assert!(outcome.input.is_empty());
        assert!(outcome.malformed.is_empty());
    }
}
