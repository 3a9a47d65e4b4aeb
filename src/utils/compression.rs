use flate2::read::GzDecoder;
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::io::{self, Read};
use std::ops::Deref;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompressionFormat {
    Gzip,
    None,
}

impl CompressionFormat {
    pub fn from_path(path: &Path) -> Self {
        let path_str = path.to_string_lossy().to_lowercase();

        if path_str.ends_with(".gz") || path_str.ends_with(".gzip") {
            CompressionFormat::Gzip
        } else {
            CompressionFormat::None
        }
    }
}

// Trace contents: mapped straight from disk when uncompressed, inflated otherwise
pub enum TraceBytes {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for TraceBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            TraceBytes::Mapped(mmap) => mmap,
            TraceBytes::Owned(bytes) => bytes,
        }
    }
}

pub fn read_trace_bytes(path: &Path) -> io::Result<TraceBytes> {
    let start_time = Instant::now();
    let file = File::open(path)?;

    match CompressionFormat::from_path(path) {
        CompressionFormat::Gzip => {
            let mut decoder = GzDecoder::new(file);
            let mut bytes = Vec::new();
            decoder.read_to_end(&mut bytes)?;
            crate::log_debug!(
                "Inflated {} ({:.2} MB) in {:.2}s",
                path.display(),
                bytes.len() as f64 / 1_048_576.0,
                start_time.elapsed().as_secs_f64()
            );
            Ok(TraceBytes::Owned(bytes))
        }
        CompressionFormat::None => {
            // Empty files cannot be mapped on every platform
            if file.metadata()?.len() == 0 {
                return Ok(TraceBytes::Owned(Vec::new()));
            }
            // SAFETY: the trace is opened read-only and is not modified while mapped
            let mmap = unsafe { MmapOptions::new().map(&file)? };
            crate::log_debug!(
                "Memory mapped {} ({:.2} MB) in {:.2}s",
                path.display(),
                mmap.len() as f64 / 1_048_576.0,
                start_time.elapsed().as_secs_f64()
            );
            Ok(TraceBytes::Mapped(mmap))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_detects_gzip_suffix() {
        assert_eq!(
            CompressionFormat::from_path(Path::new("run.darshan.dxt.gz")),
            CompressionFormat::Gzip
        );
        assert_eq!(
            CompressionFormat::from_path(Path::new("run.darshan.dxt")),
            CompressionFormat::None
        );
    }

    #[test]
    fn test_reads_plain_and_gzip() {
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("trace.dxt");
        std::fs::write(&plain, b"X_POSIX 0 write\n").unwrap();
        assert_eq!(&*read_trace_bytes(&plain).unwrap(), b"X_POSIX 0 write\n");

        let packed = dir.path().join("trace.dxt.gz");
        let mut encoder = GzEncoder::new(File::create(&packed).unwrap(), Compression::default());
        encoder.write_all(b"X_MPIIO 1 read\n").unwrap();
        encoder.finish().unwrap();
        assert_eq!(&*read_trace_bytes(&packed).unwrap(), b"X_MPIIO 1 read\n");

        let empty = dir.path().join("empty.dxt");
        std::fs::write(&empty, b"").unwrap();
        assert!(read_trace_bytes(&empty).unwrap().is_empty());
    }
}
