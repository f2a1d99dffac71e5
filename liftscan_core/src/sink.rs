//! Destinations for extraction records.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use liftscan_api::{ExtractionRecord, RecordKey};

use crate::{Error, Result};

/// Append-only store of extraction records.
pub trait RecordSink: Send {
    /// Append a batch of records in order.
    ///
    /// # Errors
    ///
    /// Returns an error when the batch cannot be persisted.
    fn append(&mut self, records: &[ExtractionRecord]) -> Result<()>;
}

/// Writes one JSON object per line, appending to an existing file.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: Utf8PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    /// Open `path` for appending, creating it and its parent directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be opened.
    pub fn open(path: impl AsRef<Utf8Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| io_error(path, source))?;

        Ok(Self {
            path: path.to_owned(),
            writer: BufWriter::new(file),
        })
    }

    /// Location of the record stream.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl RecordSink for JsonLinesSink {
    fn append(&mut self, records: &[ExtractionRecord]) -> Result<()> {
        for record in records {
            serde_json::to_writer(&mut self.writer, record).map_err(|source| Error::Sink {
                path: self.path.to_string(),
                source,
            })?;
            self.writer
                .write_all(b"\n")
                .map_err(|source| io_error(&self.path, source))?;
        }
        self.writer
            .flush()
            .map_err(|source| io_error(&self.path, source))
    }
}

/// Keeps records in memory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemorySink {
    records: Vec<ExtractionRecord>,
}

impl MemorySink {
    /// Records appended so far.
    #[must_use]
    pub fn records(&self) -> &[ExtractionRecord] {
        &self.records
    }

    /// Consume the sink, returning its records.
    #[must_use]
    pub fn into_records(self) -> Vec<ExtractionRecord> {
        self.records
    }
}

impl RecordSink for MemorySink {
    fn append(&mut self, records: &[ExtractionRecord]) -> Result<()> {
        self.records.extend_from_slice(records);
        Ok(())
    }
}

/// A sink shared by scan workers. Each batch is appended under one lock.
#[derive(Debug)]
pub struct SharedSink<S> {
    inner: Mutex<S>,
}

impl<S: RecordSink> SharedSink<S> {
    /// Wrap `sink` for concurrent use.
    pub const fn new(sink: S) -> Self {
        Self {
            inner: Mutex::new(sink),
        }
    }

    /// Append a whole batch without interleaving other workers' records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SinkPoisoned`] if another worker panicked while
    /// appending, or the error of the wrapped sink.
    pub fn append_batch(&self, records: &[ExtractionRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut sink = self.inner.lock().map_err(|_| Error::SinkPoisoned)?;
        sink.append(records)
    }

    /// Recover the wrapped sink.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SinkPoisoned`] if a worker panicked while appending.
    pub fn into_inner(self) -> Result<S> {
        self.inner.into_inner().map_err(|_| Error::SinkPoisoned)
    }
}

/// Read a record stream written by [`JsonLinesSink`]. A missing file is empty.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be read and [`Error::Sink`] for
/// a line that is not a record.
pub fn read_records(path: impl AsRef<Utf8Path>) -> Result<Vec<ExtractionRecord>> {
    let path = path.as_ref();
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(io_error(path, source)),
    };

    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|source| Error::Sink {
                path: path.to_string(),
                source,
            })
        })
        .collect()
}

/// Keys of file changes already recorded in the stream at `path`.
///
/// # Errors
///
/// See [`read_records`].
pub fn recorded_keys(path: impl AsRef<Utf8Path>) -> Result<HashSet<RecordKey>> {
    Ok(read_records(path)?
        .iter()
        .map(ExtractionRecord::key)
        .collect())
}

fn io_error(path: &Utf8Path, source: std::io::Error) -> Error {
    Error::Io {
        path: path.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use tempfile::TempDir;

    use super::*;

    fn record(repo: &str, index: u32) -> ExtractionRecord {
        ExtractionRecord {
            repo: repo.into(),
            pre_commit: "p".repeat(40),
            post_commit: format!("{index:040}"),
            pre_file: "src/lib.rs".into(),
            post_file: "src/lib.rs".into(),
            function: format!("helper_{index}"),
            start_line: index + 1,
            end_line: index + 3,
            match_pct: 75,
            generic: false,
            is_async: false,
            author: "dev@example.com".into(),
            date: "2024-01-01T00:00:00+00:00".into(),
        }
    }

    fn utf8_dir(temp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf-8 temp path")
    }

    #[test]
    fn json_lines_append_and_reload() {
        let temp = TempDir::new().expect("tempdir");
        let path = utf8_dir(&temp).join("out/extracts.jsonl");

        let mut sink = JsonLinesSink::open(&path).expect("open sink");
        sink.append(&[record("tokio", 1), record("tokio", 2)])
            .expect("append");
        drop(sink);

        let mut sink = JsonLinesSink::open(&path).expect("reopen sink");
        sink.append(&[record("serde", 3)]).expect("append");
        drop(sink);

        let records = read_records(&path).expect("read");
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].repo, "serde");

        let keys = recorded_keys(&path).expect("keys");
        assert!(keys.contains(&record("tokio", 2).key()));
        assert!(!keys.contains(&record("tokio", 4).key()));
    }

    #[test]
    fn missing_stream_reads_empty() {
        let temp = TempDir::new().expect("tempdir");
        let path = utf8_dir(&temp).join("absent.jsonl");
        assert!(read_records(path).expect("read").is_empty());
    }

    #[test]
    fn corrupt_line_is_sink_error() {
        let temp = TempDir::new().expect("tempdir");
        let path = utf8_dir(&temp).join("bad.jsonl");
        fs::write(&path, "{\"repo\": 1}\n").expect("write");
        assert!(matches!(read_records(&path), Err(Error::Sink { .. })));
    }

    #[test]
    fn shared_sink_keeps_batches_contiguous() {
        let shared = Arc::new(SharedSink::new(MemorySink::default()));
        let handles: Vec<_> = ["alpha", "beta", "gamma", "delta"]
            .into_iter()
            .map(|repo| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    let batch: Vec<_> = (0..50).map(|index| record(repo, index)).collect();
                    shared.append_batch(&batch).expect("append batch");
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker");
        }

        let shared = Arc::try_unwrap(shared).expect("sole owner");
        let records = shared.into_inner().expect("sink").into_records();
        assert_eq!(records.len(), 200);
        for chunk in records.chunks(50) {
            assert!(chunk.iter().all(|record| record.repo == chunk[0].repo));
        }
    }
}
