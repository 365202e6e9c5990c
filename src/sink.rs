//! Error Sink (spec.md §4.7): append-only NDJSON error stream with an
//! index file tracking byte offsets every [`INDEX_STRIDE`] records. Writes
//! batch in memory up to `flush_batch` entries before hitting disk.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::warn;

use crate::model::error_record::{Severity, ValidationError};
use crate::Result;

const INDEX_STRIDE: u64 = 1000;

#[derive(Debug, Clone, Default)]
pub struct PageFilter {
    pub stage: Option<u8>,
    pub rule_id: Option<String>,
}

impl PageFilter {
    fn matches(&self, error: &ValidationError) -> bool {
        self.stage.is_none_or(|s| s == error.stage) && self.rule_id.as_deref().is_none_or(|r| r == error.rule_id)
    }
}

#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub errors: Vec<ValidationError>,
    pub at_end: bool,
}

#[derive(Debug, Clone)]
pub struct SinkSummary {
    pub total_errors: u64,
    pub total_warnings: u64,
    pub path: PathBuf,
    pub degraded: bool,
}

struct SinkState {
    writer: Option<BufWriter<File>>,
    pending: Vec<ValidationError>,
    byte_offset: u64,
    record_count: u64,
    index_entries: Vec<(u64, u64)>,
    total_errors: u64,
    total_warnings: u64,
    degraded: bool,
}

/// Append-only sink for one job's `ValidationError` stream. A flush batch is
/// held in memory and written on batch-full, on `flush()` (called at stage
/// end), or on `finalize()`.
pub struct ErrorSink {
    path: PathBuf,
    index_path: PathBuf,
    flush_batch: usize,
    state: Mutex<SinkState>,
}

impl ErrorSink {
    pub fn create(path: impl Into<PathBuf>, flush_batch: usize) -> Result<Self> {
        let path = path.into();
        let index_path = path.with_extension("idx");
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            index_path,
            flush_batch,
            state: Mutex::new(SinkState {
                writer: Some(BufWriter::new(file)),
                pending: Vec::new(),
                byte_offset: 0,
                record_count: 0,
                index_entries: Vec::new(),
                total_errors: 0,
                total_warnings: 0,
                degraded: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_degraded(&self) -> bool {
        self.state.lock().degraded
    }

    /// Enqueues `error`, flushing the batch to disk once it reaches
    /// `flush_batch` (spec.md §4.7). Counters are updated even in degraded
    /// mode; only the payload is dropped.
    pub fn append(&self, error: ValidationError) {
        let mut state = self.state.lock();
        match error.severity {
            Severity::Error | Severity::Critical => state.total_errors += 1,
            Severity::Warning => state.total_warnings += 1,
            Severity::Info => {}
        }
        state.pending.push(error);
        if state.pending.len() >= self.flush_batch {
            self.flush_locked(&mut state);
        }
    }

    pub fn flush(&self) {
        let mut state = self.state.lock();
        self.flush_locked(&mut state);
    }

    fn flush_locked(&self, state: &mut SinkState) {
        if state.pending.is_empty() {
            return;
        }
        if state.degraded {
            state.pending.clear();
            return;
        }

        let Some(writer) = state.writer.as_mut() else {
            state.degraded = true;
            state.pending.clear();
            return;
        };

        for error in state.pending.drain(..) {
            let line = match serde_json::to_string(&error) {
                Ok(line) => line,
                Err(err) => {
                    warn!(error = %err, "failed to serialize validation error; dropping record");
                    continue;
                }
            };
            if let Err(err) = writeln!(writer, "{line}") {
                warn!(error = %err, path = %self.path.display(), "error sink backing file unwritable; entering degraded mode");
                state.degraded = true;
                state.writer = None;
                break;
            }
            state.byte_offset += line.len() as u64 + 1;
            state.record_count += 1;
            if state.record_count % INDEX_STRIDE == 0 {
                state.index_entries.push((state.record_count, state.byte_offset));
            }
        }

        if let Some(writer) = state.writer.as_mut() {
            if let Err(err) = writer.flush() {
                warn!(error = %err, path = %self.path.display(), "error sink flush failed; entering degraded mode");
                state.degraded = true;
                state.writer = None;
            }
        }
    }

    pub fn finalize(&self) -> SinkSummary {
        let mut state = self.state.lock();
        self.flush_locked(&mut state);
        if !state.degraded {
            if let Ok(mut index_file) = File::create(&self.index_path) {
                for (record, offset) in &state.index_entries {
                    let _ = writeln!(index_file, "{record}\t{offset}");
                }
            }
        }
        SinkSummary {
            total_errors: state.total_errors,
            total_warnings: state.total_warnings,
            path: self.path.clone(),
            degraded: state.degraded,
        }
    }

    /// Reads up to `limit` records matching `filter`, starting from raw
    /// record number `offset` in the persisted sequence (spec.md §4.7
    /// "safe to call concurrently with append"). Concatenating every page
    /// with an empty filter reproduces the full persisted sequence.
    pub fn read_page(&self, offset: usize, limit: usize, filter: &PageFilter) -> Result<ErrorPage> {
        self.flush();

        let index_entries = self.state.lock().index_entries.clone();
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return Ok(ErrorPage { errors: Vec::new(), at_end: true }),
        };
        let mut reader = BufReader::new(file);

        let (start_record, start_byte) = index_entries.iter().rev().find(|(record, _)| *record as usize <= offset).copied().unwrap_or((0, 0));
        reader.seek(SeekFrom::Start(start_byte))?;

        let mut line = String::new();
        let mut record = start_record as usize;
        while record < offset {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Ok(ErrorPage { errors: Vec::new(), at_end: true });
            }
            record += 1;
        }

        let mut errors = Vec::new();
        let mut at_end = false;
        loop {
            if errors.len() >= limit {
                break;
            }
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                at_end = true;
                break;
            }
            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<ValidationError>(trimmed) {
                Ok(error) => {
                    if filter.matches(&error) {
                        errors.push(error);
                    }
                }
                Err(err) => warn!(error = %err, "failed to parse persisted validation error; skipping record"),
            }
        }

        Ok(ErrorPage { errors, at_end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::error_record::ErrorKind;
    use chrono::Utc;
    use std::collections::HashMap;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn error(stage: u8, rule_id: &str, code: &str, severity: Severity) -> ValidationError {
        ValidationError {
            error_id: Uuid::new_v4(),
            job_id: "val_1".into(),
            stage,
            rule_id: rule_id.into(),
            code: code.into(),
            message: "msg".into(),
            table_id: "tn_buld".into(),
            table_name: "Buildings".into(),
            field: None,
            feature_id: Some(1),
            severity,
            kind: ErrorKind::Geometry,
            location: None,
            metadata: HashMap::new(),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn append_and_finalize_counts_by_severity() {
        let dir = tempdir().unwrap();
        let sink = ErrorSink::create(dir.path().join("errors.ndjson"), 10).unwrap();
        sink.append(error(3, "r1", "GEO_OVERLAP", Severity::Error));
        sink.append(error(1, "r2", "TBL_EXTRA_LAYER", Severity::Warning));
        let summary = sink.finalize();
        assert_eq!(summary.total_errors, 1);
        assert_eq!(summary.total_warnings, 1);
        assert!(!summary.degraded);
    }

    #[test]
    fn read_page_concatenation_reproduces_full_sequence_without_filter() {
        let dir = tempdir().unwrap();
        let sink = ErrorSink::create(dir.path().join("errors.ndjson"), 2);
        let sink = sink.unwrap();
        for i in 0..5 {
            sink.append(error(3, &format!("r{i}"), "GEO_OVERLAP", Severity::Error));
        }
        sink.finalize();

        let mut all = Vec::new();
        let mut offset = 0;
        loop {
            let page = sink.read_page(offset, 2, &PageFilter::default()).unwrap();
            let got = page.errors.len();
            all.extend(page.errors);
            offset += got;
            if page.at_end {
                break;
            }
        }
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].rule_id, "r0");
        assert_eq!(all[4].rule_id, "r4");
    }

    #[test]
    fn read_page_applies_filter() {
        let dir = tempdir().unwrap();
        let sink = ErrorSink::create(dir.path().join("errors.ndjson"), 10).unwrap();
        sink.append(error(3, "r1", "GEO_OVERLAP", Severity::Error));
        sink.append(error(4, "r2", "REL_POINT_SPACING_CHECK", Severity::Error));
        sink.finalize();

        let page = sink.read_page(0, 10, &PageFilter { stage: Some(4), rule_id: None }).unwrap();
        assert_eq!(page.errors.len(), 1);
        assert_eq!(page.errors[0].rule_id, "r2");
    }

    #[test]
    fn unwritable_path_enters_degraded_mode_without_panicking() {
        let dir = tempdir().unwrap();
        let bad_path = dir.path().join("missing_dir").join("errors.ndjson");
        assert!(ErrorSink::create(bad_path, 10).is_err());
    }
}
