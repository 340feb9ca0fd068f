//! Per-annotator evaluation record storage
//!
//! Each (annotator, dataset) pair owns exactly one file,
//! `{root}/{annotator}_{dataset}_labels.json`, holding a JSON array of
//! records with at most one entry per post id.
//!
//! Writes are full read-modify-write cycles with no locking: two processes
//! saving to the same pair at once can lose one of the submissions.
//!
//! Entries that do not parse as records are skipped on read but written back
//! untouched on save, so one odd entry never costs an annotator the rest of
//! the file.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{LabelError, Result};
use crate::record::{now_timestamp, Dataset, EvaluationRecord, PostId};

pub const LABELS_SUFFIX: &str = "_labels.json";

/// File name of the record file for an (annotator, dataset) pair
pub fn labels_file_name(annotator: &str, dataset: Dataset) -> String {
  format!("{annotator}_{dataset}{LABELS_SUFFIX}")
}

/// Annotator names end up in file names, so they must be a single, non-empty
/// path component
pub fn validate_annotator(annotator: &str) -> Result<()> {
  let reason = if annotator.trim().is_empty() {
    "name is empty"
  } else if annotator.contains(['/', '\\']) {
    "name contains a path separator"
  } else if annotator == "." || annotator == ".." {
    "name is a relative path"
  } else {
    return Ok(());
  };
  Err(LabelError::invalid_annotator(annotator, reason))
}

/// Whether a file name follows the record file naming convention
pub fn is_labels_file_name(name: &str) -> bool {
  Dataset::ALL.iter().any(|dataset| {
    name
      .strip_suffix(LABELS_SUFFIX)
      .and_then(|stem| stem.strip_suffix(dataset.as_str()))
      .and_then(|stem| stem.strip_suffix('_'))
      .is_some_and(|annotator| !annotator.is_empty())
  })
}

#[derive(Debug, Clone)]
pub struct RecordStore {
  root: PathBuf,
}

impl RecordStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Same (annotator, dataset) pair always maps to the same file
  pub fn file_path(&self, annotator: &str, dataset: Dataset) -> PathBuf {
    self.root.join(labels_file_name(annotator, dataset))
  }

  /// Records of one file. A missing file or invalid JSON is an error;
  /// single entries that are not records are skipped with a warning.
  pub fn load(&self, annotator: &str, dataset: Dataset) -> Result<Vec<EvaluationRecord>> {
    read_records_skipping(&self.file_path(annotator, dataset))
  }

  /// Upsert a record by post id and rewrite the annotator's file.
  ///
  /// Only entries with the same post id are replaced; every other entry is
  /// written back as stored. An absent file, or one that is not valid JSON
  /// (copied aside first), is treated as empty. Any other I/O failure aborts
  /// the save.
  pub fn save(&self, record: &EvaluationRecord, annotator: &str, dataset: Dataset) -> Result<PathBuf> {
    validate_annotator(annotator)?;
    let path = self.file_path(annotator, dataset);

    let mut entries = match read_json_values(&path) {
      Ok(entries) => entries,
      Err(LabelError::NotFound { .. }) => Vec::new(),
      Err(err @ LabelError::Malformed { .. }) => {
        warn!(path = %path.display(), error = %err, "existing labels unreadable, starting a new file");
        preserve_unreadable(&path);
        Vec::new()
      }
      Err(err) => return Err(err),
    };

    entries.retain(|entry| entry_post_id(entry).as_ref() != Some(&record.post_id));

    let mut record = record.clone();
    record.normalize();
    entries.push(serde_json::to_value(&record).map_err(|e| LabelError::malformed(&path, e))?);

    write_json_atomic(&path, &entries)?;
    info!(path = %path.display(), records = entries.len(), "saved labels");
    Ok(path)
  }

  /// Stored record for a post, or `None` when absent or unreadable
  pub fn find(&self, post_id: &PostId, annotator: &str, dataset: Dataset) -> Option<EvaluationRecord> {
    match self.load(annotator, dataset) {
      Ok(records) => records.into_iter().find(|record| &record.post_id == post_id),
      Err(err) => {
        log_degraded_read(&err);
        None
      }
    }
  }

  pub fn is_labeled(&self, post_id: &PostId, annotator: &str, dataset: Dataset) -> bool {
    self.find(post_id, annotator, dataset).is_some()
  }

  /// How many of `post_ids` already have a stored record
  pub fn count_labeled<'a>(
    &self,
    post_ids: impl IntoIterator<Item = &'a PostId>,
    annotator: &str,
    dataset: Dataset,
  ) -> usize {
    let labeled: HashSet<PostId> = match self.load(annotator, dataset) {
      Ok(records) => records.into_iter().map(|record| record.post_id).collect(),
      Err(err) => {
        log_degraded_read(&err);
        return 0;
      }
    };

    post_ids.into_iter().filter(|post_id| labeled.contains(post_id)).count()
  }

  /// Record files belonging to one annotator, sorted by name
  pub fn annotator_files(&self, annotator: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Dataset::ALL
      .iter()
      .map(|dataset| self.file_path(annotator, *dataset))
      .filter(|path| path.is_file())
      .collect();
    files.sort();
    files
  }

  /// Every record across the annotator's files; unreadable files are skipped
  pub fn collect_annotator(&self, annotator: &str) -> Vec<EvaluationRecord> {
    let mut all = Vec::new();
    for path in self.annotator_files(annotator) {
      match read_records_skipping(&path) {
        Ok(records) => all.extend(records),
        Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable labels file"),
      }
    }
    all
  }

  /// Write all of an annotator's records to `output` as one JSON array.
  ///
  /// Returns `None` when the annotator has nothing stored.
  pub fn bundle(&self, annotator: &str, output: &Path) -> Result<Option<usize>> {
    let records = self.collect_annotator(annotator);
    if records.is_empty() {
      return Ok(None);
    }

    write_json_atomic(output, &records)?;
    info!(path = %output.display(), records = records.len(), "wrote annotator bundle");
    Ok(Some(records.len()))
  }
}

fn log_degraded_read(err: &LabelError) {
  if err.is_not_found() {
    debug!(error = %err, "no labels file yet");
  } else {
    warn!(error = %err, "treating labels file as empty");
  }
}

fn preserve_unreadable(path: &Path) {
  let backup = path.with_extension(format!("json.unreadable-{}", now_timestamp().replace(':', "")));
  if let Err(err) = fs::copy(path, &backup) {
    warn!(path = %path.display(), error = %err, "could not keep a copy of the unreadable file");
  } else {
    warn!(path = %backup.display(), "kept a copy of the unreadable labels file");
  }
}

/// Read a JSON file holding either one object or an array of objects
pub(crate) fn read_json_values(path: &Path) -> Result<Vec<Value>> {
  let file = File::open(path).map_err(|e| LabelError::io(path, e))?;
  let value: Value =
    serde_json::from_reader(BufReader::new(file)).map_err(|e| LabelError::malformed(path, e))?;

  Ok(match value {
    Value::Array(items) => items,
    single => vec![single],
  })
}

/// Post id of a stored entry, whether or not the rest of it parses
fn entry_post_id(entry: &Value) -> Option<PostId> {
  entry.get("post_id").and_then(|id| PostId::deserialize(id).ok())
}

/// Strict: every entry must be a record
pub(crate) fn read_records(path: &Path) -> Result<Vec<EvaluationRecord>> {
  read_json_values(path)?
    .into_iter()
    .map(|value| serde_json::from_value(value).map_err(|e| LabelError::malformed(path, e)))
    .collect()
}

/// Lenient per entry: entries that are not records are logged and skipped
pub(crate) fn read_records_skipping(path: &Path) -> Result<Vec<EvaluationRecord>> {
  let records = read_json_values(path)?
    .into_iter()
    .enumerate()
    .filter_map(|(index, value)| match serde_json::from_value(value) {
      Ok(record) => Some(record),
      Err(err) => {
        warn!(path = %path.display(), index, error = %err, "skipping entry that is not a record");
        None
      }
    })
    .collect();
  Ok(records)
}

/// Pretty-print `value` (2-space indent, non-ASCII kept literal) into a
/// sibling temp file, then rename it over `path`
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
  let dir = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  fs::create_dir_all(dir).map_err(|e| LabelError::io(dir, e))?;

  let mut staged = NamedTempFile::new_in(dir).map_err(|e| LabelError::io(dir, e))?;
  if let Ok(metadata) = fs::metadata(path) {
    staged.as_file().set_permissions(metadata.permissions()).map_err(|e| LabelError::io(path, e))?;
  }
  {
    let mut writer = BufWriter::new(staged.as_file_mut());
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| LabelError::io(path, e.into()))?;
    writer.flush().map_err(|e| LabelError::io(path, e))?;
  }

  staged.persist(path).map_err(|e| LabelError::persist(path, e.error))?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_labels_file_name_convention() {
    assert_eq!(labels_file_name("alice", Dataset::FjOnly), "alice_FJ_only_labels.json");
    assert!(is_labels_file_name("alice_FJ_only_labels.json"));
    assert!(is_labels_file_name("bob_smith_Faiz_FJ_labels.json"));
    assert!(!is_labels_file_name("_FJ_only_labels.json"));
    assert!(!is_labels_file_name("alice_all_labels.json"));
    assert!(!is_labels_file_name("merged_labeled_data_20240101_120000.json"));
  }

  #[test]
  fn test_write_json_atomic_keeps_non_ascii_and_indents() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("out.json");

    write_json_atomic(&path, &serde_json::json!([{ "notes": "naïve — 日本語" }])).unwrap();

    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("naïve — 日本語"));
    assert!(written.contains("\n  {\n    \"notes\""));
  }

  #[test]
  fn test_validate_annotator() {
    assert!(validate_annotator("alice").is_ok());
    assert!(validate_annotator("bob smith").is_ok());
    for bad in ["", "  ", "a/b", "a\\b", ".", ".."] {
      assert!(matches!(validate_annotator(bad), Err(LabelError::InvalidAnnotator { .. })), "{bad:?} accepted");
    }
  }

  #[cfg(unix)]
  #[test]
  fn test_write_json_atomic_keeps_existing_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let path = temp.path().join("alice_FJ_only_labels.json");
    fs::write(&path, "[]").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

    write_json_atomic(&path, &serde_json::json!([])).unwrap();

    let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o644);
  }

  #[test]
  fn test_read_json_values_accepts_single_object() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("single.json");
    fs::write(&path, r#"{"post_id": 1}"#).unwrap();

    let values = read_json_values(&path).unwrap();
    assert_eq!(values.len(), 1);
  }

  #[test]
  fn test_read_json_values_reports_path_on_malformed() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("broken.json");
    fs::write(&path, "[{").unwrap();

    let err = read_json_values(&path).unwrap_err();
    assert!(matches!(err, LabelError::Malformed { .. }));
    assert!(err.to_string().contains("broken.json"));
  }
}
