//! Aggregation of every annotator's record files into one dataset
//!
//! Merging is deliberately lenient: a file that cannot be read or parsed is
//! logged and skipped so the remaining annotators still make it into the
//! export.

use chrono::Local;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{LabelError, Result};
use crate::record::EvaluationRecord;
use crate::store::{is_labels_file_name, read_json_values, write_json_atomic};

/// Columns every flattened row starts with
pub const FIXED_COLUMNS: [&str; 5] = ["post_id", "title", "annotator", "timestamp", "related_text"];

/// Record field whose entries are promoted to columns
pub const RUBRIC_FIELD: &str = "model_evaluations";

#[derive(Debug, Clone)]
pub struct MergeReport {
  pub path: PathBuf,
  pub records: usize,
  pub files: usize,
  pub skipped: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ExportReport {
  pub path: PathBuf,
  pub rows: usize,
  pub columns: Vec<String>,
  pub merge: MergeReport,
}

/// Union-of-columns table built from merged records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatTable {
  pub columns: Vec<String>,
  pub rows: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone)]
pub struct Exporter {
  root: PathBuf,
}

impl Exporter {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Record files under the root, in directory enumeration order
  pub fn list_files(&self) -> Vec<PathBuf> {
    let entries = match fs::read_dir(&self.root) {
      Ok(entries) => entries,
      Err(err) => {
        debug!(path = %self.root.display(), error = %err, "storage root not readable, no files");
        return Vec::new();
      }
    };

    entries
      .filter_map(|entry| entry.ok())
      .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
      .filter(|entry| entry.file_name().to_str().is_some_and(is_labels_file_name))
      .map(|entry| entry.path())
      .collect()
  }

  /// Merge every record file into one JSON array.
  ///
  /// Returns `Ok(None)` when there are no record files at all.
  pub fn merge_all(&self, output_name: Option<&str>) -> Result<Option<MergeReport>> {
    Ok(self.merge_records(output_name)?.map(|(report, _)| report))
  }

  /// Merge, then write one CSV row per record
  pub fn export_flattened(&self, output_name: Option<&str>) -> Result<Option<ExportReport>> {
    let path = self.output_path(output_name, default_csv_name)?;
    let Some((merge, records)) = self.merge_records(None)? else {
      return Ok(None);
    };

    let table = flatten_records(&records);
    write_csv(&path, &table)?;

    info!(path = %path.display(), rows = table.rows.len(), columns = table.columns.len(), "exported CSV");
    Ok(Some(ExportReport { path, rows: table.rows.len(), columns: table.columns, merge }))
  }

  /// Where an export lands: a plain file name directly under the root that
  /// can never be mistaken for an annotator's record file
  fn output_path(&self, output_name: Option<&str>, default_name: fn() -> String) -> Result<PathBuf> {
    let Some(name) = output_name else {
      return Ok(self.root.join(default_name()));
    };

    let mut components = Path::new(name).components();
    let single_file_name = matches!((components.next(), components.next()), (Some(Component::Normal(_)), None));
    if !single_file_name {
      return Err(LabelError::invalid_output_name(name, "must be a plain file name"));
    }
    if is_labels_file_name(name) {
      return Err(LabelError::invalid_output_name(name, "would overwrite an annotator's labels file"));
    }
    Ok(self.root.join(name))
  }

  fn merge_records(&self, output_name: Option<&str>) -> Result<Option<(MergeReport, Vec<Value>)>> {
    let path = self.output_path(output_name, default_merge_name)?;
    let files = self.list_files();
    if files.is_empty() {
      info!(path = %self.root.display(), "no labeled data files found");
      return Ok(None);
    }

    let mut records = Vec::new();
    let mut skipped = Vec::new();
    for file in &files {
      match read_json_values(file) {
        Ok(values) => records.extend(values.into_iter().map(canonicalize)),
        Err(err) => {
          warn!(path = %file.display(), error = %err, "skipping unreadable labels file");
          skipped.push(file.clone());
        }
      }
    }

    write_json_atomic(&path, &records)?;
    info!(path = %path.display(), records = records.len(), "merged labeled items");

    let report = MergeReport { path, records: records.len(), files: files.len(), skipped };
    Ok(Some((report, records)))
  }
}

fn export_stamp() -> String {
  Local::now().format("%Y%m%d_%H%M%S").to_string()
}

pub fn default_merge_name() -> String {
  format!("merged_labeled_data_{}.json", export_stamp())
}

pub fn default_csv_name() -> String {
  format!("labeled_data_{}.csv", export_stamp())
}

/// Rewrite a stored value in the canonical record shape when it parses as
/// one; anything else passes through untouched
fn canonicalize(value: Value) -> Value {
  match serde_json::from_value::<EvaluationRecord>(value.clone()).and_then(|r| serde_json::to_value(&r)) {
    Ok(canonical) => canonical,
    Err(err) => {
      debug!(error = %err, "keeping non-canonical record as stored");
      value
    }
  }
}

/// One-level flattening: fixed columns plus one column per rubric entry.
///
/// Rubric values stay nested; only their keys are promoted.
pub fn flatten_record(record: &Value) -> Map<String, Value> {
  let mut row = Map::new();

  for column in FIXED_COLUMNS {
    let value = record.get(column).cloned().unwrap_or(Value::Null);
    row.insert(column.to_string(), value);
  }
  if row.get("related_text").is_some_and(Value::is_null) {
    row.insert("related_text".to_string(), Value::String(String::new()));
  }

  if let Some(rubric) = record.get(RUBRIC_FIELD).and_then(Value::as_object) {
    for (key, value) in rubric {
      row.insert(key.clone(), value.clone());
    }
  }

  row
}

pub fn flatten_records(records: &[Value]) -> FlatTable {
  let mut columns: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
  let mut rows = Vec::with_capacity(records.len());

  for record in records {
    let row = flatten_record(record);
    if let Some(rubric) = record.get(RUBRIC_FIELD).and_then(Value::as_object) {
      for key in rubric.keys() {
        if !columns.contains(key) {
          columns.push(key.clone());
        }
      }
    }
    rows.push(row);
  }

  FlatTable { columns, rows }
}

/// Text of one CSV cell; absent and null cells are empty
pub fn cell_text(value: Option<&Value>) -> String {
  match value {
    None | Some(Value::Null) => String::new(),
    Some(Value::String(s)) => s.clone(),
    Some(other) => other.to_string(),
  }
}

pub fn write_csv(path: &Path, table: &FlatTable) -> Result<()> {
  let mut writer = csv::Writer::from_path(path).map_err(|e| LabelError::csv(path, e))?;

  writer.write_record(&table.columns).map_err(|e| LabelError::csv(path, e))?;
  for row in &table.rows {
    let cells = table.columns.iter().map(|column| cell_text(row.get(column)));
    writer.write_record(cells).map_err(|e| LabelError::csv(path, e))?;
  }

  writer.flush().map_err(|e| LabelError::io(path, e))?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_flatten_promotes_rubric_keys_one_level() {
    let record = json!({
      "post_id": 1,
      "title": "Segfault in loop",
      "annotator": "alice",
      "timestamp": "2024-05-01T09:00:00",
      "model_evaluations": {
        "GPT_with_image": { "usefulness_rating": 4 }
      }
    });

    let row = flatten_record(&record);
    assert_eq!(row["post_id"], json!(1));
    assert_eq!(row["related_text"], json!(""));
    assert_eq!(row["GPT_with_image"], json!({ "usefulness_rating": 4 }));
    assert!(!row.contains_key("model_evaluations"));
  }

  #[test]
  fn test_header_is_union_of_rubric_keys() {
    let records = vec![
      json!({ "post_id": 1, "model_evaluations": { "GPT_with_image": {} } }),
      json!({ "post_id": 2, "model_evaluations": { "GPT_with_image": {}, "Llama_without_image": {} } }),
    ];

    let table = flatten_records(&records);
    assert_eq!(
      table.columns,
      vec!["post_id", "title", "annotator", "timestamp", "related_text", "GPT_with_image", "Llama_without_image"]
    );
    assert!(!table.rows[0].contains_key("Llama_without_image"));
  }

  #[test]
  fn test_cell_text_rendering() {
    assert_eq!(cell_text(None), "");
    assert_eq!(cell_text(Some(&Value::Null)), "");
    assert_eq!(cell_text(Some(&json!("héllo"))), "héllo");
    assert_eq!(cell_text(Some(&json!(3))), "3");
    assert_eq!(cell_text(Some(&json!(true))), "true");
    assert_eq!(cell_text(Some(&json!({ "a": 1 }))), r#"{"a":1}"#);
  }

  #[test]
  fn test_canonicalize_folds_legacy_layout() {
    let legacy = json!({ "post_id": 3, "GPT_with_image_evaluation": { "notes": "ok" } });
    let canonical = canonicalize(legacy);
    assert_eq!(canonical["model_evaluations"]["GPT_with_image"]["notes"], json!("ok"));
  }

  #[test]
  fn test_canonicalize_passes_through_foreign_values() {
    let foreign = json!({ "unrelated": true });
    assert_eq!(canonicalize(foreign.clone()), foreign);
  }
}
