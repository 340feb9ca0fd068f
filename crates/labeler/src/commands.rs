use anyhow::{anyhow, Context, Result};
use colored::*;
use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::console;
use crate::dataset::DatasetLoader;
use crate::error::LabelError;
use crate::export::Exporter;
use crate::preview::render_preview;
use crate::record::{Dataset, EvaluationRecord};
use crate::store::{read_records, RecordStore};

/// Read the single record held in a draft file
fn read_draft(path: &Path) -> Result<EvaluationRecord> {
  let mut records = read_records(path)?;
  match records.len() {
    1 => Ok(records.remove(0)),
    0 => Err(anyhow!("No record found in {}", path.display())),
    n => Err(anyhow!("Expected one record in {}, found {n}", path.display())),
  }
}

/// Print a default record for a post, keyed the way the dataset keys it
pub fn print_template(config: &Config, post_id: &str, dataset: Dataset) -> Result<()> {
  let post_id = DatasetLoader::new(&config.data_dir).resolve_post_id(dataset, post_id);
  let record = EvaluationRecord::create_default(post_id, dataset);
  println!("{}", serde_json::to_string_pretty(&record)?);
  Ok(())
}

/// Report whether a draft file could be submitted
pub fn check_draft(file: &Path, dataset: Dataset) -> Result<()> {
  let record = read_draft(file)?;
  let missing = record.missing_keys(dataset);

  if missing.is_empty() {
    println!("{} Post {} is complete for {}", "✓".green(), record.post_id.to_string().cyan(), dataset);
    return Ok(());
  }

  Err(LabelError::incomplete(&record.post_id, missing).into())
}

/// Gate, stamp and save a draft file
pub fn submit_draft(
  config: &Config,
  file: &Path,
  annotator: &str,
  dataset: Dataset,
  title: Option<String>,
) -> Result<()> {
  let mut record = read_draft(file)?;

  let missing = record.missing_keys(dataset);
  if !missing.is_empty() {
    return Err(LabelError::incomplete(&record.post_id, missing).into());
  }

  let loader = DatasetLoader::new(&config.data_dir);
  if let Some(post_id) = loader.matching_post_id(dataset, &record.post_id.to_string()) {
    record.post_id = post_id;
  }

  let store = RecordStore::new(&config.output_dir);
  if store.is_labeled(&record.post_id, annotator, dataset) {
    console::warn(&format!(
      "Post {} was already labeled by {annotator}; this submission replaces it",
      record.post_id
    ));
  }

  let title = title
    .or_else(|| record.title.clone())
    .or_else(|| loader.find_question(dataset, &record.post_id).map(|question| question.title));

  record.stamp(annotator, dataset, title);
  let path = store
    .save(&record, annotator, dataset)
    .with_context(|| format!("Failed to save labels for post {}", record.post_id))?;

  println!("{} Saved post {} to {}", "✓".green(), record.post_id.to_string().cyan(), path.display());
  Ok(())
}

pub fn show_record(config: &Config, post_id: &str, annotator: &str, dataset: Dataset, preview: bool) -> Result<()> {
  let store = RecordStore::new(&config.output_dir);
  let post_id = DatasetLoader::new(&config.data_dir).resolve_post_id(dataset, post_id);

  let found = store
    .find(&post_id, annotator, dataset)
    .or_else(|| post_id.alternate().and_then(|alternate| store.find(&alternate, annotator, dataset)));
  let Some(record) = found else {
    console::info(&format!("No labels stored for post {post_id} by {annotator}"));
    return Ok(());
  };

  if preview {
    print!("{}", render_preview(&record));
  } else {
    println!("{}", serde_json::to_string_pretty(&record)?);
  }
  Ok(())
}

/// Labeling progress of an annotator against the source dataset
pub fn show_status(config: &Config, annotator: &str, dataset: Dataset) -> Result<()> {
  let loader = DatasetLoader::new(&config.data_dir);
  let questions = loader.load(dataset);
  if questions.is_empty() {
    console::warn(&format!("No questions found in {}", loader.file_path(dataset).display()));
  }

  let store = RecordStore::new(&config.output_dir);
  let labeled = store.count_labeled(questions.iter().map(|q| &q.post_id), annotator, dataset);

  println!(
    "{} has labeled {} of {} questions in {}",
    annotator.cyan(),
    labeled.to_string().green(),
    questions.len(),
    dataset.to_string().yellow()
  );
  Ok(())
}

pub fn list_annotator_files(config: &Config, annotator: &str) -> Result<()> {
  let files = RecordStore::new(&config.output_dir).annotator_files(annotator);
  if files.is_empty() {
    println!("No labeled data found for annotator: {}", annotator.yellow());
    return Ok(());
  }

  for path in files {
    let size = fs::metadata(&path).map(|m| m.len() as f64 / 1024.0).unwrap_or_default();
    println!("{} ({size:.2} KB)", path.display().to_string().cyan());
  }
  Ok(())
}

pub fn bundle_annotator(config: &Config, annotator: &str, output: &Path) -> Result<()> {
  let store = RecordStore::new(&config.output_dir);
  match store.bundle(annotator, output)? {
    Some(count) => console::success(&format!("Bundled {count} records for {annotator} into {}", output.display())),
    None => println!("No labeled data found for annotator: {}", annotator.yellow()),
  }
  Ok(())
}

pub fn list_all_files(config: &Config) -> Result<()> {
  let mut files = Exporter::new(&config.output_dir).list_files();
  files.sort();

  println!("Found {} labeled data files", files.len());
  for path in files {
    println!("{}", path.display());
  }
  Ok(())
}

pub fn merge_files(config: &Config, name: Option<&str>) -> Result<()> {
  let Some(report) = Exporter::new(&config.output_dir).merge_all(name)? else {
    console::warn("No labeled data files found. Please label some data first.");
    return Ok(());
  };

  for path in &report.skipped {
    console::warn(&format!("Skipped unreadable file {}", path.display()));
  }
  println!(
    "{} Merged {} labeled items from {} files into {}",
    "✓".green(),
    report.records,
    report.files,
    report.path.display()
  );
  Ok(())
}

pub fn export_csv(config: &Config, name: Option<&str>) -> Result<()> {
  let Some(report) = Exporter::new(&config.output_dir).export_flattened(name)? else {
    console::warn("No labeled data files found. Please label some data first.");
    return Ok(());
  };

  for path in &report.merge.skipped {
    console::warn(&format!("Skipped unreadable file {}", path.display()));
  }
  println!(
    "{} Exported {} rows ({} columns) to {}",
    "✓".green(),
    report.rows,
    report.columns.len(),
    report.path.display()
  );
  Ok(())
}
