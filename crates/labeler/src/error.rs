use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LabelError>;

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("I/O error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Malformed JSON in {path}: {source}")]
  Malformed {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("File not found: {path}")]
  NotFound { path: PathBuf },

  #[error("Failed to write CSV {path}: {source}")]
  Csv {
    path: PathBuf,
    #[source]
    source: csv::Error,
  },

  #[error("Failed to replace {path}: {source}")]
  Persist {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Evaluation for post {post_id} is incomplete, missing: {}", missing.join(", "))]
  Incomplete { post_id: String, missing: Vec<String> },

  #[error("Usefulness rating {rating} is outside 1..=5")]
  InvalidRating { rating: u8 },

  #[error("Unknown dataset '{name}' (expected Faiz_FJ or FJ_only)")]
  UnknownDataset { name: String },

  #[error("Unknown evaluation key '{key}'")]
  UnknownEvaluationKey { key: String },

  #[error("Invalid annotator '{name}': {reason}")]
  InvalidAnnotator { name: String, reason: String },

  #[error("Invalid output name '{name}': {reason}")]
  InvalidOutputName { name: String, reason: String },
}

impl LabelError {
  pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
    let path = path.as_ref().to_path_buf();
    if source.kind() == std::io::ErrorKind::NotFound {
      return Self::NotFound { path };
    }
    Self::Io { path, source }
  }

  pub fn malformed(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
    Self::Malformed { path: path.as_ref().to_path_buf(), source }
  }

  pub fn csv(path: impl AsRef<Path>, source: csv::Error) -> Self {
    Self::Csv { path: path.as_ref().to_path_buf(), source }
  }

  pub fn persist(path: impl AsRef<Path>, source: std::io::Error) -> Self {
    Self::Persist { path: path.as_ref().to_path_buf(), source }
  }

  pub fn incomplete(post_id: impl ToString, missing: Vec<String>) -> Self {
    Self::Incomplete { post_id: post_id.to_string(), missing }
  }

  pub fn unknown_dataset(name: impl Into<String>) -> Self {
    Self::UnknownDataset { name: name.into() }
  }

  pub fn unknown_evaluation_key(key: impl Into<String>) -> Self {
    Self::UnknownEvaluationKey { key: key.into() }
  }

  pub fn invalid_annotator(name: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::InvalidAnnotator { name: name.into(), reason: reason.into() }
  }

  pub fn invalid_output_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::InvalidOutputName { name: name.into(), reason: reason.into() }
  }

  /// True for the "source missing" half of the read taxonomy
  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound { .. })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_io_not_found_maps_to_not_found_variant() {
    let err = LabelError::io(
      "labeled_data/alice_FJ_only_labels.json",
      std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
    );
    assert!(err.is_not_found());
    assert!(err.to_string().contains("alice_FJ_only_labels.json"));
  }

  #[test]
  fn test_incomplete_lists_missing_keys() {
    let err = LabelError::incomplete(42, vec!["GPT_with_image".to_string(), "related_text".to_string()]);
    let message = err.to_string();
    assert!(message.contains("post 42"));
    assert!(message.contains("GPT_with_image, related_text"));
  }
}
