//! Evaluation record data model
//!
//! One [`EvaluationRecord`] holds a single annotator's judgment of one post:
//! six rubric scorings (three models, each with and without the question
//! image) plus the image-text extraction for the `Faiz_FJ` dataset.

use chrono::Local;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{LabelError, Result};

/// Post identifier as it appears in the source dataset.
///
/// Integer and string ids never compare equal, so `1` and `"1"` are
/// different posts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostId {
  Number(i64),
  Text(String),
}

impl PostId {
  /// Interpret command-line style input: integers become numeric ids
  pub fn parse(raw: &str) -> Self {
    raw.trim().parse::<i64>().map(PostId::Number).unwrap_or_else(|_| PostId::Text(raw.to_string()))
  }

  /// The same id in the other representation, if it has one: `7` and `"7"`
  pub fn alternate(&self) -> Option<PostId> {
    match self {
      PostId::Number(n) => Some(PostId::Text(n.to_string())),
      PostId::Text(s) => s.parse::<i64>().ok().map(PostId::Number),
    }
  }
}

impl fmt::Display for PostId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PostId::Number(n) => write!(f, "{n}"),
      PostId::Text(s) => write!(f, "{s}"),
    }
  }
}

impl From<i64> for PostId {
  fn from(value: i64) -> Self {
    PostId::Number(value)
  }
}

impl From<&str> for PostId {
  fn from(value: &str) -> Self {
    PostId::Text(value.to_string())
  }
}

impl From<String> for PostId {
  fn from(value: String) -> Self {
    PostId::Text(value)
  }
}

/// Source dataset a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dataset {
  #[serde(rename = "Faiz_FJ")]
  FaizFj,
  #[serde(rename = "FJ_only")]
  FjOnly,
}

impl Dataset {
  pub const ALL: [Dataset; 2] = [Dataset::FaizFj, Dataset::FjOnly];

  pub fn as_str(&self) -> &'static str {
    match self {
      Dataset::FaizFj => "Faiz_FJ",
      Dataset::FjOnly => "FJ_only",
    }
  }

  /// Only `Faiz_FJ` posts carry an image-text extraction
  pub fn requires_related_text(&self) -> bool {
    matches!(self, Dataset::FaizFj)
  }
}

impl fmt::Display for Dataset {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Dataset {
  type Err = LabelError;

  fn from_str(s: &str) -> Result<Self> {
    Dataset::ALL
      .into_iter()
      .find(|dataset| dataset.as_str() == s)
      .ok_or_else(|| LabelError::unknown_dataset(s))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Model {
  Gpt,
  Gemini,
  Llama,
}

impl Model {
  pub const ALL: [Model; 3] = [Model::Gpt, Model::Gemini, Model::Llama];

  pub fn as_str(&self) -> &'static str {
    match self {
      Model::Gpt => "GPT",
      Model::Gemini => "Gemini",
      Model::Llama => "Llama",
    }
  }
}

impl fmt::Display for Model {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Whether the evaluated answer was generated with access to the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImageCondition {
  WithImage,
  WithoutImage,
}

impl ImageCondition {
  pub const ALL: [ImageCondition; 2] = [ImageCondition::WithImage, ImageCondition::WithoutImage];

  pub fn as_str(&self) -> &'static str {
    match self {
      ImageCondition::WithImage => "with_image",
      ImageCondition::WithoutImage => "without_image",
    }
  }
}

impl fmt::Display for ImageCondition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Composite (model, image condition) key of a rubric scoring.
///
/// Serialized as `"{Model}_{with|without}_image"`, e.g. `GPT_with_image`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EvaluationKey {
  pub model: Model,
  pub condition: ImageCondition,
}

impl EvaluationKey {
  pub const ALL: [EvaluationKey; 6] = [
    EvaluationKey::new(Model::Gpt, ImageCondition::WithImage),
    EvaluationKey::new(Model::Gpt, ImageCondition::WithoutImage),
    EvaluationKey::new(Model::Gemini, ImageCondition::WithImage),
    EvaluationKey::new(Model::Gemini, ImageCondition::WithoutImage),
    EvaluationKey::new(Model::Llama, ImageCondition::WithImage),
    EvaluationKey::new(Model::Llama, ImageCondition::WithoutImage),
  ];

  pub const fn new(model: Model, condition: ImageCondition) -> Self {
    Self { model, condition }
  }

  /// Top-level field name used by the flat legacy record layout
  pub fn legacy_field(&self) -> String {
    format!("{self}_evaluation")
  }

  /// Field name of the model answer in a dataset question
  pub fn response_field(&self) -> String {
    format!("{self}_response")
  }
}

impl fmt::Display for EvaluationKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}_{}", self.model, self.condition)
  }
}

impl FromStr for EvaluationKey {
  type Err = LabelError;

  fn from_str(s: &str) -> Result<Self> {
    EvaluationKey::ALL
      .into_iter()
      .find(|key| key.to_string() == s)
      .ok_or_else(|| LabelError::unknown_evaluation_key(s))
  }
}

impl Serialize for EvaluationKey {
  fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for EvaluationKey {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(de::Error::custom)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Correctness {
  pub is_correct: bool,
  pub issues: Vec<String>,
}

impl Default for Correctness {
  fn default() -> Self {
    Self { is_correct: true, issues: Vec::new() }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Consistency {
  pub is_consistent: bool,
  pub issues: Vec<String>,
}

impl Default for Consistency {
  fn default() -> Self {
    Self { is_consistent: true, issues: Vec::new() }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conciseness {
  pub is_concise: bool,
  pub issues: Vec<String>,
}

impl Default for Conciseness {
  fn default() -> Self {
    Self { is_concise: true, issues: Vec::new() }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeIssues {
  pub has_issues: bool,
  pub types: Vec<String>,
  pub non_functional_types: Vec<String>,
}

impl CodeIssues {
  pub const NON_FUNCTIONAL: &'static str = "Non-Functional";

  pub fn has_non_functional(&self) -> bool {
    self.types.iter().any(|t| t == Self::NON_FUNCTIONAL)
  }

  /// Drop non-functional subtypes unless "Non-Functional" is selected
  pub fn normalize(&mut self) {
    if !self.has_non_functional() {
      self.non_functional_types.clear();
    }
  }
}

/// One rubric scoring of one model answer under one image condition.
///
/// Defaults mean "no issue found", not "unanswered".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelEvaluation {
  pub correctness: Correctness,
  pub consistency: Consistency,
  pub is_comprehensive: bool,
  pub conciseness: Conciseness,
  pub usefulness_rating: u8,
  pub code_issues: CodeIssues,
  pub notes: String,
}

impl Default for ModelEvaluation {
  fn default() -> Self {
    Self {
      correctness: Correctness::default(),
      consistency: Consistency::default(),
      is_comprehensive: true,
      conciseness: Conciseness::default(),
      usefulness_rating: 3,
      code_issues: CodeIssues::default(),
      notes: String::new(),
    }
  }
}

impl ModelEvaluation {
  pub const MIN_RATING: u8 = 1;
  pub const MAX_RATING: u8 = 5;

  pub fn set_usefulness(&mut self, rating: u8) -> Result<()> {
    if !(Self::MIN_RATING..=Self::MAX_RATING).contains(&rating) {
      return Err(LabelError::InvalidRating { rating });
    }
    self.usefulness_rating = rating;
    Ok(())
  }
}

/// Current local time in the ISO-8601 form used for record timestamps
pub fn now_timestamp() -> String {
  Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// A single annotator's full judgment of one post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord")]
pub struct EvaluationRecord {
  pub post_id: PostId,
  pub timestamp: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub annotator: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub dataset: Option<Dataset>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  /// `Some("")` means "no relevant text", `None` means not yet evaluated
  #[serde(skip_serializing_if = "Option::is_none")]
  pub related_text: Option<String>,
  pub model_evaluations: BTreeMap<EvaluationKey, ModelEvaluation>,
  /// Fields this crate does not model, kept verbatim
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// Wire form accepted on read: canonical records and the flat legacy layout
#[derive(Deserialize)]
struct RawRecord {
  post_id: PostId,
  #[serde(default)]
  timestamp: String,
  #[serde(default)]
  annotator: Option<String>,
  #[serde(default)]
  dataset: Option<Dataset>,
  #[serde(default)]
  title: Option<String>,
  #[serde(default)]
  related_text: Option<String>,
  #[serde(default)]
  model_evaluations: BTreeMap<EvaluationKey, ModelEvaluation>,
  #[serde(flatten)]
  extra: Map<String, Value>,
}

impl TryFrom<RawRecord> for EvaluationRecord {
  type Error = serde_json::Error;

  fn try_from(raw: RawRecord) -> std::result::Result<Self, Self::Error> {
    let RawRecord {
      post_id,
      timestamp,
      annotator,
      dataset,
      title,
      related_text,
      mut model_evaluations,
      mut extra,
    } = raw;

    for key in EvaluationKey::ALL {
      if let Some(legacy) = extra.remove(&key.legacy_field()) {
        let evaluation: ModelEvaluation = serde_json::from_value(legacy)?;
        model_evaluations.entry(key).or_insert(evaluation);
      }
    }

    Ok(Self { post_id, timestamp, annotator, dataset, title, related_text, model_evaluations, extra })
  }
}

impl EvaluationRecord {
  /// Template record shown the first time a post is visited
  pub fn create_default(post_id: impl Into<PostId>, dataset: Dataset) -> Self {
    let model_evaluations =
      EvaluationKey::ALL.into_iter().map(|key| (key, ModelEvaluation::default())).collect();

    Self {
      post_id: post_id.into(),
      timestamp: now_timestamp(),
      annotator: None,
      dataset: None,
      title: None,
      related_text: dataset.requires_related_text().then(String::new),
      model_evaluations,
      extra: Map::new(),
    }
  }

  /// Everything still blocking submission, in display order
  pub fn missing_keys(&self, dataset: Dataset) -> Vec<String> {
    let mut missing: Vec<String> = EvaluationKey::ALL
      .into_iter()
      .filter(|key| !self.model_evaluations.contains_key(key))
      .map(|key| key.to_string())
      .collect();

    if dataset.requires_related_text() && self.related_text.is_none() {
      missing.push("related_text".to_string());
    }

    missing
  }

  /// Presence check only; the values inside the evaluations are not inspected
  pub fn is_complete(&self, dataset: Dataset) -> bool {
    self.missing_keys(dataset).is_empty()
  }

  pub fn evaluation(&self, key: EvaluationKey) -> Option<&ModelEvaluation> {
    self.model_evaluations.get(&key)
  }

  /// Mutable access, creating a default entry when absent
  pub fn evaluation_mut(&mut self, key: EvaluationKey) -> &mut ModelEvaluation {
    self.model_evaluations.entry(key).or_default()
  }

  pub fn set_related_text(&mut self, text: impl Into<String>) {
    self.related_text = Some(text.into());
  }

  /// Apply submit metadata
  pub fn stamp(&mut self, annotator: &str, dataset: Dataset, title: Option<String>) {
    self.annotator = Some(annotator.to_string());
    self.dataset = Some(dataset);
    if title.is_some() {
      self.title = title;
    }
    self.timestamp = now_timestamp();
  }

  pub fn normalize(&mut self) {
    for evaluation in self.model_evaluations.values_mut() {
      evaluation.code_issues.normalize();
    }
  }
}
