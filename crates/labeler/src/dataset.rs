//! Source question datasets
//!
//! Questions are read from `{data_dir}/{dataset}.json`. Model answer fields
//! arrive with inconsistent casing (`GPT_…`, `gpt_…`, `GEMINI_…`), so they
//! are normalized into [`Question::responses`] once, at load time.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::warn;

use crate::error::{LabelError, Result};
use crate::record::{Dataset, EvaluationKey, ImageCondition, Model, PostId};
use crate::store::read_json_values;

const RESPONSE_FIELD_PATTERN: &str = r"(?i)^(gpt|gemini|llama)_(with|without)_image_response$";

fn response_field_regex() -> &'static Regex {
  static REGEX: OnceLock<Regex> = OnceLock::new();
  REGEX.get_or_init(|| Regex::new(RESPONSE_FIELD_PATTERN).expect("response field pattern is valid"))
}

/// A StackOverflow question with the answers of every model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
  pub post_id: PostId,
  pub title: String,
  pub body: String,
  pub tags: Vec<String>,
  pub creation_date: String,
  pub score: i64,
  pub image_link: Option<String>,
  pub responses: BTreeMap<EvaluationKey, String>,
}

impl Question {
  pub fn response(&self, key: EvaluationKey) -> Option<&str> {
    self.responses.get(&key).map(String::as_str)
  }
}

#[derive(Deserialize)]
struct RawQuestion {
  post_id: PostId,
  #[serde(default)]
  title: Option<String>,
  #[serde(default)]
  body: Option<String>,
  #[serde(default)]
  tags: Option<Vec<String>>,
  #[serde(default)]
  creation_date: Option<Value>,
  #[serde(default)]
  score: Option<i64>,
  #[serde(default)]
  image_link: Option<String>,
  #[serde(flatten)]
  rest: Map<String, Value>,
}

impl From<RawQuestion> for Question {
  fn from(raw: RawQuestion) -> Self {
    let creation_date = match raw.creation_date {
      None | Some(Value::Null) => String::new(),
      Some(Value::String(s)) => s,
      Some(other) => other.to_string(),
    };

    Self {
      post_id: raw.post_id,
      title: raw.title.unwrap_or_default(),
      body: raw.body.unwrap_or_default(),
      tags: raw.tags.unwrap_or_default(),
      creation_date,
      score: raw.score.unwrap_or_default(),
      image_link: raw.image_link.filter(|link| !link.is_empty()),
      responses: normalize_responses(&raw.rest),
    }
  }
}

/// Map every casing variant of `{Model}_{with|without}_image_response` onto
/// its evaluation key. The exact-case field wins; otherwise the first
/// non-empty variant is kept.
fn normalize_responses(fields: &Map<String, Value>) -> BTreeMap<EvaluationKey, String> {
  let mut responses = BTreeMap::new();

  for (name, value) in fields {
    let Some(text) = value.as_str().filter(|text| !text.is_empty()) else {
      continue;
    };
    let Some(captures) = response_field_regex().captures(name) else {
      continue;
    };

    let model = match captures[1].to_ascii_lowercase().as_str() {
      "gpt" => Model::Gpt,
      "gemini" => Model::Gemini,
      _ => Model::Llama,
    };
    let condition = if captures[2].eq_ignore_ascii_case("with") {
      ImageCondition::WithImage
    } else {
      ImageCondition::WithoutImage
    };
    let key = EvaluationKey::new(model, condition);

    if *name == key.response_field() {
      responses.insert(key, text.to_string());
    } else {
      responses.entry(key).or_insert_with(|| text.to_string());
    }
  }

  responses
}

#[derive(Debug, Clone)]
pub struct DatasetLoader {
  data_dir: PathBuf,
}

impl DatasetLoader {
  pub fn new(data_dir: impl Into<PathBuf>) -> Self {
    Self { data_dir: data_dir.into() }
  }

  pub fn data_dir(&self) -> &Path {
    &self.data_dir
  }

  pub fn file_path(&self, dataset: Dataset) -> PathBuf {
    self.data_dir.join(format!("{dataset}.json"))
  }

  /// Strict load; entries that are not questions make the whole file fail
  pub fn try_load(&self, dataset: Dataset) -> Result<Vec<Question>> {
    let path = self.file_path(dataset);
    read_json_values(&path)?
      .into_iter()
      .map(|value| {
        serde_json::from_value::<RawQuestion>(value)
          .map(Question::from)
          .map_err(|e| LabelError::malformed(&path, e))
      })
      .collect()
  }

  /// Questions of a dataset, or an empty list when the file is missing or
  /// malformed
  pub fn load(&self, dataset: Dataset) -> Vec<Question> {
    self.try_load(dataset).unwrap_or_else(|err| {
      warn!(dataset = %dataset, error = %err, "unable to load dataset, using an empty one");
      Vec::new()
    })
  }

  pub fn find_question(&self, dataset: Dataset, post_id: &PostId) -> Option<Question> {
    self.load(dataset).into_iter().find(|question| &question.post_id == post_id)
  }

  /// The id of the question whose id reads as `raw`, in the dataset's own
  /// representation (`123` finds a question stored as `"123"`)
  pub fn matching_post_id(&self, dataset: Dataset, raw: &str) -> Option<PostId> {
    let raw = raw.trim();
    self.load(dataset).into_iter().map(|question| question.post_id).find(|post_id| post_id.to_string() == raw)
  }

  /// Command-line input as a post id: the dataset's id when a question
  /// matches, [`PostId::parse`] otherwise
  pub fn resolve_post_id(&self, dataset: Dataset, raw: &str) -> PostId {
    self.matching_post_id(dataset, raw).unwrap_or_else(|| PostId::parse(raw))
  }

  pub fn count(&self, dataset: Dataset) -> usize {
    self.load(dataset).len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn fields(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
  }

  #[test]
  fn test_response_fields_matched_case_insensitively() {
    let responses = normalize_responses(&fields(json!({
      "gpt_with_image_response": "lower",
      "GEMINI_without_image_response": "upper",
      "Llama_with_image_response": "exact",
      "Llama_with_image_summary": "ignored"
    })));

    assert_eq!(responses.len(), 3);
    assert_eq!(responses[&EvaluationKey::new(Model::Gpt, ImageCondition::WithImage)], "lower");
    assert_eq!(responses[&EvaluationKey::new(Model::Gemini, ImageCondition::WithoutImage)], "upper");
    assert_eq!(responses[&EvaluationKey::new(Model::Llama, ImageCondition::WithImage)], "exact");
  }

  #[test]
  fn test_exact_case_field_wins_and_empty_variants_skipped() {
    let responses = normalize_responses(&fields(json!({
      "gpt_without_image_response": "lowercase copy",
      "GPT_without_image_response": "canonical",
      "Gemini_with_image_response": ""
    })));

    let key = EvaluationKey::new(Model::Gpt, ImageCondition::WithoutImage);
    assert_eq!(responses[&key], "canonical");
    assert!(!responses.contains_key(&EvaluationKey::new(Model::Gemini, ImageCondition::WithImage)));
  }

  #[test]
  fn test_question_defaults_for_missing_fields() {
    let raw: RawQuestion = serde_json::from_value(json!({
      "post_id": 77,
      "title": null,
      "creation_date": 1700000000,
      "image_link": ""
    }))
    .unwrap();

    let question = Question::from(raw);
    assert_eq!(question.post_id, PostId::Number(77));
    assert_eq!(question.title, "");
    assert_eq!(question.creation_date, "1700000000");
    assert!(question.image_link.is_none());
    assert!(question.responses.is_empty());
  }
}
