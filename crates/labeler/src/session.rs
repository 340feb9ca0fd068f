use std::collections::HashMap;
use std::path::PathBuf;

use crate::dataset::Question;
use crate::error::{LabelError, Result};
use crate::record::{Dataset, EvaluationRecord, PostId};
use crate::store::RecordStore;

/// In-progress labeling state owned by the front end.
///
/// Nothing here is persisted; only [`LabelingSession::submit`] writes, and
/// it goes through the [`RecordStore`].
#[derive(Debug, Clone)]
pub struct LabelingSession {
  pub annotator: String,
  pub dataset: Dataset,
  current_index: usize,
  len: usize,
  drafts: HashMap<PostId, EvaluationRecord>,
}

impl LabelingSession {
  pub fn new(annotator: impl Into<String>, dataset: Dataset, len: usize) -> Self {
    Self { annotator: annotator.into(), dataset, current_index: 0, len, drafts: HashMap::new() }
  }

  pub fn current_index(&self) -> usize {
    self.current_index
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// The question under the cursor
  pub fn current_post<'a>(&self, questions: &'a [Question]) -> Option<&'a Question> {
    questions.get(self.current_index)
  }

  /// Advance the cursor; returns false at the last question
  pub fn next(&mut self) -> bool {
    if self.current_index + 1 < self.len {
      self.current_index += 1;
      true
    } else {
      false
    }
  }

  /// Step back; returns false at the first question
  pub fn previous(&mut self) -> bool {
    if self.current_index > 0 {
      self.current_index -= 1;
      true
    } else {
      false
    }
  }

  /// Jump to a question, clamped to the dataset bounds
  pub fn jump_to(&mut self, index: usize) -> usize {
    self.current_index = index.min(self.len.saturating_sub(1));
    self.current_index
  }

  /// Draft for a post, created with rubric defaults on first visit
  pub fn draft_mut(&mut self, post_id: &PostId) -> &mut EvaluationRecord {
    let dataset = self.dataset;
    self.drafts.entry(post_id.clone()).or_insert_with(|| EvaluationRecord::create_default(post_id.clone(), dataset))
  }

  /// Like [`draft_mut`](Self::draft_mut), but seeds a new draft from the
  /// stored record when the post was labeled before
  pub fn open(&mut self, store: &RecordStore, post_id: &PostId) -> &mut EvaluationRecord {
    let annotator = &self.annotator;
    let dataset = self.dataset;
    self.drafts.entry(post_id.clone()).or_insert_with(|| {
      store
        .find(post_id, annotator, dataset)
        .unwrap_or_else(|| EvaluationRecord::create_default(post_id.clone(), dataset))
    })
  }

  pub fn draft(&self, post_id: &PostId) -> Option<&EvaluationRecord> {
    self.drafts.get(post_id)
  }

  pub fn can_submit(&self, post_id: &PostId) -> bool {
    self.drafts.get(post_id).is_some_and(|draft| draft.is_complete(self.dataset))
  }

  /// Save the post's draft, drop it and move to the next question.
  ///
  /// Incomplete drafts are refused without touching storage.
  pub fn submit(&mut self, store: &RecordStore, post_id: &PostId, title: Option<String>) -> Result<PathBuf> {
    let mut record = self.draft_mut(post_id).clone();

    let missing = record.missing_keys(self.dataset);
    if !missing.is_empty() {
      return Err(LabelError::incomplete(post_id, missing));
    }

    record.stamp(&self.annotator, self.dataset, title);
    let path = store.save(&record, &self.annotator, self.dataset)?;

    self.drafts.remove(post_id);
    self.next();
    Ok(path)
  }
}
