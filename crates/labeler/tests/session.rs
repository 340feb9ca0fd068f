use labeler::record::{EvaluationKey, ImageCondition, Model};
use labeler::{Dataset, DatasetLoader, LabelError, LabelingSession, PostId, RecordStore};
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod session_tests {
  use super::*;

  fn setup() -> (TempDir, DatasetLoader, RecordStore) {
    let temp = TempDir::new().unwrap();
    fs::write(
      temp.path().join("Faiz_FJ.json"),
      r#"[{ "post_id": 1, "title": "First" }, { "post_id": 2, "title": "Second" }]"#,
    )
    .unwrap();
    let loader = DatasetLoader::new(temp.path());
    let store = RecordStore::new(temp.path().join("labeled_data"));
    (temp, loader, store)
  }

  #[test]
  fn test_label_a_whole_dataset() {
    let (_temp, loader, store) = setup();
    let questions = loader.load(Dataset::FaizFj);
    let mut session = LabelingSession::new("alice", Dataset::FaizFj, questions.len());

    for _ in 0..questions.len() {
      let question = session.current_post(&questions).cloned().unwrap();
      let draft = session.draft_mut(&question.post_id);
      draft.set_related_text("int *p = NULL;");
      draft.evaluation_mut(EvaluationKey::new(Model::Gemini, ImageCondition::WithImage)).set_usefulness(4).unwrap();

      session.submit(&store, &question.post_id, Some(question.title.clone())).unwrap();
    }
    assert_eq!(session.current_index(), 1);

    let ids: Vec<PostId> = questions.iter().map(|q| q.post_id.clone()).collect();
    assert_eq!(store.count_labeled(ids.iter(), "alice", Dataset::FaizFj), 2);

    let second = store.find(&PostId::Number(2), "alice", Dataset::FaizFj).unwrap();
    assert_eq!(second.title.as_deref(), Some("Second"));
    assert_eq!(second.related_text.as_deref(), Some("int *p = NULL;"));
  }

  #[test]
  fn test_incomplete_submit_leaves_store_untouched() {
    let (_temp, _loader, store) = setup();
    let mut session = LabelingSession::new("alice", Dataset::FaizFj, 2);
    let post = PostId::Number(1);

    session.draft_mut(&post).model_evaluations.clear();
    let err = session.submit(&store, &post, None).unwrap_err();

    match err {
      LabelError::Incomplete { missing, .. } => assert_eq!(missing.len(), 6),
      other => panic!("unexpected error: {other}"),
    }
    assert!(!store.is_labeled(&post, "alice", Dataset::FaizFj));
  }

  #[test]
  fn test_reopening_a_labeled_post_starts_from_saved_values() {
    let (_temp, _loader, store) = setup();
    let key = EvaluationKey::new(Model::Gpt, ImageCondition::WithoutImage);
    let post = PostId::Number(2);

    let mut first = LabelingSession::new("alice", Dataset::FaizFj, 2);
    first.draft_mut(&post).evaluation_mut(key).notes = "Off by one".to_string();
    first.submit(&store, &post, None).unwrap();

    let mut second = LabelingSession::new("alice", Dataset::FaizFj, 2);
    assert_eq!(second.open(&store, &post).evaluation(key).unwrap().notes, "Off by one");

    let mut other_annotator = LabelingSession::new("bob", Dataset::FaizFj, 2);
    assert_eq!(other_annotator.open(&store, &post).evaluation(key).unwrap().notes, "");
  }
}
