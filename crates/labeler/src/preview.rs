//! Plain-text summary of a record, shown before submitting

use std::fmt::Write;

use crate::record::{EvaluationKey, EvaluationRecord, ImageCondition, Model, ModelEvaluation};

pub fn render_preview(record: &EvaluationRecord) -> String {
  let mut out = String::new();

  for model in Model::ALL {
    let _ = writeln!(out, "== {model} Evaluation ==");
    for condition in ImageCondition::ALL {
      let heading = match condition {
        ImageCondition::WithImage => "With Image",
        ImageCondition::WithoutImage => "Without Image",
      };
      let _ = writeln!(out, "### {model} {heading} Evaluation");

      match record.evaluation(EvaluationKey::new(model, condition)) {
        Some(evaluation) => render_evaluation(&mut out, evaluation),
        None => out.push_str("No evaluation provided yet\n"),
      }
    }
    out.push('\n');
  }

  if let Some(text) = &record.related_text {
    out.push_str("== Image Text Extraction ==\n");
    if text.is_empty() {
      out.push_str("Extracted Text: (No relevant text in the image)\n");
    } else {
      let _ = writeln!(out, "Extracted Text: {text}");
    }
  }

  out
}

fn render_evaluation(out: &mut String, evaluation: &ModelEvaluation) {
  let correctness = &evaluation.correctness;
  let _ = writeln!(out, "Correctness: {}", if correctness.is_correct { "Correct" } else { "Incorrect" });
  if !correctness.is_correct {
    let _ = writeln!(out, "- Issues: {}", correctness.issues.join(", "));

    let code = &evaluation.code_issues;
    if code.has_issues {
      let _ = writeln!(out, "- Code Issues: {}", code.types.join(", "));
      if code.has_non_functional() {
        let _ = writeln!(out, "  - Non-Functional Types: {}", code.non_functional_types.join(", "));
      }
    }
  }

  let consistency = &evaluation.consistency;
  let _ = writeln!(
    out,
    "Consistency: {}",
    if consistency.is_consistent { "Consistent" } else { "Inconsistent" }
  );
  if !consistency.is_consistent {
    let _ = writeln!(out, "- Issues: {}", consistency.issues.join(", "));
  }

  let _ = writeln!(
    out,
    "Comprehensiveness: {}",
    if evaluation.is_comprehensive { "Comprehensive" } else { "Not Comprehensive" }
  );

  let conciseness = &evaluation.conciseness;
  let _ = writeln!(out, "Conciseness: {}", if conciseness.is_concise { "Concise" } else { "Not Concise" });
  if !conciseness.is_concise {
    let _ = writeln!(out, "- Issues: {}", conciseness.issues.join(", "));
  }

  let _ = writeln!(out, "Usefulness Rating: {}/5", evaluation.usefulness_rating);

  if !evaluation.notes.is_empty() {
    let _ = writeln!(out, "Notes: {}", evaluation.notes);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::record::{CodeIssues, Dataset};

  #[test]
  fn test_preview_of_default_record() {
    let record = EvaluationRecord::create_default(1i64, Dataset::FaizFj);
    let preview = render_preview(&record);

    assert_eq!(preview.matches("Correctness: Correct").count(), 6);
    assert_eq!(preview.matches("Usefulness Rating: 3/5").count(), 6);
    assert!(preview.contains("(No relevant text in the image)"));
    assert!(!preview.contains("No evaluation provided yet"));
  }

  #[test]
  fn test_preview_lists_issues_and_gaps() {
    let mut record = EvaluationRecord::create_default(1i64, Dataset::FjOnly);
    let key = EvaluationKey::new(Model::Gemini, ImageCondition::WithImage);
    let evaluation = record.evaluation_mut(key);
    evaluation.correctness.is_correct = false;
    evaluation.correctness.issues = vec!["Wrong API".to_string()];
    evaluation.code_issues.has_issues = true;
    evaluation.code_issues.types = vec![CodeIssues::NON_FUNCTIONAL.to_string()];
    evaluation.code_issues.non_functional_types = vec!["Performance".to_string()];
    evaluation.notes = "Misreads the stack trace".to_string();
    record.model_evaluations.remove(&EvaluationKey::new(Model::Llama, ImageCondition::WithoutImage));

    let preview = render_preview(&record);
    assert!(preview.contains("Correctness: Incorrect"));
    assert!(preview.contains("- Issues: Wrong API"));
    assert!(preview.contains("  - Non-Functional Types: Performance"));
    assert!(preview.contains("Notes: Misreads the stack trace"));
    assert_eq!(preview.matches("No evaluation provided yet").count(), 1);
    assert!(!preview.contains("Image Text Extraction"));
  }
}
