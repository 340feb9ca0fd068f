//! Labeler - Rubric Labeling Store for Model Answers
//!
//! Annotators score GPT, Gemini and Llama answers to StackOverflow questions,
//! with and without the question image. Each annotator's judgments persist
//! as one JSON file per dataset and can later be merged and flattened into a
//! single CSV export.

pub mod commands;
pub mod config;
pub mod console;
pub mod dataset;
pub mod error;
pub mod export;
pub mod preview;
pub mod record;
pub mod session;
pub mod store;

pub use config::Config;
pub use dataset::{DatasetLoader, Question};
pub use error::{LabelError, Result};
pub use export::{ExportReport, Exporter, FlatTable, MergeReport};
pub use record::{Dataset, EvaluationKey, EvaluationRecord, ImageCondition, Model, ModelEvaluation, PostId};
pub use session::LabelingSession;
pub use store::RecordStore;
