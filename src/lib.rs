//! # quiz2qti
//!
//! Client-side workflow for turning quiz content into a downloadable QTI
//! package with the help of a remote conversion service.
//!
//! ## Why this crate?
//!
//! The conversion service does the parsing and packaging. What is left on the
//! client is a small but racy workflow: two mutually exclusive inputs, a
//! progress indicator that runs on a timer, a preview request that must fire
//! exactly once per run, a review step and an export that must reuse the
//! input that was previewed. This crate models it as one explicit state
//! machine so a stale timer or a late response can never corrupt a newer run.
//!
//! ## Workflow Overview
//!
//! ```text
//! InputSource (text | file)
//!  │ validate → InputSnapshot
//!  ├─ 1. Engine   idle → processing, progress 0 → 100 on a timer
//!  ├─ 2. Preview  POST /preview once at 100 → questions
//!  ├─ 3. Review   PreviewStore: questions + dialog flag
//!  └─ 4. Export   POST /download with the same snapshot → quiz_package.zip
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quiz2qti::{ExportType, Workflow, WorkflowConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WorkflowConfig::builder()
//!         .server_url("http://127.0.0.1:5000")
//!         .output_dir("exports")
//!         .build()?;
//!     let mut workflow = Workflow::new(config)?;
//!
//!     workflow.set_text("What is 2+2?\nA) 3\nB) 4\nAnswer: B");
//!     let count = workflow.convert(ExportType::Qti).await?;
//!     eprintln!("{count} questions previewed");
//!
//!     if let Some(saved) = workflow.finalize().await? {
//!         eprintln!("saved {}", saved.path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `quiz2qti` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod input;
pub mod preview;
pub mod progress;
pub mod timer;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{HttpConversionClient, InstructionsDocument, RemoteConversionClient};
pub use config::{ExportType, WorkflowConfig, WorkflowConfigBuilder};
pub use engine::{ConversionEngine, ConversionStatus, EngineEffect, EngineEvent};
pub use error::QuizError;
pub use export::{ExportController, SavedPackage};
pub use input::{InputMode, InputSnapshot, InputSource, SelectedFile};
pub use preview::{
    render_item, render_preview, AnswerDisplay, AnswerOption, PreviewAnswer, PreviewItem,
    PreviewQuestion, PreviewStore,
};
pub use progress::{CallbackRef, NoopCallback, WorkflowCallback};
pub use workflow::Workflow;
