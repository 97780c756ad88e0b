//! Integration tests for the conversion workflow.
//!
//! These drive a real `Workflow` (real timer task, real channel) against an
//! in-memory conversion service, so they need no network. Ticks run every
//! millisecond to keep episodes short.
//!
//! Run with:
//!   cargo test --test workflow -- --nocapture

use async_trait::async_trait;
use quiz2qti::{
    AnswerDisplay, ConversionStatus, ExportType, InputSnapshot, InstructionsDocument,
    PreviewQuestion, QuizError, RemoteConversionClient, SelectedFile, Workflow, WorkflowCallback,
    WorkflowConfig,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use tracing_subscriber::EnvFilter;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// In-memory stand-in for the conversion service.
#[derive(Default)]
struct FakeService {
    questions: Vec<PreviewQuestion>,
    preview_delay: Duration,
    fail_preview: bool,
    fail_download: bool,
    preview_calls: AtomicUsize,
    download_calls: AtomicUsize,
    seen: Mutex<Vec<(&'static str, InputSnapshot)>>,
}

impl FakeService {
    fn with_questions(questions: Vec<PreviewQuestion>) -> Self {
        Self {
            questions,
            ..Default::default()
        }
    }

    fn previews(&self) -> usize {
        self.preview_calls.load(Ordering::SeqCst)
    }

    fn downloads(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    fn seen(&self) -> Vec<(&'static str, InputSnapshot)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteConversionClient for FakeService {
    async fn preview(&self, input: &InputSnapshot) -> Result<Vec<PreviewQuestion>, QuizError> {
        self.preview_calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(("preview", input.clone()));
        if !self.preview_delay.is_zero() {
            tokio::time::sleep(self.preview_delay).await;
        }
        if self.fail_preview {
            return Err(QuizError::Request {
                endpoint: "/preview".into(),
                reason: "HTTP 500 Internal Server Error".into(),
            });
        }
        Ok(self.questions.clone())
    }

    async fn download(
        &self,
        input: &InputSnapshot,
        _export_type: ExportType,
    ) -> Result<Vec<u8>, QuizError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(("download", input.clone()));
        if self.fail_download {
            return Err(QuizError::Request {
                endpoint: "/download".into(),
                reason: "HTTP 502 Bad Gateway".into(),
            });
        }
        Ok(b"PK\x03\x04fake-zip".to_vec())
    }

    async fn fetch_instructions(&self) -> Result<InstructionsDocument, QuizError> {
        Ok(InstructionsDocument {
            file_name: "formatting_instructions.txt".into(),
            bytes: b"MC: A) B) C)".to_vec(),
        })
    }

    async fn ping(&self) -> Result<String, QuizError> {
        Ok("Quiz converter API is running".into())
    }
}

/// Records callback events in order.
#[derive(Default)]
struct Recorder {
    progress: Mutex<Vec<(u64, u8)>>,
    statuses: Mutex<Vec<(ConversionStatus, ConversionStatus)>>,
    errors: Mutex<Vec<String>>,
    previews: AtomicUsize,
    saved: Mutex<Vec<PathBuf>>,
}

impl WorkflowCallback for Recorder {
    fn on_progress(&self, episode: u64, progress: u8) {
        self.progress.lock().unwrap().push((episode, progress));
    }

    fn on_status_change(&self, from: ConversionStatus, to: ConversionStatus) {
        self.statuses.lock().unwrap().push((from, to));
    }

    fn on_preview_ready(&self, _episode: u64, _question_count: usize) {
        self.previews.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn on_package_saved(&self, path: &Path, _size_bytes: usize) {
        self.saved.lock().unwrap().push(path.to_path_buf());
    }
}

fn two_plus_two() -> Vec<PreviewQuestion> {
    serde_json::from_value(json!([{
        "id": 1,
        "type": "multiple_choice",
        "question_text": "What is 2+2?",
        "points": 1,
        "answers": [{"id": 1, "text": "3"}, {"id": 2, "text": "4"}],
        "correct_answer_id": 2
    }]))
    .unwrap()
}

fn config(dir: &Path) -> WorkflowConfig {
    WorkflowConfig::builder()
        .tick_interval_ms(1)
        .request_timeout_secs(5)
        .output_dir(dir)
        .build()
        .unwrap()
}

/// Route library logs to the test harness. Set `RUST_LOG=quiz2qti=debug`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn workflow(service: &Arc<FakeService>, dir: &Path) -> Workflow {
    init_tracing();
    Workflow::with_client(config(dir), Arc::clone(service) as Arc<dyn RemoteConversionClient>)
}

// ── Conversion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn text_conversion_opens_preview() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(FakeService::with_questions(two_plus_two()));
    let mut wf = workflow(&service, dir.path());

    wf.set_text("What is 2+2?\nA) 3\nB) 4\nAnswer: B");
    let count = wf.convert(ExportType::Qti).await.unwrap();

    assert_eq!(count, 1);
    assert_eq!(wf.status(), ConversionStatus::Complete);
    assert_eq!(wf.progress(), 100);
    assert!(wf.preview().is_visible());
    assert_eq!(service.previews(), 1);
    assert!(!wf.timer_running());
    assert!(!wf.request_in_flight());

    let item = &wf.preview().items()[0];
    assert_eq!(item.text, "What is 2+2?");
    match item.answers.as_ref().unwrap() {
        AnswerDisplay::MultipleChoice { options } => {
            assert_eq!(options.len(), 2);
            assert!(!options[0].correct);
            assert!(options[1].correct);
            assert_eq!(options[1].text, "4");
        }
        other => panic!("expected multiple choice, got {other:?}"),
    }
}

#[tokio::test]
async fn file_conversion_sends_file_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(FakeService::with_questions(two_plus_two()));
    let mut wf = workflow(&service, dir.path());

    let file = SelectedFile::from_bytes("week3.docx", b"docx bytes".to_vec());
    wf.set_file(Some(file.clone()));
    wf.convert(ExportType::Qti).await.unwrap();

    assert_eq!(service.seen(), vec![("preview", InputSnapshot::File(file))]);
}

#[tokio::test]
async fn both_inputs_fail_without_request() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(FakeService::with_questions(two_plus_two()));
    let mut wf = workflow(&service, dir.path());

    wf.set_text("What is 2+2?");
    wf.set_file(Some(SelectedFile::from_bytes("q.pdf", b"%PDF".to_vec())));
    assert!(wf.can_convert());

    let err = wf.start_convert(ExportType::Qti).unwrap_err();
    assert!(matches!(err, QuizError::Validation));
    assert_eq!(
        err.to_string(),
        "Please provide either quiz content or a file, not both."
    );
    assert_eq!(wf.status(), ConversionStatus::Error);
    assert!(!wf.timer_running());

    // Nothing queued, nothing sent.
    assert!(!wf.process_next().await);
    assert_eq!(service.previews(), 0);
}

#[tokio::test]
async fn empty_input_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(FakeService::default());
    let mut wf = workflow(&service, dir.path());

    wf.set_text("   \n");
    assert!(!wf.can_convert());
    let err = wf.start_convert(ExportType::Qti).unwrap_err();
    assert!(matches!(err, QuizError::EmptyInput));
    assert_eq!(wf.status(), ConversionStatus::Idle);
    assert_eq!(wf.episode(), 0);
    assert_eq!(service.previews(), 0);
}

#[tokio::test]
async fn preview_failure_freezes_progress() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(FakeService {
        fail_preview: true,
        ..Default::default()
    });
    let mut wf = workflow(&service, dir.path());

    wf.set_text("What is 2+2?");
    let err = wf.convert(ExportType::Qti).await.unwrap_err();

    assert!(err.is_request_error());
    assert_eq!(wf.status(), ConversionStatus::Error);
    assert_eq!(wf.progress(), 100);
    assert!(!wf.preview().is_visible());
    assert!(wf.preview().is_empty());
    assert!(wf.last_error().unwrap().contains("/preview"));
    assert!(!wf.show_preview());
}

#[tokio::test]
async fn preview_timeout_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(FakeService {
        questions: two_plus_two(),
        preview_delay: Duration::from_secs(30),
        ..Default::default()
    });
    let config = WorkflowConfig::builder()
        .tick_interval_ms(1)
        .request_timeout_secs(1)
        .output_dir(dir.path())
        .build()
        .unwrap();
    let mut wf = Workflow::with_client(config, Arc::clone(&service) as Arc<dyn RemoteConversionClient>);

    wf.set_text("What is 2+2?");
    let err = wf.convert(ExportType::Qti).await.unwrap_err();
    assert!(matches!(err, QuizError::Timeout { secs: 1, .. }));
    assert_eq!(wf.status(), ConversionStatus::Error);
}

#[tokio::test]
async fn new_convert_supersedes_running_episode() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(FakeService::with_questions(two_plus_two()));
    let mut wf = workflow(&service, dir.path());

    wf.set_text("first quiz");
    wf.start_convert(ExportType::Qti).unwrap();
    assert!(wf.process_next().await);
    let first = wf.episode();

    wf.set_text("second quiz");
    wf.start_convert(ExportType::Qti).unwrap();
    assert_eq!(wf.progress(), 0);
    assert_eq!(wf.settle().await, ConversionStatus::Complete);

    assert!(wf.episode() > first);
    assert_eq!(service.previews(), 1);
    assert_eq!(
        service.seen(),
        vec![("preview", InputSnapshot::Text("second quiz".into()))]
    );
}

#[tokio::test]
async fn convert_after_error_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(FakeService::with_questions(two_plus_two()));
    let mut wf = workflow(&service, dir.path());

    wf.set_text("What is 2+2?");
    wf.set_file(Some(SelectedFile::from_bytes("q.pdf", b"%PDF".to_vec())));
    assert!(wf.start_convert(ExportType::Qti).is_err());

    wf.set_file(None);
    assert_eq!(wf.convert(ExportType::Qti).await.unwrap(), 1);
    assert_eq!(wf.status(), ConversionStatus::Complete);
}

#[tokio::test]
async fn shutdown_cancels_in_flight_request() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(FakeService {
        questions: two_plus_two(),
        preview_delay: Duration::from_secs(30),
        ..Default::default()
    });
    let mut wf = workflow(&service, dir.path());

    wf.set_text("What is 2+2?");
    wf.start_convert(ExportType::Qti).unwrap();
    while !wf.request_in_flight() {
        assert!(wf.process_next().await);
    }

    wf.shutdown();
    assert_eq!(wf.status(), ConversionStatus::Error);
    assert!(!wf.request_in_flight());
    assert!(!wf.timer_running());
    assert!(wf.last_error().unwrap().contains("cancelled"));
    assert!(!wf.process_next().await);
}

// ── Callbacks ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn callback_sees_monotonic_progress() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(FakeService::with_questions(two_plus_two()));
    let recorder = Arc::new(Recorder::default());
    let config = WorkflowConfig::builder()
        .tick_interval_ms(1)
        .output_dir(dir.path())
        .callback(Arc::clone(&recorder) as Arc<dyn WorkflowCallback>)
        .build()
        .unwrap();
    let mut wf = Workflow::with_client(config, Arc::clone(&service) as Arc<dyn RemoteConversionClient>);

    wf.set_text("What is 2+2?");
    wf.convert(ExportType::Qti).await.unwrap();
    wf.finalize().await.unwrap();

    let progress: Vec<u8> = recorder.progress.lock().unwrap().iter().map(|p| p.1).collect();
    assert_eq!(progress.first(), Some(&0));
    assert_eq!(progress.last(), Some(&100));
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(
        progress,
        vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100]
    );

    assert_eq!(
        *recorder.statuses.lock().unwrap(),
        vec![
            (ConversionStatus::Idle, ConversionStatus::Processing),
            (ConversionStatus::Processing, ConversionStatus::Complete),
        ]
    );
    assert_eq!(recorder.previews.load(Ordering::SeqCst), 1);
    assert!(recorder.errors.lock().unwrap().is_empty());
    assert_eq!(
        *recorder.saved.lock().unwrap(),
        vec![dir.path().join("quiz_package.zip")]
    );
}

// ── Export ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn finalize_downloads_the_previewed_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(FakeService::with_questions(two_plus_two()));
    let mut wf = workflow(&service, dir.path());

    wf.set_text("What is 2+2?");
    wf.convert(ExportType::Qti).await.unwrap();

    // Edits after the preview do not leak into the export.
    wf.set_text("something else");

    let saved = assert_ok!(wf.finalize().await).unwrap();
    assert_eq!(saved.path, dir.path().join("quiz_package.zip"));
    assert_eq!(std::fs::read(&saved.path).unwrap(), b"PK\x03\x04fake-zip");
    assert!(!wf.preview().is_visible());
    assert_eq!(service.downloads(), 1);
    assert_eq!(
        service.seen(),
        vec![
            ("preview", InputSnapshot::Text("What is 2+2?".into())),
            ("download", InputSnapshot::Text("What is 2+2?".into())),
        ]
    );
}

#[tokio::test]
async fn canvas_export_downloads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(FakeService::with_questions(two_plus_two()));
    let mut wf = workflow(&service, dir.path());

    wf.set_text("What is 2+2?");
    wf.convert(ExportType::Canvas).await.unwrap();
    assert_eq!(wf.export_type(), ExportType::Canvas);

    assert!(wf.finalize().await.unwrap().is_none());
    assert!(!wf.preview().is_visible());
    assert_eq!(service.downloads(), 0);
    assert!(!dir.path().join("quiz_package.zip").exists());
}

#[tokio::test]
async fn finalize_without_preview_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(FakeService::default());
    let mut wf = workflow(&service, dir.path());

    let err = assert_err!(wf.finalize().await);
    assert!(matches!(err, QuizError::NothingToExport));
    assert_eq!(service.downloads(), 0);
}

#[tokio::test]
async fn export_failure_keeps_questions() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(FakeService {
        questions: two_plus_two(),
        fail_download: true,
        ..Default::default()
    });
    let mut wf = workflow(&service, dir.path());

    wf.set_text("What is 2+2?");
    wf.convert(ExportType::Qti).await.unwrap();
    let err = wf.finalize().await.unwrap_err();

    assert!(err.is_request_error());
    assert_eq!(wf.status(), ConversionStatus::Error);
    assert_eq!(wf.preview().len(), 1);
    assert!(!dir.path().join("quiz_package.zip").exists());
}

#[tokio::test]
async fn reopen_preview_after_closing() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(FakeService::with_questions(two_plus_two()));
    let mut wf = workflow(&service, dir.path());

    assert!(!wf.show_preview());
    wf.set_text("What is 2+2?");
    wf.convert(ExportType::Qti).await.unwrap();

    wf.hide_preview();
    assert!(!wf.preview().is_visible());
    assert!(wf.show_preview());
    assert!(wf.preview().is_visible());
}
