//! The top-level controller: input → episode → review → export.
//!
//! [`Workflow`] owns the [`InputSource`], the [`ConversionEngine`], the
//! [`PreviewStore`] and the [`ExportController`], and carries out the effects
//! the engine asks for. All engine input arrives through one channel. Timer
//! ticks and preview results are events on that channel, applied one at a
//! time by whichever task drives the workflow. Nothing mutates the state
//! behind the engine's back.
//!
//! ## Lifecycle of one conversion
//!
//! ```text
//! start_convert ──▶ Convert event ──▶ StartTimer ──▶ Tick … Tick(100)
//!                                                        │
//!                              FetchPreview ◀────────────┘
//!                                   │ (spawned, timeout + cancellation)
//!                  PreviewLoaded / PreviewFailed ──▶ complete / error
//! ```
//!
//! The timer and the in-flight request are held as scoped handles. Replacing
//! or dropping them cancels the underlying task, so a new episode, an error,
//! [`Workflow::shutdown`] or dropping the workflow all release them.

use crate::client::{HttpConversionClient, RemoteConversionClient, PREVIEW_ENDPOINT};
use crate::config::{ExportType, WorkflowConfig};
use crate::engine::{ConversionEngine, ConversionStatus, EngineEffect, EngineEvent};
use crate::error::QuizError;
use crate::export::{ExportController, SavedPackage};
use crate::input::{InputSnapshot, InputSource, SelectedFile};
use crate::preview::PreviewStore;
use crate::progress::{CallbackRef, NoopCallback};
use crate::timer::ProgressTimer;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info};

/// A preview request running in the background. Cancelled on drop.
struct InFlightPreview {
    episode: u64,
    _handle: JoinHandle<()>,
    _guard: DropGuard,
}

/// Client-side conversion workflow.
///
/// Must be used inside a Tokio runtime; a current-thread runtime is enough.
pub struct Workflow {
    config: WorkflowConfig,
    client: Arc<dyn RemoteConversionClient>,
    callback: CallbackRef,
    input: InputSource,
    engine: ConversionEngine,
    store: PreviewStore,
    exporter: ExportController,
    events_tx: UnboundedSender<EngineEvent>,
    events_rx: UnboundedReceiver<EngineEvent>,
    timer: Option<ProgressTimer>,
    request: Option<InFlightPreview>,
    last_failure: Option<QuizError>,
}

impl Workflow {
    /// Create a workflow talking to the service at `config.server_url`.
    pub fn new(config: WorkflowConfig) -> Result<Self, QuizError> {
        let client = HttpConversionClient::from_config(&config)?;
        Ok(Self::with_client(config, Arc::new(client)))
    }

    /// Create a workflow around any [`RemoteConversionClient`].
    pub fn with_client(config: WorkflowConfig, client: Arc<dyn RemoteConversionClient>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let callback = config
            .callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopCallback));

        Self {
            engine: ConversionEngine::new(config.progress_step),
            exporter: ExportController::new(Arc::clone(&client), &config),
            store: PreviewStore::new(),
            input: InputSource::new(),
            client,
            callback,
            config,
            events_tx,
            events_rx,
            timer: None,
            request: None,
            last_failure: None,
        }
    }

    // ── Input ────────────────────────────────────────────────────────────

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.input.set_text(text);
    }

    /// Select a file, or clear the selection with `None`.
    pub fn set_file(&mut self, file: Option<SelectedFile>) {
        if let Some(ref f) = file {
            debug!("Selected '{}' ({:.2} KB)", f.name(), f.size_kb());
        }
        self.input.set_file(file);
    }

    pub fn input(&self) -> &InputSource {
        &self.input
    }

    // ── State ────────────────────────────────────────────────────────────

    pub fn status(&self) -> ConversionStatus {
        self.engine.status()
    }

    pub fn progress(&self) -> u8 {
        self.engine.progress()
    }

    pub fn episode(&self) -> u64 {
        self.engine.episode()
    }

    pub fn export_type(&self) -> ExportType {
        self.engine.export_type()
    }

    /// Snapshot the current episode was started with.
    pub fn snapshot(&self) -> Option<&InputSnapshot> {
        self.engine.snapshot()
    }

    /// Message of the last failure, for display.
    pub fn last_error(&self) -> Option<&str> {
        self.engine.last_error()
    }

    pub fn preview(&self) -> &PreviewStore {
        &self.store
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn RemoteConversionClient> {
        &self.client
    }

    /// Whether the convert action is enabled: some input is present and no
    /// episode is running.
    pub fn can_convert(&self) -> bool {
        self.input.has_content() && self.engine.status() != ConversionStatus::Processing
    }

    /// True while the progress ticker task is alive.
    pub fn timer_running(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// True while a preview request is outstanding.
    pub fn request_in_flight(&self) -> bool {
        self.request.is_some()
    }

    // ── Dialog ───────────────────────────────────────────────────────────

    /// Reopen the review dialog. Only meaningful once an episode completed.
    pub fn show_preview(&mut self) -> bool {
        if self.engine.status() == ConversionStatus::Complete {
            self.store.show();
            true
        } else {
            false
        }
    }

    /// Close the review dialog without exporting.
    pub fn hide_preview(&mut self) {
        self.store.hide();
    }

    // ── Conversion ───────────────────────────────────────────────────────

    /// Begin a conversion episode and return without waiting for it.
    ///
    /// With no input this is a no-op that returns [`QuizError::EmptyInput`];
    /// the state is untouched. With both inputs the workflow moves to `error`
    /// and returns [`QuizError::Validation`]; nothing is sent. Otherwise any
    /// running episode is superseded and a new one starts at progress 0.
    pub fn start_convert(&mut self, export_type: ExportType) -> Result<(), QuizError> {
        if !self.input.has_content() {
            debug!("Convert disabled: no input");
            return Err(QuizError::EmptyInput);
        }

        self.last_failure = None;
        let input = self.input.validate();
        self.dispatch(EngineEvent::Convert { export_type, input });

        match self.engine.status() {
            ConversionStatus::Processing => Ok(()),
            _ => Err(self.take_failure()),
        }
    }

    /// Apply the next queued event. Returns `false` when no episode is
    /// running and nothing was waited for.
    pub async fn process_next(&mut self) -> bool {
        if self.engine.status() != ConversionStatus::Processing {
            return false;
        }
        match self.events_rx.recv().await {
            Some(event) => {
                self.dispatch(event);
                true
            }
            None => false,
        }
    }

    /// Drive the current episode until it leaves `processing`.
    pub async fn settle(&mut self) -> ConversionStatus {
        while self.process_next().await {}
        self.engine.status()
    }

    /// Run one full episode: start, tick to 100, fetch the preview.
    ///
    /// Returns the number of preview questions, or the error that ended the
    /// episode.
    pub async fn convert(&mut self, export_type: ExportType) -> Result<usize, QuizError> {
        self.start_convert(export_type)?;
        match self.settle().await {
            ConversionStatus::Complete => Ok(self.store.len()),
            _ => Err(self.take_failure()),
        }
    }

    // ── Export ───────────────────────────────────────────────────────────

    /// User confirmed the preview: close the dialog and export.
    ///
    /// Uses the episode's snapshot and export type. Returns the saved
    /// package, or `None` for export types that have no download yet.
    pub async fn finalize(&mut self) -> Result<Option<SavedPackage>, QuizError> {
        if self.engine.status() != ConversionStatus::Complete {
            self.store.hide();
            return Err(QuizError::NothingToExport);
        }
        let snapshot = self
            .engine
            .snapshot()
            .cloned()
            .ok_or(QuizError::NothingToExport)?;
        let export_type = self.engine.export_type();

        match self
            .exporter
            .finalize(&mut self.store, &snapshot, export_type)
            .await
        {
            Ok(Some(saved)) => {
                self.callback.on_package_saved(&saved.path, saved.size_bytes);
                Ok(Some(saved))
            }
            Ok(None) => Ok(None),
            Err(error) => {
                self.last_failure = None;
                self.dispatch(EngineEvent::ExportFailed { error });
                Err(self.take_failure())
            }
        }
    }

    // ── Teardown ─────────────────────────────────────────────────────────

    /// Stop the timer and abandon any request. Also happens on drop.
    pub fn shutdown(&mut self) {
        info!("Workflow shutting down");
        self.dispatch(EngineEvent::Teardown);
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn take_failure(&mut self) -> QuizError {
        self.last_failure.take().unwrap_or_else(|| {
            QuizError::Internal(
                self.engine
                    .last_error()
                    .unwrap_or("episode ended without a result")
                    .to_string(),
            )
        })
    }

    fn dispatch(&mut self, event: EngineEvent) {
        let before = self.engine.status();
        let effects = self.engine.transition(event);
        let after = self.engine.status();
        if before != after {
            debug!("Status {} → {}", before, after);
            self.callback.on_status_change(before, after);
        }
        for effect in effects {
            self.apply(effect);
        }
    }

    fn apply(&mut self, effect: EngineEffect) {
        match effect {
            EngineEffect::StartTimer { episode } => {
                self.callback.on_episode_start(episode);
                self.timer = Some(ProgressTimer::start(
                    episode,
                    self.config.tick_interval(),
                    self.events_tx.clone(),
                ));
            }
            EngineEffect::StopTimer => {
                self.timer = None;
            }
            EngineEffect::CancelRequest => {
                if let Some(req) = self.request.take() {
                    debug!("Cancelling preview request of episode {}", req.episode);
                }
            }
            EngineEffect::Progress { episode, progress } => {
                self.callback.on_progress(episode, progress);
            }
            EngineEffect::FetchPreview { episode, snapshot } => {
                self.request = Some(self.spawn_preview(episode, snapshot));
            }
            EngineEffect::OpenPreview { episode, questions } => {
                self.request = None;
                self.store.set_questions(questions);
                self.store.show();
                self.callback.on_preview_ready(episode, self.store.len());
            }
            EngineEffect::Report(error) => {
                self.request = None;
                self.callback.on_error(&error.to_string());
                self.last_failure = Some(error);
            }
        }
    }

    fn spawn_preview(&self, episode: u64, snapshot: InputSnapshot) -> InFlightPreview {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let client = Arc::clone(&self.client);
        let events = self.events_tx.clone();
        let timeout = self.config.request_timeout();

        let handle = tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = cancelled.cancelled() => {
                    debug!("Preview request of episode {} cancelled", episode);
                    return;
                }
                r = tokio::time::timeout(timeout, client.preview(&snapshot)) => r,
            };

            let event = match outcome {
                Ok(Ok(questions)) => EngineEvent::PreviewLoaded { episode, questions },
                Ok(Err(error)) => EngineEvent::PreviewFailed { episode, error },
                Err(_) => EngineEvent::PreviewFailed {
                    episode,
                    error: QuizError::Timeout {
                        endpoint: PREVIEW_ENDPOINT.to_string(),
                        secs: timeout.as_secs(),
                    },
                },
            };
            let _ = events.send(event);
        });

        InFlightPreview {
            episode,
            _handle: handle,
            _guard: token.drop_guard(),
        }
    }
}
