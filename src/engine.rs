//! The conversion state machine.
//!
//! ```text
//!            convert(valid)                    tick × N
//!   idle ─────────────────────▶ processing ◀──────────┐
//!    │                          │     │  └────────────┘
//!    │ convert(both inputs)     │     │ progress == 100
//!    ▼                          │     ▼ (one preview request)
//!  error ◀── preview failed ────┘   awaiting preview
//!    ▲                                  │ preview loaded
//!    └──── export failed ─── complete ◀─┘
//! ```
//!
//! `error` and `complete` are not terminal: any later valid convert starts a
//! new episode.
//!
//! [`ConversionEngine`] owns `{status, progress, snapshot}` and changes them in
//! one place, [`ConversionEngine::transition`]. It performs no I/O. Each call
//! returns the [`EngineEffect`]s the caller must carry out (start or stop the
//! timer, send the preview request, open the dialog, report an error).
//!
//! Every episode gets a fresh number. Ticks and preview results carry the
//! number of the episode that produced them, and anything from an older
//! episode is dropped. This is what keeps a stale timer or a late response
//! from touching the state after a new convert request.

use crate::config::ExportType;
use crate::error::QuizError;
use crate::input::InputSnapshot;
use crate::preview::PreviewQuestion;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Lifecycle status of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    #[default]
    Idle,
    Processing,
    Complete,
    Error,
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConversionStatus::Idle => "idle",
            ConversionStatus::Processing => "processing",
            ConversionStatus::Complete => "complete",
            ConversionStatus::Error => "error",
        })
    }
}

/// Inputs to [`ConversionEngine::transition`].
#[derive(Debug)]
pub enum EngineEvent {
    /// User asked to convert. `input` is the result of `InputSource::validate`.
    Convert {
        export_type: ExportType,
        input: Result<InputSnapshot, QuizError>,
    },
    /// The progress timer fired.
    Tick { episode: u64 },
    /// The preview request succeeded.
    PreviewLoaded {
        episode: u64,
        questions: Vec<PreviewQuestion>,
    },
    /// The preview request failed, timed out or was cancelled.
    PreviewFailed { episode: u64, error: QuizError },
    /// The download during export failed.
    ExportFailed { error: QuizError },
    /// The owner is going away. Release the timer and any request.
    Teardown,
}

/// Work the caller must perform after a transition.
#[derive(Debug)]
pub enum EngineEffect {
    /// Start the progress timer for `episode`, replacing any running one.
    StartTimer { episode: u64 },
    /// Stop the progress timer.
    StopTimer,
    /// Abandon the in-flight preview request, if any.
    CancelRequest,
    /// Progress changed; repaint.
    Progress { episode: u64, progress: u8 },
    /// Send the preview request. Emitted once per episode.
    FetchPreview {
        episode: u64,
        snapshot: InputSnapshot,
    },
    /// Store the questions and open the review dialog.
    OpenPreview {
        episode: u64,
        questions: Vec<PreviewQuestion>,
    },
    /// Tell the user something went wrong.
    Report(QuizError),
}

/// The conversion state machine.
#[derive(Debug, Clone)]
pub struct ConversionEngine {
    status: ConversionStatus,
    progress: u8,
    step: u8,
    episode: u64,
    snapshot: Option<InputSnapshot>,
    export_type: ExportType,
    preview_requested: bool,
    last_error: Option<String>,
}

impl ConversionEngine {
    /// Create an idle engine advancing `step` percent per tick (clamped to 1–100).
    pub fn new(step: u8) -> Self {
        Self {
            status: ConversionStatus::Idle,
            progress: 0,
            step: step.clamp(1, 100),
            episode: 0,
            snapshot: None,
            export_type: ExportType::default(),
            preview_requested: false,
            last_error: None,
        }
    }

    pub fn status(&self) -> ConversionStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Number of the current (or last) episode. 0 before the first convert.
    pub fn episode(&self) -> u64 {
        self.episode
    }

    /// Input captured by the current episode.
    pub fn snapshot(&self) -> Option<&InputSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn export_type(&self) -> ExportType {
        self.export_type
    }

    /// User-facing message of the last failure, cleared by a new episode.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Apply one event and return the effects to carry out, in order.
    pub fn transition(&mut self, event: EngineEvent) -> Vec<EngineEffect> {
        match event {
            EngineEvent::Convert { export_type, input } => self.on_convert(export_type, input),
            EngineEvent::Tick { episode } => self.on_tick(episode),
            EngineEvent::PreviewLoaded { episode, questions } => {
                self.on_preview_loaded(episode, questions)
            }
            EngineEvent::PreviewFailed { episode, error } => self.on_preview_failed(episode, error),
            EngineEvent::ExportFailed { error } => self.on_export_failed(error),
            EngineEvent::Teardown => self.on_teardown(),
        }
    }

    fn is_current(&self, episode: u64) -> bool {
        episode == self.episode && self.status == ConversionStatus::Processing
    }

    fn fail(&mut self, error: QuizError) -> EngineEffect {
        self.status = ConversionStatus::Error;
        self.last_error = Some(error.to_string());
        EngineEffect::Report(error)
    }

    fn on_convert(
        &mut self,
        export_type: ExportType,
        input: Result<InputSnapshot, QuizError>,
    ) -> Vec<EngineEffect> {
        let snapshot = match input {
            // Disabled action: nothing happens.
            Err(QuizError::EmptyInput) => {
                debug!("Convert ignored: no input");
                return Vec::new();
            }
            Err(error) => {
                self.episode += 1;
                self.export_type = export_type;
                self.progress = 0;
                self.preview_requested = false;
                warn!("Episode {} rejected: {}", self.episode, error);
                return vec![
                    EngineEffect::StopTimer,
                    EngineEffect::CancelRequest,
                    self.fail(error),
                ];
            }
            Ok(snapshot) => snapshot,
        };

        self.episode += 1;
        self.export_type = export_type;
        self.status = ConversionStatus::Processing;
        self.progress = 0;
        self.preview_requested = false;
        self.last_error = None;
        info!(
            "Episode {} started: {} → {}",
            self.episode,
            snapshot.describe(),
            export_type
        );
        self.snapshot = Some(snapshot);

        vec![
            EngineEffect::CancelRequest,
            EngineEffect::Progress {
                episode: self.episode,
                progress: 0,
            },
            EngineEffect::StartTimer {
                episode: self.episode,
            },
        ]
    }

    fn on_tick(&mut self, episode: u64) -> Vec<EngineEffect> {
        if !self.is_current(episode) || self.preview_requested {
            debug!("Dropping stale tick from episode {}", episode);
            return Vec::new();
        }

        self.progress = self.progress.saturating_add(self.step).min(100);
        let mut effects = vec![EngineEffect::Progress {
            episode,
            progress: self.progress,
        }];

        if self.progress == 100 {
            self.preview_requested = true;
            effects.push(EngineEffect::StopTimer);
            match self.snapshot.clone() {
                Some(snapshot) => effects.push(EngineEffect::FetchPreview { episode, snapshot }),
                None => effects.push(self.fail(QuizError::Internal(
                    "processing without an input snapshot".into(),
                ))),
            }
        }

        effects
    }

    fn on_preview_loaded(
        &mut self,
        episode: u64,
        questions: Vec<PreviewQuestion>,
    ) -> Vec<EngineEffect> {
        if !self.is_current(episode) || !self.preview_requested {
            warn!("Dropping preview from superseded episode {}", episode);
            return Vec::new();
        }
        self.status = ConversionStatus::Complete;
        info!(
            "Episode {} complete: {} questions",
            episode,
            questions.len()
        );
        vec![EngineEffect::OpenPreview { episode, questions }]
    }

    fn on_preview_failed(&mut self, episode: u64, error: QuizError) -> Vec<EngineEffect> {
        if !self.is_current(episode) {
            debug!("Ignoring failure from superseded episode {}: {}", episode, error);
            return Vec::new();
        }
        warn!("Episode {} failed: {}", episode, error);
        vec![EngineEffect::StopTimer, self.fail(error)]
    }

    fn on_export_failed(&mut self, error: QuizError) -> Vec<EngineEffect> {
        warn!("Export for episode {} failed: {}", self.episode, error);
        vec![self.fail(error)]
    }

    fn on_teardown(&mut self) -> Vec<EngineEffect> {
        let was_processing = self.status == ConversionStatus::Processing;
        // Anything still in flight now belongs to a dead episode.
        self.episode += 1;
        let mut effects = vec![EngineEffect::StopTimer, EngineEffect::CancelRequest];
        if was_processing {
            effects.push(self.fail(QuizError::Cancelled {
                endpoint: "/preview".into(),
            }));
        }
        effects
    }
}

impl Default for ConversionEngine {
    fn default() -> Self {
        Self::new(10)
    }
}
