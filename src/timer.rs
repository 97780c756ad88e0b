//! The progress ticker: a recurring task owned as a scoped handle.
//!
//! [`ProgressTimer::start`] spawns a task that sends
//! [`EngineEvent::Tick`] for one episode at a fixed interval. Dropping the
//! handle cancels the task, so the ticker cannot outlive the episode or the
//! workflow that owns it: replacing it for a new episode, stopping it at 100,
//! stopping it on error and dropping the workflow all go through `Drop`.

use crate::engine::EngineEvent;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

/// Handle to a running progress ticker. Cancelled on drop.
#[derive(Debug)]
pub struct ProgressTimer {
    episode: u64,
    handle: JoinHandle<()>,
    _guard: DropGuard,
}

impl ProgressTimer {
    /// Start ticking for `episode`. The first tick fires one `period` from now.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(episode: u64, period: Duration, events: UnboundedSender<EngineEvent>) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let ticks = IntervalStream::new(interval).take_until(cancelled.cancelled_owned());
            tokio::pin!(ticks);

            while ticks.next().await.is_some() {
                if events.send(EngineEvent::Tick { episode }).is_err() {
                    // Receiver gone: the workflow was dropped.
                    break;
                }
            }
            debug!("Progress timer for episode {} stopped", episode);
        });

        Self {
            episode,
            handle,
            _guard: token.drop_guard(),
        }
    }

    pub fn episode(&self) -> u64 {
        self.episode
    }

    /// True once the ticker task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
