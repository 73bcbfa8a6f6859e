//! Resume/dismiss policy over incomplete streams.
//!
//! The controller does not re-invoke any provider. It surfaces the most
//! recent incomplete stream for a conversation; resuming hands the saved
//! snapshot back to the caller, which restarts generation from
//! `state.messages` under a fresh stream id.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::interval;
use tracing::{debug, info};

use crate::{config::RecoveryConfig, manager::StreamStateManager, state::StreamState};

/// An offer to the caller: an interrupted generation that can be resumed
/// or dismissed.
#[derive(Debug, Clone)]
pub struct RecoveryPrompt {
    /// Most recent incomplete stream — the primary resume candidate.
    pub primary: StreamState,
    /// Estimated completion fraction of the primary candidate.
    pub progress: f64,
    /// Output tokens the primary candidate had produced.
    pub tokens_generated: u64,
    /// Every incomplete stream currently listed, most recent first.
    pub incomplete: Vec<StreamState>,
}

/// Policy layer that watches for interrupted generations.
pub struct RecoveryController {
    manager: Arc<StreamStateManager>,
    conversation_id: Option<String>,
    config: RecoveryConfig,
}

impl RecoveryController {
    pub fn new(manager: Arc<StreamStateManager>, conversation_id: Option<String>) -> Self {
        Self::with_config(manager, conversation_id, RecoveryConfig::default())
    }

    pub fn with_config(
        manager: Arc<StreamStateManager>,
        conversation_id: Option<String>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            manager,
            conversation_id,
            config,
        }
    }

    /// One-shot check for incomplete streams. `None` when there is
    /// nothing to offer.
    pub fn check(&self) -> Option<RecoveryPrompt> {
        let incomplete = self
            .manager
            .get_incomplete_streams(self.conversation_id.as_deref());
        let primary = incomplete.first()?.clone();
        let progress = self.manager.estimate_progress(&primary);
        let tokens_generated = primary.tokens_generated;

        Some(RecoveryPrompt {
            primary,
            progress,
            tokens_generated,
            incomplete,
        })
    }

    /// Take the snapshot for `stream_id` and retire the old record. The
    /// caller restarts generation from the snapshot under a new id, so
    /// the stream re-enters the active state there.
    pub fn resume(&self, stream_id: &str) -> Option<StreamState> {
        let state = self.manager.get_stream_state(stream_id)?;
        self.manager.remove_stream_state(stream_id);
        info!(stream_id, tokens_generated = state.tokens_generated, "resuming stream");
        Some(state)
    }

    /// Drop one incomplete stream without resuming it.
    pub fn dismiss(&self, stream_id: &str) {
        debug!(stream_id, "dismissing stream");
        self.manager.remove_stream_state(stream_id);
    }

    /// Drop every currently-listed incomplete stream.
    pub fn dismiss_all(&self) {
        for state in self
            .manager
            .get_incomplete_streams(self.conversation_id.as_deref())
        {
            self.manager.remove_stream_state(&state.stream_id);
        }
    }

    /// Poll loop: checks immediately on activation, then on the
    /// configured interval, sending prompts until shutdown or the
    /// receiver goes away.
    pub async fn run(
        self,
        prompts: mpsc::UnboundedSender<RecoveryPrompt>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut poll = interval(self.config.poll_interval());
        info!(
            interval_secs = self.config.poll_interval_secs,
            "starting stream recovery poll loop"
        );

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    if let Some(prompt) = self.check() {
                        if prompts.send(prompt).is_err() {
                            break;
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("stream recovery poll loop received shutdown signal");
                    break;
                }
            }
        }
    }
}
