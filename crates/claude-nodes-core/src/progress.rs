//! Broadcast + history store for node progress messages.

use std::{
    collections::VecDeque,
    sync::{PoisonError, RwLock},
};

use futures::{StreamExt, future};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::traits::ProgressSink;

/// History size limit (1 MB of message text).
const HISTORY_BYTES: usize = 1024 * 1024;

/// Progress message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressMsg {
    /// Free-text update for a node.
    Update { node_id: String, message: String },
    /// The run producing updates is over.
    Finished,
}

impl ProgressMsg {
    fn approx_bytes(&self) -> usize {
        match self {
            Self::Update { node_id, message } => node_id.len() + message.len() + 16,
            Self::Finished => 8,
        }
    }
}

struct Inner {
    history: VecDeque<(ProgressMsg, usize)>,
    total_bytes: usize,
}

/// Progress store with broadcast and history support.
///
/// Late subscribers receive the history first, then live updates.
/// Pushing never blocks and never fails, even with no subscribers.
pub struct ProgressStore {
    inner: RwLock<Inner>,
    sender: broadcast::Sender<ProgressMsg>,
}

impl Default for ProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressStore {
    /// Create a new progress store.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self {
            inner: RwLock::new(Inner {
                history: VecDeque::with_capacity(32),
                total_bytes: 0,
            }),
            sender,
        }
    }

    /// Push a message to live listeners and history.
    pub fn push(&self, msg: ProgressMsg) {
        let _ = self.sender.send(msg.clone());
        let bytes = msg.approx_bytes();

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        while inner.total_bytes.saturating_add(bytes) > HISTORY_BYTES {
            if let Some((_, front)) = inner.history.pop_front() {
                inner.total_bytes = inner.total_bytes.saturating_sub(front);
            } else {
                break;
            }
        }
        inner.history.push_back((msg, bytes));
        inner.total_bytes = inner.total_bytes.saturating_add(bytes);
    }

    /// Push an update for a node.
    pub fn push_update<N: Into<String>, M: Into<String>>(&self, node_id: N, message: M) {
        self.push(ProgressMsg::Update {
            node_id: node_id.into(),
            message: message.into(),
        });
    }

    /// Push finished notification.
    pub fn push_finished(&self) {
        self.push(ProgressMsg::Finished);
    }

    /// Get a receiver for live updates.
    #[must_use]
    pub fn get_receiver(&self) -> broadcast::Receiver<ProgressMsg> {
        self.sender.subscribe()
    }

    /// Get a snapshot of the history.
    #[must_use]
    pub fn get_history(&self) -> Vec<ProgressMsg> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .iter()
            .map(|(msg, _)| msg.clone())
            .collect()
    }

    /// Stream that yields history first, then live updates.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, ProgressMsg> {
        let (history, rx) = (self.get_history(), self.get_receiver());

        let hist = futures::stream::iter(history);
        let live = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });

        Box::pin(hist.chain(live))
    }

    /// Stream of `[node] message` lines, ending at `Finished`.
    #[must_use]
    pub fn update_lines(&self) -> futures::stream::BoxStream<'static, String> {
        self.history_plus_stream()
            .take_while(|msg| future::ready(!matches!(msg, ProgressMsg::Finished)))
            .filter_map(|msg| async move {
                match msg {
                    ProgressMsg::Update { node_id, message } => {
                        Some(format!("[{node_id}] {message}"))
                    }
                    ProgressMsg::Finished => None,
                }
            })
            .boxed()
    }
}

impl ProgressSink for ProgressStore {
    fn report(&self, node_id: &str, message: &str) {
        tracing::debug!(node_id, "{message}");
        self.push_update(node_id, message);
    }
}
