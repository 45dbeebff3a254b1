//! Per-chat serialization of conversation events
//!
//! Each chat gets a lane: an unbounded queue drained by one worker task that
//! runs every event to completion before taking the next. Different chats run
//! concurrently; one chat never has two handlers in flight.
//!
//! A lane whose worker has been idle for `idle_timeout` closes itself. The next
//! event for that chat opens a new lane whose worker first waits for the old
//! one to finish draining, so arrival order holds across the hand-over.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::conversation::{ConversationEngine, InboundEvent};
use crate::model::ChatId;

/// Default time a lane stays open without events
pub const DEFAULT_LANE_IDLE: Duration = Duration::from_secs(60);

struct Lane {
    tx: mpsc::UnboundedSender<InboundEvent>,
    worker: JoinHandle<()>,
}

/// Per-chat sequential event queue in front of a [`ConversationEngine`]
pub struct ChatQueue {
    engine: Arc<ConversationEngine>,
    lanes: Mutex<HashMap<ChatId, Lane>>,
    idle_timeout: Duration,
}

impl ChatQueue {
    pub fn new(engine: Arc<ConversationEngine>) -> Self {
        Self::with_idle_timeout(engine, DEFAULT_LANE_IDLE)
    }

    pub fn with_idle_timeout(engine: Arc<ConversationEngine>, idle_timeout: Duration) -> Self {
        Self {
            engine,
            lanes: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    fn lanes(&self) -> MutexGuard<'_, HashMap<ChatId, Lane>> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an event behind every earlier event of the same chat
    pub fn submit(&self, event: InboundEvent) {
        let chat_id = event.chat_id;
        let mut lanes = self.lanes();

        let event = match lanes.get(&chat_id) {
            Some(lane) => match lane.tx.send(event) {
                Ok(()) => return,
                // Lane closed itself; open a new one behind it
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let previous = lanes.remove(&chat_id).map(|lane| lane.worker);
        lanes.retain(|_, lane| !(lane.tx.is_closed() && lane.worker.is_finished()));

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(event).is_err() {
            warn!("Could not queue event for chat {}", chat_id);
            return;
        }

        debug!("Opening lane for chat {}", chat_id);
        let worker = tokio::spawn(run_lane(
            Arc::clone(&self.engine),
            chat_id,
            rx,
            self.idle_timeout,
            previous,
        ));
        lanes.insert(chat_id, Lane { tx, worker });
    }

    /// Number of open lanes
    pub fn lanes_open(&self) -> usize {
        self.lanes().values().filter(|l| !l.tx.is_closed()).count()
    }

    /// Stop accepting work and wait for every queued event to be handled
    pub async fn shutdown(&self) {
        let workers: Vec<JoinHandle<()>> = self
            .lanes()
            .drain()
            .map(|(_, lane)| lane.worker)
            .collect();

        info!("Draining {} chat lane(s)", workers.len());
        for worker in workers {
            if let Err(e) = worker.await {
                warn!("Chat lane ended abnormally: {}", e);
            }
        }
    }
}

async fn run_lane(
    engine: Arc<ConversationEngine>,
    chat_id: ChatId,
    mut rx: mpsc::UnboundedReceiver<InboundEvent>,
    idle_timeout: Duration,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        if let Err(e) = previous.await {
            warn!("Previous lane for chat {} ended abnormally: {}", chat_id, e);
        }
    }

    loop {
        match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(event)) => {
                engine.handle(event).await;
            }
            // Queue dropped
            Ok(None) => break,
            Err(_) => {
                rx.close();
                while let Ok(event) = rx.try_recv() {
                    engine.handle(event).await;
                }
                break;
            }
        }
    }

    debug!("Lane for chat {} closed", chat_id);
}
