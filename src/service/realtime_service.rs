use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Named events published over per-user channels. Payloads are always full
/// snapshots, so duplicate or reordered delivery cannot corrupt client state.
pub mod events {
    pub const NEGOTIATION_CREATED: &str = "negotiation:created";
    pub const NEGOTIATION_RESPONDED: &str = "negotiation:responded";
    pub const NEGOTIATION_DISCUSSION: &str = "negotiation:discussion";
    pub const NEGOTIATION_AGREEMENT: &str = "negotiation:agreement";
    pub const CONTRACT_CREATED: &str = "contract:created";
    pub const CONTRACT_UPDATED: &str = "contract:updated";
    pub const CONTRACT_FEEDBACK: &str = "contract:feedback";
}

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeEvent {
    pub event: String,
    pub data: serde_json::Value,
}

impl RealtimeEvent {
    pub fn new(event: &str, data: impl Serialize) -> Self {
        RealtimeEvent {
            event: event.to_string(),
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
        }
    }
}

#[derive(Debug)]
struct SessionHandle {
    session_id: Uuid,
    tx: mpsc::Sender<String>,
}

/// Handed to a WebSocket connection on subscribe; the receiver drains frames
/// for exactly one session of one user.
#[derive(Debug)]
pub struct Subscription {
    pub session_id: Uuid,
    pub receiver: mpsc::Receiver<String>,
}

/// Per-user fan-out registry. A user may hold several sessions (multiple
/// tabs/devices); each gets every event addressed to that user. Publishing is
/// fire-and-forget: it never awaits and never blocks the caller, so it stays
/// off the transactional path.
#[derive(Debug, Default)]
pub struct RealtimeService {
    sessions: DashMap<Uuid, Vec<SessionHandle>>,
}

const SESSION_CHANNEL_CAPACITY: usize = 64;

impl RealtimeService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session for `user_id`. The caller owns the receiver
    /// and must call `unsubscribe` when the connection goes away.
    pub fn subscribe(&self, user_id: Uuid) -> Subscription {
        let (tx, rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        let session_id = Uuid::new_v4();
        self.sessions
            .entry(user_id)
            .or_default()
            .push(SessionHandle { session_id, tx });
        tracing::debug!("realtime session {} registered for user {}", session_id, user_id);
        Subscription {
            session_id,
            receiver: rx,
        }
    }

    pub fn unsubscribe(&self, user_id: Uuid, session_id: Uuid) {
        if let Some(mut handles) = self.sessions.get_mut(&user_id) {
            handles.retain(|h| h.session_id != session_id);
        }
        self.sessions.remove_if(&user_id, |_, handles| handles.is_empty());
    }

    pub fn session_count(&self, user_id: Uuid) -> usize {
        self.sessions.get(&user_id).map(|h| h.len()).unwrap_or(0)
    }

    /// Fans one event out to every open session of one user. A session whose
    /// buffer is full simply misses the event (the reconciliation poller
    /// heals it); a closed session is pruned.
    pub fn publish(&self, user_id: Uuid, event: &RealtimeEvent) {
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("failed to serialize realtime event {}: {}", event.event, e);
                return;
            }
        };

        if let Some(mut handles) = self.sessions.get_mut(&user_id) {
            handles.retain(|handle| {
                if handle.tx.is_closed() {
                    return false;
                }
                if let Err(e) = handle.tx.try_send(frame.clone()) {
                    tracing::warn!(
                        "dropping realtime event {} for user {} session {}: {}",
                        event.event,
                        user_id,
                        handle.session_id,
                        e
                    );
                }
                true
            });
        }
    }

    /// Every state change on a negotiation or contract concerns exactly two
    /// users; each gets its own copy on its own channel (no broadcast).
    pub fn publish_to_parties(&self, client_id: Uuid, worker_id: Uuid, event: &RealtimeEvent) {
        self.publish(client_id, event);
        self.publish(worker_id, event);
    }
}
