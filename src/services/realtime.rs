//! Session-scoped shared key-value state with fan-out to every peer.
//!
//! Each key holds a JSON value. `Merge` writes fold an object into the
//! current object entry by entry (last writer wins per entry); `Replace`
//! writes swap the whole value. Delivery order is whatever the broadcast
//! channel gives; nothing here orders writes across peers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{broadcast, RwLock};

use crate::{
    constants::{MAX_SESSIONS, SESSION_CHANNEL_CAPACITY},
    error::{AppError, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOp {
    Replace,
    Merge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub key: String,
    pub op: SyncOp,
    pub value: Value,
    /// Client id of the writer.
    pub origin: String,
    pub sent_at: DateTime<Utc>,
}

impl SyncMessage {
    pub fn new(key: impl Into<String>, op: SyncOp, value: Value, origin: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            op,
            value,
            origin: origin.into(),
            sent_at: Utc::now(),
        }
    }
}

/// Shared key-value channel of one session.
#[async_trait]
pub trait SharedKeyValueChannel: Send + Sync {
    fn client_id(&self) -> &str;

    async fn read(&self, key: &str) -> Result<Option<Value>>;

    async fn publish(&self, key: &str, op: SyncOp, value: Value) -> Result<()>;

    /// Every message written to the session from now on, own writes included.
    fn subscribe(&self) -> broadcast::Receiver<SyncMessage>;
}

pub fn new_client_id() -> String {
    format!("client-{:016x}", rand::random::<u64>())
}

fn fold(state: &mut HashMap<String, Value>, message: &SyncMessage) {
    match message.op {
        SyncOp::Replace => {
            state.insert(message.key.clone(), message.value.clone());
        }
        SyncOp::Merge => {
            let Value::Object(patch) = &message.value else {
                tracing::warn!("Dropping non-object merge on {}", message.key);
                return;
            };
            let entry = state
                .entry(message.key.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(current) = entry {
                for (k, v) in patch {
                    current.insert(k.clone(), v.clone());
                }
            }
        }
    }
}

pub struct Session {
    id: String,
    state: RwLock<HashMap<String, Value>>,
    tx: broadcast::Sender<SyncMessage>,
}

impl Session {
    fn new(id: String) -> Self {
        let (tx, _) = broadcast::channel(SESSION_CHANNEL_CAPACITY);
        Self {
            id,
            state: RwLock::new(HashMap::new()),
            tx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fold a message into the session state and fan it out.
    pub async fn apply(&self, message: SyncMessage) {
        {
            let mut state = self.state.write().await;
            fold(&mut state, &message);
        }
        // no receivers is fine: the state above still records the write
        let _ = self.tx.send(message);
    }

    pub async fn read(&self, key: &str) -> Option<Value> {
        self.state.read().await.get(key).cloned()
    }

    /// Current state as `Replace` messages, for late joiners.
    pub async fn snapshot(&self) -> Vec<SyncMessage> {
        let state = self.state.read().await;
        let mut keys: Vec<&String> = state.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|key| SyncMessage::new(key.clone(), SyncOp::Replace, state[key].clone(), "snapshot"))
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncMessage> {
        self.tx.subscribe()
    }

    pub fn peer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// All live sessions, keyed by session id, at most `max_sessions` of them.
#[derive(Clone)]
pub struct SessionHub {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
    max_sessions: usize,
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::with_capacity(MAX_SESSIONS)
    }
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Existing session, or a new one. At capacity, sessions nobody is
    /// subscribed to are evicted first; if none are, the join is refused.
    pub async fn session(&self, session_id: &str) -> Result<Arc<Session>> {
        if let Some(session) = self.sessions.read().await.get(session_id) {
            return Ok(session.clone());
        }
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(session_id) {
            return Ok(session.clone());
        }
        if sessions.len() >= self.max_sessions {
            let before = sessions.len();
            sessions.retain(|_, session| session.peer_count() > 0);
            tracing::info!("Evicted {} idle sessions", before - sessions.len());
        }
        if sessions.len() >= self.max_sessions {
            return Err(AppError::Realtime(format!(
                "session limit of {} reached",
                self.max_sessions
            )));
        }
        tracing::info!("Session created: {}", session_id);
        let session = Arc::new(Session::new(session_id.to_string()));
        sessions.insert(session_id.to_string(), session.clone());
        Ok(session)
    }

    /// Existing session only; never creates one.
    pub async fn find(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn join(&self, session_id: &str) -> Result<SessionHandle> {
        Ok(SessionHandle {
            session: self.session(session_id).await?,
            client_id: new_client_id(),
        })
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// One client's view of a session.
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Session>,
    client_id: String,
}

impl SessionHandle {
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}

#[async_trait]
impl SharedKeyValueChannel for SessionHandle {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn read(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.session.read(key).await)
    }

    async fn publish(&self, key: &str, op: SyncOp, value: Value) -> Result<()> {
        if key.is_empty() {
            return Err(AppError::Realtime("empty key".to_string()));
        }
        if op == SyncOp::Merge && !value.is_object() {
            return Err(AppError::Realtime(format!("merge on {} needs an object value", key)));
        }
        self.session
            .apply(SyncMessage::new(key, op, value, self.client_id.clone()))
            .await;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SyncMessage> {
        self.session.subscribe()
    }
}
