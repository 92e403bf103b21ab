//! Per-user dialog sessions. Memory resident only; a restart drops every
//! in-flight dialog by design.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::domain::UserId;

use super::state::{DialogFields, DialogState};

#[derive(Clone, Debug, PartialEq)]
pub struct DialogSession {
    pub state: DialogState,
    pub fields: DialogFields,
}

#[derive(Default)]
pub struct SessionStore {
    inner: RwLock<HashMap<UserId, DialogSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, user: &UserId) -> Option<DialogSession> {
        let sessions = self.inner.read().await;
        sessions.get(user).cloned()
    }

    pub async fn state(&self, user: &UserId) -> Option<DialogState> {
        let sessions = self.inner.read().await;
        sessions.get(user).map(|session| session.state)
    }

    /// Stores the session. The state and fields always belong to the same
    /// dialog; the dispatcher guarantees it, and this asserts it in tests.
    pub async fn set(&self, user: &UserId, state: DialogState, fields: DialogFields) {
        debug_assert_eq!(state.dialog(), fields.dialog());
        let mut sessions = self.inner.write().await;
        sessions.insert(user.clone(), DialogSession { state, fields });
    }

    pub async fn clear(&self, user: &UserId) {
        let mut sessions = self.inner.write().await;
        sessions.remove(user);
    }

    pub async fn active_count(&self) -> usize {
        let sessions = self.inner.read().await;
        sessions.len()
    }
}
