//! Shared fakes for dialog tests: a transport that records everything it
//! is told to deliver and an in-memory entry store with failure toggles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{Column, EntryRecord, UserId};
use crate::outbound::{
    CallbackAnswer, CallbackRef, Keyboard, MessageRef, Transport, TransportError,
};
use crate::store::{EntryStore, RowPosition, StoreError};

use super::graph::StepContext;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Outgoing {
    Sent { user: UserId, text: String, keyboard: Option<Keyboard> },
    Edited { message: MessageRef, text: String, keyboard: Option<Keyboard> },
}

impl Outgoing {
    pub(crate) fn text(&self) -> &str {
        match self {
            Outgoing::Sent { text, .. } | Outgoing::Edited { text, .. } => text,
        }
    }

    pub(crate) fn keyboard(&self) -> Option<&Keyboard> {
        match self {
            Outgoing::Sent { keyboard, .. } | Outgoing::Edited { keyboard, .. } => {
                keyboard.as_ref()
            }
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingTransport {
    outgoing: Mutex<Vec<Outgoing>>,
    answers: Mutex<Vec<CallbackAnswer>>,
}

impl RecordingTransport {
    pub(crate) async fn outgoing(&self) -> Vec<Outgoing> {
        self.outgoing.lock().await.clone()
    }

    pub(crate) async fn texts(&self) -> Vec<String> {
        self.outgoing.lock().await.iter().map(|out| out.text().to_owned()).collect()
    }

    pub(crate) async fn last(&self) -> Outgoing {
        self.outgoing.lock().await.last().expect("no outgoing messages recorded").clone()
    }

    pub(crate) async fn answers(&self) -> Vec<CallbackAnswer> {
        self.answers.lock().await.clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(
        &self,
        user: &UserId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<(), TransportError> {
        self.outgoing.lock().await.push(Outgoing::Sent {
            user: user.clone(),
            text: text.to_owned(),
            keyboard,
        });
        Ok(())
    }

    async fn edit(
        &self,
        message: &MessageRef,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<(), TransportError> {
        self.outgoing.lock().await.push(Outgoing::Edited {
            message: message.clone(),
            text: text.to_owned(),
            keyboard,
        });
        Ok(())
    }

    async fn answer(
        &self,
        _callback: &CallbackRef,
        answer: CallbackAnswer,
    ) -> Result<(), TransportError> {
        self.answers.lock().await.push(answer);
        Ok(())
    }
}

/// `EntryStore` backed by a `Vec`. Row positions mirror the sheet layout:
/// the record at index `i` sits at row `i + 2`.
#[derive(Default)]
pub(crate) struct MemStore {
    records: Mutex<Vec<EntryRecord>>,
    offline: AtomicBool,
    failing: AtomicBool,
}

impl MemStore {
    pub(crate) async fn seed(&self, records: Vec<EntryRecord>) {
        self.records.lock().await.extend(records);
    }

    pub(crate) async fn records(&self) -> Vec<EntryRecord> {
        self.records.lock().await.clone()
    }

    pub(crate) fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_requests(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Request("scripted failure".into()));
        }
        Ok(())
    }
}

fn apply_change(record: &mut EntryRecord, column: Column, value: String) {
    match column {
        Column::Id => record.id = value,
        Column::Timestamp => {
            if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(&value) {
                record.timestamp = parsed.into();
            }
        }
        Column::SubmittedBy => record.submitted_by = value,
        Column::Product => record.product = value,
        Column::Price => {
            if let Ok(parsed) = value.parse() {
                record.price = parsed;
            }
        }
        Column::Location => record.location = value,
        Column::Remark => record.remark = value,
    }
}

#[async_trait]
impl EntryStore for MemStore {
    fn is_ready(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }

    async fn find_by_id(
        &self,
        id: &str,
    ) -> Result<Option<(RowPosition, EntryRecord)>, StoreError> {
        self.check()?;
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .position(|record| record.id == id)
            .map(|index| (RowPosition(index + 2), records[index].clone())))
    }

    async fn append(&self, records: &[EntryRecord]) -> Result<(), StoreError> {
        self.check()?;
        self.records.lock().await.extend_from_slice(records);
        Ok(())
    }

    async fn update_cells(
        &self,
        position: RowPosition,
        changes: &[(Column, String)],
    ) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.records.lock().await;
        let record = position
            .0
            .checked_sub(2)
            .and_then(|index| records.get_mut(index))
            .ok_or(StoreError::RowOutOfRange(position))?;
        for (column, value) in changes {
            apply_change(record, *column, value.clone());
        }
        Ok(())
    }

    async fn delete(&self, position: RowPosition) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.records.lock().await;
        let index = position
            .0
            .checked_sub(2)
            .filter(|index| *index < records.len())
            .ok_or(StoreError::RowOutOfRange(position))?;
        records.remove(index);
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<EntryRecord>, StoreError> {
        self.check()?;
        Ok(self.records.lock().await.clone())
    }
}

/// One transport and one store shared by every context the test builds.
pub(crate) struct Harness {
    pub(crate) transport: Arc<RecordingTransport>,
    pub(crate) store: Arc<MemStore>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self {
            transport: Arc::new(RecordingTransport::default()),
            store: Arc::new(MemStore::default()),
        }
    }

    /// Context for a plain text message from `user`.
    pub(crate) fn context(&self, user: &str) -> StepContext {
        StepContext {
            user: UserId::from(user),
            submitted_by: user.to_owned(),
            transport: self.transport.clone(),
            store: self.store.clone(),
            page_size: 5,
            message: None,
            callback: None,
        }
    }

    /// Context for a button press on a prior bot message.
    pub(crate) fn button_context(&self, user: &str) -> StepContext {
        StepContext {
            message: Some(MessageRef { chat: UserId::from(user), message_id: 99 }),
            callback: Some(CallbackRef("cb-1".into())),
            ..self.context(user)
        }
    }
}
