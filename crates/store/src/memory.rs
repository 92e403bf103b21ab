//! In-memory `EntryStore` for tests and local development. Mirrors the
//! sheet's row arithmetic: positions are 1-based and row 1 is a virtual
//! header, so the first record lives at row 2.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use pricelog_core::domain::{Column, EntryRecord};
use pricelog_core::store::{EntryStore, RowPosition, StoreError};

#[derive(Default)]
pub struct InMemoryEntryStore {
    records: RwLock<Vec<EntryRecord>>,
}

impl InMemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_records(records: Vec<EntryRecord>) -> Self {
        let store = Self::new();
        *store.records.write().await = records;
        store
    }

    fn index(position: RowPosition, len: usize) -> Result<usize, StoreError> {
        let index = position.0.checked_sub(2).ok_or(StoreError::RowOutOfRange(position))?;
        if index >= len {
            return Err(StoreError::RowOutOfRange(position));
        }
        Ok(index)
    }
}

#[async_trait]
impl EntryStore for InMemoryEntryStore {
    fn is_ready(&self) -> bool {
        true
    }

    async fn find_by_id(
        &self,
        id: &str,
    ) -> Result<Option<(RowPosition, EntryRecord)>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .position(|record| record.id == id)
            .map(|index| (RowPosition(index + 2), records[index].clone())))
    }

    async fn append(&self, new_records: &[EntryRecord]) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        records.extend_from_slice(new_records);
        Ok(())
    }

    async fn update_cells(
        &self,
        position: RowPosition,
        changes: &[(Column, String)],
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let index = Self::index(position, records.len())?;
        let record = &mut records[index];
        for (column, value) in changes {
            apply_change(record, *column, value)?;
        }
        Ok(())
    }

    async fn delete(&self, position: RowPosition) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let index = Self::index(position, records.len())?;
        records.remove(index);
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<EntryRecord>, StoreError> {
        Ok(self.records.read().await.clone())
    }
}

fn apply_change(record: &mut EntryRecord, column: Column, value: &str) -> Result<(), StoreError> {
    match column {
        Column::Id => record.id = value.to_owned(),
        Column::Timestamp => {
            let parsed: DateTime<Utc> = DateTime::parse_from_rfc3339(value)
                .map_err(|_| {
                    StoreError::BadResponse(format!("`{value}` is not an RFC 3339 timestamp"))
                })?
                .with_timezone(&Utc);
            record.timestamp = parsed;
        }
        Column::SubmittedBy => record.submitted_by = value.to_owned(),
        Column::Product => record.product = value.to_owned(),
        Column::Price => {
            record.price = value
                .parse()
                .map_err(|_| StoreError::BadResponse(format!("`{value}` is not a price")))?;
        }
        Column::Location => record.location = value.to_owned(),
        Column::Remark => record.remark = value.to_owned(),
    }
    Ok(())
}
