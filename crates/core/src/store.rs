//! Backing-store seam. The engine only ever talks to `EntryStore`; the
//! spreadsheet adapter and the in-memory test double both live in the
//! store crate.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Column, EntryRecord};

/// 1-based row index in the backing sheet (row 1 is the header).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RowPosition(pub usize);

impl std::fmt::Display for RowPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backing store is not connected")]
    Unavailable,
    #[error("backing store request failed: {0}")]
    Request(String),
    #[error("backing store returned an unexpected response: {0}")]
    BadResponse(String),
    #[error("row {0} does not exist")]
    RowOutOfRange(RowPosition),
}

#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Whether the store finished its startup handshake. Handlers check
    /// this before any read or write and fail the dialog gracefully when
    /// the store never came up.
    fn is_ready(&self) -> bool;

    /// Scans the id column for an exact match.
    async fn find_by_id(
        &self,
        id: &str,
    ) -> Result<Option<(RowPosition, EntryRecord)>, StoreError>;

    /// Appends records as new rows, in order, in one request.
    async fn append(&self, records: &[EntryRecord]) -> Result<(), StoreError>;

    /// Writes individual cells of one row in a single batched request.
    async fn update_cells(
        &self,
        position: RowPosition,
        changes: &[(Column, String)],
    ) -> Result<(), StoreError>;

    async fn update_cell(
        &self,
        position: RowPosition,
        column: Column,
        value: String,
    ) -> Result<(), StoreError> {
        self.update_cells(position, &[(column, value)]).await
    }

    /// Removes the row entirely; rows below shift up.
    async fn delete(&self, position: RowPosition) -> Result<(), StoreError>;

    /// All data rows in sheet order (oldest first).
    async fn get_all(&self) -> Result<Vec<EntryRecord>, StoreError>;
}
