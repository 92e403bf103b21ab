//! `EntryStore` adapter over the Sheets client.
//!
//! `connect` resolves the worksheet, reads or seeds the header row, and
//! returns a ready store. When the spreadsheet cannot be reached at
//! startup the process keeps running with a degraded store whose
//! `is_ready` stays false; dialogs then fail each operation gracefully
//! instead of crashing the bot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use pricelog_core::config::SheetsConfig;
use pricelog_core::domain::{Column, EntryRecord};
use pricelog_core::store::{EntryStore, RowPosition, StoreError};

use crate::sheets::SheetsClient;

pub struct SheetStore {
    inner: Option<Connected>,
}

struct Connected {
    client: SheetsClient,
    worksheet: String,
    grid_id: i64,
}

impl SheetStore {
    /// Opens the configured worksheet and makes sure the header row is
    /// in place. An empty first row is seeded with the default headers;
    /// missing headers are reported but do not block startup.
    pub async fn connect(config: &SheetsConfig) -> Result<Self, StoreError> {
        let client = SheetsClient::new(config);
        let worksheets = client.worksheets().await?;

        let properties = match &config.worksheet {
            Some(name) => worksheets
                .into_iter()
                .find(|sheet| &sheet.title == name)
                .ok_or_else(|| {
                    StoreError::BadResponse(format!("worksheet `{name}` not found"))
                })?,
            None => {
                let first = worksheets.into_iter().next().ok_or_else(|| {
                    StoreError::BadResponse("spreadsheet has no worksheets".to_owned())
                })?;
                warn!(worksheet = %first.title, "worksheet not configured, using the first one");
                first
            }
        };

        let connected =
            Connected { client, worksheet: properties.title, grid_id: properties.grid_id };
        connected.ensure_headers().await?;
        info!(worksheet = %connected.worksheet, "spreadsheet store connected");
        Ok(Self { inner: Some(connected) })
    }

    /// A store that never came up. Every operation returns
    /// `StoreError::Unavailable`.
    pub fn offline() -> Self {
        Self { inner: None }
    }

    fn connected(&self) -> Result<&Connected, StoreError> {
        self.inner.as_ref().ok_or(StoreError::Unavailable)
    }
}

impl Connected {
    async fn ensure_headers(&self) -> Result<(), StoreError> {
        let header_rows = self.client.get_values(&self.range("A1:G1")).await?;
        let headers = header_rows.into_iter().next().unwrap_or_default();

        if headers.iter().all(|cell| cell.trim().is_empty()) {
            let defaults: Vec<String> =
                Column::ORDER.iter().map(|column| column.header().to_owned()).collect();
            info!(worksheet = %self.worksheet, "seeding default headers into empty worksheet");
            self.client.update_values(vec![(self.range("A1:G1"), vec![defaults])]).await?;
            return Ok(());
        }

        let missing: Vec<&str> = Column::ORDER
            .iter()
            .map(|column| column.header())
            .filter(|expected| !headers.iter().any(|cell| cell.trim() == *expected))
            .collect();
        if !missing.is_empty() {
            warn!(
                worksheet = %self.worksheet,
                missing = ?missing,
                found = ?headers,
                "worksheet headers do not match the expected layout"
            );
        }
        Ok(())
    }

    fn range(&self, cells: &str) -> String {
        format!("'{}'!{}", self.worksheet.replace('\'', "''"), cells)
    }

    async fn data_rows(&self) -> Result<Vec<Vec<String>>, StoreError> {
        self.client.get_values(&self.range("A2:G")).await
    }
}

#[async_trait]
impl EntryStore for SheetStore {
    fn is_ready(&self) -> bool {
        self.inner.is_some()
    }

    async fn find_by_id(
        &self,
        id: &str,
    ) -> Result<Option<(RowPosition, EntryRecord)>, StoreError> {
        let connected = self.connected()?;
        if id.trim().is_empty() {
            return Ok(None);
        }

        for (index, row) in connected.data_rows().await?.iter().enumerate() {
            if row.first().map(String::as_str) != Some(id) {
                continue;
            }
            let position = RowPosition(index + 2);
            let record = parse_row(row).map_err(|reason| {
                StoreError::BadResponse(format!("row {position} is not a valid entry: {reason}"))
            })?;
            return Ok(Some((position, record)));
        }
        Ok(None)
    }

    async fn append(&self, records: &[EntryRecord]) -> Result<(), StoreError> {
        let connected = self.connected()?;
        if records.is_empty() {
            return Ok(());
        }
        let rows: Vec<Vec<String>> = records
            .iter()
            .map(|record| Column::ORDER.iter().map(|column| record.cell(*column)).collect())
            .collect();
        connected.client.append_rows(&connected.range("A1:G"), rows).await
    }

    async fn update_cells(
        &self,
        position: RowPosition,
        changes: &[(Column, String)],
    ) -> Result<(), StoreError> {
        let connected = self.connected()?;
        if position.0 < 2 {
            return Err(StoreError::RowOutOfRange(position));
        }
        if changes.is_empty() {
            return Ok(());
        }
        let data = changes
            .iter()
            .map(|(column, value)| {
                let cell = format!("{}{}", column_letter(*column), position.0);
                (connected.range(&cell), vec![vec![value.clone()]])
            })
            .collect();
        connected.client.update_values(data).await
    }

    async fn delete(&self, position: RowPosition) -> Result<(), StoreError> {
        let connected = self.connected()?;
        if position.0 < 2 {
            return Err(StoreError::RowOutOfRange(position));
        }
        connected.client.delete_row(connected.grid_id, position.0).await
    }

    async fn get_all(&self) -> Result<Vec<EntryRecord>, StoreError> {
        let connected = self.connected()?;
        let mut records = Vec::new();
        for (index, row) in connected.data_rows().await?.iter().enumerate() {
            match parse_row(row) {
                Ok(record) => records.push(record),
                Err(reason) => {
                    warn!(row = index + 2, reason, "skipping malformed sheet row");
                }
            }
        }
        Ok(records)
    }
}

fn column_letter(column: Column) -> char {
    let index = Column::ORDER
        .iter()
        .position(|candidate| *candidate == column)
        .unwrap_or_default() as u8;
    (b'A' + index) as char
}

fn parse_row(row: &[String]) -> Result<EntryRecord, &'static str> {
    let cell = |column: Column| -> &str {
        let index = Column::ORDER.iter().position(|c| *c == column).unwrap_or_default();
        row.get(index).map(String::as_str).unwrap_or("")
    };

    let id = cell(Column::Id).trim();
    if id.is_empty() {
        return Err("missing id");
    }
    let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(cell(Column::Timestamp).trim())
        .map_err(|_| "bad timestamp")?
        .with_timezone(&Utc);
    let price: Decimal =
        cell(Column::Price).trim().replace(',', "").parse().map_err(|_| "bad price")?;

    Ok(EntryRecord {
        id: id.to_owned(),
        timestamp,
        submitted_by: cell(Column::SubmittedBy).to_owned(),
        product: cell(Column::Product).to_owned(),
        price,
        location: cell(Column::Location).to_owned(),
        remark: cell(Column::Remark).to_owned(),
    })
}
