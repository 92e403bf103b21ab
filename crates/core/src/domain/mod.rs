pub mod catalog;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Chat-scoped user identity. The Telegram transport renders the chat id
/// into this; the engine treats it as opaque.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// One logged price observation. Maps one-to-one onto a sheet row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub submitted_by: String,
    pub product: String,
    pub price: Decimal,
    pub location: String,
    pub remark: String,
}

impl EntryRecord {
    pub fn new(
        submitted_by: impl Into<String>,
        product: impl Into<String>,
        price: Decimal,
        location: impl Into<String>,
        remark: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            submitted_by: submitted_by.into(),
            product: product.into(),
            price,
            location: location.into(),
            remark: remark.into(),
        }
    }

    /// Cell value for a column, rendered the way it is written to the sheet.
    pub fn cell(&self, column: Column) -> String {
        match column {
            Column::Id => self.id.clone(),
            Column::Timestamp => self.timestamp.to_rfc3339(),
            Column::SubmittedBy => self.submitted_by.clone(),
            Column::Product => self.product.clone(),
            Column::Price => self.price.to_string(),
            Column::Location => self.location.clone(),
            Column::Remark => self.remark.clone(),
        }
    }

    pub fn field_value(&self, key: FieldKey) -> String {
        self.cell(key.column())
    }
}

/// Physical column layout of the backing sheet, in write order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Id,
    Timestamp,
    SubmittedBy,
    Product,
    Price,
    Location,
    Remark,
}

impl Column {
    pub const ORDER: [Column; 7] = [
        Column::Id,
        Column::Timestamp,
        Column::SubmittedBy,
        Column::Product,
        Column::Price,
        Column::Location,
        Column::Remark,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Timestamp => "timestamp",
            Column::SubmittedBy => "submitted_by",
            Column::Product => "product",
            Column::Price => "price",
            Column::Location => "location",
            Column::Remark => "remark",
        }
    }

    pub fn from_header(header: &str) -> Option<Column> {
        Self::ORDER.into_iter().find(|column| column.header() == header.trim())
    }
}

/// The columns a user may edit after submission, in the order they are
/// offered and prompted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKey {
    Product,
    Price,
    Location,
    Remark,
}

impl FieldKey {
    pub const DISPLAY_ORDER: [FieldKey; 4] =
        [FieldKey::Product, FieldKey::Price, FieldKey::Location, FieldKey::Remark];

    pub fn column(self) -> Column {
        match self {
            FieldKey::Product => Column::Product,
            FieldKey::Price => Column::Price,
            FieldKey::Location => Column::Location,
            FieldKey::Remark => Column::Remark,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FieldKey::Product => "Product",
            FieldKey::Price => "Price",
            FieldKey::Location => "Location",
            FieldKey::Remark => "Remark",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            FieldKey::Product => "product",
            FieldKey::Price => "price",
            FieldKey::Location => "location",
            FieldKey::Remark => "remark",
        }
    }

    pub fn from_slug(slug: &str) -> Option<FieldKey> {
        Self::DISPLAY_ORDER.into_iter().find(|key| key.slug() == slug)
    }
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum PriceError {
    #[error("price is not a number")]
    NotANumber,
    #[error("price must be greater than zero")]
    NotPositive,
}

/// Parse a user-typed price. Thousands separators are tolerated; zero and
/// negative amounts are rejected.
pub fn parse_price(input: &str) -> Result<Decimal, PriceError> {
    let cleaned = input.trim().replace(',', "");
    let value: Decimal = cleaned.parse().map_err(|_| PriceError::NotANumber)?;
    if value <= Decimal::ZERO {
        return Err(PriceError::NotPositive);
    }
    Ok(value.normalize())
}

#[cfg(test)]
mod tests {
    use super::{parse_price, Column, EntryRecord, FieldKey, PriceError};
    use rust_decimal::Decimal;

    #[test]
    fn parse_price_accepts_decimals_and_thousands_separators() {
        assert_eq!(parse_price("120.50"), Ok(Decimal::new(1205, 1)));
        assert_eq!(parse_price(" 1,250 "), Ok(Decimal::new(1250, 0)));
    }

    #[test]
    fn parse_price_rejects_zero_negative_and_garbage() {
        assert_eq!(parse_price("0"), Err(PriceError::NotPositive));
        assert_eq!(parse_price("-3"), Err(PriceError::NotPositive));
        assert_eq!(parse_price("cheap"), Err(PriceError::NotANumber));
        assert_eq!(parse_price(""), Err(PriceError::NotANumber));
    }

    #[test]
    fn new_records_get_distinct_ids() {
        let a = EntryRecord::new("u1", "Carrot", Decimal::ONE, "DC 1", "");
        let b = EntryRecord::new("u1", "Carrot", Decimal::ONE, "DC 1", "");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn column_headers_round_trip() {
        for column in Column::ORDER {
            assert_eq!(Column::from_header(column.header()), Some(column));
        }
        assert_eq!(Column::from_header("unknown"), None);
    }

    #[test]
    fn field_keys_map_onto_columns_in_display_order() {
        let columns: Vec<_> =
            FieldKey::DISPLAY_ORDER.into_iter().map(FieldKey::column).collect();
        assert_eq!(
            columns,
            vec![Column::Product, Column::Price, Column::Location, Column::Remark]
        );
        assert_eq!(FieldKey::from_slug("price"), Some(FieldKey::Price));
        assert_eq!(FieldKey::from_slug("nope"), None);
    }
}
