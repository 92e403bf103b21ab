//! Thin Google Sheets v4 REST client. Only the handful of calls the
//! adapter needs: value reads, appends, batched cell writes, row deletes
//! and the spreadsheet metadata lookup that resolves a worksheet's grid id.

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use pricelog_core::config::SheetsConfig;
use pricelog_core::store::StoreError;

pub struct SheetsClient {
    http: Client,
    api_base: String,
    spreadsheet_id: String,
    api_token: Option<SecretString>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorksheetProperties {
    pub grid_id: i64,
    pub title: String,
}

impl SheetsClient {
    pub fn new(config: &SheetsConfig) -> Self {
        Self {
            http: Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            api_token: config.api_token.clone(),
        }
    }

    /// Worksheet list in spreadsheet order.
    pub async fn worksheets(&self) -> Result<Vec<WorksheetProperties>, StoreError> {
        let url = format!(
            "{}/v4/spreadsheets/{}?fields=sheets.properties",
            self.api_base, self.spreadsheet_id
        );
        let metadata: SpreadsheetMetadata = self.execute(self.request(Method::GET, &url)).await?;
        Ok(metadata
            .sheets
            .into_iter()
            .map(|sheet| WorksheetProperties {
                grid_id: sheet.properties.sheet_id,
                title: sheet.properties.title,
            })
            .collect())
    }

    /// Rows within an A1 range. Trailing empty cells are absent from the
    /// API response, so callers must treat short rows as padded with "".
    pub async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.api_base,
            self.spreadsheet_id,
            encode_range(range)
        );
        let body: ValueRange = self.execute(self.request(Method::GET, &url)).await?;
        Ok(body.values.unwrap_or_default().into_iter().map(stringify_row).collect())
    }

    pub async fn append_rows(
        &self,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), StoreError> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
            self.api_base,
            self.spreadsheet_id,
            encode_range(range)
        );
        debug!(range, rows = rows.len(), "appending rows");
        let request = self.request(Method::POST, &url).json(&AppendBody { values: rows });
        self.execute::<Value>(request).await?;
        Ok(())
    }

    /// Writes several ranges in one request.
    pub async fn update_values(
        &self,
        data: Vec<(String, Vec<Vec<String>>)>,
    ) -> Result<(), StoreError> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values:batchUpdate",
            self.api_base, self.spreadsheet_id
        );
        let body = BatchUpdateValuesBody {
            value_input_option: "USER_ENTERED",
            data: data
                .into_iter()
                .map(|(range, values)| RangeValues { range, values })
                .collect(),
        };
        let request = self.request(Method::POST, &url).json(&body);
        self.execute::<Value>(request).await?;
        Ok(())
    }

    /// Removes one row from the grid; rows below shift up.
    pub async fn delete_row(&self, grid_id: i64, row: usize) -> Result<(), StoreError> {
        let url =
            format!("{}/v4/spreadsheets/{}:batchUpdate", self.api_base, self.spreadsheet_id);
        let body = BatchUpdateSpreadsheetBody {
            requests: vec![SheetRequest {
                delete_dimension: DeleteDimension {
                    range: DimensionRange {
                        sheet_id: grid_id,
                        dimension: "ROWS",
                        start_index: row - 1,
                        end_index: row,
                    },
                },
            }],
        };
        debug!(grid_id, row, "deleting row");
        let request = self.request(Method::POST, &url).json(&body);
        self.execute::<Value>(request).await?;
        Ok(())
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut builder = self.http.request(method, url);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        builder
    }

    async fn execute<T>(&self, request: RequestBuilder) -> Result<T, StoreError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .map_err(|error| StoreError::Request(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(request_failure(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|error| StoreError::BadResponse(error.to_string()))
    }
}

fn request_failure(status: StatusCode, body: &str) -> StoreError {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| body.to_owned());
    StoreError::Request(format!("sheets api returned {status}: {detail}"))
}

/// A1 ranges travel in the URL path; the worksheet title may contain
/// spaces and the quoting apostrophes must survive.
fn encode_range(range: &str) -> String {
    range.replace('%', "%25").replace(' ', "%20").replace('#', "%23")
}

fn stringify_row(row: Vec<Value>) -> Vec<String> {
    row.into_iter()
        .map(|cell| match cell {
            Value::String(text) => text,
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetPropertiesBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetPropertiesBody {
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    values: Option<Vec<Vec<Value>>>,
}

#[derive(Debug, Serialize)]
struct AppendBody {
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateValuesBody {
    value_input_option: &'static str,
    data: Vec<RangeValues>,
}

#[derive(Debug, Serialize)]
struct RangeValues {
    range: String,
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct BatchUpdateSpreadsheetBody {
    requests: Vec<SheetRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SheetRequest {
    delete_dimension: DeleteDimension,
}

#[derive(Debug, Serialize)]
struct DeleteDimension {
    range: DimensionRange,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DimensionRange {
    sheet_id: i64,
    dimension: &'static str,
    start_index: usize,
    end_index: usize,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{encode_range, request_failure, stringify_row};
    use pricelog_core::store::StoreError;

    #[test]
    fn ranges_survive_worksheet_titles_with_spaces() {
        assert_eq!(encode_range("'Price Log'!A2:G"), "'Price%20Log'!A2:G");
        assert_eq!(encode_range("Sheet1!A1:G1"), "Sheet1!A1:G1");
    }

    #[test]
    fn numeric_cells_are_rendered_as_text() {
        let row: Vec<Value> = vec![json!("abc"), json!(12.5), json!(true), Value::Null];
        assert_eq!(stringify_row(row), vec!["abc", "12.5", "true", ""]);
    }

    #[test]
    fn api_error_messages_are_surfaced() {
        let body = r#"{"error":{"code":403,"message":"The caller does not have permission"}}"#;
        let error = request_failure(reqwest::StatusCode::FORBIDDEN, body);
        match error {
            StoreError::Request(message) => {
                assert!(message.contains("403"));
                assert!(message.contains("does not have permission"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
