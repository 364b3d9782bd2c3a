//! Google Sheets v4 `values` API backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{RangeUpdate, TabularStore};
use crate::error::StoreError;
use crate::sheet::A1Range;

pub const DEFAULT_SHEETS_ENDPOINT: &str = "https://sheets.googleapis.com/v4";

const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeInput<'a> {
    range: String,
    major_dimension: &'static str,
    values: &'a [Vec<String>],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateRequest<'a> {
    value_input_option: &'static str,
    data: Vec<ValueRangeInput<'a>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateResponse {
    #[serde(default)]
    total_updated_cells: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    updates: UpdatedRange,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatedRange {
    #[serde(default)]
    updated_range: String,
}

/// A spreadsheet document reached over HTTPS with a bearer token.
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    access_token: String,
}

impl SheetsClient {
    pub fn new(endpoint: &str, spreadsheet_id: &str, access_token: &str) -> Self {
        SheetsClient {
            http: reqwest::Client::new(),
            base_url: endpoint.trim().trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn values_url(&self, range: &A1Range, suffix: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}{}",
            self.base_url,
            urlencoding::encode(&self.spreadsheet_id),
            urlencoding::encode(&range.to_string()),
            suffix
        )
    }

    fn batch_url(&self) -> String {
        format!(
            "{}/spreadsheets/{}/values:batchUpdate",
            self.base_url,
            urlencoding::encode(&self.spreadsheet_id)
        )
    }

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, StoreError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(StoreError::Api {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl TabularStore for SheetsClient {
    async fn read_range(&self, range: &A1Range) -> Result<Vec<Vec<String>>, StoreError> {
        let response = self
            .http
            .get(self.values_url(range, ""))
            .query(&[("valueRenderOption", "FORMATTED_VALUE")])
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let body: ValueRange = Self::handle_response(response).await?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn write_range(
        &self,
        range: &A1Range,
        values: Vec<Vec<String>>,
    ) -> Result<(), StoreError> {
        let body = ValueRangeInput {
            range: range.to_string(),
            major_dimension: "ROWS",
            values: &values,
        };
        let response = self
            .http
            .put(self.values_url(range, ""))
            .query(&[("valueInputOption", VALUE_INPUT_OPTION)])
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        let _: serde_json::Value = Self::handle_response(response).await?;
        Ok(())
    }

    async fn batch_write(&self, updates: Vec<RangeUpdate>) -> Result<usize, StoreError> {
        let body = BatchUpdateRequest {
            value_input_option: VALUE_INPUT_OPTION,
            data: updates
                .iter()
                .map(|update| ValueRangeInput {
                    range: update.range.to_string(),
                    major_dimension: "ROWS",
                    values: &update.values,
                })
                .collect(),
        };
        let response = self
            .http
            .post(self.batch_url())
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        let reply: BatchUpdateResponse = Self::handle_response(response).await?;
        Ok(reply.total_updated_cells)
    }

    async fn append_rows(
        &self,
        range: &A1Range,
        rows: Vec<Vec<String>>,
    ) -> Result<(), StoreError> {
        let body = ValueRangeInput {
            range: range.to_string(),
            major_dimension: "ROWS",
            values: &rows,
        };
        let response = self
            .http
            .post(self.values_url(range, ":append"))
            .query(&[("valueInputOption", VALUE_INPUT_OPTION)])
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        let reply: AppendResponse = Self::handle_response(response).await?;
        match reply.updates.updated_range.parse::<A1Range>() {
            Ok(landed) => log::debug!("appended {} rows at {}", rows.len(), landed),
            Err(_) => log::debug!("appended {} rows to {}", rows.len(), range),
        }
        Ok(())
    }
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
