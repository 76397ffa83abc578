//! Google Sheets v4 client
//!
//! Only the two calls the Sheets connector needs: reading a range of values
//! and applying a batch of update requests. Request bodies are plain serde
//! types mirroring the REST resources.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::http::{read_json, HttpError};

pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4/";

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("Range {range} contains no values")]
    EmptyRange { range: String },
}

impl From<reqwest::Error> for SheetsError {
    fn from(e: reqwest::Error) -> Self {
        SheetsError::Http(HttpError::Transport(e))
    }
}

impl From<url::ParseError> for SheetsError {
    fn from(e: url::ParseError) -> Self {
        SheetsError::Http(HttpError::Url(e))
    }
}

/// `spreadsheets.values` resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub major_dimension: Option<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

impl ValueRange {
    /// The first value of the first row, if the range holds any.
    pub fn first_value(&self) -> Option<&Value> {
        self.values.first().and_then(|row| row.first())
    }
}

/// Value of a cell as entered by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtendedValue {
    StringValue(String),
    NumberValue(f64),
    BoolValue(bool),
    FormulaValue(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellData {
    pub user_entered_value: ExtendedValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowData {
    pub values: Vec<CellData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCoordinate {
    pub sheet_id: i32,
    pub row_index: i32,
    pub column_index: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCellsRequest {
    pub start: GridCoordinate,
    pub rows: Vec<RowData>,
    pub fields: String,
}

/// One entry of a batch update. Only cell updates are used here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Request {
    UpdateCells(UpdateCellsRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateRequest {
    pub requests: Vec<Request>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateResponse {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub replies: Vec<Value>,
}

/// A batch holding a single update of one cell, overwriting every field of
/// the cell with a string value.
pub fn update_cell_request(sheet_id: i32, row: i32, column: i32, value: &str) -> BatchUpdateRequest {
    BatchUpdateRequest {
        requests: vec![Request::UpdateCells(UpdateCellsRequest {
            start: GridCoordinate {
                sheet_id,
                row_index: row,
                column_index: column,
            },
            rows: vec![RowData {
                values: vec![CellData {
                    user_entered_value: ExtendedValue::StringValue(value.to_string()),
                }],
            }],
            fields: "*".to_string(),
        })],
    }
}

#[async_trait]
pub trait SpreadsheetService {
    async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<ValueRange, SheetsError>;

    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        request: &BatchUpdateRequest,
    ) -> Result<BatchUpdateResponse, SheetsError>;
}

/// Sheets client bound to one access token.
pub struct SheetsClient {
    client: Client,
    base_url: Url,
    access_token: String,
}

impl SheetsClient {
    pub fn new(client: Client, access_token: impl Into<String>) -> Result<Self, SheetsError> {
        Self::with_base_url(client, access_token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        client: Client,
        access_token: impl Into<String>,
        base_url: &str,
    ) -> Result<Self, SheetsError> {
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            access_token: access_token.into(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, SheetsError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| HttpError::Decode(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl SpreadsheetService for SheetsClient {
    #[instrument(skip(self))]
    async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<ValueRange, SheetsError> {
        let url = self.endpoint(&["spreadsheets", spreadsheet_id, "values", range])?;
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        Ok(read_json(response).await?)
    }

    #[instrument(skip(self, request))]
    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        request: &BatchUpdateRequest,
    ) -> Result<BatchUpdateResponse, SheetsError> {
        let url = self.endpoint(&["spreadsheets", &format!("{}:batchUpdate", spreadsheet_id)])?;
        debug!("POST {} ({} requests)", url, request.requests.len());
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await?;
        Ok(read_json(response).await?)
    }
}
