//! Google Sheets connector
//!
//! Authorizes against Google with the installed-application flow, prints the
//! content of one cell and then overwrites another.

use async_trait::async_trait;
use bookconnect_core::{paths, ClientSecrets, FileTokenStore};
use bookconnect_providers::oauth2::{AuthorizationCodeFlow, AuthorizationPrompt, SPREADSHEETS_SCOPE};
use bookconnect_providers::sheets::{
    update_cell_request, BatchUpdateResponse, SheetsClient, SheetsError, SpreadsheetService,
};
use bookconnect_providers::create_http_client;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

use crate::connector::{resolve, Connector, ConnectorError, ConnectorMetadata};

/// Key of the stored credential in the token store
pub const USER_ID: &str = "testuser";
pub const DEFAULT_APPLICATION_NAME: &str = "Test application";
pub const DEFAULT_SPREADSHEET_ID: &str = "1IP-ALTVvAIWSgMtZtCcRlr268TJjuWLeZVKY0baoDEE";
pub const DEFAULT_RANGE: &str = "A1";
pub const DEFAULT_VALUE: &str = "Lowagie";

/// Cell updates always target the first sheet of the document
const SHEET_ID: i32 = 0;

/// The first value of the first row of `range`.
pub async fn get_cell_content<S: SpreadsheetService + ?Sized>(
    sheets: &S,
    spreadsheet_id: &str,
    range: &str,
) -> Result<Value, SheetsError> {
    let values = sheets.get_values(spreadsheet_id, range).await?;
    values
        .first_value()
        .cloned()
        .ok_or_else(|| SheetsError::EmptyRange {
            range: range.to_string(),
        })
}

/// Writes `value` into one cell of the first sheet in a single batch update.
pub async fn set_cell_content<S: SpreadsheetService + ?Sized>(
    sheets: &S,
    spreadsheet_id: &str,
    value: &str,
    row: i32,
    column: i32,
) -> Result<BatchUpdateResponse, SheetsError> {
    let request = update_cell_request(SHEET_ID, row, column, value);
    sheets.batch_update(spreadsheet_id, &request).await
}

/// Strings print without their JSON quotes.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct GoogleConnector {
    pub application_name: String,
    pub spreadsheet_id: String,
    pub range: String,
    pub value: String,
    pub row: i32,
    pub column: i32,
    root: PathBuf,
}

impl Default for GoogleConnector {
    fn default() -> Self {
        Self {
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            spreadsheet_id: DEFAULT_SPREADSHEET_ID.to_string(),
            range: DEFAULT_RANGE.to_string(),
            value: DEFAULT_VALUE.to_string(),
            row: 0,
            column: 1,
            root: PathBuf::new(),
        }
    }
}

impl GoogleConnector {
    /// Directory the `google/` folder is resolved against.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Reads and writes cells through an already authorized client.
    pub async fn read_and_write<S: SpreadsheetService + ?Sized>(
        &self,
        sheets: &S,
        out: &mut dyn Write,
    ) -> Result<(), ConnectorError> {
        let content = get_cell_content(sheets, &self.spreadsheet_id, &self.range).await?;
        writeln!(out, "{}", display_value(&content))?;

        set_cell_content(sheets, &self.spreadsheet_id, &self.value, self.row, self.column).await?;
        info!(
            "Wrote {:?} to row {}, column {} of {}",
            self.value, self.row, self.column, self.spreadsheet_id
        );
        Ok(())
    }
}

#[async_trait(?Send)]
impl Connector for GoogleConnector {
    type Config = ClientSecrets;
    type Client = SheetsClient;

    fn metadata(&self) -> ConnectorMetadata {
        ConnectorMetadata {
            name: "Google Sheets",
            config_path: resolve(&self.root, paths::google_client_secret()),
        }
    }

    fn load_config(&self) -> Result<ClientSecrets, ConnectorError> {
        Ok(ClientSecrets::load(resolve(&self.root, paths::google_client_secret()))?)
    }

    async fn build_client(
        &self,
        secrets: ClientSecrets,
        prompt: &dyn AuthorizationPrompt,
    ) -> Result<SheetsClient, ConnectorError> {
        let client = create_http_client(&self.application_name)?;
        let store = FileTokenStore::new(resolve(&self.root, paths::google_token_store()));
        let flow = AuthorizationCodeFlow::new(
            client.clone(),
            secrets,
            vec![SPREADSHEETS_SCOPE.to_string()],
            store,
        );

        let credential = flow.authorize(USER_ID, prompt).await?;
        Ok(SheetsClient::new(client, credential.access_token)?)
    }

    async fn invoke(&self, sheets: SheetsClient, out: &mut dyn Write) -> Result<(), ConnectorError> {
        self.read_and_write(&sheets, out).await
    }
}
