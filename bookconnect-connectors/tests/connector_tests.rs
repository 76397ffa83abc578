//! Comprehensive tests for the connectors
//! Invocation against fake services, configuration failures before any
//! network call and the exact console output of every connector.

use async_trait::async_trait;
use bookconnect_connectors::connectors::{google, klout, quotes, twitter};
use bookconnect_connectors::{
    run, ConnectorError, GoogleConnector, KloutConnector, LinkedInConnector, QuotesConnector,
    TwitterConnector,
};
use bookconnect_core::{ConfigError, DatabaseError, Quote, QuoteSource};
use bookconnect_providers::klout::{
    Influence, KloutError, KloutService, Network, Topic, User, UserId,
};
use bookconnect_providers::sheets::{
    BatchUpdateRequest, BatchUpdateResponse, ExtendedValue, Request, SheetsError, SpreadsheetService,
    ValueRange,
};
use bookconnect_providers::twitter::{TwitterError, TwitterService, TwitterUser};
use bookconnect_providers::{AuthorizationPrompt, HttpError};
use serde_json::json;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

/// Fails the test if a connector reaches the interactive step.
struct NoPrompt;

impl AuthorizationPrompt for NoPrompt {
    fn present_url(&self, url: &str) -> io::Result<()> {
        panic!("unexpected authorization prompt for {}", url)
    }

    fn request_code(&self, url: &str) -> io::Result<String> {
        panic!("unexpected authorization prompt for {}", url)
    }
}

fn output(buffer: Vec<u8>) -> String {
    String::from_utf8(buffer).unwrap()
}

// ============================================================================
// Google Sheets
// ============================================================================

struct FakeSheets {
    values: Vec<Vec<serde_json::Value>>,
    fail_updates: bool,
    updates: Mutex<Vec<(String, BatchUpdateRequest)>>,
}

impl FakeSheets {
    fn with_values(values: Vec<Vec<serde_json::Value>>) -> Self {
        Self {
            values,
            fail_updates: false,
            updates: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SpreadsheetService for FakeSheets {
    async fn get_values(&self, _spreadsheet_id: &str, range: &str) -> Result<ValueRange, SheetsError> {
        Ok(ValueRange {
            range: Some(format!("Sheet1!{}", range)),
            major_dimension: Some("ROWS".to_string()),
            values: self.values.clone(),
        })
    }

    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        request: &BatchUpdateRequest,
    ) -> Result<BatchUpdateResponse, SheetsError> {
        if self.fail_updates {
            return Err(SheetsError::Http(HttpError::Api {
                status: 403,
                message: "The caller does not have permission".to_string(),
            }));
        }
        self.updates
            .lock()
            .unwrap()
            .push((spreadsheet_id.to_string(), request.clone()));
        Ok(BatchUpdateResponse {
            spreadsheet_id: Some(spreadsheet_id.to_string()),
            replies: vec![json!({})],
        })
    }
}

#[tokio::test]
async fn test_google_reads_then_writes_lowagie() {
    let sheets = FakeSheets::with_values(vec![vec![json!("Bruno"), json!("ignored")]]);
    let connector = GoogleConnector::default();
    let mut out: Vec<u8> = Vec::new();

    connector.read_and_write(&sheets, &mut out).await.unwrap();
    assert_eq!(output(out), "Bruno\n");

    let updates = sheets.updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    let (spreadsheet_id, request) = &updates[0];
    assert_eq!(spreadsheet_id, google::DEFAULT_SPREADSHEET_ID);
    assert_eq!(request.requests.len(), 1);

    let Request::UpdateCells(update) = &request.requests[0];
    assert_eq!(update.start.sheet_id, 0);
    assert_eq!(update.start.row_index, 0);
    assert_eq!(update.start.column_index, 1);
    assert_eq!(update.fields, "*");
    assert_eq!(update.rows.len(), 1);
    assert_eq!(update.rows[0].values.len(), 1);
    assert_eq!(
        update.rows[0].values[0].user_entered_value,
        ExtendedValue::StringValue("Lowagie".to_string())
    );
}

#[tokio::test]
async fn test_get_cell_content_returns_first_value() {
    let sheets = FakeSheets::with_values(vec![vec![json!(42)], vec![json!("second row")]]);
    let value = google::get_cell_content(&sheets, "sheet", "A1:A2").await.unwrap();
    assert_eq!(value, json!(42));
}

#[tokio::test]
async fn test_get_cell_content_empty_range() {
    let sheets = FakeSheets::with_values(vec![]);
    match google::get_cell_content(&sheets, "sheet", "B7").await {
        Err(SheetsError::EmptyRange { range }) => assert_eq!(range, "B7"),
        other => panic!("Expected EmptyRange error, got {:?}", other),
    }

    // an empty first row is just as empty
    let sheets = FakeSheets::with_values(vec![vec![]]);
    assert!(matches!(
        google::get_cell_content(&sheets, "sheet", "B7").await,
        Err(SheetsError::EmptyRange { .. })
    ));
}

#[tokio::test]
async fn test_google_empty_range_skips_update() {
    let sheets = FakeSheets::with_values(vec![]);
    let mut out: Vec<u8> = Vec::new();
    let result = GoogleConnector::default().read_and_write(&sheets, &mut out).await;

    assert!(matches!(result, Err(ConnectorError::Sheets(SheetsError::EmptyRange { .. }))));
    assert!(out.is_empty());
    assert!(sheets.updates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_google_failing_batch_fails_the_call() {
    let mut sheets = FakeSheets::with_values(vec![vec![json!("Bruno")]]);
    sheets.fail_updates = true;
    let mut out: Vec<u8> = Vec::new();

    let err = GoogleConnector::default()
        .read_and_write(&sheets, &mut out)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("does not have permission"));
    // the read value was printed before the write failed
    assert_eq!(output(out), "Bruno\n");
}

#[tokio::test]
async fn test_set_cell_content_custom_coordinates() {
    let sheets = FakeSheets::with_values(vec![]);
    google::set_cell_content(&sheets, "doc", "value", 4, 2).await.unwrap();

    let updates = sheets.updates.lock().unwrap();
    let Request::UpdateCells(update) = &updates[0].1.requests[0];
    assert_eq!((update.start.sheet_id, update.start.row_index, update.start.column_index), (0, 4, 2));
}

// ============================================================================
// Klout
// ============================================================================

struct FakeKlout;

fn klout_user() -> User {
    serde_json::from_value(json!({
        "kloutId": "635263",
        "nick": "bruno1970",
        "score": {"score": 56.5}
    }))
    .unwrap()
}

#[async_trait]
impl KloutService for FakeKlout {
    async fn user_id_from_twitter_screen_name(&self, screen_name: &str) -> Result<UserId, KloutError> {
        assert_eq!(screen_name, "bruno1970");
        Ok(UserId::klout("635263"))
    }

    async fn user_id_on_network(&self, klout_id: &UserId, network: Network) -> Result<UserId, KloutError> {
        assert_eq!(klout_id.id, "635263");
        Ok(UserId {
            id: "15639238".to_string(),
            network,
        })
    }

    async fn klout_user_id(&self, network_id: &UserId) -> Result<UserId, KloutError> {
        match network_id.network {
            Network::Klout => Ok(network_id.clone()),
            _ => Ok(UserId::klout("635263")),
        }
    }

    async fn user(&self, _klout_id: &UserId) -> Result<User, KloutError> {
        Ok(klout_user())
    }

    async fn influence(&self, _klout_id: &UserId) -> Result<Influence, KloutError> {
        Ok(serde_json::from_value(json!({
            "myInfluencers": [
                {"entity": {"id": "1", "payload": {"kloutId": "1", "nick": "itext", "score": {"score": 61.5}}}},
                {"entity": {"id": "2", "payload": {"kloutId": "2", "nick": "lowagie", "score": {"score": 44.25}}}}
            ],
            "myInfluencees": [
                {"entity": {"id": "3", "payload": {"kloutId": "3", "nick": "directmediatips", "score": {"score": 30.0}}}}
            ]
        }))
        .unwrap())
    }

    async fn topics(&self, _klout_id: &UserId) -> Result<Vec<Topic>, KloutError> {
        Ok(serde_json::from_value(json!([
            {"displayName": "PDF"},
            {"displayName": "Java"}
        ]))
        .unwrap())
    }
}

#[tokio::test]
async fn test_klout_report_output() {
    let mut out: Vec<u8> = Vec::new();
    KloutConnector::default().report(&FakeKlout, &mut out).await.unwrap();

    let expected = format!(
        "635263 (ks)\n15639238 (tw)\n635263 (ks)\n\n{}\n\nInfluencers:\nitext: 61.5\nlowagie: 44.25\n\nInfluencees:\ndirectmediatips: 30\n\nTopics:\nPDF\nJava\n",
        klout_user()
    );
    assert_eq!(output(out), expected);
}

#[tokio::test]
async fn test_klout_resolution_is_idempotent() {
    let mut first: Vec<u8> = Vec::new();
    let mut second: Vec<u8> = Vec::new();
    let a = klout::resolve_user_id(&FakeKlout, "bruno1970", &mut first).await.unwrap();
    let b = klout::resolve_user_id(&FakeKlout, "bruno1970", &mut second).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(first, second);
}

// ============================================================================
// Twitter
// ============================================================================

struct FakeTwitter {
    description: Option<&'static str>,
}

#[async_trait]
impl TwitterService for FakeTwitter {
    async fn current_user_id(&self) -> Result<u64, TwitterError> {
        Ok(370773112)
    }

    async fn show_user(&self, user_id: u64) -> Result<TwitterUser, TwitterError> {
        Ok(TwitterUser {
            id: user_id,
            screen_name: "directmediatips".to_string(),
            name: Some("Direct Media Tips".to_string()),
            description: self.description.map(str::to_string),
        })
    }
}

#[tokio::test]
async fn test_twitter_prints_current_user() {
    let mut out: Vec<u8> = Vec::new();
    let twitter = FakeTwitter {
        description: Some("Tips about direct media"),
    };
    let user = twitter::show_current_user(&twitter, &mut out).await.unwrap();

    assert_eq!(user.id, 370773112);
    assert_eq!(
        output(out),
        "Current id: 370773112\ndirectmediatips: Tips about direct media\n"
    );
}

#[tokio::test]
async fn test_twitter_without_description() {
    let mut out: Vec<u8> = Vec::new();
    twitter::show_current_user(&FakeTwitter { description: None }, &mut out)
        .await
        .unwrap();
    assert_eq!(output(out), "Current id: 370773112\ndirectmediatips: \n");
}

// ============================================================================
// Quotes
// ============================================================================

struct FakeQuotes(Vec<Quote>);

#[async_trait]
impl QuoteSource for FakeQuotes {
    async fn quotes(&self) -> Result<Vec<Quote>, DatabaseError> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn test_quotes_one_line_per_row_in_order() {
    let rows = vec![
        Quote {
            quote: "Simplicity is prerequisite for reliability.".to_string(),
            author: "Edsger W. Dijkstra".to_string(),
        },
        Quote {
            quote: "Talk is cheap. Show me the code.".to_string(),
            author: "Linus Torvalds".to_string(),
        },
        Quote {
            quote: "Premature optimization is the root of all evil.".to_string(),
            author: "Donald Knuth".to_string(),
        },
    ];
    let mut out: Vec<u8> = Vec::new();
    let count = quotes::show_quotes(&FakeQuotes(rows), &mut out).await.unwrap();

    assert_eq!(count, 3);
    assert_eq!(
        output(out),
        "\"Simplicity is prerequisite for reliability.\" - Edsger W. Dijkstra\n\
         \"Talk is cheap. Show me the code.\" - Linus Torvalds\n\
         \"Premature optimization is the root of all evil.\" - Donald Knuth\n"
    );
}

#[tokio::test]
async fn test_quotes_empty_table() {
    let mut out: Vec<u8> = Vec::new();
    let count = quotes::show_quotes(&FakeQuotes(vec![]), &mut out).await.unwrap();
    assert_eq!(count, 0);
    assert!(out.is_empty());
}

// ============================================================================
// Configuration failures happen before any network call
// ============================================================================

fn expect_not_found(result: Result<(), ConnectorError>, expected: &Path) {
    match result {
        Err(ConnectorError::Config(ConfigError::NotFound { path })) => assert_eq!(path, expected),
        other => panic!("Expected NotFound error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_config_files() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let mut out: Vec<u8> = Vec::new();

    expect_not_found(
        run(&TwitterConnector::default().with_root(root), &NoPrompt, &mut out).await,
        &root.join("twitter/directmediatips.properties"),
    );
    expect_not_found(
        run(&LinkedInConnector::default().with_root(root), &NoPrompt, &mut out).await,
        &root.join("linkedin/directmediatips.properties"),
    );
    expect_not_found(
        run(&KloutConnector::default().with_root(root), &NoPrompt, &mut out).await,
        &root.join("klout/klout.properties"),
    );
    expect_not_found(
        run(&GoogleConnector::default().with_root(root), &NoPrompt, &mut out).await,
        &root.join("google/client_secret.json"),
    );
    expect_not_found(
        run(&QuotesConnector::new().with_root(root), &NoPrompt, &mut out).await,
        &root.join("database/database.properties"),
    );

    assert!(out.is_empty());
}

#[tokio::test]
async fn test_empty_config_fails_at_first_key() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("twitter")).unwrap();
    std::fs::write(dir.path().join("twitter/someone.properties"), "").unwrap();

    let mut out: Vec<u8> = Vec::new();
    let result = run(&TwitterConnector::new("someone").with_root(dir.path()), &NoPrompt, &mut out).await;
    match result {
        Err(ConnectorError::Config(ConfigError::MissingKey { key, .. })) => {
            assert_eq!(key, "oauth.consumerKey")
        }
        other => panic!("Expected MissingKey error, got {:?}", other),
    }
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_linkedin_missing_key() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("linkedin")).unwrap();
    std::fs::write(
        dir.path().join("linkedin/directmediatips.properties"),
        "ClientID=78abc\nClientSecret=s3cr3t\nPermissions=r_basicprofile\n",
    )
    .unwrap();

    let result = run(&LinkedInConnector::default().with_root(dir.path()), &NoPrompt, &mut Vec::<u8>::new()).await;
    match result {
        Err(ConnectorError::Config(ConfigError::MissingKey { key, .. })) => assert_eq!(key, "Redirect_URL1"),
        other => panic!("Expected MissingKey error, got {:?}", other),
    }
}
