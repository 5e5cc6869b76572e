// =============================================================================
// GOOGLE SHEETS CLIENT WITH SERVICE ACCOUNT AUTHENTICATION
// =============================================================================
//
// Thin client over the Sheets v4 REST API. The bot both reads the practice
// log and writes its own `logs`/`agent_state` worksheets, so the spreadsheet
// must be shared with the service account email with Editor access.
//
// **Environment Variables:**
// - `GOOGLE_SERVICE_ACCOUNT_KEY` - Path to the service account JSON key file
// - `GOOGLE_SERVICE_ACCOUNT_JSON` - The JSON content directly (for deployment)

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

type ClientError = Box<dyn Error + Send + Sync>;

// =============================================================================
// SERVICE ACCOUNT AUTHENTICATION
// =============================================================================

/// Service account credentials from the JSON key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    /// The service account email (used as issuer in the JWT).
    client_email: String,

    /// The private key in PEM format.
    private_key: String,

    /// Where to exchange the JWT for an access token.
    token_uri: String,
}

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

/// Handles the OAuth2 JWT-bearer grant and caches the resulting token.
pub struct ServiceAccountAuth {
    credentials: ServiceAccountCredentials,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl ServiceAccountAuth {
    pub async fn from_file(path: &str) -> Result<Self, ClientError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ClientError> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(json)?;
        Ok(Self {
            credentials,
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Key file path takes precedence over inline JSON.
    pub async fn from_env() -> Result<Self, ClientError> {
        if let Ok(path) = std::env::var("GOOGLE_SERVICE_ACCOUNT_KEY") {
            return Self::from_file(&path).await;
        }

        if let Ok(json) = std::env::var("GOOGLE_SERVICE_ACCOUNT_JSON") {
            return Self::from_json(&json);
        }

        Err("Neither GOOGLE_SERVICE_ACCOUNT_KEY nor GOOGLE_SERVICE_ACCOUNT_JSON is set.".into())
    }

    /// Gets a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String, ClientError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + Duration::from_secs(60) {
                    return Ok(token.token.clone());
                }
            }
        }

        let new_token = self.fetch_new_token().await?;

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(CachedToken {
                token: new_token.clone(),
                // Tokens live an hour; refresh a little early.
                expires_at: SystemTime::now() + Duration::from_secs(55 * 60),
            });
        }

        Ok(new_token)
    }

    async fn fetch_new_token(&self) -> Result<String, ClientError> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

        let claims = JwtClaims {
            iss: self.credentials.client_email.clone(),
            scope: SHEETS_SCOPE.to_string(),
            aud: self.credentials.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())?;
        let jwt = encode(&header, &claims, &key)?;

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(format!("Token exchange failed ({}): {}", status, text).into());
        }

        let token_response: TokenResponse = response.json().await?;
        Ok(token_response.access_token)
    }
}

// =============================================================================
// SHEETS API RESPONSE STRUCTURES
// =============================================================================

/// `values.get` response. With the default FORMATTED_VALUE render option
/// every cell arrives as a string, which is exactly what the aggregator
/// wants to parse itself.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

// =============================================================================
// SHEETS CLIENT
// =============================================================================

pub struct SheetsClient {
    client: Client,
    auth: ServiceAccountAuth,
}

impl SheetsClient {
    pub fn new(auth: ServiceAccountAuth) -> Self {
        Self {
            client: Client::new(),
            auth,
        }
    }

    /// A1 range scoped to a worksheet, quoted so titles with spaces work.
    pub fn range(worksheet: &str, cells: &str) -> String {
        format!("'{}'!{}", worksheet, cells)
    }

    /// Titles of all worksheets in the spreadsheet, in sheet order.
    pub async fn sheet_titles(&self, spreadsheet_id: &str) -> Result<Vec<String>, ClientError> {
        let token = self.auth.get_access_token().await?;
        let url = format!(
            "{}/{}?fields=sheets.properties.title",
            SHEETS_API, spreadsheet_id
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;
        let meta: SpreadsheetMeta = Self::check(response).await?.json().await?;

        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    /// Reads a range as rows of formatted cell strings. Trailing empty cells
    /// and rows are simply absent from the response.
    pub async fn read_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, ClientError> {
        let token = self.auth.get_access_token().await?;
        let url = format!("{}/{}/values/{}", SHEETS_API, spreadsheet_id, range);

        tracing::debug!("Sheets read: {}", range);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;
        let values: ValueRange = Self::check(response).await?.json().await?;

        Ok(values.values)
    }

    /// Appends one row after the last row of data in the worksheet.
    pub async fn append_row(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        row: &[String],
    ) -> Result<(), ClientError> {
        let token = self.auth.get_access_token().await?;
        let range = Self::range(worksheet, "A1");
        let url = format!(
            "{}/{}/values/{}:append?valueInputOption=USER_ENTERED",
            SHEETS_API, spreadsheet_id, range
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .json(&json!({ "values": [row] }))
            .send()
            .await?;
        Self::check(response).await?;

        Ok(())
    }

    /// Overwrites an exact range with the given rows.
    pub async fn update_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), ClientError> {
        let token = self.auth.get_access_token().await?;
        let url = format!(
            "{}/{}/values/{}?valueInputOption=USER_ENTERED",
            SHEETS_API, spreadsheet_id, range
        );

        let response = self
            .client
            .put(&url)
            .header("Authorization", format!("Bearer {}", token))
            .json(&json!({ "range": range, "values": rows }))
            .send()
            .await?;
        Self::check(response).await?;

        Ok(())
    }

    /// Adds a new worksheet to the spreadsheet.
    pub async fn add_worksheet(
        &self,
        spreadsheet_id: &str,
        title: &str,
        rows: u32,
        cols: u32,
    ) -> Result<(), ClientError> {
        let token = self.auth.get_access_token().await?;
        let url = format!("{}/{}:batchUpdate", SHEETS_API, spreadsheet_id);

        tracing::info!("Creating worksheet '{}'", title);

        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": title,
                        "gridProperties": { "rowCount": rows, "columnCount": cols }
                    }
                }
            }]
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;

        Ok(())
    }

    /// Surfaces non-2xx responses with status and body, the way every other
    /// API client in this codebase does.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(format!("Sheets API error ({}): {}", status, text).into())
    }
}
