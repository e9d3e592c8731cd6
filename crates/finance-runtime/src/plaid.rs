//! Plaid Bank Aggregator
//!
//! Implementation of `BankAggregator` against Plaid's JSON API. Every call
//! is a POST carrying `client_id` and `secret` in the body.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use finance_core::{
    aggregator::{BankAggregator, DateRange, Pagination, RawTransaction, TransactionPage},
    error::{FinanceError, Result},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

const SERVICE: &str = "Plaid";

/// Plaid error code for items whose transactions are still being prepared
pub const PRODUCT_NOT_READY: &str = "PRODUCT_NOT_READY";

/// Sandbox institution used by the sync harness
pub const SANDBOX_INSTITUTION: &str = "ins_109508";

/// Plaid deployment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaidEnvironment {
    #[default]
    Sandbox,
    Development,
    Production,
}

impl PlaidEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            PlaidEnvironment::Sandbox => "https://sandbox.plaid.com",
            PlaidEnvironment::Development => "https://development.plaid.com",
            PlaidEnvironment::Production => "https://production.plaid.com",
        }
    }
}

impl FromStr for PlaidEnvironment {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sandbox" => Ok(PlaidEnvironment::Sandbox),
            "development" => Ok(PlaidEnvironment::Development),
            "production" => Ok(PlaidEnvironment::Production),
            other => Err(FinanceError::Configuration(format!("unknown PLAID_ENV: {other}"))),
        }
    }
}

/// Plaid client configuration
#[derive(Clone, Debug)]
pub struct PlaidConfig {
    pub base_url: String,
    pub client_id: String,
    pub secret: String,

    /// Shown in the account linking widget
    pub client_name: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl PlaidConfig {
    pub fn new(
        client_id: impl Into<String>,
        secret: impl Into<String>,
        environment: PlaidEnvironment,
    ) -> Self {
        Self {
            base_url: environment.base_url().into(),
            client_id: client_id.into(),
            secret: secret.into(),
            client_name: "NeoFinance".into(),
            timeout_secs: 120,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("PLAID_CLIENT_ID")
            .map_err(|_| FinanceError::Configuration("PLAID_CLIENT_ID not set".into()))?;
        let secret = std::env::var("PLAID_SECRET")
            .map_err(|_| FinanceError::Configuration("PLAID_SECRET not set".into()))?;
        let environment = match std::env::var("PLAID_ENV") {
            Ok(env) if !env.trim().is_empty() => env.parse()?,
            _ => PlaidEnvironment::default(),
        };

        let mut config = Self::new(client_id, secret, environment);
        if let Ok(base_url) = std::env::var("PLAID_BASE_URL") {
            config.base_url = base_url;
        }
        let timeout = std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|t| t.parse().ok());
        if let Some(timeout) = timeout {
            config.timeout_secs = timeout;
        }
        Ok(config)
    }
}

/// Request body with credentials prepended
#[derive(Serialize)]
struct Authed<'a, B> {
    client_id: &'a str,
    secret: &'a str,
    #[serde(flatten)]
    body: B,
}

/// Error body Plaid sends with non-2xx responses
#[derive(Debug, Deserialize)]
struct PlaidErrorBody {
    #[serde(default)]
    error_type: String,
    error_code: String,
    #[serde(default)]
    error_message: String,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Serialize)]
struct LinkTokenUser<'a> {
    client_user_id: &'a str,
}

#[derive(Serialize)]
struct LinkTokenCreate<'a> {
    client_name: &'a str,
    language: &'a str,
    country_codes: [&'a str; 1],
    user: LinkTokenUser<'a>,
    products: [&'a str; 1],
}

#[derive(Deserialize)]
struct LinkTokenResponse {
    link_token: String,
}

#[derive(Serialize)]
struct SandboxPublicTokenCreate<'a> {
    institution_id: &'a str,
    initial_products: [&'a str; 1],
}

#[derive(Deserialize)]
struct PublicTokenResponse {
    public_token: String,
}

#[derive(Serialize)]
struct PublicTokenExchange<'a> {
    public_token: &'a str,
}

#[derive(Deserialize)]
struct ExchangeResponse {
    access_token: String,
    #[serde(default)]
    item_id: Option<String>,
}

#[derive(Serialize)]
struct TransactionsGet<'a> {
    access_token: &'a str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    options: Pagination,
}

#[derive(Deserialize)]
struct TransactionsResponse {
    transactions: Vec<RawTransaction>,
    #[serde(default)]
    total_transactions: Option<u32>,
}

/// Plaid API client
pub struct PlaidClient {
    client: reqwest::Client,
    config: PlaidConfig,
}

impl PlaidClient {
    pub fn new(config: PlaidConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FinanceError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(PlaidConfig::from_env()?)
    }

    async fn post<B, R>(&self, path: &str, body: B) -> Result<R>
    where
        B: Serialize + Send,
        R: DeserializeOwned,
    {
        let request = Authed {
            client_id: &self.config.client_id,
            secret: &self.config.secret,
            body,
        };

        let response = self
            .client
            .post(format!("{}{path}", self.config.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| FinanceError::upstream(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &text));
        }

        response
            .json()
            .await
            .map_err(|e| FinanceError::upstream(SERVICE, format!("parse {path} response: {e}")))
    }
}

/// Turn a failed response into an error, keeping Plaid's own code
fn classify_error(status: reqwest::StatusCode, text: &str) -> FinanceError {
    match serde_json::from_str::<PlaidErrorBody>(text) {
        Ok(body) if body.error_code == PRODUCT_NOT_READY => {
            FinanceError::ProductNotReady(body.error_message)
        }
        Ok(body) => FinanceError::upstream(
            SERVICE,
            format!(
                "{status} {}/{}: {} (request {})",
                body.error_type,
                body.error_code,
                body.error_message,
                body.request_id.as_deref().unwrap_or("-")
            ),
        ),
        Err(_) => FinanceError::upstream(SERVICE, format!("{status} {text}")),
    }
}

#[async_trait]
impl BankAggregator for PlaidClient {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn create_link_token(&self, client_user_id: &str) -> Result<String> {
        let body = LinkTokenCreate {
            client_name: &self.config.client_name,
            language: "en",
            country_codes: ["US"],
            user: LinkTokenUser { client_user_id },
            products: ["transactions"],
        };
        let response: LinkTokenResponse = self.post("/link/token/create", body).await?;
        Ok(response.link_token)
    }

    async fn create_sandbox_public_token(&self, institution_id: &str) -> Result<String> {
        let body = SandboxPublicTokenCreate {
            institution_id,
            initial_products: ["transactions"],
        };
        let response: PublicTokenResponse = self.post("/sandbox/public_token/create", body).await?;
        Ok(response.public_token)
    }

    async fn exchange_public_token(&self, public_token: &str) -> Result<String> {
        let response: ExchangeResponse = self
            .post("/item/public_token/exchange", PublicTokenExchange { public_token })
            .await?;
        tracing::info!(item_id = ?response.item_id, "Exchanged public token");
        Ok(response.access_token)
    }

    async fn fetch_transactions(
        &self,
        access_token: &str,
        range: DateRange,
        page: Pagination,
    ) -> Result<TransactionPage> {
        let body = TransactionsGet {
            access_token,
            start_date: range.start,
            end_date: range.end,
            options: page,
        };
        let response: TransactionsResponse = self.post("/transactions/get", body).await?;
        Ok(TransactionPage {
            transactions: response.transactions,
            total_transactions: response.total_transactions,
        })
    }
}
