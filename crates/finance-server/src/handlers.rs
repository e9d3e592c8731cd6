//! HTTP Handlers

use axum::{extract::State, Json};
use chrono::NaiveDate;
use finance_core::{
    aggregator::{DateRange, Pagination},
    analyze_changes, calculate_trends, get_monthly_summary, AdviceRequest, FinanceError,
    IngestionService, MonthlySummary, Transaction, TrendAnalysis, TrendReport,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiError;
use crate::extract::{require, Validate, ValidJson};
use crate::state::AppState;

/// Plaid rejects larger pages
const MAX_PAGE_SIZE: u32 = 500;

/// Link token user when the caller names none
const DEFAULT_CLIENT_USER: &str = "test-user";

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model_configured: bool,
    pub plaid_configured: bool,
    pub cache: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceBody {
    pub user_id: String,
    pub user_input: String,
}

impl Validate for AdviceBody {
    fn validate(&self) -> Result<(), String> {
        require("userId", &self.user_id)?;
        require("userInput", &self.user_input)
    }
}

#[derive(Debug, Serialize)]
pub struct AdviceResponse {
    pub advice: String,
}

#[derive(Debug, Deserialize)]
pub struct LinkTokenBody {
    #[serde(default)]
    pub client_user_id: Option<String>,
}

impl Validate for LinkTokenBody {
    fn validate(&self) -> Result<(), String> {
        self.client_user_id
            .as_deref()
            .map_or(Ok(()), |id| require("client_user_id", id))
    }
}

#[derive(Debug, Serialize)]
pub struct LinkTokenResponse {
    pub link_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeTokenBody {
    pub public_token: String,
}

impl Validate for ExchangeTokenBody {
    fn validate(&self) -> Result<(), String> {
        require("public_token", &self.public_token)
    }
}

#[derive(Debug, Serialize)]
pub struct ExchangeTokenResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsBody {
    pub access_token: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

impl Validate for TransactionsBody {
    fn validate(&self) -> Result<(), String> {
        require("access_token", &self.access_token)?;
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err("`start_date` is after `end_date`".into());
            }
        }
        if let Some(count) = self.count {
            if count == 0 || count > MAX_PAGE_SIZE {
                return Err(format!("`count` must be between 1 and {MAX_PAGE_SIZE}"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub success: bool,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Serialize)]
pub struct TrendsResponse {
    pub months: TrendReport,
    pub analysis: TrendAnalysis,
}

fn ingestion(state: &AppState) -> Result<&Arc<IngestionService>, FinanceError> {
    state
        .ingestion
        .as_ref()
        .ok_or_else(|| FinanceError::Configuration("PLAID_CLIENT_ID / PLAID_SECRET not set".into()))
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider = state.pipeline.provider();
    let model_configured = provider.health_check().await.unwrap_or_else(|e| {
        tracing::warn!("{} health check failed: {}", provider.name(), e);
        false
    });

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model_configured,
        plaid_configured: state.ingestion.is_some(),
        cache: state.pipeline.cache().name().to_string(),
    })
}

/// Budgeting advice for a question about the stored transactions
pub async fn advice_handler(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<AdviceBody>,
) -> Result<Json<AdviceResponse>, ApiError> {
    tracing::info!(user_id = %payload.user_id, "Advice requested");

    let request = AdviceRequest {
        user_id: payload.user_id,
        user_input: payload.user_input,
    };
    let advice = state
        .pipeline
        .advise(&request)
        .await
        .map_err(ApiError::failed("Failed to generate advice"))?;

    tracing::info!(source = ?advice.source, "Advice ready");
    Ok(Json(AdviceResponse { advice: advice.content }))
}

/// Link token for the client-side account linking widget
pub async fn link_token_handler(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LinkTokenBody>,
) -> Result<Json<LinkTokenResponse>, ApiError> {
    let fail = ApiError::failed("Link token creation failed");
    let client_user_id = payload.client_user_id.as_deref().unwrap_or(DEFAULT_CLIENT_USER);
    let link_token = match ingestion(&state) {
        Ok(svc) => svc.aggregator().create_link_token(client_user_id).await,
        Err(e) => Err(e),
    }
    .map_err(fail)?;

    Ok(Json(LinkTokenResponse { link_token }))
}

/// Swap a public token from the linking widget for an access token
pub async fn exchange_token_handler(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<ExchangeTokenBody>,
) -> Result<Json<ExchangeTokenResponse>, ApiError> {
    let fail = ApiError::failed_with_details("Token exchange failed");
    let access_token = match ingestion(&state) {
        Ok(svc) => svc.aggregator().exchange_public_token(&payload.public_token).await,
        Err(e) => Err(e),
    }
    .map_err(fail)?;

    Ok(Json(ExchangeTokenResponse { access_token }))
}

/// Fetch one page of transactions and overwrite the local store with it
pub async fn transactions_handler(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<TransactionsBody>,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let fail = ApiError::failed("Failed to fetch transactions");
    let defaults = &state.config;
    let range = DateRange::new(
        payload.start_date.unwrap_or(defaults.default_range.start),
        payload.end_date.unwrap_or(defaults.default_range.end),
    );
    if range.start > range.end {
        return Err(ApiError::InvalidRequest("date range is empty".into()));
    }
    let page = Pagination::new(
        payload.count.unwrap_or(defaults.page_size),
        payload.offset.unwrap_or(0),
    );

    let transactions = match ingestion(&state) {
        Ok(svc) => svc.fetch_page(&payload.access_token, range, page).await,
        Err(e) => Err(e),
    }
    .map_err(fail)?;

    Ok(Json(TransactionsResponse {
        success: true,
        transactions,
    }))
}

/// Category totals over every stored transaction
pub async fn summary_handler(
    State(state): State<AppState>,
) -> Result<Json<MonthlySummary>, ApiError> {
    let transactions = state
        .store
        .load()
        .await
        .map_err(ApiError::failed("Failed to load transactions"))?;

    Ok(Json(get_monthly_summary(&transactions)))
}

/// Per-month totals and the latest month-over-month change
pub async fn trends_handler(
    State(state): State<AppState>,
) -> Result<Json<TrendsResponse>, ApiError> {
    let transactions = state
        .store
        .load()
        .await
        .map_err(ApiError::failed("Failed to load transactions"))?;

    Ok(Json(TrendsResponse {
        months: calculate_trends(&transactions),
        analysis: analyze_changes(&transactions),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use finance_core::{
        aggregator::{BankAggregator, RawTransaction, TransactionPage},
        provider::{Completion, GenerationOptions, LlmProvider},
        AdviceCache, AdvicePipeline, MemoryCache, MemoryStore, Message, PipelineConfig,
        Result as CoreResult, RetryPolicy, TransactionStore,
    };
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::ServerConfig;

    struct StubProvider {
        configured: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            "Stub"
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn health_check(&self) -> CoreResult<bool> {
            Ok(self.configured)
        }

        async fn complete(
            &self,
            _messages: &[Message],
            options: &GenerationOptions,
        ) -> CoreResult<Completion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Completion {
                content: "Cut back on takeout.".into(),
                model: options.model.clone(),
                usage: None,
            })
        }
    }

    /// Aggregator stub with a queue of page results
    struct StubAggregator {
        pages: Mutex<VecDeque<CoreResult<TransactionPage>>>,
        calls: AtomicUsize,
    }

    impl StubAggregator {
        fn new(pages: Vec<CoreResult<TransactionPage>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl BankAggregator for StubAggregator {
        fn name(&self) -> &str {
            "stub"
        }

        async fn create_link_token(&self, client_user_id: &str) -> CoreResult<String> {
            Ok(format!("link-{client_user_id}"))
        }

        async fn create_sandbox_public_token(&self, _institution_id: &str) -> CoreResult<String> {
            Ok("public-sandbox".into())
        }

        async fn exchange_public_token(&self, public_token: &str) -> CoreResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if public_token == "bad" {
                return Err(FinanceError::upstream("Plaid", "INVALID_PUBLIC_TOKEN"));
            }
            Ok("access-sandbox".into())
        }

        async fn fetch_transactions(
            &self,
            _access_token: &str,
            _range: DateRange,
            _page: Pagination,
        ) -> CoreResult<TransactionPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FinanceError::upstream("Plaid", "no more pages")))
        }
    }

    struct Harness {
        app: Router,
        provider: Arc<StubProvider>,
        aggregator: Arc<StubAggregator>,
        store: Arc<MemoryStore>,
    }

    fn stored() -> Vec<Transaction> {
        let day = |m, d| NaiveDate::from_ymd_opt(2024, m, d).unwrap();
        vec![
            Transaction::new(day(4, 3), "Food", dec!(100)),
            Transaction::new(day(5, 3), "Food", dec!(150)),
            Transaction::new(day(5, 9), "Travel", dec!(40)),
        ]
    }

    fn harness(
        configured: bool,
        pages: Vec<CoreResult<TransactionPage>>,
        with_plaid: bool,
    ) -> Harness {
        let provider = Arc::new(StubProvider {
            configured,
            calls: AtomicUsize::new(0),
        });
        let aggregator = Arc::new(StubAggregator::new(pages));
        let store = Arc::new(MemoryStore::new(stored()));
        let cache: Arc<dyn AdviceCache> = Arc::new(MemoryCache::new());

        let config = PipelineConfig::default();
        let pipeline = AdvicePipeline::new(provider.clone(), cache, store.clone(), config);
        let ingestion = with_plaid.then(|| {
            let svc = IngestionService::new(aggregator.clone(), store.clone());
            Arc::new(svc.with_retry(RetryPolicy::immediate(3)))
        });

        let state = AppState {
            pipeline: Arc::new(pipeline),
            ingestion,
            store: store.clone(),
            config: Arc::new(ServerConfig::default()),
        };

        Harness {
            app: crate::router(state),
            provider,
            aggregator,
            store,
        }
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        call(app, "POST", uri, Some(body)).await
    }

    fn page(n: usize) -> CoreResult<TransactionPage> {
        Ok(TransactionPage {
            transactions: (0..n)
                .map(|i| RawTransaction {
                    transaction_id: Some(format!("t{i}")),
                    date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                    amount: dec!(12.5),
                    category: if i == 0 { Some(vec!["Shops".into()]) } else { None },
                    name: None,
                })
                .collect(),
            total_transactions: Some(u32::try_from(n).unwrap()),
        })
    }

    #[tokio::test]
    async fn test_advice_then_cached() {
        let h = harness(true, vec![], true);
        let body = json!({"userId": "test-user", "userInput": "How are my spending habits?"});

        let (status, value) = post(&h.app, "/advice", body.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value, json!({"advice": "Cut back on takeout."}));

        let (status, _) = post(&h.app, "/advice", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(h.provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_advice_without_model_key() {
        let h = harness(false, vec![], true);
        let body = json!({"userId": "test-user", "userInput": "Anything?"});

        let (status, value) = post(&h.app, "/advice", body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(value["error"], "Failed to generate advice");
        assert_eq!(value["code"], "CONFIGURATION_ERROR");
        assert_eq!(h.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_advice_rejects_bad_bodies() {
        let h = harness(true, vec![], true);

        let (status, value) = post(&h.app, "/advice", json!({"userId": "u"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["code"], "INVALID_REQUEST");

        let (status, _) = post(&h.app, "/advice", json!({"userId": 7, "userInput": "q"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post(&h.app, "/advice", json!({"userId": " ", "userInput": "q"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(h.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exchange_token() {
        let h = harness(true, vec![], true);

        let body = json!({"public_token": "public-1"});
        let (status, value) = post(&h.app, "/plaid/exchange-token", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value, json!({"access_token": "access-sandbox"}));

        let body = json!({"public_token": "bad"});
        let (status, value) = post(&h.app, "/plaid/exchange-token", body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(value["error"], "Token exchange failed");
        assert!(value["details"].as_str().unwrap().contains("INVALID_PUBLIC_TOKEN"));
    }

    #[tokio::test]
    async fn test_transactions_overwrite_store() {
        let h = harness(true, vec![page(2)], true);

        let body = json!({"access_token": "access"});
        let (status, value) = post(&h.app, "/plaid/transactions", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["success"], true);
        assert_eq!(value["transactions"][0]["category"], "Shops");
        assert_eq!(value["transactions"][1]["category"], "Uncategorized");

        let saved = h.store.load().await.unwrap();
        assert_eq!(saved.len(), 2);
    }

    #[tokio::test]
    async fn test_transactions_upstream_failure() {
        let failure = Err(FinanceError::upstream("Plaid", "ITEM_LOGIN_REQUIRED"));
        let h = harness(true, vec![failure], true);

        let body = json!({"access_token": "access"});
        let (status, value) = post(&h.app, "/plaid/transactions", body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(value["error"], "Failed to fetch transactions");
        assert!(value.get("details").is_none());
        assert_eq!(h.store.load().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_transactions_validation() {
        let h = harness(true, vec![page(1)], true);

        let body = json!({
            "access_token": "a",
            "start_date": "2025-01-01",
            "end_date": "2024-01-01"
        });
        let (status, _) = post(&h.app, "/plaid/transactions", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let body = json!({"access_token": "a", "count": 0});
        let (status, _) = post(&h.app, "/plaid/transactions", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(h.aggregator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_plaid_routes_without_credentials() {
        let h = harness(true, vec![], false);

        let body = json!({"public_token": "p"});
        let (status, value) = post(&h.app, "/plaid/exchange-token", body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(value["code"], "CONFIGURATION_ERROR");
        assert_eq!(h.aggregator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_link_token() {
        let h = harness(true, vec![], true);

        let (status, value) = post(&h.app, "/plaid/link-token", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["link_token"], "link-test-user");

        let body = json!({"client_user_id": "alice"});
        let (status, value) = post(&h.app, "/plaid/link-token", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["link_token"], "link-alice");

        let (status, _) = post(&h.app, "/plaid/link-token", json!({"client_user_id": ""})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_insights() {
        let h = harness(true, vec![], true);

        let (status, value) = call(&h.app, "GET", "/insights/summary", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value, json!({"Food": 250.0, "Travel": 40.0}));

        let (status, value) = call(&h.app, "GET", "/insights/trends", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["analysis"]["status"], "changes");
        assert_eq!(value["analysis"]["current_month"], "2024-05");
        assert_eq!(value["analysis"]["changes"], json!({"Food": 50.0}));
        assert_eq!(value["months"]["2024-04"]["Food"], 100.0);
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(false, vec![], false);

        let (status, value) = call(&h.app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["model_configured"], false);
        assert_eq!(value["plaid_configured"], false);
        assert_eq!(value["cache"], "memory");

        let h = harness(true, vec![], true);
        let (_, value) = call(&h.app, "GET", "/health", None).await;
        assert_eq!(value["model_configured"], true);
        assert_eq!(value["plaid_configured"], true);
        assert_eq!(h.provider.calls.load(Ordering::SeqCst), 0);
    }
}
