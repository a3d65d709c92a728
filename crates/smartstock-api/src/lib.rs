// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use smartstock_app::{
    AgentHealth, AgentReply, AgentTool, BulkDeleteResult, BulkStatusUpdate,
    BulkStatusUpdateResult, ChatTurn, CriticalCounts, DashboardKpis, ForecastId, ForecastItem,
    ForecastQuery, ForecastRecord, ForecastUpdate, InventoryTurnover, MAX_PAGE_SIZE, NewOrder,
    NewTransaction, Order, OrderId, OrderQuery, OrderUpdate, OtprMetrics, Page, PageRequest,
    PagedQuery, Product, ProductId, ProductQuery, StockAlertKpi, StockLevelPoint, Transaction,
    TransactionId, TransactionKpi, TransactionQuery, TransactionRecord, TransactionUpdate,
    Warehouse, WarehouseId,
};
use std::time::Duration;
use url::Url;

/// Blocking client for the SmartStock REST backend.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    token: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration, token: Option<&str>) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("api.base_url must not be empty");
        }
        let parsed = Url::parse(&base_url)
            .with_context(|| format!("api.base_url {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "api.base_url must use http or https, got {:?}",
                parsed.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            token: token
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_owned),
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // transactions

    pub fn list_transactions(&self, query: &TransactionQuery) -> Result<Page<Transaction>> {
        self.fetch(
            self.request(Method::GET, "/api/transactions/")
                .query(&query.query_pairs()),
            "decode transaction page",
        )
    }

    pub fn transaction_kpi(&self) -> Result<TransactionKpi> {
        self.fetch(
            self.request(Method::GET, "/api/transactions/kpi"),
            "decode transaction KPI",
        )
    }

    pub fn get_transaction(&self, id: TransactionId) -> Result<TransactionRecord> {
        self.fetch(
            self.request(Method::GET, &format!("/api/transactions/{id}")),
            "decode transaction",
        )
    }

    pub fn create_transaction(&self, transaction: &NewTransaction) -> Result<TransactionRecord> {
        self.fetch(
            self.request(Method::POST, "/api/transactions/")
                .json(transaction),
            "decode created transaction",
        )
    }

    pub fn update_transaction(
        &self,
        id: TransactionId,
        update: &TransactionUpdate,
    ) -> Result<TransactionRecord> {
        self.fetch(
            self.request(Method::PUT, &format!("/api/transactions/{id}"))
                .json(update),
            "decode updated transaction",
        )
    }

    /// Cancels a transaction; the backend refuses delivered or cancelled ones.
    pub fn cancel_transaction(&self, id: TransactionId) -> Result<String> {
        let envelope: MessageEnvelope = self.fetch(
            self.request(Method::DELETE, &format!("/api/transactions/{id}")),
            "decode cancel response",
        )?;
        Ok(envelope.message)
    }

    pub fn bulk_update_status(&self, update: &BulkStatusUpdate) -> Result<BulkStatusUpdateResult> {
        if update.transaction_ids.is_empty() {
            bail!("no transactions selected");
        }
        self.fetch(
            self.request(Method::PUT, "/api/transactions/bulk-status")
                .json(update),
            "decode bulk status response",
        )
    }

    pub fn bulk_delete_transactions(&self, ids: &[TransactionId]) -> Result<BulkDeleteResult> {
        if ids.is_empty() {
            bail!("no transactions selected");
        }
        self.fetch(
            self.request(Method::DELETE, "/api/transactions/bulk-delete")
                .json(&BulkDeleteRequest {
                    transaction_ids: ids,
                }),
            "decode bulk delete response",
        )
    }

    // inventory

    pub fn list_forecast(&self, query: &ForecastQuery) -> Result<Page<ForecastItem>> {
        self.fetch(
            self.request(Method::GET, "/api/inventory/forecast")
                .query(&query.query_pairs()),
            "decode forecast page",
        )
    }

    pub fn update_forecast(&self, id: ForecastId, update: &ForecastUpdate) -> Result<ForecastRecord> {
        self.fetch(
            self.request(Method::PUT, &format!("/api/inventory/forecast/{id}"))
                .json(update),
            "decode updated forecast",
        )
    }

    pub fn stock_history(
        &self,
        sku: &str,
        warehouse_id: WarehouseId,
        days: u32,
    ) -> Result<Vec<StockLevelPoint>> {
        self.fetch(
            self.request(Method::GET, "/api/inventory/history").query(&[
                ("item_id", sku.to_owned()),
                ("warehouse_id", warehouse_id.to_string()),
                ("days", days.to_string()),
            ]),
            "decode stock history",
        )
    }

    pub fn stock_alert_kpi(&self) -> Result<StockAlertKpi> {
        self.fetch(
            self.request(Method::GET, "/api/inventory/alerts/kpi"),
            "decode stock alert KPI",
        )
    }

    pub fn otpr(&self) -> Result<OtprMetrics> {
        let metrics: OtprMetrics =
            self.fetch(self.request(Method::GET, "/api/otpr/"), "decode OTPR metrics")?;
        if let Some(error) = metrics.error.as_deref().filter(|error| !error.trim().is_empty()) {
            bail!("OTPR unavailable: {error}");
        }
        Ok(metrics)
    }

    pub fn inventory_turnover(&self) -> Result<InventoryTurnover> {
        self.fetch(
            self.request(Method::GET, "/api/inventory-turnover/"),
            "decode inventory turnover",
        )
    }

    pub fn critical_counts(&self) -> Result<CriticalCounts> {
        self.fetch(
            self.request(Method::GET, "/api/homepage/critical-counts"),
            "decode critical counts",
        )
    }

    /// Transaction and alert KPIs are required; the view-backed metrics are
    /// left empty when their endpoint fails.
    pub fn dashboard_kpis(&self) -> Result<DashboardKpis> {
        Ok(DashboardKpis {
            transactions: self.transaction_kpi()?,
            alerts: self.stock_alert_kpi()?,
            otpr: optional_metric("otpr", self.otpr()),
            turnover: optional_metric("inventory turnover", self.inventory_turnover()),
            critical: optional_metric("critical counts", self.critical_counts()),
        })
    }

    // products and warehouses

    pub fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>> {
        self.fetch(
            self.request(Method::GET, "/api/products/")
                .query(&query.query_pairs()),
            "decode product page",
        )
    }

    pub fn get_product(&self, id: ProductId) -> Result<Product> {
        self.fetch(
            self.request(Method::GET, &format!("/api/products/{id}")),
            "decode product",
        )
    }

    /// Resolves a SKU through the product search. The search also matches
    /// names and descriptions, so the widest page is requested and only an
    /// exact SKU match is accepted.
    pub fn find_product_by_sku(&self, sku: &str) -> Result<Product> {
        let sku = sku.trim();
        if sku.is_empty() {
            bail!("product SKU is empty");
        }
        let query = ProductQuery {
            page: PageRequest::new(0, MAX_PAGE_SIZE),
            ..ProductQuery::search(sku)
        };
        let page = self
            .list_products(&query)
            .with_context(|| format!("look up product {sku}"))?;
        page.items
            .into_iter()
            .find(|product| product.sku.eq_ignore_ascii_case(sku))
            .ok_or_else(|| anyhow!("no product with SKU {sku:?}"))
    }

    pub fn list_warehouses(&self, page: PageRequest) -> Result<Page<Warehouse>> {
        self.fetch(
            self.request(Method::GET, "/api/warehouses/").query(&[
                ("limit", page.limit.to_string()),
                ("offset", page.offset.to_string()),
            ]),
            "decode warehouse page",
        )
    }

    pub fn get_warehouse(&self, id: WarehouseId) -> Result<Warehouse> {
        self.fetch(
            self.request(Method::GET, &format!("/api/warehouses/{id}")),
            "decode warehouse",
        )
    }

    // orders

    pub fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        self.fetch(
            self.request(Method::GET, "/api/orders/")
                .query(&query.query_pairs()),
            "decode order list",
        )
    }

    pub fn get_order(&self, id: OrderId) -> Result<Order> {
        self.fetch(
            self.request(Method::GET, &format!("/api/orders/{id}")),
            "decode order",
        )
    }

    pub fn create_order(&self, order: &NewOrder) -> Result<Order> {
        self.fetch(
            self.request(Method::POST, "/api/orders/").json(order),
            "decode created order",
        )
    }

    pub fn update_order(&self, id: OrderId, update: &OrderUpdate) -> Result<Order> {
        self.fetch(
            self.request(Method::PUT, &format!("/api/orders/{id}"))
                .json(update),
            "decode updated order",
        )
    }

    pub fn cancel_order(&self, id: OrderId) -> Result<String> {
        let envelope: MessageEnvelope = self.fetch(
            self.request(Method::DELETE, &format!("/api/orders/{id}")),
            "decode cancel response",
        )?;
        Ok(envelope.message)
    }

    // agent

    pub fn send_message(&self, transcript: &[ChatTurn]) -> Result<AgentReply> {
        let request = AgentRequest {
            messages: transcript
                .iter()
                .map(|turn| AgentMessage {
                    role: turn.role.as_str(),
                    content: &turn.content,
                })
                .collect(),
        };
        self.fetch(
            self.request(Method::POST, "/api/agent/send-message")
                .json(&request),
            "decode agent reply",
        )
    }

    pub fn agent_health(&self) -> Result<AgentHealth> {
        self.fetch(
            self.request(Method::GET, "/api/agent/health"),
            "decode agent health",
        )
    }

    pub fn agent_tools(&self) -> Result<Vec<AgentTool>> {
        let envelope: ToolsEnvelope = self.fetch(
            self.request(Method::GET, "/api/agent/tools"),
            "decode agent tools",
        )?;
        match envelope.error {
            Some(error) if envelope.tools.is_empty() => bail!("agent tools unavailable: {error}"),
            _ => Ok(envelope.tools),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        tracing::debug!(method = method.as_str(), path, "api request");
        let builder = self
            .http
            .request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;
        let response = check_status(response)?;
        response.json().with_context(|| what.to_owned())
    }
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let error = clean_error_response(status, &body);
    tracing::warn!(status = status.as_u16(), error = %error, "api request failed");
    Err(error)
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- is the SmartStock backend running? ({})",
        base_url,
        error
    )
}

/// Collapses a failed response body into one line. FastAPI reports
/// `{"detail": "..."}` for handled errors and `{"detail": [{"msg": ...}]}`
/// for request validation failures.
pub fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<DetailEnvelope>(body)
        && let Some(detail) = parsed.detail
    {
        let text = match detail {
            serde_json::Value::String(text) => text,
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|item| item.get("msg").and_then(serde_json::Value::as_str))
                .collect::<Vec<_>>()
                .join("; "),
            _ => String::new(),
        };
        if !text.trim().is_empty() {
            return anyhow!("server error ({}): {}", status.as_u16(), text.trim());
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') {
        return anyhow!("server error ({}): {}", status.as_u16(), trimmed);
    }

    anyhow!("server returned {}", status.as_u16())
}

#[derive(Debug, Deserialize)]
struct DetailEnvelope {
    detail: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct MessageEnvelope {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ToolsEnvelope {
    #[serde(default)]
    tools: Vec<AgentTool>,
    #[serde(default)]
    error: Option<String>,
}

fn optional_metric<T>(what: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(error = %format!("{error:#}"), what, "kpi unavailable");
            None
        }
    }
}

#[derive(Debug, Serialize)]
struct BulkDeleteRequest<'a> {
    transaction_ids: &'a [TransactionId],
}

#[derive(Debug, Serialize)]
struct AgentRequest<'a> {
    messages: Vec<AgentMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AgentMessage<'a> {
    role: &'static str,
    content: &'a str,
}
