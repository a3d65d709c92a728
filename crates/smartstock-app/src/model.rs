// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::ids::*;
use crate::wire;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl TransactionStatus {
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Confirmed,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "processing" => Some(Self::Processing),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Final states can only move to another final state.
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Inbound,
    Sale,
    Adjustment,
}

impl TransactionType {
    pub const ALL: [Self; 3] = [Self::Inbound, Self::Sale, Self::Adjustment];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Sale => "sale",
            Self::Adjustment => "adjustment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "inbound" => Some(Self::Inbound),
            "sale" => Some(Self::Sale),
            "adjustment" => Some(Self::Adjustment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    Active,
    Pending,
    Expired,
    Resolved,
}

impl ForecastStatus {
    pub const ALL: [Self; 4] = [Self::Active, Self::Pending, Self::Expired, Self::Resolved];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Expired => "expired",
            Self::Resolved => "resolved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "pending" => Some(Self::Pending),
            "expired" => Some(Self::Expired),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryStatus {
    InStock,
    LowStock,
    OutOfStock,
    ReorderNeeded,
    Resolved,
}

impl InventoryStatus {
    pub const ALL: [Self; 5] = [
        Self::InStock,
        Self::LowStock,
        Self::OutOfStock,
        Self::ReorderNeeded,
        Self::Resolved,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InStock => "in_stock",
            Self::LowStock => "low_stock",
            Self::OutOfStock => "out_of_stock",
            Self::ReorderNeeded => "reorder_needed",
            Self::Resolved => "resolved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_stock" => Some(Self::InStock),
            "low_stock" => Some(Self::LowStock),
            "out_of_stock" => Some(Self::OutOfStock),
            "reorder_needed" => Some(Self::ReorderNeeded),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }

    /// Lower is more urgent.
    pub const fn severity_rank(self) -> u8 {
        match self {
            Self::OutOfStock => 0,
            Self::ReorderNeeded => 1,
            Self::LowStock => 2,
            Self::InStock => 3,
            Self::Resolved => 4,
        }
    }

    /// Classifies a stock/forecast pair the same way the backend does.
    pub fn classify(stock: i64, forecast_30_days: i64, resolved: bool) -> Self {
        if resolved {
            Self::Resolved
        } else if stock == 0 {
            Self::OutOfStock
        } else if (stock as f64) < (forecast_30_days as f64) * 0.5 {
            Self::ReorderNeeded
        } else if stock < forecast_30_days {
            Self::LowStock
        } else {
            Self::InStock
        }
    }

    pub const fn recommended_action(self) -> &'static str {
        match self {
            Self::Resolved => "Resolved",
            Self::OutOfStock => "Urgent Reorder",
            Self::ReorderNeeded => "Reorder Now",
            Self::LowStock => "Monitor",
            Self::InStock => "No Action",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Approved,
    Ordered,
    Received,
    Cancelled,
}

impl OrderStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Ordered => "ordered",
            Self::Received => "received",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "ordered" => Some(Self::Ordered),
            "received" => Some(Self::Received),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabKind {
    Transactions,
    Forecast,
    Orders,
    Warehouses,
}

impl TabKind {
    pub const ALL: [Self; 4] = [
        Self::Transactions,
        Self::Forecast,
        Self::Orders,
        Self::Warehouses,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Transactions => "transactions",
            Self::Forecast => "forecast",
            Self::Orders => "orders",
            Self::Warehouses => "warehouses",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tab| tab.label().eq_ignore_ascii_case(value.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub const fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub total: u64,
    pub limit: u32,
    pub offset: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMeta {
    pub fn for_window(total: u64, limit: u32, offset: u64) -> Self {
        Self {
            total,
            limit,
            offset,
            has_next: offset + u64::from(limit) < total,
            has_prev: offset > 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> Page<T> {
    pub fn empty(limit: u32, offset: u64) -> Self {
        Self {
            items: Vec::new(),
            pagination: PaginationMeta::for_window(0, limit, offset),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub transaction_number: String,
    pub product: String,
    pub quantity_change: i64,
    pub warehouse: String,
    pub transaction_type: TransactionType,
    #[serde(with = "wire::timestamp")]
    pub transaction_timestamp: OffsetDateTime,
    pub status: TransactionStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastItem {
    pub forecast_id: ForecastId,
    pub item_id: String,
    pub item_name: String,
    pub stock: i64,
    pub forecast_30_days: i64,
    pub warehouse_id: WarehouseId,
    pub warehouse_name: String,
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub warehouse_location: String,
    pub status: InventoryStatus,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub order_number: String,
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub warehouse_id: Option<WarehouseId>,
    pub requested_by: String,
    pub status: OrderStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub forecast_id: Option<ForecastId>,
    #[serde(with = "wire::timestamp")]
    pub created_at: OffsetDateTime,
    #[serde(with = "wire::timestamp")]
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_sku: Option<String>,
    #[serde(default, deserialize_with = "wire::decimal_option::deserialize")]
    pub unit_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub sku: String,
    #[serde(deserialize_with = "wire::decimal::deserialize")]
    pub price: f64,
    pub unit: String,
    #[serde(default)]
    pub category: Option<String>,
    pub reorder_level: i64,
    #[serde(with = "wire::timestamp")]
    pub created_at: OffsetDateTime,
    #[serde(with = "wire::timestamp")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub warehouse_id: WarehouseId,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(with = "wire::timestamp")]
    pub created_at: OffsetDateTime,
    #[serde(with = "wire::timestamp")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevelPoint {
    #[serde(with = "wire::date")]
    pub date: Date,
    pub stock_level: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionKpi {
    pub total_transactions: u64,
    pub pending_transactions: u64,
    pub confirmed_transactions: u64,
    pub processing_transactions: u64,
    pub shipped_transactions: u64,
    pub delivered_transactions: u64,
    pub total_quantity_change: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StockAlertKpi {
    pub low_stock_items: u64,
    pub out_of_stock_items: u64,
    pub reorder_needed_items: u64,
    pub total_alerts: u64,
}

/// On-time production rate for the last two 30-day windows, in percent.
/// The backend reads it from a database view, so every figure may be absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OtprMetrics {
    pub otpr_last_30d: Option<f64>,
    pub otpr_prev_30d: Option<f64>,
    pub change_ppt: Option<f64>,
    pub trend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OtprMetrics {
    /// Builds the metrics from on-time/total counts per window. Rates are
    /// rounded to one decimal before the change is taken.
    pub fn from_counts(last: (u64, u64), prev: (u64, u64)) -> Self {
        let rate = |(on_time, total): (u64, u64)| {
            (total > 0).then(|| (1000.0 * on_time as f64 / total as f64).round() / 10.0)
        };
        let otpr_last_30d = rate(last);
        let otpr_prev_30d = rate(prev);
        let change_ppt = otpr_last_30d
            .zip(otpr_prev_30d)
            .map(|(last, prev)| ((last - prev) * 10.0).round() / 10.0);
        Self {
            otpr_last_30d,
            otpr_prev_30d,
            change_ppt,
            trend: change_ppt.map(|change| arrow_for(change).to_owned()),
            error: None,
        }
    }

    /// Arrow for the card: the backend's own when present.
    pub fn trend_arrow(&self) -> &str {
        match (&self.trend, self.change_ppt) {
            (Some(trend), _) if !trend.trim().is_empty() => trend.trim(),
            (_, Some(change)) => arrow_for(change),
            _ => "→",
        }
    }
}

fn arrow_for(change: f64) -> &'static str {
    if change > 0.0 {
        "↑"
    } else if change < 0.0 {
        "↓"
    } else {
        "→"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InventoryTurnover {
    pub total_consumption_value: Option<f64>,
    pub total_avg_inventory_value: Option<f64>,
    pub overall_inventory_turnover: Option<f64>,
    pub overall_days_on_hand: Option<i64>,
    pub active_products: Option<u64>,
    pub total_units_consumed: Option<i64>,
    pub total_avg_units: Option<i64>,
}

/// Unresolved forecast rows by urgency: out of stock or reorder needed
/// count as critical, low stock as warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CriticalCounts {
    #[serde(rename = "criticalCount")]
    pub critical: u64,
    #[serde(rename = "warningCount")]
    pub warning: u64,
}

impl CriticalCounts {
    pub fn tally<'a>(statuses: impl IntoIterator<Item = &'a InventoryStatus>) -> Self {
        statuses
            .into_iter()
            .fold(Self::default(), |mut counts, status| {
                match status {
                    InventoryStatus::OutOfStock | InventoryStatus::ReorderNeeded => {
                        counts.critical += 1;
                    }
                    InventoryStatus::LowStock => counts.warning += 1,
                    InventoryStatus::InStock | InventoryStatus::Resolved => {}
                }
                counts
            })
    }
}

/// Everything the KPI strip shows. The view-backed metrics are optional:
/// their endpoints fail while the views are empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashboardKpis {
    pub transactions: TransactionKpi,
    pub alerts: StockAlertKpi,
    pub otpr: Option<OtprMetrics>,
    pub turnover: Option<InventoryTurnover>,
    pub critical: Option<CriticalCounts>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkStatusUpdate {
    pub transaction_ids: Vec<TransactionId>,
    pub status: TransactionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkStatusUpdateResult {
    pub updated_count: u64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDeleteResult {
    pub deleted_count: u64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity_change: i64,
    pub transaction_type: TransactionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TransactionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity_change: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Full transaction record as returned by the single-item endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: TransactionId,
    pub transaction_number: String,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity_change: i64,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(with = "wire::timestamp")]
    pub transaction_timestamp: OffsetDateTime,
    #[serde(with = "wire::timestamp")]
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub warehouse_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForecastUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_30_days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reorder_point: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reorder_quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ForecastStatus>,
}

/// Raw forecast row as returned by the update endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub forecast_id: ForecastId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    #[serde(default)]
    pub current_stock: Option<i64>,
    #[serde(default)]
    pub forecast_30_days: Option<i64>,
    #[serde(default)]
    pub reorder_point: Option<i64>,
    #[serde(default)]
    pub reorder_quantity: Option<i64>,
    pub status: ForecastStatus,
    #[serde(with = "wire::timestamp")]
    pub last_updated: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub product_id: ProductId,
    pub quantity: i64,
    pub warehouse_id: WarehouseId,
    pub requested_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_id: Option<ForecastId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    pub message_id: String,
    pub content: String,
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub tool_calls: Vec<serde_json::Value>,
}

impl AgentReply {
    pub fn is_error(&self) -> bool {
        self.status == "error" || self.error.is_some()
    }

    /// Text to show in the transcript: the error for failed replies.
    pub fn display_text(&self) -> String {
        match (&self.error, self.is_error()) {
            (Some(error), _) => format!("agent error: {error}"),
            (None, true) => format!("agent error: {}", self.content),
            (None, false) => self.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentHealth {
    pub status: String,
    #[serde(default)]
    pub agent_type: Option<String>,
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub tools_available: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTool {
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub description: String,
}
