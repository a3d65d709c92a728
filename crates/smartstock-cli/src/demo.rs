// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use smartstock_app::{
    AgentHealth, AgentReply, AgentTool, BulkStatusUpdate, BulkStatusUpdateResult, ChatRole,
    ChatTurn, CriticalCounts, DashboardKpis, ForecastItem, ForecastQuery, ForecastStatus,
    InventoryStatus, InventoryTurnover, NewOrder, Order, OrderId, OrderStatus, OtprMetrics, Page,
    PageRequest, PaginationMeta, ProductId, StockAlertKpi, StockLevelPoint, Transaction,
    TransactionKpi, TransactionQuery, TransactionStatus, TransactionType, Warehouse,
    sort_forecast_rows, sort_transaction_rows,
};
use smartstock_testkit::{Dataset, InventoryFaker, reference_now};
use std::collections::BTreeSet;
use time::{Date, Duration, OffsetDateTime};

const DEMO_TRANSACTIONS: usize = 240;
const DEMO_TOOLS: [(&str, &str); 3] = [
    ("get_stock_alerts", "List items that are out of stock or need reorder"),
    ("get_transactions", "Search recent inventory transactions"),
    ("create_order", "Draft a replenishment order for a SKU"),
];

/// Offline backend over generated data. Filtering, sorting and paging follow
/// the REST endpoints so the dashboard behaves the same as against a server.
pub struct DemoRuntime {
    seed: u64,
    data: Dataset,
    replies: u64,
}

impl DemoRuntime {
    pub fn new(seed: u64) -> Self {
        let data = InventoryFaker::new(seed).dataset(DEMO_TRANSACTIONS);
        Self {
            seed,
            data,
            replies: 0,
        }
    }

    fn warehouse_names(&self, query: &TransactionQuery) -> BTreeSet<&str> {
        self.data
            .warehouses
            .iter()
            .filter(|warehouse| query.filters.warehouse_ids.contains(&warehouse.warehouse_id))
            .map(|warehouse| warehouse.name.as_str())
            .collect()
    }

    fn product_names(&self, query: &TransactionQuery) -> BTreeSet<&str> {
        self.data
            .products
            .iter()
            .filter(|product| query.filters.product_ids.contains(&product.product_id))
            .map(|product| product.name.as_str())
            .collect()
    }

    fn alert_kpi(&self) -> StockAlertKpi {
        let count = |status: InventoryStatus| {
            self.data
                .forecasts
                .iter()
                .filter(|item| item.status == status)
                .count() as u64
        };
        let low_stock_items = count(InventoryStatus::LowStock);
        let out_of_stock_items = count(InventoryStatus::OutOfStock);
        let reorder_needed_items = count(InventoryStatus::ReorderNeeded);
        StockAlertKpi {
            low_stock_items,
            out_of_stock_items,
            reorder_needed_items,
            total_alerts: low_stock_items + out_of_stock_items + reorder_needed_items,
        }
    }

    fn transaction_kpi(&self) -> TransactionKpi {
        let rows = &self.data.transactions;
        let count = |status: TransactionStatus| {
            rows.iter().filter(|row| row.status == status).count() as u64
        };
        TransactionKpi {
            total_transactions: rows.len() as u64,
            pending_transactions: count(TransactionStatus::Pending),
            confirmed_transactions: count(TransactionStatus::Confirmed),
            processing_transactions: count(TransactionStatus::Processing),
            shipped_transactions: count(TransactionStatus::Shipped),
            delivered_transactions: count(TransactionStatus::Delivered),
            total_quantity_change: rows.iter().map(|row| row.quantity_change).sum(),
        }
    }

    /// Share of sales delivered, last 30 days against the 30 before.
    fn otpr(&self) -> OtprMetrics {
        let now = reference_now();
        let window = |from: OffsetDateTime, to: OffsetDateTime| {
            let sales = self
                .data
                .transactions
                .iter()
                .filter(|row| row.transaction_type == TransactionType::Sale)
                .filter(|row| row.transaction_timestamp > from && row.transaction_timestamp <= to);
            sales.fold((0, 0), |(on_time, total), row| {
                let delivered = u64::from(row.status == TransactionStatus::Delivered);
                (on_time + delivered, total + 1)
            })
        };
        let month = Duration::days(30);
        OtprMetrics::from_counts(
            window(now - month, now),
            window(now - month - month, now - month),
        )
    }

    /// Sales value over the value of stock on hand, priced by SKU.
    fn turnover(&self) -> InventoryTurnover {
        let products = &self.data.products;
        let price_by_name = |name: &str| {
            products
                .iter()
                .find(|product| product.name == name)
                .map_or(0.0, |product| product.price)
        };
        let price_by_sku = |sku: &str| {
            products
                .iter()
                .find(|product| product.sku == sku)
                .map_or(0.0, |product| product.price)
        };

        let sales = self
            .data
            .transactions
            .iter()
            .filter(|row| row.transaction_type == TransactionType::Sale)
            .collect::<Vec<_>>();
        let units_consumed: i64 = sales.iter().map(|row| row.quantity_change.abs()).sum();
        let consumption_value: f64 = sales
            .iter()
            .map(|row| row.quantity_change.abs() as f64 * price_by_name(&row.product))
            .sum();
        let active_products = sales
            .iter()
            .map(|row| row.product.as_str())
            .collect::<BTreeSet<_>>()
            .len() as u64;

        let forecasts = &self.data.forecasts;
        let stock_units: i64 = forecasts.iter().map(|item| item.stock.max(0)).sum();
        let stock_value: f64 = forecasts
            .iter()
            .map(|item| item.stock.max(0) as f64 * price_by_sku(&item.item_id))
            .sum();
        let turnover = (stock_value > 0.0)
            .then(|| (consumption_value / stock_value * 100.0).round() / 100.0);

        InventoryTurnover {
            total_consumption_value: Some((consumption_value * 100.0).round() / 100.0),
            total_avg_inventory_value: Some((stock_value * 100.0).round() / 100.0),
            overall_inventory_turnover: turnover,
            overall_days_on_hand: turnover
                .filter(|turnover| *turnover > 0.0)
                .map(|turnover| (365.0 / turnover).round() as i64),
            active_products: Some(active_products),
            total_units_consumed: Some(units_consumed),
            total_avg_units: Some(stock_units / (forecasts.len().max(1) as i64)),
        }
    }

    fn next_order_id(&self) -> i64 {
        self.data
            .orders
            .iter()
            .map(|order| order.order_id.get())
            .max()
            .unwrap_or(0)
            + 1
    }
}

fn window<T: Clone>(rows: &[T], page: PageRequest) -> Page<T> {
    let total = rows.len() as u64;
    let items = rows
        .iter()
        .skip(usize::try_from(page.offset).unwrap_or(usize::MAX))
        .take(page.limit as usize)
        .cloned()
        .collect();
    Page {
        items,
        pagination: PaginationMeta::for_window(total, page.limit, page.offset),
    }
}

fn matches_forecast_status(item: &ForecastItem, status: ForecastStatus) -> bool {
    match status {
        ForecastStatus::Resolved => item.status == InventoryStatus::Resolved,
        ForecastStatus::Active => item.status != InventoryStatus::Resolved,
        ForecastStatus::Pending | ForecastStatus::Expired => false,
    }
}

fn order_number(at: OffsetDateTime) -> String {
    format!(
        "ORD-{:04}{:02}{:02}-{:02}{:02}{:02}",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

impl smartstock_tui::AppRuntime for DemoRuntime {
    fn load_kpis(&mut self) -> Result<DashboardKpis> {
        Ok(DashboardKpis {
            transactions: self.transaction_kpi(),
            alerts: self.alert_kpi(),
            otpr: Some(self.otpr()),
            turnover: Some(self.turnover()),
            critical: Some(CriticalCounts::tally(
                self.data.forecasts.iter().map(|item| &item.status),
            )),
        })
    }

    fn load_transactions(&mut self, query: &TransactionQuery) -> Result<Page<Transaction>> {
        let filters = &query.filters;
        let warehouses = self.warehouse_names(query);
        let products = self.product_names(query);
        let mut rows: Vec<Transaction> = self
            .data
            .transactions
            .iter()
            .filter(|row| filters.statuses.is_empty() || filters.statuses.contains(&row.status))
            .filter(|row| filters.types.is_empty() || filters.types.contains(&row.transaction_type))
            .filter(|row| {
                filters.warehouse_ids.is_empty() || warehouses.contains(row.warehouse.as_str())
            })
            .filter(|row| filters.product_ids.is_empty() || products.contains(row.product.as_str()))
            .filter(|row| {
                let day = row.transaction_timestamp.date();
                filters.date_from.is_none_or(|from| day >= from)
                    && filters.date_to.is_none_or(|to| day <= to)
            })
            .cloned()
            .collect();
        sort_transaction_rows(&mut rows, query.sort.key, query.sort.direction);
        Ok(window(&rows, query.page))
    }

    fn load_forecast(&mut self, query: &ForecastQuery) -> Result<Page<ForecastItem>> {
        let filters = query.filters;
        let mut rows: Vec<ForecastItem> = self
            .data
            .forecasts
            .iter()
            .filter(|item| filters.warehouse_id.is_none_or(|id| item.warehouse_id == id))
            .filter(|item| filters.status.is_none_or(|status| matches_forecast_status(item, status)))
            .cloned()
            .collect();
        sort_forecast_rows(&mut rows, query.sort.key, query.sort.direction);
        Ok(window(&rows, query.page))
    }

    fn load_orders(&mut self) -> Result<Vec<Order>> {
        Ok(self.data.orders.clone())
    }

    fn load_warehouses(&mut self, page: PageRequest) -> Result<Page<Warehouse>> {
        Ok(window(&self.data.warehouses, page))
    }

    fn load_stock_history(&mut self, item: &ForecastItem, days: u32) -> Result<Vec<StockLevelPoint>> {
        let mut faker = InventoryFaker::new(self.seed ^ item.forecast_id.get().unsigned_abs());
        Ok(faker.stock_history(item, reference_now().date(), days))
    }

    fn bulk_update_status(
        &mut self,
        update: &BulkStatusUpdate,
    ) -> Result<BulkStatusUpdateResult> {
        if update.transaction_ids.is_empty() {
            bail!("server error (400): No transaction IDs provided");
        }

        let known: BTreeSet<_> = self
            .data
            .transactions
            .iter()
            .map(|row| row.transaction_id)
            .collect();
        let missing: Vec<String> = update
            .transaction_ids
            .iter()
            .filter(|id| !known.contains(id))
            .map(ToString::to_string)
            .collect();
        if !missing.is_empty() {
            bail!(
                "server error (404): Transactions not found: [{}]",
                missing.join(", ")
            );
        }

        let requested: BTreeSet<_> = update.transaction_ids.iter().copied().collect();
        let mut updated_count: u64 = 0;
        for row in &mut self.data.transactions {
            if requested.contains(&row.transaction_id) {
                row.status = update.status;
                updated_count += 1;
            }
        }
        tracing::info!(updated_count, status = update.status.as_str(), "demo bulk update");
        Ok(BulkStatusUpdateResult {
            updated_count,
            message: format!(
                "Successfully updated {updated_count} transaction(s) to status '{}'",
                update.status.as_str()
            ),
        })
    }

    fn resolve_product(&mut self, sku: &str) -> Result<ProductId> {
        match self.data.products.iter().find(|product| product.sku == sku) {
            Some(product) => Ok(product.product_id),
            None => bail!("no product with SKU {sku:?}"),
        }
    }

    fn create_order(&mut self, order: &NewOrder) -> Result<Order> {
        if order.quantity <= 0 {
            bail!("server error (422): quantity must be greater than 0");
        }
        if order.requested_by.trim().is_empty() {
            bail!("server error (422): requested_by is required");
        }
        let Some(product) = self
            .data
            .products
            .iter()
            .find(|product| product.product_id == order.product_id)
        else {
            bail!("server error (404): Product not found");
        };
        if !self
            .data
            .warehouses
            .iter()
            .any(|warehouse| warehouse.warehouse_id == order.warehouse_id)
        {
            bail!("server error (404): Warehouse not found");
        }

        let id = self.next_order_id();
        let created_at = reference_now() + Duration::seconds(id);
        let created = Order {
            order_id: OrderId::new(id),
            order_number: order_number(created_at),
            product_id: product.product_id,
            quantity: order.quantity,
            warehouse_id: Some(order.warehouse_id),
            requested_by: order.requested_by.trim().to_owned(),
            status: OrderStatus::Pending,
            notes: order.notes.clone(),
            forecast_id: order.forecast_id,
            created_at,
            updated_at: created_at,
            product_name: Some(product.name.clone()),
            product_sku: Some(product.sku.clone()),
            unit_price: Some(product.price),
        };
        self.data.orders.push(created.clone());
        Ok(created)
    }

    fn send_chat(&mut self, transcript: &[ChatTurn]) -> Result<AgentReply> {
        self.replies += 1;
        let question = transcript
            .iter()
            .rev()
            .find(|turn| turn.role == ChatRole::User)
            .map(|turn| turn.content.trim())
            .unwrap_or_default();
        let alerts = self.alert_kpi();
        let content = format!(
            "Demo agent (no backend). You asked: {question:?}. Right now {} items are out of stock, {} need reorder and {} are low on stock.",
            alerts.out_of_stock_items, alerts.reorder_needed_items, alerts.low_stock_items
        );
        Ok(AgentReply {
            message_id: format!("demo-{}", self.replies),
            content,
            status: "completed".to_owned(),
            error: None,
            tool_calls: Vec::new(),
        })
    }

    fn agent_health(&mut self) -> Result<AgentHealth> {
        Ok(AgentHealth {
            status: "healthy".to_owned(),
            agent_type: Some("demo".to_owned()),
            tools_available: DEMO_TOOLS.iter().map(|(name, _)| (*name).to_owned()).collect(),
            error: None,
        })
    }

    fn agent_tools(&mut self) -> Result<Vec<AgentTool>> {
        Ok(DEMO_TOOLS
            .iter()
            .map(|(name, description)| AgentTool {
                name: (*name).to_owned(),
                description: (*description).to_owned(),
            })
            .collect())
    }

    fn today(&self) -> Date {
        reference_now().date()
    }
}

#[cfg(test)]
mod tests {
    use super::{DemoRuntime, order_number};
    use anyhow::Result;
    use smartstock_app::{
        BulkStatusUpdate, ChatRole, ChatTurn, ForecastQuery, ForecastSortKey, ForecastStatus,
        InventoryStatus, NewOrder, OrderStatus, PageRequest, SortState, TransactionId,
        TransactionQuery, TransactionSortKey, TransactionStatus,
    };
    use smartstock_testkit::reference_now;
    use smartstock_tui::AppRuntime;
    use time::Duration;
    use time::macros::datetime;

    #[test]
    fn transaction_pages_respect_window_and_total() -> Result<()> {
        let mut runtime = DemoRuntime::new(7);
        let mut query = TransactionQuery::default();
        query.page = PageRequest::new(25, 25);

        let page = runtime.load_transactions(&query)?;
        assert_eq!(page.items.len(), 25);
        assert_eq!(page.pagination.total, 240);
        assert!(page.pagination.has_prev);
        assert!(page.pagination.has_next);

        query.page = PageRequest::new(225, 25);
        let last = runtime.load_transactions(&query)?;
        assert_eq!(last.items.len(), 15);
        assert!(!last.pagination.has_next);
        Ok(())
    }

    #[test]
    fn transaction_filters_narrow_rows() -> Result<()> {
        let mut runtime = DemoRuntime::new(7);
        let mut query = TransactionQuery::default();
        query.filters.statuses.insert(TransactionStatus::Pending);
        query.page = PageRequest::new(0, 500);

        let page = runtime.load_transactions(&query)?;
        assert!(!page.items.is_empty());
        assert!(
            page.items
                .iter()
                .all(|row| row.status == TransactionStatus::Pending)
        );

        let warehouse = runtime.data.warehouses[0].clone();
        query.filters.statuses.clear();
        query.filters.warehouse_ids.insert(warehouse.warehouse_id);
        let page = runtime.load_transactions(&query)?;
        assert!(page.items.iter().all(|row| row.warehouse == warehouse.name));

        query.filters.warehouse_ids.clear();
        let since = reference_now().date() - Duration::days(7);
        query.filters.date_from = Some(since);
        let page = runtime.load_transactions(&query)?;
        assert!(
            page.items
                .iter()
                .all(|row| row.transaction_timestamp.date() >= since)
        );
        Ok(())
    }

    #[test]
    fn transaction_sort_follows_query() -> Result<()> {
        let mut runtime = DemoRuntime::new(7);
        let mut query = TransactionQuery::default();
        query.sort = SortState::new(TransactionSortKey::Timestamp);

        let page = runtime.load_transactions(&query)?;
        let newest_first = page
            .items
            .windows(2)
            .all(|pair| pair[0].transaction_timestamp >= pair[1].transaction_timestamp);
        assert!(newest_first);

        query.sort.click(TransactionSortKey::Timestamp);
        let page = runtime.load_transactions(&query)?;
        let oldest_first = page
            .items
            .windows(2)
            .all(|pair| pair[0].transaction_timestamp <= pair[1].transaction_timestamp);
        assert!(oldest_first);
        Ok(())
    }

    #[test]
    fn forecast_status_filter_splits_resolved_from_active() -> Result<()> {
        let mut runtime = DemoRuntime::new(7);
        let mut query = ForecastQuery::default();
        query.page = PageRequest::new(0, 500);
        let total = runtime.load_forecast(&query)?.pagination.total;

        query.filters.status = Some(ForecastStatus::Resolved);
        let resolved = runtime.load_forecast(&query)?;
        assert!(
            resolved
                .items
                .iter()
                .all(|item| item.status == InventoryStatus::Resolved)
        );

        query.filters.status = Some(ForecastStatus::Active);
        let active = runtime.load_forecast(&query)?;
        assert_eq!(active.pagination.total + resolved.pagination.total, total);

        query.filters.status = None;
        query.sort = SortState::new(ForecastSortKey::Stock);
        let by_stock = runtime.load_forecast(&query)?;
        assert!(by_stock.items.windows(2).all(|pair| pair[0].stock <= pair[1].stock));
        Ok(())
    }

    #[test]
    fn bulk_update_rejects_empty_and_unknown_ids() -> Result<()> {
        let mut runtime = DemoRuntime::new(7);
        let before = runtime.data.transactions.clone();
        let error = runtime
            .bulk_update_status(&BulkStatusUpdate {
                transaction_ids: Vec::new(),
                status: TransactionStatus::Shipped,
            })
            .expect_err("empty list should fail");
        assert!(error.to_string().contains("No transaction IDs provided"));

        let error = runtime
            .bulk_update_status(&BulkStatusUpdate {
                transaction_ids: vec![TransactionId::new(1), TransactionId::new(9999)],
                status: TransactionStatus::Shipped,
            })
            .expect_err("unknown id should fail");
        assert_eq!(
            error.to_string(),
            "server error (404): Transactions not found: [9999]"
        );
        assert_eq!(runtime.data.transactions, before);
        Ok(())
    }

    #[test]
    fn bulk_update_applies_status_and_reports_count() -> Result<()> {
        let mut runtime = DemoRuntime::new(7);
        let ids = vec![TransactionId::new(1), TransactionId::new(2)];
        let result = runtime.bulk_update_status(&BulkStatusUpdate {
            transaction_ids: ids.clone(),
            status: TransactionStatus::Cancelled,
        })?;
        assert_eq!(result.updated_count, 2);
        assert_eq!(
            result.message,
            "Successfully updated 2 transaction(s) to status 'cancelled'"
        );
        assert!(
            runtime
                .data
                .transactions
                .iter()
                .filter(|row| ids.contains(&row.transaction_id))
                .all(|row| row.status == TransactionStatus::Cancelled)
        );
        Ok(())
    }

    #[test]
    fn created_order_is_numbered_and_listed() -> Result<()> {
        let mut runtime = DemoRuntime::new(7);
        let item = runtime.data.forecasts[0].clone();
        let product_id = runtime.resolve_product(&item.item_id)?;
        let before = runtime.load_orders()?.len();

        let order = runtime.create_order(&NewOrder {
            product_id,
            quantity: 12,
            warehouse_id: item.warehouse_id,
            requested_by: " ops ".to_owned(),
            notes: Some("Reorder Now".to_owned()),
            forecast_id: Some(item.forecast_id),
        })?;
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.requested_by, "ops");
        assert_eq!(order.product_sku.as_deref(), Some(item.item_id.as_str()));
        assert!(order.order_number.starts_with("ORD-20250602-12"));
        assert_eq!(runtime.load_orders()?.len(), before + 1);
        Ok(())
    }

    #[test]
    fn create_order_rejects_bad_input() -> Result<()> {
        let mut runtime = DemoRuntime::new(7);
        let item = runtime.data.forecasts[0].clone();
        let product_id = runtime.resolve_product(&item.item_id)?;
        let order = NewOrder {
            product_id,
            quantity: 0,
            warehouse_id: item.warehouse_id,
            requested_by: "ops".to_owned(),
            notes: None,
            forecast_id: None,
        };
        assert!(runtime.create_order(&order).is_err());
        assert!(
            runtime
                .resolve_product("NOPE-1")
                .expect_err("unknown sku")
                .to_string()
                .contains("no product with SKU")
        );
        Ok(())
    }

    #[test]
    fn order_number_uses_timestamp_layout() {
        assert_eq!(
            order_number(datetime!(2025-01-10 08:30:05 UTC)),
            "ORD-20250110-083005"
        );
    }

    #[test]
    fn stock_history_is_stable_per_item() -> Result<()> {
        let mut runtime = DemoRuntime::new(7);
        let item = runtime.data.forecasts[0].clone();
        let first = runtime.load_stock_history(&item, 30)?;
        let second = runtime.load_stock_history(&item, 30)?;
        assert_eq!(first.len(), 30);
        assert_eq!(first, second);
        assert_eq!(
            first.last().map(|point| point.date),
            Some(reference_now().date() - Duration::days(1))
        );
        Ok(())
    }

    #[test]
    fn view_metrics_agree_with_dataset() -> Result<()> {
        let mut runtime = DemoRuntime::new(7);
        let kpis = runtime.load_kpis()?;

        let critical = kpis.critical.expect("critical counts");
        assert_eq!(
            critical.critical,
            kpis.alerts.out_of_stock_items + kpis.alerts.reorder_needed_items
        );
        assert_eq!(critical.warning, kpis.alerts.low_stock_items);

        let otpr = kpis.otpr.expect("otpr");
        for rate in [otpr.otpr_last_30d, otpr.otpr_prev_30d].into_iter().flatten() {
            assert!((0.0..=100.0).contains(&rate), "{rate}");
        }

        let turnover = kpis.turnover.expect("turnover");
        let ratio = turnover.overall_inventory_turnover.expect("stock has value");
        let expected_days = (ratio > 0.0).then(|| (365.0 / ratio).round() as i64);
        assert_eq!(turnover.overall_days_on_hand, expected_days);
        assert!(turnover.active_products.is_some_and(|count| count > 0));
        Ok(())
    }

    #[test]
    fn kpis_and_agent_reflect_dataset() -> Result<()> {
        let mut runtime = DemoRuntime::new(7);
        let kpis = runtime.load_kpis()?;
        assert_eq!(kpis.transactions.total_transactions, 240);
        assert_eq!(
            kpis.alerts.total_alerts,
            kpis.alerts.low_stock_items
                + kpis.alerts.out_of_stock_items
                + kpis.alerts.reorder_needed_items
        );

        let reply = runtime.send_chat(&[ChatTurn {
            role: ChatRole::User,
            content: "what is low?".to_owned(),
        }])?;
        assert!(!reply.is_error());
        assert!(reply.content.contains("what is low?"));
        assert_eq!(runtime.agent_tools()?.len(), 3);
        assert_eq!(runtime.agent_health()?.status, "healthy");
        Ok(())
    }
}
