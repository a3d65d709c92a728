// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use smartstock_api::Client;
use smartstock_app::{
    AgentHealth, AgentReply, AgentTool, BulkStatusUpdate, BulkStatusUpdateResult, ChatTurn,
    DashboardKpis, ForecastItem, ForecastQuery, MAX_PAGE_SIZE, NewOrder, Order, OrderQuery, Page,
    PageRequest, ProductId, StockLevelPoint, Transaction, TransactionQuery, Warehouse,
};
use smartstock_tui::InternalEvent;
use std::sync::mpsc::Sender;
use std::thread;

pub struct ApiRuntime {
    client: Client,
}

impl ApiRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl smartstock_tui::AppRuntime for ApiRuntime {
    fn load_kpis(&mut self) -> Result<DashboardKpis> {
        self.client.dashboard_kpis()
    }

    fn load_transactions(&mut self, query: &TransactionQuery) -> Result<Page<Transaction>> {
        self.client.list_transactions(query)
    }

    fn load_forecast(&mut self, query: &ForecastQuery) -> Result<Page<ForecastItem>> {
        self.client.list_forecast(query)
    }

    fn load_orders(&mut self) -> Result<Vec<Order>> {
        self.client.list_orders(&OrderQuery {
            page: PageRequest::new(0, MAX_PAGE_SIZE),
            ..OrderQuery::default()
        })
    }

    fn load_warehouses(&mut self, page: PageRequest) -> Result<Page<Warehouse>> {
        self.client.list_warehouses(page)
    }

    fn load_stock_history(&mut self, item: &ForecastItem, days: u32) -> Result<Vec<StockLevelPoint>> {
        self.client
            .stock_history(&item.item_id, item.warehouse_id, days)
    }

    fn bulk_update_status(
        &mut self,
        update: &BulkStatusUpdate,
    ) -> Result<BulkStatusUpdateResult> {
        self.client.bulk_update_status(update)
    }

    fn resolve_product(&mut self, sku: &str) -> Result<ProductId> {
        Ok(self.client.find_product_by_sku(sku)?.product_id)
    }

    fn create_order(&mut self, order: &NewOrder) -> Result<Order> {
        self.client.create_order(order)
    }

    fn send_chat(&mut self, transcript: &[ChatTurn]) -> Result<AgentReply> {
        self.client.send_message(transcript)
    }

    fn agent_health(&mut self) -> Result<AgentHealth> {
        self.client.agent_health()
    }

    fn agent_tools(&mut self) -> Result<Vec<AgentTool>> {
        self.client.agent_tools()
    }

    fn spawn_chat(
        &mut self,
        request_id: u64,
        transcript: &[ChatTurn],
        internal_tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let client = self.client.clone();
        let transcript = transcript.to_vec();
        thread::Builder::new()
            .name("smartstock-chat".to_owned())
            .spawn(move || {
                let result = client
                    .send_message(&transcript)
                    .map_err(|error| format!("{error:#}"));
                if let Err(error) = &result {
                    tracing::warn!(request_id, %error, "agent request failed");
                }
                let _ = internal_tx.send(InternalEvent::ChatReply { request_id, result });
            })
            .map_err(|error| anyhow!("spawn chat worker: {error}"))?;
        Ok(())
    }
}
