// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cmp::Ordering;

use crate::{
    ForecastItem, ForecastSortKey, Order, SortDirection, SortKey, Transaction, TransactionSortKey,
};

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

fn compare_names(left: &str, right: &str) -> Ordering {
    left.to_lowercase().cmp(&right.to_lowercase())
}

/// Sorts forecast rows the way the forecast endpoint orders them: the
/// chosen column first, then product name ascending as a tie breaker.
pub fn sort_forecast_rows(rows: &mut [ForecastItem], key: ForecastSortKey, direction: SortDirection) {
    rows.sort_by(|left, right| {
        let primary = match key {
            ForecastSortKey::Severity => left
                .status
                .severity_rank()
                .cmp(&right.status.severity_rank()),
            ForecastSortKey::Stock => left.stock.cmp(&right.stock),
            ForecastSortKey::Forecast => left.forecast_30_days.cmp(&right.forecast_30_days),
            ForecastSortKey::Product => compare_names(&left.item_name, &right.item_name),
            ForecastSortKey::LastUpdated => left.forecast_id.cmp(&right.forecast_id),
        };
        let primary = directed(primary, direction);
        if key == ForecastSortKey::Product {
            primary
        } else {
            primary.then_with(|| compare_names(&left.item_name, &right.item_name))
        }
    });
}

pub fn sort_transaction_rows(
    rows: &mut [Transaction],
    key: TransactionSortKey,
    direction: SortDirection,
) {
    rows.sort_by(|left, right| {
        let primary = match key {
            TransactionSortKey::Product => compare_names(&left.product, &right.product),
            TransactionSortKey::Warehouse => compare_names(&left.warehouse, &right.warehouse),
            TransactionSortKey::Timestamp => left
                .transaction_timestamp
                .cmp(&right.transaction_timestamp),
        };
        directed(primary, direction)
            .then_with(|| right.transaction_id.cmp(&left.transaction_id))
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSortKey {
    Number,
    Product,
    Quantity,
    Status,
    Created,
}

impl OrderSortKey {
    pub const ALL: [Self; 5] = [
        Self::Number,
        Self::Product,
        Self::Quantity,
        Self::Status,
        Self::Created,
    ];
}

impl SortKey for OrderSortKey {
    fn as_param(self) -> &'static str {
        match self {
            Self::Number => "order_number",
            Self::Product => "product",
            Self::Quantity => "quantity",
            Self::Status => "status",
            Self::Created => "created_at",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Number => "order",
            Self::Product => "product",
            Self::Quantity => "qty",
            Self::Status => "status",
            Self::Created => "created",
        }
    }

    fn default_direction(self) -> SortDirection {
        match self {
            Self::Created => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }
}

// Pipeline order: open work first.
fn order_status_rank(status: crate::OrderStatus) -> u8 {
    use crate::OrderStatus;
    match status {
        OrderStatus::Pending => 0,
        OrderStatus::Approved => 1,
        OrderStatus::Ordered => 2,
        OrderStatus::Received => 3,
        OrderStatus::Cancelled => 4,
    }
}

pub fn sort_orders(rows: &mut [Order], key: OrderSortKey, direction: SortDirection) {
    rows.sort_by(|left, right| {
        let primary = match key {
            OrderSortKey::Number => left.order_number.cmp(&right.order_number),
            OrderSortKey::Product => compare_names(
                left.product_name.as_deref().unwrap_or_default(),
                right.product_name.as_deref().unwrap_or_default(),
            ),
            OrderSortKey::Quantity => left.quantity.cmp(&right.quantity),
            OrderSortKey::Status => order_status_rank(left.status).cmp(&order_status_rank(right.status)),
            OrderSortKey::Created => left.created_at.cmp(&right.created_at),
        };
        directed(primary, direction).then_with(|| left.order_id.cmp(&right.order_id))
    });
}
