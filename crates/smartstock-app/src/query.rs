// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;
use time::Date;
use time::macros::format_description;

use crate::{
    ForecastStatus, ProductId, SortDirection, TransactionStatus, TransactionType, WarehouseId,
};

pub const PAGE_SIZES: [u32; 4] = [10, 25, 50, 100];
pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 500;

pub type QueryPairs = Vec<(&'static str, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(offset: u64, limit: u32) -> Self {
        Self {
            offset,
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Keeps the first visible row on screen: the new offset is the start of
    /// the page (at the new size) that contains the old offset.
    pub fn resized(self, limit: u32) -> Self {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let step = u64::from(limit);
        Self {
            offset: (self.offset / step) * step,
            limit,
        }
    }

    pub fn next(self) -> Self {
        Self {
            offset: self.offset + u64::from(self.limit),
            ..self
        }
    }

    pub fn prev(self) -> Self {
        Self {
            offset: self.offset.saturating_sub(u64::from(self.limit)),
            ..self
        }
    }

    pub fn first(self) -> Self {
        Self { offset: 0, ..self }
    }

    pub fn page_number(self) -> u64 {
        self.offset / u64::from(self.limit.max(1)) + 1
    }

    fn push_pairs(self, pairs: &mut QueryPairs) {
        pairs.push(("limit", self.limit.to_string()));
        pairs.push(("offset", self.offset.to_string()));
    }
}

pub fn next_page_size(current: u32) -> u32 {
    PAGE_SIZES
        .iter()
        .copied()
        .find(|size| *size > current)
        .unwrap_or(PAGE_SIZES[0])
}

pub fn prev_page_size(current: u32) -> u32 {
    PAGE_SIZES
        .iter()
        .rev()
        .copied()
        .find(|size| *size < current)
        .unwrap_or(PAGE_SIZES[PAGE_SIZES.len() - 1])
}

pub trait SortKey: Copy + Eq + std::fmt::Debug {
    /// Value sent as `sort_by`.
    fn as_param(self) -> &'static str;
    fn label(self) -> &'static str;
    fn default_direction(self) -> SortDirection;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState<K> {
    pub key: K,
    pub direction: SortDirection,
}

impl<K: SortKey> SortState<K> {
    pub fn new(key: K) -> Self {
        Self {
            key,
            direction: key.default_direction(),
        }
    }

    /// Header click: the active column flips, another column takes over with
    /// its default direction.
    pub fn click(&mut self, key: K) {
        if self.key == key {
            self.direction = self.direction.flipped();
        } else {
            self.key = key;
            self.direction = key.default_direction();
        }
    }

    fn push_pairs(self, pairs: &mut QueryPairs) {
        pairs.push(("sort_by", self.key.as_param().to_owned()));
        pairs.push(("sort_order", self.direction.as_str().to_owned()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionSortKey {
    Product,
    Warehouse,
    Timestamp,
}

impl TransactionSortKey {
    pub const ALL: [Self; 3] = [Self::Product, Self::Warehouse, Self::Timestamp];
}

impl SortKey for TransactionSortKey {
    fn as_param(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Warehouse => "warehouse",
            Self::Timestamp => "transaction_timestamp",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Warehouse => "warehouse",
            Self::Timestamp => "time",
        }
    }

    fn default_direction(self) -> SortDirection {
        match self {
            Self::Timestamp => SortDirection::Desc,
            Self::Product | Self::Warehouse => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastSortKey {
    Severity,
    Stock,
    Forecast,
    Product,
    LastUpdated,
}

impl ForecastSortKey {
    pub const ALL: [Self; 5] = [
        Self::Severity,
        Self::Stock,
        Self::Forecast,
        Self::Product,
        Self::LastUpdated,
    ];
}

impl SortKey for ForecastSortKey {
    fn as_param(self) -> &'static str {
        match self {
            Self::Severity => "severity",
            Self::Stock => "stock",
            Self::Forecast => "forecast",
            Self::Product => "product",
            Self::LastUpdated => "last_updated",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Severity => "status",
            Self::Stock => "stock",
            Self::Forecast => "forecast",
            Self::Product => "product",
            Self::LastUpdated => "updated",
        }
    }

    fn default_direction(self) -> SortDirection {
        match self {
            Self::LastUpdated => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionFilters {
    pub statuses: BTreeSet<TransactionStatus>,
    pub types: BTreeSet<TransactionType>,
    pub warehouse_ids: BTreeSet<WarehouseId>,
    pub product_ids: BTreeSet<ProductId>,
    pub date_from: Option<Date>,
    pub date_to: Option<Date>,
}

impl TransactionFilters {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn active_count(&self) -> usize {
        self.statuses.len()
            + self.types.len()
            + self.warehouse_ids.len()
            + self.product_ids.len()
            + usize::from(self.date_from.is_some())
            + usize::from(self.date_to.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ForecastFilters {
    pub warehouse_id: Option<WarehouseId>,
    pub status: Option<ForecastStatus>,
}

impl ForecastFilters {
    pub fn active_count(&self) -> usize {
        usize::from(self.warehouse_id.is_some()) + usize::from(self.status.is_some())
    }
}

/// Query state owned by a list view: filters, sort and page window.
pub trait PagedQuery: Clone + PartialEq {
    type Sort: SortKey;

    fn page(&self) -> PageRequest;
    fn page_mut(&mut self) -> &mut PageRequest;
    fn sort(&self) -> SortState<Self::Sort>;
    fn sort_mut(&mut self) -> &mut SortState<Self::Sort>;
    fn query_pairs(&self) -> QueryPairs;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionQuery {
    pub filters: TransactionFilters,
    pub sort: SortState<TransactionSortKey>,
    pub page: PageRequest,
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self {
            filters: TransactionFilters::default(),
            sort: SortState::new(TransactionSortKey::Timestamp),
            page: PageRequest::default(),
        }
    }
}

impl PagedQuery for TransactionQuery {
    type Sort = TransactionSortKey;

    fn page(&self) -> PageRequest {
        self.page
    }

    fn page_mut(&mut self) -> &mut PageRequest {
        &mut self.page
    }

    fn sort(&self) -> SortState<TransactionSortKey> {
        self.sort
    }

    fn sort_mut(&mut self) -> &mut SortState<TransactionSortKey> {
        &mut self.sort
    }

    fn query_pairs(&self) -> QueryPairs {
        let mut pairs = Vec::new();
        for status in &self.filters.statuses {
            pairs.push(("status", status.as_str().to_owned()));
        }
        for warehouse_id in &self.filters.warehouse_ids {
            pairs.push(("warehouse_id", warehouse_id.to_string()));
        }
        for product_id in &self.filters.product_ids {
            pairs.push(("product_id", product_id.to_string()));
        }
        for kind in &self.filters.types {
            pairs.push(("transaction_type", kind.as_str().to_owned()));
        }
        if let Some(date) = self.filters.date_from {
            pairs.push(("date_from", format_query_date(date)));
        }
        if let Some(date) = self.filters.date_to {
            pairs.push(("date_to", format_query_date(date)));
        }
        self.sort.push_pairs(&mut pairs);
        self.page.push_pairs(&mut pairs);
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastQuery {
    pub filters: ForecastFilters,
    pub sort: SortState<ForecastSortKey>,
    pub page: PageRequest,
}

impl Default for ForecastQuery {
    fn default() -> Self {
        Self {
            filters: ForecastFilters::default(),
            sort: SortState::new(ForecastSortKey::Severity),
            page: PageRequest::default(),
        }
    }
}

impl PagedQuery for ForecastQuery {
    type Sort = ForecastSortKey;

    fn page(&self) -> PageRequest {
        self.page
    }

    fn page_mut(&mut self) -> &mut PageRequest {
        &mut self.page
    }

    fn sort(&self) -> SortState<ForecastSortKey> {
        self.sort
    }

    fn sort_mut(&mut self) -> &mut SortState<ForecastSortKey> {
        &mut self.sort
    }

    fn query_pairs(&self) -> QueryPairs {
        let mut pairs = Vec::new();
        if let Some(warehouse_id) = self.filters.warehouse_id {
            pairs.push(("warehouse_id", warehouse_id.to_string()));
        }
        if let Some(status) = self.filters.status {
            pairs.push(("status", status.as_str().to_owned()));
        }
        self.page.push_pairs(&mut pairs);
        self.sort.push_pairs(&mut pairs);
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: PageRequest,
}

impl ProductQuery {
    pub fn search(term: &str) -> Self {
        Self {
            search: Some(term.to_owned()),
            ..Self::default()
        }
    }

    pub fn query_pairs(&self) -> QueryPairs {
        let mut pairs = Vec::new();
        if let Some(category) = &self.category {
            pairs.push(("category", category.clone()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        self.page.push_pairs(&mut pairs);
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderQuery {
    pub status: Option<crate::OrderStatus>,
    pub requested_by: Option<String>,
    pub page: PageRequest,
}

impl OrderQuery {
    pub fn query_pairs(&self) -> QueryPairs {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_owned()));
        }
        if let Some(requested_by) = &self.requested_by {
            pairs.push(("requested_by", requested_by.clone()));
        }
        self.page.push_pairs(&mut pairs);
        pairs
    }
}

fn format_query_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

#[cfg(test)]
mod tests {
    use super::{
        ForecastQuery, ForecastSortKey, PageRequest, PagedQuery, SortState, TransactionQuery,
        TransactionSortKey, next_page_size, prev_page_size,
    };
    use crate::{ForecastStatus, SortDirection, TransactionStatus, TransactionType, WarehouseId};
    use time::macros::date;

    fn pair_values(pairs: &[(&'static str, String)], key: &str) -> Vec<String> {
        pairs
            .iter()
            .filter(|(name, _)| *name == key)
            .map(|(_, value)| value.clone())
            .collect()
    }

    #[test]
    fn resize_floors_offset_to_new_page_boundary() {
        let page = PageRequest::new(75, 25);
        assert_eq!(page.resized(50), PageRequest::new(50, 50));
        assert_eq!(page.resized(10), PageRequest::new(70, 10));
        assert_eq!(page.resized(100), PageRequest::new(0, 100));
        assert_eq!(PageRequest::new(0, 25).resized(10).offset, 0);
    }

    #[test]
    fn prev_page_never_goes_negative() {
        let page = PageRequest::new(10, 25);
        assert_eq!(page.prev().offset, 0);
        assert_eq!(page.next().offset, 35);
        assert_eq!(PageRequest::new(50, 25).page_number(), 3);
    }

    #[test]
    fn page_size_cycle_wraps_both_ways() {
        assert_eq!(next_page_size(25), 50);
        assert_eq!(next_page_size(100), 10);
        assert_eq!(prev_page_size(25), 10);
        assert_eq!(prev_page_size(10), 100);
    }

    #[test]
    fn clicking_active_sort_flips_and_new_column_uses_default() {
        let mut sort = SortState::new(TransactionSortKey::Timestamp);
        assert_eq!(sort.direction, SortDirection::Desc);

        sort.click(TransactionSortKey::Timestamp);
        assert_eq!(sort.direction, SortDirection::Asc);

        sort.click(TransactionSortKey::Product);
        assert_eq!(sort.key, TransactionSortKey::Product);
        assert_eq!(sort.direction, SortDirection::Asc);

        sort.click(TransactionSortKey::Product);
        assert_eq!(sort.direction, SortDirection::Desc);
    }

    #[test]
    fn transaction_query_repeats_multi_value_filters() {
        let mut query = TransactionQuery::default();
        query.filters.statuses.insert(TransactionStatus::Shipped);
        query.filters.statuses.insert(TransactionStatus::Pending);
        query.filters.types.insert(TransactionType::Sale);
        query.filters.warehouse_ids.insert(WarehouseId::new(4));
        query.filters.date_from = Some(date!(2025 - 01 - 02));

        let pairs = query.query_pairs();
        assert_eq!(pair_values(&pairs, "status"), vec!["pending", "shipped"]);
        assert_eq!(pair_values(&pairs, "transaction_type"), vec!["sale"]);
        assert_eq!(pair_values(&pairs, "warehouse_id"), vec!["4"]);
        assert_eq!(pair_values(&pairs, "date_from"), vec!["2025-01-02"]);
        assert_eq!(
            pair_values(&pairs, "sort_by"),
            vec!["transaction_timestamp"]
        );
        assert_eq!(pair_values(&pairs, "sort_order"), vec!["desc"]);
        assert_eq!(pair_values(&pairs, "limit"), vec!["25"]);
        assert_eq!(pair_values(&pairs, "offset"), vec!["0"]);
    }

    #[test]
    fn forecast_query_defaults_to_severity_ascending() {
        let mut query = ForecastQuery::default();
        query.filters.status = Some(ForecastStatus::Active);
        let pairs = query.query_pairs();
        assert_eq!(pair_values(&pairs, "sort_by"), vec!["severity"]);
        assert_eq!(pair_values(&pairs, "sort_order"), vec!["asc"]);
        assert_eq!(pair_values(&pairs, "status"), vec!["active"]);
        assert!(pair_values(&pairs, "warehouse_id").is_empty());
        assert_eq!(query.sort().key, ForecastSortKey::Severity);
    }
}
