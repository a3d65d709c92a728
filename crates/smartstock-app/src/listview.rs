// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use crate::{
    ForecastId, ForecastItem, Page, PageRequest, PagedQuery, PaginationMeta, SortState,
    Transaction, TransactionId,
};

pub trait ListRow {
    type Id: Copy + Ord + std::fmt::Debug;

    fn row_id(&self) -> Self::Id;
}

impl ListRow for Transaction {
    type Id = TransactionId;

    fn row_id(&self) -> TransactionId {
        self.transaction_id
    }
}

impl ListRow for ForecastItem {
    type Id = ForecastId;

    fn row_id(&self) -> ForecastId {
        self.forecast_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchTicket(u64);

impl FetchTicket {
    pub const fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest<Q> {
    pub ticket: FetchTicket,
    pub query: Q,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    Failed,
    /// A newer fetch was issued after this one; the response was dropped.
    Stale,
}

/// Server-paginated list controller. Owns the query, the current page of
/// rows and the row selection. Only the response to the most recently issued
/// fetch is ever applied.
#[derive(Debug, Clone)]
pub struct ListView<Q, R: ListRow> {
    query: Q,
    rows: Vec<R>,
    pagination: Option<PaginationMeta>,
    selected: BTreeSet<R::Id>,
    loading: bool,
    issued: u64,
    last_error: Option<String>,
}

pub type TransactionList = ListView<crate::TransactionQuery, Transaction>;
pub type ForecastList = ListView<crate::ForecastQuery, ForecastItem>;

impl<Q: PagedQuery, R: ListRow> ListView<Q, R> {
    pub fn new(query: Q) -> Self {
        Self {
            query,
            rows: Vec::new(),
            pagination: None,
            selected: BTreeSet::new(),
            loading: false,
            issued: 0,
            last_error: None,
        }
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn pagination(&self) -> Option<PaginationMeta> {
        self.pagination
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn sort(&self) -> SortState<Q::Sort> {
        self.query.sort()
    }

    pub fn page(&self) -> PageRequest {
        self.query.page()
    }

    /// Applies a filter edit. Returns true when the query changed, in which
    /// case the offset is back at zero and a refetch is due.
    pub fn update_query(&mut self, edit: impl FnOnce(&mut Q)) -> bool {
        let before = self.query.clone();
        edit(&mut self.query);
        if self.query == before {
            return false;
        }
        let page = self.query.page_mut();
        *page = page.first();
        true
    }

    pub fn click_sort(&mut self, key: Q::Sort) {
        self.query.sort_mut().click(key);
        let page = self.query.page_mut();
        *page = page.first();
    }

    pub fn set_page_size(&mut self, limit: u32) -> bool {
        let page = self.query.page_mut();
        let resized = page.resized(limit);
        if resized == *page {
            return false;
        }
        *page = resized;
        true
    }

    pub fn next_page(&mut self) -> bool {
        let has_next = self.pagination.is_some_and(|meta| meta.has_next);
        if !has_next {
            return false;
        }
        let page = self.query.page_mut();
        *page = page.next();
        true
    }

    pub fn prev_page(&mut self) -> bool {
        let has_prev = self
            .pagination
            .map_or(self.query.page().offset > 0, |meta| meta.has_prev);
        if !has_prev {
            return false;
        }
        let page = self.query.page_mut();
        *page = page.prev();
        true
    }

    pub fn begin_fetch(&mut self) -> FetchRequest<Q> {
        self.issued += 1;
        self.loading = true;
        FetchRequest {
            ticket: FetchTicket(self.issued),
            query: self.query.clone(),
        }
    }

    pub fn finish_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Page<R>, String>,
    ) -> FetchOutcome {
        if ticket.0 != self.issued {
            return FetchOutcome::Stale;
        }
        self.loading = false;
        self.selected.clear();
        match result {
            Ok(page) => {
                self.rows = page.items;
                self.pagination = Some(page.pagination);
                self.last_error = None;
                FetchOutcome::Applied
            }
            Err(error) => {
                self.rows.clear();
                self.pagination = None;
                self.last_error = Some(error);
                FetchOutcome::Failed
            }
        }
    }

    pub fn is_selected(&self, id: R::Id) -> bool {
        self.selected.contains(&id)
    }

    pub fn toggle_selected(&mut self, id: R::Id) {
        if !self.selected.remove(&id) {
            self.selected.insert(id);
        }
    }

    /// Selects every displayed row, or clears the selection when all of them
    /// are already selected. Rows on other pages are never touched.
    pub fn toggle_select_all(&mut self) {
        let all_selected =
            !self.rows.is_empty() && self.rows.iter().all(|row| self.selected.contains(&row.row_id()));
        if all_selected {
            self.selected.clear();
        } else {
            self.selected = self.rows.iter().map(ListRow::row_id).collect();
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn selected_ids(&self) -> Vec<R::Id> {
        self.selected.iter().copied().collect()
    }

    pub fn selection_len(&self) -> usize {
        self.selected.len()
    }

    /// "Showing 26-50 of 120".
    pub fn range_label(&self) -> String {
        match self.pagination {
            Some(meta) if meta.total > 0 && !self.rows.is_empty() => {
                let start = meta.offset + 1;
                let end = (meta.offset + self.rows.len() as u64).min(meta.total);
                format!("showing {start}-{end} of {}", meta.total)
            }
            Some(_) => "no results".to_owned(),
            None => String::new(),
        }
    }
}
