// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};

use crate::{
    BulkStatusUpdate, ForecastId, ForecastItem, NewOrder, ProductId, TransactionId,
    TransactionStatus, WarehouseId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    Quantity,
    RequestedBy,
    Notes,
}

impl OrderField {
    pub const ALL: [Self; 3] = [Self::Quantity, Self::RequestedBy, Self::Notes];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Quantity => "Quantity",
            Self::RequestedBy => "Requested by",
            Self::Notes => "Notes",
        }
    }

    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        let index = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Self::ALL[(index + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Editable order draft built from a forecast row. Text fields hold exactly
/// what the user typed; parsing happens in `validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFormInput {
    pub forecast_id: ForecastId,
    pub sku: String,
    pub product_name: String,
    pub warehouse_id: WarehouseId,
    pub warehouse_name: String,
    pub quantity: String,
    pub requested_by: String,
    pub notes: String,
}

impl OrderFormInput {
    pub fn prefill(item: &ForecastItem, requested_by: &str) -> Self {
        let action = if item.action.trim().is_empty() {
            item.status.recommended_action()
        } else {
            item.action.trim()
        };
        Self {
            forecast_id: item.forecast_id,
            sku: item.item_id.clone(),
            product_name: item.item_name.clone(),
            warehouse_id: item.warehouse_id,
            warehouse_name: item.warehouse_name.clone(),
            quantity: suggested_quantity(item).to_string(),
            requested_by: requested_by.trim().to_owned(),
            notes: format!("{action} for {} ({})", item.item_name, item.item_id),
        }
    }

    pub fn field(&self, field: OrderField) -> &str {
        match field {
            OrderField::Quantity => &self.quantity,
            OrderField::RequestedBy => &self.requested_by,
            OrderField::Notes => &self.notes,
        }
    }

    pub fn field_mut(&mut self, field: OrderField) -> &mut String {
        match field {
            OrderField::Quantity => &mut self.quantity,
            OrderField::RequestedBy => &mut self.requested_by,
            OrderField::Notes => &mut self.notes,
        }
    }

    pub fn parsed_quantity(&self) -> Result<i64> {
        let raw = self.quantity.trim();
        let Ok(quantity) = raw.parse::<i64>() else {
            bail!("quantity {raw:?} is not a whole number -- enter a number and retry");
        };
        if quantity <= 0 {
            bail!("quantity must be positive");
        }
        Ok(quantity)
    }

    pub fn validate(&self) -> Result<()> {
        self.parsed_quantity()?;
        if self.requested_by.trim().is_empty() {
            bail!("requester is required -- enter your name and retry");
        }
        Ok(())
    }

    pub fn to_new_order(&self, product_id: ProductId) -> Result<NewOrder> {
        self.validate()?;
        let notes = self.notes.trim();
        Ok(NewOrder {
            product_id,
            quantity: self.parsed_quantity()?,
            warehouse_id: self.warehouse_id,
            requested_by: self.requested_by.trim().to_owned(),
            notes: (!notes.is_empty()).then(|| notes.to_owned()),
            forecast_id: Some(self.forecast_id),
        })
    }
}

/// Shortfall against the 30-day forecast, else the forecast itself, else 1.
pub fn suggested_quantity(item: &ForecastItem) -> i64 {
    let shortfall = item.forecast_30_days - item.stock;
    if shortfall > 0 {
        shortfall
    } else if item.forecast_30_days > 0 {
        item.forecast_30_days
    } else {
        1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFormState {
    pub input: OrderFormInput,
    pub focus: OrderField,
    pub error: Option<String>,
}

impl OrderFormState {
    pub fn new(input: OrderFormInput) -> Self {
        Self {
            input,
            focus: OrderField::Quantity,
            error: None,
        }
    }

    pub fn insert_char(&mut self, ch: char) {
        if self.focus == OrderField::Quantity && !ch.is_ascii_digit() {
            return;
        }
        self.input.field_mut(self.focus).push(ch);
        self.error = None;
    }

    pub fn backspace(&mut self) {
        self.input.field_mut(self.focus).pop();
        self.error = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkPhase {
    Editing,
    Submitting,
    Succeeded { message: String },
    Failed { error: String },
}

/// Bulk status modal. The id set is captured when the modal opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkStatusForm {
    ids: Vec<TransactionId>,
    target_index: usize,
    pub phase: BulkPhase,
}

impl BulkStatusForm {
    pub fn new(ids: Vec<TransactionId>) -> Result<Self> {
        if ids.is_empty() {
            bail!("no transactions selected -- select rows with space and retry");
        }
        Ok(Self {
            ids,
            target_index: 0,
            phase: BulkPhase::Editing,
        })
    }

    pub fn ids(&self) -> &[TransactionId] {
        &self.ids
    }

    pub fn target(&self) -> TransactionStatus {
        TransactionStatus::ALL[self.target_index % TransactionStatus::ALL.len()]
    }

    pub fn cycle_target(&mut self, delta: isize) {
        if !self.accepts_input() {
            return;
        }
        let len = TransactionStatus::ALL.len() as isize;
        self.target_index = (self.target_index as isize + delta).rem_euclid(len) as usize;
        if matches!(self.phase, BulkPhase::Failed { .. }) {
            self.phase = BulkPhase::Editing;
        }
    }

    pub fn accepts_input(&self) -> bool {
        matches!(self.phase, BulkPhase::Editing | BulkPhase::Failed { .. })
    }

    /// Marks the form as in flight and returns the request body. Returns
    /// `None` while a request is outstanding or after success.
    pub fn submit(&mut self) -> Option<BulkStatusUpdate> {
        if !self.accepts_input() {
            return None;
        }
        self.phase = BulkPhase::Submitting;
        Some(BulkStatusUpdate {
            transaction_ids: self.ids.clone(),
            status: self.target(),
        })
    }

    pub fn succeed(&mut self, message: String) {
        self.phase = BulkPhase::Succeeded { message };
    }

    pub fn fail(&mut self, error: String) {
        self.phase = BulkPhase::Failed { error };
    }
}
