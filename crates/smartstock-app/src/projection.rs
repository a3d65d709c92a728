// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::{Date, Duration};

use crate::{ForecastItem, InventoryStatus, SeededRng, StockLevelPoint};

pub const HISTORY_DAYS: u32 = 30;
pub const PROJECTION_DAYS: i64 = 30;
pub const RESTOCK_DAY: i64 = 5;
const JITTER_RATIO: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionPoint {
    /// Days from today; 0 is the starting level.
    pub day: i64,
    pub date: Date,
    pub stock: f64,
    pub restock: bool,
}

/// Stock series for the chart modal: observed history followed by the
/// synthesized forward projection.
#[derive(Debug, Clone, PartialEq)]
pub struct StockChart {
    pub history: Vec<StockLevelPoint>,
    pub projection: Vec<ProjectionPoint>,
}

impl StockChart {
    pub fn build(item: &ForecastItem, mut history: Vec<StockLevelPoint>, today: Date) -> Self {
        history.sort_by_key(|point| point.date);
        let projection = project_stock(item, &history, today);
        Self {
            history,
            projection,
        }
    }

    /// Points as (days relative to today, stock) for plotting.
    pub fn history_series(&self, today: Date) -> Vec<(f64, f64)> {
        self.history
            .iter()
            .map(|point| {
                let offset = (point.date - today).whole_days();
                (offset as f64, point.stock_level as f64)
            })
            .collect()
    }

    pub fn projection_series(&self) -> Vec<(f64, f64)> {
        self.projection
            .iter()
            .map(|point| (point.day as f64, point.stock))
            .collect()
    }

    pub fn x_bounds(&self, today: Date) -> [f64; 2] {
        let first = self
            .history
            .first()
            .map_or(0, |point| (point.date - today).whole_days().min(0));
        [first as f64, PROJECTION_DAYS as f64]
    }

    pub fn y_max(&self) -> f64 {
        let history_max = self
            .history
            .iter()
            .map(|point| point.stock_level as f64)
            .fold(0.0, f64::max);
        let projection_max = self
            .projection
            .iter()
            .map(|point| point.stock)
            .fold(0.0, f64::max);
        history_max.max(projection_max).max(1.0)
    }

    pub fn stockout_day(&self) -> Option<i64> {
        self.projection
            .iter()
            .find(|point| point.day > 0 && point.stock <= 0.0)
            .map(|point| point.day)
    }
}

/// Projects stock forward from the last observed level (or the item's
/// current stock when there is no history). Each day consumes the average
/// daily demand plus deterministic jitter seeded by the forecast id, so the
/// same item always draws the same curve.
pub fn project_stock(
    item: &ForecastItem,
    history: &[StockLevelPoint],
    today: Date,
) -> Vec<ProjectionPoint> {
    let daily_demand = item.forecast_30_days.max(0) as f64 / PROJECTION_DAYS as f64;
    let restocks = item.status == InventoryStatus::Resolved;
    let mut jitter = SeededRng::new(item.forecast_id.get() as u64);

    let mut level = history
        .iter()
        .max_by_key(|point| point.date)
        .map_or(item.stock, |point| point.stock_level)
        .max(0) as f64;

    let mut points = Vec::with_capacity(PROJECTION_DAYS as usize + 1);
    points.push(ProjectionPoint {
        day: 0,
        date: today,
        stock: level,
        restock: false,
    });

    for day in 1..=PROJECTION_DAYS {
        let noise = daily_demand * JITTER_RATIO * jitter.next_signed();
        level = (level - (daily_demand + noise)).max(0.0);
        let restock = restocks && day == RESTOCK_DAY;
        if restock {
            level += item.forecast_30_days.max(0) as f64;
        }
        points.push(ProjectionPoint {
            day,
            date: today.saturating_add(Duration::days(day)),
            stock: level,
            restock,
        });
    }
    points
}
