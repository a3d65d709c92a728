// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use smartstock_app::{
    ForecastId, ForecastItem, InventoryStatus, Order, OrderId, OrderStatus, Product, ProductId,
    SeededRng, StockLevelPoint, Transaction, TransactionId, TransactionStatus, TransactionType,
    Warehouse, WarehouseId,
};
use time::macros::datetime;
use time::{Date, Duration, OffsetDateTime};

// (name, sku, price, unit, category, reorder level)
const CATALOG: [(&str, &str, f64, &str, &str, i64); 24] = [
    ("E-Motor 250W Mid-Drive", "MTR-250-MD-01", 450.0, "piece", "Motors", 15),
    ("E-Motor 500W Hub", "MTR-500-HB-01", 380.0, "piece", "Motors", 20),
    ("E-Motor 750W Performance", "MTR-750-PF-01", 680.0, "piece", "Motors", 10),
    ("Motor Controller Unit", "CTR-MCU-01", 125.0, "piece", "Motors", 25),
    ("Battery 48V 14Ah", "BAT-48-14-01", 420.0, "piece", "Batteries", 30),
    ("Battery 36V 10Ah", "BAT-36-10-01", 280.0, "piece", "Batteries", 40),
    ("Battery 52V 20Ah", "BAT-52-20-01", 650.0, "piece", "Batteries", 15),
    ("Battery Management System", "BAT-BMS-01", 45.0, "piece", "Batteries", 50),
    ("Battery Charger 4A", "BAT-CHG-4A", 85.0, "piece", "Batteries", 35),
    ("Carbon Frame MTB", "FRM-CBN-MTB-01", 1200.0, "piece", "Frames", 8),
    ("Aluminum Frame City", "FRM-ALU-CTY-01", 380.0, "piece", "Frames", 20),
    ("Aluminum Frame Cargo", "FRM-ALU-CRG-01", 520.0, "piece", "Frames", 12),
    ("Wheel Set 29\" MTB", "WHL-29-MTB-01", 320.0, "set", "Wheels", 25),
    ("Wheel Set 28\" City", "WHL-28-CTY-01", 180.0, "set", "Wheels", 35),
    ("Tire 29x2.4 MTB", "TIR-29-24-MTB", 55.0, "piece", "Wheels", 60),
    ("Hydraulic Disc Brake Set", "BRK-HYD-4P-01", 220.0, "set", "Brakes", 20),
    ("Brake Pads Set", "BRK-PAD-HP-01", 18.0, "set", "Brakes", 100),
    ("LED Display Basic", "DSP-LED-BS-01", 45.0, "piece", "Electronics", 40),
    ("Pedal Assist Sensor", "CTL-PAS-01", 35.0, "piece", "Electronics", 50),
    ("Torque Sensor", "CTL-TRQ-BB-01", 125.0, "piece", "Electronics", 20),
    ("Chain 11-Speed", "DRV-CHN-11S-01", 42.0, "piece", "Drivetrain", 80),
    ("Cassette 11-50T", "DRV-CAS-1150-01", 125.0, "piece", "Drivetrain", 30),
    ("Saddle Comfort Plus", "ACC-SDL-CP-01", 52.0, "piece", "Accessories", 45),
    ("LED Light Set", "ACC-LGT-SET-01", 48.0, "set", "Accessories", 50),
];

// (name, location)
const WAREHOUSES: [(&str, &str); 3] = [
    ("Lyon Main Warehouse", "Zone Industrielle, 69007 Lyon, France"),
    ("Hamburg Distribution Center", "Hafencity, 20457 Hamburg, Germany"),
    ("Milan Assembly Hub", "Via Industriale, 20090 Segrate MI, Italy"),
];

const REQUESTERS: [&str; 6] = [
    "elena.rossi",
    "jonas.weber",
    "claire.martin",
    "marco.bianchi",
    "lea.schmidt",
    "hugo.bernard",
];

const TRANSACTION_NOTES: [&str; 8] = [
    "Monthly {category} shipment",
    "Regular {category} delivery",
    "URGENT: {category} expedite",
    "{category} stock replenishment",
    "Production Line A - {category} consumption",
    "Customer order - {category}",
    "Damaged {category} components",
    "Cycle count correction",
];

/// A full backend's worth of generated rows, consistent across tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub products: Vec<Product>,
    pub warehouses: Vec<Warehouse>,
    pub transactions: Vec<Transaction>,
    pub forecasts: Vec<ForecastItem>,
    pub orders: Vec<Order>,
}

#[derive(Debug, Clone)]
pub struct InventoryFaker {
    rng: SeededRng,
}

impl InventoryFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: SeededRng::new(normalized),
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn products(&self) -> Vec<Product> {
        let created = reference_now() - Duration::days(400);
        CATALOG
            .iter()
            .zip(1_i64..)
            .map(|(&(name, sku, price, unit, category, reorder_level), id)| Product {
                product_id: ProductId::new(id),
                name: name.to_owned(),
                description: None,
                sku: sku.to_owned(),
                price,
                unit: unit.to_owned(),
                category: Some(category.to_owned()),
                reorder_level,
                created_at: created,
                updated_at: created,
            })
            .collect()
    }

    pub fn warehouses(&self) -> Vec<Warehouse> {
        let created = datetime!(2022-01-01 09:00 UTC);
        WAREHOUSES
            .iter()
            .zip(1_i64..)
            .map(|(&(name, location), id)| Warehouse {
                warehouse_id: WarehouseId::new(id),
                name: name.to_owned(),
                location: Some(location.to_owned()),
                created_at: created,
                updated_at: created,
            })
            .collect()
    }

    pub fn transaction(
        &mut self,
        id: i64,
        product: &Product,
        warehouse: &Warehouse,
        at: OffsetDateTime,
    ) -> Transaction {
        let transaction_type = match self.rng.int_n(10) {
            0..=3 => TransactionType::Inbound,
            4..=8 => TransactionType::Sale,
            _ => TransactionType::Adjustment,
        };
        let magnitude = self.int_range_i64(1, 60);
        let quantity_change = match transaction_type {
            TransactionType::Inbound => magnitude,
            TransactionType::Sale => -magnitude,
            TransactionType::Adjustment => magnitude.min(10) * if self.bool() { 1 } else { -1 },
        };
        // Older rows are further along the pipeline.
        let age_days = (reference_now() - at).whole_days();
        let status = if age_days > 20 {
            *self.pick(&[TransactionStatus::Delivered, TransactionStatus::Cancelled, TransactionStatus::Delivered])
        } else {
            *self.pick(&TransactionStatus::ALL)
        };
        let category = product.category.as_deref().unwrap_or("parts");
        let notes = if self.rng.int_n(3) == 0 {
            None
        } else {
            Some(self.pick(&TRANSACTION_NOTES).replace("{category}", &category.to_lowercase()))
        };

        Transaction {
            transaction_id: TransactionId::new(id),
            transaction_number: format!(
                "TXN-{:04}{:02}{:02}-{id:05}",
                at.year(),
                u8::from(at.month()),
                at.day()
            ),
            product: product.name.clone(),
            quantity_change,
            warehouse: warehouse.name.clone(),
            transaction_type,
            transaction_timestamp: at,
            status,
            notes,
        }
    }

    pub fn forecast_item(&mut self, id: i64, product: &Product, warehouse: &Warehouse) -> ForecastItem {
        let forecast_30_days = self.int_range_i64(20, 240);
        let stock = match self.rng.int_n(8) {
            0 => 0,
            1 | 2 => self.int_range_i64(1, forecast_30_days / 2),
            3 | 4 => self.int_range_i64(forecast_30_days / 2, forecast_30_days),
            _ => self.int_range_i64(forecast_30_days, forecast_30_days * 3),
        };
        let resolved = self.rng.int_n(12) == 0;
        let status = InventoryStatus::classify(stock, forecast_30_days, resolved);
        ForecastItem {
            forecast_id: ForecastId::new(id),
            item_id: product.sku.clone(),
            item_name: product.name.clone(),
            stock,
            forecast_30_days,
            warehouse_id: warehouse.warehouse_id,
            warehouse_name: warehouse.name.clone(),
            warehouse_location: warehouse.location.clone().unwrap_or_default(),
            status,
            action: status.recommended_action().to_owned(),
        }
    }

    pub fn order(&mut self, id: i64, product: &Product, warehouse: &Warehouse) -> Order {
        let created_at = reference_now() - Duration::hours(self.int_range_i64(1, 24 * 30));
        let status = *self.pick(&[
            OrderStatus::Pending,
            OrderStatus::Approved,
            OrderStatus::Ordered,
            OrderStatus::Received,
            OrderStatus::Cancelled,
        ]);
        Order {
            order_id: OrderId::new(id),
            order_number: format!("ORD-2025-{:04}", 1000 + id),
            product_id: product.product_id,
            quantity: self.int_range_i64(5, 50),
            warehouse_id: Some(warehouse.warehouse_id),
            requested_by: (*self.pick(&REQUESTERS)).to_owned(),
            status,
            notes: None,
            forecast_id: None,
            created_at,
            updated_at: created_at,
            product_name: Some(product.name.clone()),
            product_sku: Some(product.sku.clone()),
            unit_price: Some(product.price),
        }
    }

    /// Daily levels walking back from the item's current stock, oldest
    /// first, ending the day before `today`.
    pub fn stock_history(&mut self, item: &ForecastItem, today: Date, days: u32) -> Vec<StockLevelPoint> {
        let daily = (item.forecast_30_days / 30).max(1);
        let mut level = item.stock;
        let mut points = Vec::with_capacity(days as usize);
        for back in 1..=i64::from(days) {
            level += self.int_range_i64(0, daily * 2);
            if self.rng.int_n(15) == 0 {
                level = (level - item.forecast_30_days).max(0);
            }
            points.push(StockLevelPoint {
                date: today.saturating_sub(Duration::days(back)),
                stock_level: level,
            });
        }
        points.reverse();
        points
    }

    pub fn dataset(&mut self, transaction_count: usize) -> Dataset {
        let products = self.products();
        let warehouses = self.warehouses();
        let now = reference_now();

        let mut transactions = Vec::with_capacity(transaction_count);
        for index in 0..transaction_count {
            let product = &products[self.rng.int_n(products.len())];
            let warehouse = &warehouses[self.rng.int_n(warehouses.len())];
            let at = now - Duration::minutes(self.int_range_i64(1, 60 * 24 * 45));
            transactions.push(self.transaction(index as i64 + 1, product, warehouse, at));
        }

        let mut forecasts = Vec::new();
        let mut forecast_id = 1;
        for warehouse in &warehouses {
            for product in &products {
                if self.rng.int_n(3) == 0 {
                    continue;
                }
                forecasts.push(self.forecast_item(forecast_id, product, warehouse));
                forecast_id += 1;
            }
        }

        let orders = (1..=12)
            .map(|id| {
                let product = &products[self.rng.int_n(products.len())];
                let warehouse = &warehouses[self.rng.int_n(warehouses.len())];
                self.order(id, product, warehouse)
            })
            .collect();

        Dataset {
            products,
            warehouses,
            transactions,
            forecasts,
            orders,
        }
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.rng.int_n(items.len())]
    }

    fn bool(&mut self) -> bool {
        (self.rng.next_u64() & 1) == 1
    }

    fn int_range_i64(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = max - min + 1;
        min + (self.rng.next_u64() % (span as u64)) as i64
    }
}

/// Fixed "now" for generated data so fixtures never drift.
pub fn reference_now() -> OffsetDateTime {
    datetime!(2025-06-02 12:00 UTC)
}

pub fn fixture_datetime() -> &'static str {
    "2025-06-02T12:00:00"
}

#[cfg(test)]
mod tests {
    use super::{InventoryFaker, reference_now};
    use smartstock_app::{InventoryStatus, TransactionType};
    use std::collections::BTreeSet;

    #[test]
    fn new_deterministic_seed() {
        let mut left = InventoryFaker::new(42);
        let mut right = InventoryFaker::new(42);
        assert_eq!(left.dataset(30), right.dataset(30));
    }

    #[test]
    fn variety_across_seeds() {
        let mut names = BTreeSet::new();
        for seed in 1..6 {
            let data = InventoryFaker::new(seed).dataset(5);
            names.insert(data.transactions[0].transaction_number.clone());
        }
        assert!(names.len() > 1);
    }

    #[test]
    fn transaction_sign_follows_type() {
        let mut faker = InventoryFaker::new(7);
        let data = faker.dataset(200);
        for txn in &data.transactions {
            match txn.transaction_type {
                TransactionType::Inbound => assert!(txn.quantity_change > 0),
                TransactionType::Sale => assert!(txn.quantity_change < 0),
                TransactionType::Adjustment => assert!(txn.quantity_change != 0),
            }
            assert!(txn.transaction_timestamp < reference_now());
        }
    }

    #[test]
    fn forecast_status_matches_classification() {
        let mut faker = InventoryFaker::new(3);
        let data = faker.dataset(0);
        assert!(!data.forecasts.is_empty());
        for item in &data.forecasts {
            if item.status != InventoryStatus::Resolved {
                assert_eq!(
                    item.status,
                    InventoryStatus::classify(item.stock, item.forecast_30_days, false)
                );
            }
            assert_eq!(item.action, item.status.recommended_action());
        }
    }

    #[test]
    fn stock_history_is_oldest_first_and_ends_yesterday() {
        let mut faker = InventoryFaker::new(5);
        let data = faker.dataset(0);
        let today = reference_now().date();
        let history = faker.stock_history(&data.forecasts[0], today, 30);
        assert_eq!(history.len(), 30);
        assert!(history.windows(2).all(|pair| pair[0].date < pair[1].date));
        assert_eq!(history[29].date, today.previous_day().expect("valid date"));
        assert!(history.iter().all(|point| point.stock_level >= 0));
    }

    #[test]
    fn int_n() {
        let mut faker = InventoryFaker::new(9);
        for _ in 0..100 {
            assert!(faker.int_n(4) < 4);
        }
        assert_eq!(faker.int_n(1), 0);
    }
}
