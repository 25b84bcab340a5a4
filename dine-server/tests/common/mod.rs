//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::sync::Arc;

use dine_server::db::DbService;
use dine_server::db::repository::{product, restaurant};
use dine_server::sessions::ManualClock;
use dine_server::{Config, ServerState};
use shared::message::{Room, RoomMessage};
use shared::models::{DiningTable, DiningTableCreate, OrderItemInput, Product, ProductCreate, RestaurantCreate};
use tokio::sync::broadcast;

pub struct Fixture {
    pub state: ServerState,
    pub clock: ManualClock,
    pub restaurant_id: i64,
    /// P1 10.00, P2 4.50
    pub products: Vec<Product>,
    /// tables "1", "2", "3"
    pub tables: Vec<DiningTable>,
}

impl Fixture {
    pub fn p1(&self) -> i64 {
        self.products[0].id
    }

    pub fn p2(&self) -> i64 {
        self.products[1].id
    }

    pub fn table(&self, idx: usize) -> &DiningTable {
        &self.tables[idx]
    }

    pub fn subscribe(&self, room: Room) -> broadcast::Receiver<RoomMessage> {
        self.state.hub.subscribe(self.restaurant_id, room)
    }
}

pub fn line(product_id: i64, quantity: i32) -> OrderItemInput {
    OrderItemInput {
        product_id,
        quantity,
        note: None,
    }
}

fn test_config() -> Config {
    let mut config = Config::with_overrides("/tmp/dine-test", 0);
    config.session_inactivity_minutes = 30;
    config.reaper_interval_secs = 300;
    config
}

/// In-memory database, tax rate 8%
pub async fn fixture() -> Fixture {
    let db = DbService::in_memory().await.unwrap();
    seed(db).await
}

/// File-backed database (several pooled connections)
pub async fn file_fixture(dir: &tempfile::TempDir) -> Fixture {
    let path = dir.path().join("dine.db");
    let db = DbService::new(path.to_str().unwrap()).await.unwrap();
    seed(db).await
}

async fn seed(db: DbService) -> Fixture {
    let clock = ManualClock::starting_now();
    let state = ServerState::new(test_config(), db, Arc::new(clock.clone()));
    let pool = &state.db.pool;

    let r = restaurant::create(
        pool,
        RestaurantCreate {
            name: "Test Bistro".into(),
            tax_rate: 0.08,
        },
    )
    .await
    .unwrap();

    let mut products = Vec::new();
    for (name, price) in [("P1", 10.0), ("P2", 4.5)] {
        products.push(
            product::create(
                pool,
                r.id,
                ProductCreate {
                    name: name.into(),
                    price,
                },
            )
            .await
            .unwrap(),
        );
    }

    let mut tables = Vec::new();
    for number in ["1", "2", "3"] {
        tables.push(
            state
                .registry
                .create_table(
                    r.id,
                    DiningTableCreate {
                        number: number.into(),
                        capacity: Some(4),
                    },
                )
                .await
                .unwrap(),
        );
    }

    Fixture {
        state,
        clock,
        restaurant_id: r.id,
        products,
        tables,
    }
}

/// Drain every message currently buffered on `rx`
pub fn drain(rx: &mut broadcast::Receiver<RoomMessage>) -> Vec<RoomMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}
