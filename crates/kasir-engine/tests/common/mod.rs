//! Shared setup for the engine integration tests: an in-memory database,
//! a fixed clock at 2025-03-03 10:00 WIB, staff, and two stocked products.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use kasir_core::checkout::CartLine;
use kasir_core::{PaymentMethod, Product, User, UserRole};
use kasir_db::{Database, DbConfig};
use kasir_engine::{
    CheckoutReceipt, CheckoutRequest, Engine, EngineConfig, FixedClock, StockAdjustment,
};

pub const CASHIER: &str = "kasir-01";
pub const SUPERVISOR: &str = "spv-01";
pub const KOPI: &str = "prod-kopi";
pub const ROTI: &str = "prod-roti";
pub const OPENING_STOCK: i64 = 10;

pub struct TestEnv {
    pub engine: Engine,
    pub clock: Arc<FixedClock>,
}

impl TestEnv {
    pub fn db(&self) -> &Database {
        self.engine.db()
    }

    pub async fn on_hand(&self, product_id: &str) -> i64 {
        self.engine.stock().on_hand(product_id).await.unwrap()
    }
}

/// 2025-03-03 10:00 WIB.
pub fn sale_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 3, 0, 0).unwrap()
}

pub async fn setup() -> TestEnv {
    setup_with(EngineConfig::default()).await
}

pub async fn setup_with(config: EngineConfig) -> TestEnv {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    seed(db, config).await
}

/// Same fixtures on a WAL file database with a real connection pool, so
/// concurrent writers contend on SQLite's lock. Returns the file path for
/// cleanup.
pub async fn setup_file(max_connections: u32) -> (TestEnv, PathBuf) {
    let path = std::env::temp_dir().join(format!("kasir-test-{}.db", uuid::Uuid::new_v4()));
    let db = Database::new(DbConfig::new(path.clone()).max_connections(max_connections))
        .await
        .unwrap();
    (seed(db, EngineConfig::default()).await, path)
}

/// Removes a `setup_file` database and its WAL side files.
pub async fn remove_file_db(env: TestEnv, path: PathBuf) {
    env.db().close().await;
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.clone().into_os_string();
        file.push(suffix);
        let _ = std::fs::remove_file(file);
    }
}

async fn seed(db: Database, config: EngineConfig) -> TestEnv {
    let clock = Arc::new(FixedClock::new(sale_time()));
    let engine = Engine::with_clock(db, config, clock.clone());

    user(engine.db(), CASHIER, UserRole::Cashier).await;
    user(engine.db(), SUPERVISOR, UserRole::Supervisor).await;
    product(engine.db(), KOPI, 18_000, true).await;
    product(engine.db(), ROTI, 22_000, true).await;

    for id in [KOPI, ROTI] {
        engine
            .stock()
            .adjust(
                StockAdjustment {
                    product_id: id.to_string(),
                    qty_delta: OPENING_STOCK,
                    movement_type: None,
                    note: Some("Stok awal".to_string()),
                },
                SUPERVISOR,
            )
            .await
            .unwrap();
    }

    TestEnv { engine, clock }
}

pub async fn user(db: &Database, id: &str, role: UserRole) -> User {
    let user = User {
        id: id.to_string(),
        name: format!("User {id}"),
        role,
        is_active: true,
        created_at: sale_time(),
    };
    db.users().insert(&user).await.unwrap();
    user
}

pub async fn product(db: &Database, id: &str, price: i64, is_active: bool) -> Product {
    let product = Product {
        id: id.to_string(),
        sku: id.to_uppercase(),
        name: format!("Produk {id}"),
        price,
        is_active,
        created_at: sale_time(),
        updated_at: sale_time(),
    };
    db.products().insert(&product).await.unwrap();
    product
}

pub fn line(product_id: &str, qty: i64) -> CartLine {
    CartLine {
        product_id: product_id.to_string(),
        qty,
        discount_amount: None,
    }
}

pub fn cash(cash_received: i64, items: Vec<CartLine>) -> CheckoutRequest {
    CheckoutRequest {
        payment_method: PaymentMethod::Cash,
        cash_received: Some(cash_received),
        reference: None,
        local_txn_uuid: None,
        occurred_at: None,
        items,
    }
}

pub fn ewallet(items: Vec<CartLine>) -> CheckoutRequest {
    CheckoutRequest {
        payment_method: PaymentMethod::Ewallet,
        cash_received: None,
        reference: Some("QRIS-0001".to_string()),
        local_txn_uuid: None,
        occurred_at: None,
        items,
    }
}

/// Scenario A: kopi + roti, CASH 50.000.
pub async fn sell_kopi_roti(env: &TestEnv) -> CheckoutReceipt {
    env.engine
        .checkout()
        .checkout(cash(50_000, vec![line(KOPI, 1), line(ROTI, 1)]), CASHIER)
        .await
        .unwrap()
}
