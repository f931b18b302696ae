//! # Seed Data Generator
//!
//! Populates a database with demo staff, products, opening stock, and the
//! default refund window.
//!
//! ## Usage
//! ```bash
//! cargo run -p kasir-db --bin seed
//!
//! # Specify database path and opening stock per product
//! cargo run -p kasir-db --bin seed -- --db ./data/kasir.db --stock 50
//! ```
//!
//! ## Generated Data
//! - Users `kasir-01` (CASHIER), `spv-01` (SUPERVISOR), `admin-01` (ADMIN);
//!   send one of these ids as `X-User-Id`
//! - A small warung catalogue, each product with an ADJUSTMENT movement
//!   for its opening stock
//! - `refund.window_days` = 2

use chrono::Utc;
use std::env;
use uuid::Uuid;

use kasir_core::settings::{DEFAULT_REFUND_WINDOW_DAYS, REFUND_WINDOW_DAYS_KEY};
use kasir_core::{MovementType, Product, RefType, User, UserRole};
use kasir_db::{Database, DbConfig, NewMovement, StockRepository};

const USERS: &[(&str, &str, UserRole)] = &[
    ("kasir-01", "Sari Kasir", UserRole::Cashier),
    ("spv-01", "Budi Supervisor", UserRole::Supervisor),
    ("admin-01", "Admin Toko", UserRole::Admin),
];

/// (sku, name, price in Rupiah)
const PRODUCTS: &[(&str, &str, i64)] = &[
    ("KOPI-SUSU", "Kopi Susu Gula Aren", 18_000),
    ("ROTI-BAKAR", "Roti Bakar Coklat Keju", 22_000),
    ("TEH-MANIS", "Es Teh Manis", 8_000),
    ("AIR-600", "Air Mineral 600ml", 5_000),
    ("MIE-GORENG", "Mie Goreng Telur", 15_000),
    ("NASI-GORENG", "Nasi Goreng Spesial", 28_000),
    ("PISANG-GRG", "Pisang Goreng (5 pcs)", 12_000),
    ("JERUK-PERAS", "Es Jeruk Peras", 10_000),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./kasir.db");
    let mut opening_stock: i64 = 100;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--stock" | "-s" => {
                if i + 1 < args.len() {
                    opening_stock = args[i + 1].parse().unwrap_or(100);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Kasir POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./kasir.db)");
                println!("  -s, --stock <N>    Opening stock per product (default: 100)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Kasir POS Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let now = Utc::now();

    for (id, name, role) in USERS {
        db.users()
            .insert(&User {
                id: id.to_string(),
                name: name.to_string(),
                role: *role,
                is_active: true,
                created_at: now,
            })
            .await?;
    }
    println!("✓ Inserted {} users", USERS.len());

    let mut tx = db.begin().await?;
    for (sku, name, price) in PRODUCTS {
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            name: name.to_string(),
            price: *price,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO products (id, sku, name, price, is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if opening_stock != 0 {
            StockRepository::record(
                &mut tx,
                &NewMovement {
                    product_id: product.id.clone(),
                    qty_delta: opening_stock,
                    movement_type: MovementType::Adjustment,
                    ref_type: RefType::Adjustment,
                    ref_id: None,
                    actor_id: Some("admin-01".to_string()),
                    note: Some("Stok awal".to_string()),
                    created_at: now,
                },
                true,
            )
            .await?;
        }

        println!("  {:<12} {:<26} Rp {}", product.sku, product.name, product.price);
    }
    tx.commit().await?;
    println!("✓ Inserted {} products with opening stock {}", PRODUCTS.len(), opening_stock);

    db.settings()
        .set(REFUND_WINDOW_DAYS_KEY, &DEFAULT_REFUND_WINDOW_DAYS.to_string(), now)
        .await?;
    println!("✓ {} = {}", REFUND_WINDOW_DAYS_KEY, DEFAULT_REFUND_WINDOW_DAYS);

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
