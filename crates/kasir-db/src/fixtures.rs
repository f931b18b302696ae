//! Row builders shared by the repository tests.

use chrono::{DateTime, TimeZone, Utc};

use crate::pool::{Database, DbConfig};
use kasir_core::{Product, User, UserRole};

pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, hour, 0, 0).unwrap()
}

pub async fn database() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub async fn user(db: &Database, id: &str, role: UserRole) -> User {
    let user = User {
        id: id.to_string(),
        name: format!("User {id}"),
        role,
        is_active: true,
        created_at: at(0),
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
        created_at: at(0),
        updated_at: at(0),
    };
    db.products().insert(&product).await.unwrap();
    product
}
