//! # Product Repository
//!
//! Product lookups for checkout. Product CRUD lives outside the
//! transaction core; this repository reads rows and inserts them for
//! seeding and tests.
//!
//! ## Batch Lookup
//! ```text
//! cart: [p-kopi ×1, p-roti ×2, p-kopi ×1]
//!          │
//!          ▼
//! SELECT ... FROM products WHERE id IN (?, ?)   ← one round trip
//!          │
//!          ▼
//! HashMap { "p-kopi" → Product, "p-roti" → Product }
//!          │
//!          ▼
//! kasir_core::checkout::plan_checkout decides missing / inactive
//! ```

use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use kasir_core::Product;

const PRODUCT_COLUMNS: &str = "id, sku, name, price, is_active, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(product)
    }

    /// Loads every product named in `ids`, keyed by id.
    ///
    /// Unknown ids are simply absent from the map; inactive products are
    /// included so the caller can report them precisely.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<HashMap<String, Product>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_many(&mut conn, ids).await
    }

    pub async fn find_many(
        conn: &mut SqliteConnection,
        ids: &[String],
    ) -> DbResult<HashMap<String, Product>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id IN ("));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");

        let products = builder
            .build_query_as::<Product>()
            .fetch_all(&mut *conn)
            .await?;

        debug!(requested = ids.len(), found = products.len(), "Loaded products");

        Ok(products.into_iter().map(|p| (p.id.clone(), p)).collect())
    }

    /// Inserts a product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, price, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(id = %product.id, sku = %product.sku, "Inserted product");
        Ok(())
    }

    /// Counts all products (for diagnostics and seeding).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::fixtures;

    #[tokio::test]
    async fn test_find_many_skips_unknown_ids() {
        let db = fixtures::database().await;
        fixtures::product(&db, "p-kopi", 18_000, true).await;
        fixtures::product(&db, "p-roti", 22_000, false).await;

        let found = db
            .products()
            .get_many(&["p-kopi".to_string(), "p-roti".to_string(), "p-hilang".to_string()])
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found["p-kopi"].price, 18_000);
        assert!(!found["p-roti"].is_active);
        assert!(db.products().get_many(&[]).await.unwrap().is_empty());
    }
}
