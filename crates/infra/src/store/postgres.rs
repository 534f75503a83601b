//! Postgres-backed catalog store.
//!
//! Entities are stored as JSONB documents (`doc`) next to the few columns the
//! queries filter, sort or enforce uniqueness on.
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | StoreError |
//! |------------|---------------|------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | Database (other) | any | `Backend` |
//! | Decode / JSON | n/a | `Serialization` |
//! | Pool / IO / other | n/a | `Backend` |
//!
//! ## Atomicity
//!
//! Product edits and sales run in one transaction and lock the touched
//! product rows with `SELECT ... FOR UPDATE` (sales lock in id order), so a
//! stock check and its decrement can never interleave with another writer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use painterp_core::{BrandId, InvoiceId, ProductId, UserId};
use painterp_inventory::{Brand, Product, ProductKey, ProductType, StockChange, base_code_of};
use painterp_invoicing::Invoice;

use super::{CatalogStore, ProductEdit, ProductFilter, StoreError, product_not_found};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS brands (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        is_active BOOLEAN NOT NULL,
        doc JSONB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS product_types (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        doc JSONB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id UUID PRIMARY KEY,
        brand_id UUID NOT NULL REFERENCES brands (id),
        unique_key TEXT NOT NULL,
        name TEXT NOT NULL,
        product_type TEXT NOT NULL,
        product_code TEXT NOT NULL,
        is_active BOOLEAN NOT NULL,
        doc JSONB NOT NULL,
        UNIQUE (brand_id, unique_key)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS invoices (
        id UUID PRIMARY KEY,
        invoice_no TEXT NOT NULL UNIQUE,
        user_id UUID NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        doc JSONB NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS invoices_user_created_idx ON invoices (user_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS products_brand_idx ON products (brand_id, name)",
];

/// Postgres catalog store.
#[derive(Debug, Clone)]
pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if missing. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }

    async fn fetch_docs<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<T>, StoreError> {
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter().map(decode_doc).collect()
    }
}

fn decode_doc<T: DeserializeOwned>(row: &PgRow) -> Result<T, StoreError> {
    row.try_get::<Json<T>, _>("doc")
        .map(|Json(doc)| doc)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn encode_doc<T: Serialize>(doc: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(doc).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn product_uuids(ids: &[ProductId]) -> Vec<Uuid> {
    ids.iter().map(|id| *id.as_uuid()).collect()
}

async fn write_product(
    tx: &mut Transaction<'static, Postgres>,
    product: &Product,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        UPDATE products
        SET brand_id = $2,
            unique_key = $3,
            name = $4,
            product_type = $5,
            product_code = $6,
            is_active = $7,
            doc = $8
        WHERE id = $1
        "#,
    )
    .bind(product.id().as_uuid())
    .bind(product.brand().as_uuid())
    .bind(product.uniqueness_key().storage_key())
    .bind(product.name())
    .bind(product.product_type())
    .bind(product.product_code())
    .bind(product.is_active())
    .bind(encode_doc(product)?)
    .execute(&mut **tx)
    .await
    .map_err(|e| match map_sqlx_error("update_product", e) {
        StoreError::Duplicate(_) => {
            StoreError::Duplicate(product.uniqueness_key().conflict_message())
        }
        other => other,
    })?;
    Ok(())
}

async fn rollback(tx: Transaction<'static, Postgres>) -> Result<(), StoreError> {
    tx.rollback()
        .await
        .map_err(|e| map_sqlx_error("rollback", e))
}

#[async_trait::async_trait]
impl CatalogStore for PostgresCatalogStore {
    #[instrument(skip(self, brand), fields(brand_id = %brand.id()), err)]
    async fn insert_brand(&self, brand: &Brand) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO brands (id, name, is_active, doc) VALUES ($1, $2, $3, $4)")
            .bind(brand.id().as_uuid())
            .bind(brand.name())
            .bind(brand.is_active())
            .bind(encode_doc(brand)?)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                with_duplicate_message(
                    map_sqlx_error("insert_brand", e),
                    "Brand with this name already exists",
                )
            })?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_brand(&self, id: BrandId) -> Result<Option<Brand>, StoreError> {
        let query = sqlx::query("SELECT doc FROM brands WHERE id = $1").bind(*id.as_uuid());
        Ok(self.fetch_docs("get_brand", query).await?.pop())
    }

    #[instrument(skip(self), err)]
    async fn find_brand_by_name(&self, name: &str) -> Result<Option<Brand>, StoreError> {
        let query = sqlx::query("SELECT doc FROM brands WHERE name = $1").bind(name.to_string());
        Ok(self.fetch_docs("find_brand_by_name", query).await?.pop())
    }

    #[instrument(skip(self), err)]
    async fn list_active_brands(&self) -> Result<Vec<Brand>, StoreError> {
        let query = sqlx::query("SELECT doc FROM brands WHERE is_active ORDER BY name");
        self.fetch_docs("list_active_brands", query).await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_brands(&self, ids: &[BrandId]) -> Result<Vec<Brand>, StoreError> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let query = sqlx::query("SELECT doc FROM brands WHERE id = ANY($1)").bind(ids);
        self.fetch_docs("get_brands", query).await
    }

    #[instrument(skip(self), err)]
    async fn find_product_type(&self, name: &str) -> Result<Option<ProductType>, StoreError> {
        let query =
            sqlx::query("SELECT doc FROM product_types WHERE name = $1").bind(name.to_string());
        Ok(self.fetch_docs("find_product_type", query).await?.pop())
    }

    #[instrument(skip(self, product_type), fields(name = product_type.name()), err)]
    async fn save_product_type(&self, product_type: &ProductType) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO product_types (id, name, doc)
            VALUES ($1, $2, $3)
            ON CONFLICT (id)
            DO UPDATE SET name = EXCLUDED.name, doc = EXCLUDED.doc
            "#,
        )
        .bind(product_type.id().as_uuid())
        .bind(product_type.name())
        .bind(encode_doc(product_type)?)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            with_duplicate_message(
                map_sqlx_error("save_product_type", e),
                "Product type with this name already exists",
            )
        })?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_product_types(&self) -> Result<Vec<ProductType>, StoreError> {
        let query = sqlx::query("SELECT doc FROM product_types ORDER BY name");
        self.fetch_docs("list_product_types", query).await
    }

    #[instrument(skip(self), err)]
    async fn product_types_in_use(&self, brand: Option<BrandId>) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT product_type
            FROM products
            WHERE is_active AND ($1::uuid IS NULL OR brand_id = $1)
            ORDER BY product_type
            "#,
        )
        .bind(brand.map(|b| *b.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("product_types_in_use", e))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("product_type")
                    .map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .collect()
    }

    #[instrument(skip(self, product), fields(product_id = %product.id()), err)]
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, brand_id, unique_key, name, product_type, product_code, is_active, doc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id().as_uuid())
        .bind(product.brand().as_uuid())
        .bind(product.uniqueness_key().storage_key())
        .bind(product.name())
        .bind(product.product_type())
        .bind(product.product_code())
        .bind(product.is_active())
        .bind(encode_doc(product)?)
        .execute(&self.pool)
        .await
        .map_err(|e| match map_sqlx_error("insert_product", e) {
            StoreError::Duplicate(_) => {
                StoreError::Duplicate(product.uniqueness_key().conflict_message())
            }
            other => other,
        })?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let query = sqlx::query("SELECT doc FROM products WHERE id = $1").bind(*id.as_uuid());
        Ok(self.fetch_docs("get_product", query).await?.pop())
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let query =
            sqlx::query("SELECT doc FROM products WHERE id = ANY($1)").bind(product_uuids(ids));
        self.fetch_docs("get_products", query).await
    }

    #[instrument(skip(self), err)]
    async fn find_product_by_key(
        &self,
        brand: BrandId,
        key: &ProductKey,
    ) -> Result<Option<Product>, StoreError> {
        let query = sqlx::query("SELECT doc FROM products WHERE brand_id = $1 AND unique_key = $2")
            .bind(*brand.as_uuid())
            .bind(key.storage_key());
        Ok(self.fetch_docs("find_product_by_key", query).await?.pop())
    }

    #[instrument(skip(self), fields(count = tracing::field::Empty), err)]
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let query = sqlx::query(
            r#"
            SELECT doc
            FROM products
            WHERE is_active
                AND ($1::uuid IS NULL OR brand_id = $1)
                AND ($2::text IS NULL OR product_type = $2)
                AND ($3::text IS NULL OR strpos(lower(name), lower($3)) > 0)
            ORDER BY name
            "#,
        )
        .bind(filter.brand.map(|b| *b.as_uuid()))
        .bind(filter.product_type.clone())
        .bind(search);

        let products = self.fetch_docs("list_products", query).await?;
        Span::current().record("count", products.len());
        Ok(products)
    }

    #[instrument(skip(self, edit), err)]
    async fn update_product(&self, id: ProductId, edit: ProductEdit<'_>) -> Result<Product, StoreError> {
        let mut tx = self.begin().await?;

        let row = sqlx::query("SELECT doc FROM products WHERE id = $1 FOR UPDATE")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_product", e))?;
        let Some(row) = row else {
            rollback(tx).await?;
            return Err(product_not_found().into());
        };
        let mut product: Product = decode_doc(&row)?;

        if let Err(e) = edit(&mut product) {
            rollback(tx).await?;
            return Err(e.into());
        }

        write_product(&mut tx, &product).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(product)
    }

    #[instrument(skip(self, image), err)]
    async fn propagate_image(
        &self,
        brand: BrandId,
        base_code: &str,
        image: &str,
        except: ProductId,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut tx = self.begin().await?;

        // Narrow in SQL, then apply the exact family rule on the documents.
        let rows = sqlx::query(
            r#"
            SELECT doc
            FROM products
            WHERE brand_id = $1
                AND id <> $2
                AND trim(split_part(product_code, '-', 1)) = $3
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(*brand.as_uuid())
        .bind(*except.as_uuid())
        .bind(base_code.to_string())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_code_family", e))?;

        let mut changed = 0;
        for row in &rows {
            let mut product: Product = decode_doc(row)?;
            if base_code_of(product.product_code()) != Some(base_code) {
                continue;
            }
            product.set_image(image, now);
            write_product(&mut tx, &product).await?;
            changed += 1;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(changed)
    }

    #[instrument(skip(self), err)]
    async fn count_invoices(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM invoices")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_invoices", e))?;
        let total: i64 = row
            .try_get("total")
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    #[instrument(
        skip(self, invoice, changes),
        fields(invoice_no = invoice.invoice_no(), lines = changes.len()),
        err
    )]
    async fn commit_sale(
        &self,
        invoice: &Invoice,
        changes: &[(ProductId, StockChange)],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;

        let mut ids: Vec<ProductId> = changes.iter().map(|(id, _)| *id).collect();
        ids.sort();
        ids.dedup();

        let rows = sqlx::query("SELECT doc FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(product_uuids(&ids))
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_products", e))?;

        let mut locked: HashMap<ProductId, Product> = HashMap::with_capacity(rows.len());
        for row in &rows {
            let product: Product = decode_doc(row)?;
            locked.insert(product.id(), product);
        }

        for (id, change) in changes {
            let applied = match locked.get_mut(id) {
                Some(product) if product.is_active() => product.apply_stock_change(*change, now),
                _ => Err(product_not_found()),
            };
            if let Err(e) = applied {
                rollback(tx).await?;
                return Err(e.into());
            }
        }

        for product in locked.values() {
            write_product(&mut tx, product).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO invoices (id, invoice_no, user_id, created_at, doc)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(invoice.id().as_uuid())
        .bind(invoice.invoice_no())
        .bind(invoice.user().as_uuid())
        .bind(invoice.created_at())
        .bind(encode_doc(invoice)?)
        .execute(&mut *tx)
        .await
        .map_err(|e| match map_sqlx_error("insert_invoice", e) {
            StoreError::Duplicate(_) => StoreError::Duplicate(format!(
                "Invoice number {} already exists",
                invoice.invoice_no()
            )),
            other => other,
        })?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_invoices(
        &self,
        user: UserId,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Invoice>, u64), StoreError> {
        let total_row = sqlx::query("SELECT COUNT(*) AS total FROM invoices WHERE user_id = $1")
            .bind(*user.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_user_invoices", e))?;
        let total: i64 = total_row
            .try_get("total")
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let query = sqlx::query(
            r#"
            SELECT doc
            FROM invoices
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            OFFSET $2
            LIMIT $3
            "#,
        )
        .bind(*user.as_uuid())
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX));
        let invoices = self.fetch_docs("list_invoices", query).await?;

        Ok((invoices, u64::try_from(total).unwrap_or_default()))
    }

    #[instrument(skip(self), err)]
    async fn get_invoice(&self, user: UserId, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        let query = sqlx::query("SELECT doc FROM invoices WHERE id = $1 AND user_id = $2")
            .bind(*id.as_uuid())
            .bind(*user.as_uuid());
        Ok(self.fetch_docs("get_invoice", query).await?.pop())
    }
}

/// Swap the raw driver text of a unique violation for a client-facing message.
fn with_duplicate_message(err: StoreError, message: &str) -> StoreError {
    match err {
        StoreError::Duplicate(_) => StoreError::Duplicate(message.to_string()),
        other => other,
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Duplicate(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Serialization(format!("decode error in {}: {}", operation, err))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
