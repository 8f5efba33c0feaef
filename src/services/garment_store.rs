//! Garment record store.
//!
//! `GarmentStore` is the seam the wardrobe service talks to; the shipped
//! implementation keeps rows in SQLite through a shared `sqlx` pool.

use crate::models::garment::{Garment, GarmentSummary, NewGarment};
use async_trait::async_trait;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite, types::Json};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Literal `tipo` filter value meaning "every type".
pub const ALL_TYPES: &str = "Todos";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait GarmentStore: Send + Sync {
    /// Insert a record and return it with its assigned id.
    async fn insert(&self, garment: NewGarment) -> StoreResult<Garment>;

    /// All records of a user, newest first. `tipo` narrows by category.
    async fn list(&self, usuario_id: &str, tipo: Option<&str>) -> StoreResult<Vec<Garment>>;

    /// Context columns for every record of a user, in store order.
    async fn summaries(&self, usuario_id: &str) -> StoreResult<Vec<GarmentSummary>>;

    /// Image URL of a record, `None` when the id does not exist.
    async fn image_url(&self, id: Uuid) -> StoreResult<Option<String>>;

    /// Delete a record. Deleting a missing id is not an error.
    async fn delete(&self, id: Uuid) -> StoreResult<()>;

    /// Cheap connectivity check used by the readiness probe.
    async fn ping(&self) -> StoreResult<()>;
}

/// SQLite-backed [`GarmentStore`].
#[derive(Clone)]
pub struct SqliteGarmentStore {
    pub db: Arc<SqlitePool>,
}

impl SqliteGarmentStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Apply the embedded schema. Every statement is idempotent.
    pub async fn migrate(&self) -> StoreResult<()> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        tracing::info!("Running {} migration statements...", statements.len());

        for stmt in statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl GarmentStore for SqliteGarmentStore {
    async fn insert(&self, garment: NewGarment) -> StoreResult<Garment> {
        let row = sqlx::query_as::<_, Garment>(
            r#"
            INSERT INTO prendas (
                id, usuario_id, tipo, genero, imagen_url, descripcion, metadata_ia, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, usuario_id, tipo, genero, imagen_url, descripcion, metadata_ia, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&garment.usuario_id)
        .bind(&garment.tipo)
        .bind(&garment.genero)
        .bind(&garment.imagen_url)
        .bind(&garment.descripcion)
        .bind(Json(&garment.metadata_ia))
        .bind(garment.created_at)
        .fetch_one(&*self.db)
        .await?;

        debug!("inserted garment {} for {}", row.id, row.usuario_id);
        Ok(row)
    }

    async fn list(&self, usuario_id: &str, tipo: Option<&str>) -> StoreResult<Vec<Garment>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, usuario_id, tipo, genero, imagen_url, descripcion, metadata_ia, created_at \
             FROM prendas WHERE usuario_id = ",
        );
        builder.push_bind(usuario_id);

        if let Some(tipo) = tipo.filter(|t| !t.is_empty() && *t != ALL_TYPES) {
            builder.push(" AND tipo = ");
            builder.push_bind(tipo);
        }

        // rowid breaks ties between rows stamped in the same instant
        builder.push(" ORDER BY created_at DESC, rowid DESC");

        let rows: Vec<Garment> = builder.build_query_as().fetch_all(&*self.db).await?;
        Ok(rows)
    }

    async fn summaries(&self, usuario_id: &str) -> StoreResult<Vec<GarmentSummary>> {
        let rows = sqlx::query_as::<_, GarmentSummary>(
            "SELECT tipo, descripcion, genero FROM prendas WHERE usuario_id = ?",
        )
        .bind(usuario_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    async fn image_url(&self, id: Uuid) -> StoreResult<Option<String>> {
        let url = sqlx::query_scalar::<_, String>("SELECT imagen_url FROM prendas WHERE id = ?")
            .bind(id)
            .fetch_optional(&*self.db)
            .await?;
        Ok(url)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM prendas WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        debug!("delete garment {}: {} row(s)", id, result.rows_affected());
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}
