//! Read-only collaborators: live stock availability, pack sizes and the
//! warehouse transaction ledgers.
//!
//! None of these are cached. Availability is shared by every store submitting
//! at the same time, so each call reads current values.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde::Serialize;
use tracing::warn;

use crate::db::DbPool;
use crate::entities::{article_pack_size, article_stock, warehouse_transaction};
use crate::errors::ServiceError;
use crate::models::WarehouseBoxes;

/// Available boxes for one article at the time of the read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleAvailability {
    pub article_code: String,
    pub article_name: Option<String>,
    pub boxes: WarehouseBoxes,
    /// Total as reported by the stock view; may lag the per-bucket figures.
    pub total: u32,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StockSnapshotProvider: Send + Sync {
    /// Availability for the given codes. Codes with no stock entry are simply
    /// absent from the result.
    async fn snapshot(&self, article_codes: &[String])
        -> Result<Vec<ArticleAvailability>, ServiceError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArticleCatalog: Send + Sync {
    /// Pairs per box for the codes that have master data.
    async fn pairs_per_box(&self, article_codes: &[String])
        -> Result<HashMap<String, u32>, ServiceError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryNoteLedger: Send + Sync {
    /// Whether `source` has at least one row carrying exactly `number`.
    async fn contains_delivery_note(&self, source: &str, number: &str)
        -> Result<bool, ServiceError>;
}

/// The external lookups the engine is built with.
#[derive(Clone)]
pub struct Collaborators {
    pub stock: Arc<dyn StockSnapshotProvider>,
    pub catalog: Arc<dyn ArticleCatalog>,
    pub ledger: Arc<dyn DeliveryNoteLedger>,
}

impl Collaborators {
    /// Collaborators backed by the stock, pack size and ledger tables of the
    /// engine's own database.
    pub fn database(db: Arc<DbPool>) -> Self {
        Self {
            stock: Arc::new(DbStockSnapshot::new(db.clone())),
            catalog: Arc::new(DbArticleCatalog::new(db.clone())),
            ledger: Arc::new(DbDeliveryNoteLedger::new(db)),
        }
    }
}

fn clamp(article_code: &str, column: &str, value: i32) -> u32 {
    u32::try_from(value).unwrap_or_else(|_| {
        warn!(article_code, column, value, "negative stock reported, treating as zero");
        0
    })
}

#[derive(Clone)]
pub struct DbStockSnapshot {
    db: Arc<DbPool>,
}

impl DbStockSnapshot {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StockSnapshotProvider for DbStockSnapshot {
    async fn snapshot(
        &self,
        article_codes: &[String],
    ) -> Result<Vec<ArticleAvailability>, ServiceError> {
        if article_codes.is_empty() {
            return Ok(Vec::new());
        }

        let rows = article_stock::Entity::find()
            .filter(article_stock::Column::ArticleCode.is_in(article_codes.iter().cloned()))
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let code = row.article_code.as_str();
                ArticleAvailability {
                    boxes: WarehouseBoxes {
                        ddd: clamp(code, "stock_ddd", row.stock_ddd),
                        ljbb: clamp(code, "stock_ljbb", row.stock_ljbb),
                        mbb: clamp(code, "stock_mbb", row.stock_mbb),
                        ubb: clamp(code, "stock_ubb", row.stock_ubb),
                    },
                    total: clamp(code, "stock_total", row.stock_total),
                    article_name: row.article_name,
                    article_code: row.article_code,
                }
            })
            .collect())
    }
}

#[derive(Clone)]
pub struct DbArticleCatalog {
    db: Arc<DbPool>,
}

impl DbArticleCatalog {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ArticleCatalog for DbArticleCatalog {
    async fn pairs_per_box(
        &self,
        article_codes: &[String],
    ) -> Result<HashMap<String, u32>, ServiceError> {
        if article_codes.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = article_pack_size::Entity::find()
            .filter(article_pack_size::Column::ArticleCode.is_in(article_codes.iter().cloned()))
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match u32::try_from(row.pairs_per_box) {
                Ok(pairs) if pairs > 0 => Some((row.article_code, pairs)),
                _ => {
                    warn!(
                        article_code = %row.article_code,
                        pairs_per_box = row.pairs_per_box,
                        "ignoring non-positive pack size"
                    );
                    None
                }
            })
            .collect())
    }
}

#[derive(Clone)]
pub struct DbDeliveryNoteLedger {
    db: Arc<DbPool>,
}

impl DbDeliveryNoteLedger {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DeliveryNoteLedger for DbDeliveryNoteLedger {
    async fn contains_delivery_note(&self, source: &str, number: &str) -> Result<bool, ServiceError> {
        let rows = warehouse_transaction::Entity::find()
            .filter(warehouse_transaction::Column::Source.eq(source))
            .filter(warehouse_transaction::Column::DeliveryNote.eq(number))
            .count(&*self.db)
            .await?;

        Ok(rows > 0)
    }
}
