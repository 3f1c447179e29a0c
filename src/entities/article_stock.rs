use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-article availability aggregated from the warehouse ledgers.
///
/// Maintained outside this service; read-only here. `stock_total` is carried
/// separately from the bucket columns and is not guaranteed to equal their sum.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "article_stock")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub article_code: String,
    pub article_name: Option<String>,
    pub stock_ddd: i32,
    pub stock_ljbb: i32,
    pub stock_mbb: i32,
    pub stock_ubb: i32,
    pub stock_total: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
