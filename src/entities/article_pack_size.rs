use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Pairs-per-box master data. Read-only here.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "article_pack_sizes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub article_code: String,
    pub pairs_per_box: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
