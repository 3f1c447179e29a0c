use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One article on an order. `boxes_requested` always equals the sum of the
/// four bucket columns; it is written only together with them.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ro_order_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub order_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub article_code: String,
    pub article_name: Option<String>,
    pub boxes_requested: i32,
    pub boxes_ddd: i32,
    pub boxes_ljbb: i32,
    pub boxes_mbb: i32,
    pub boxes_ubb: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::ro_order::Entity",
        from = "Column::OrderId",
        to = "super::ro_order::Column::Id"
    )]
    Order,
}

impl Related<super::ro_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
