use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ro_receipt_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub order_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub article_code: String,
    pub pairs_per_box: i32,
    /// Allocation at the time the order arrived
    pub boxes_ddd: i32,
    pub boxes_ljbb: i32,
    pub boxes_mbb: i32,
    pub boxes_ubb: i32,
    pub pairs_shipped: i32,
    pub fisik: i32,
    pub selisih: i32,
    pub status: String,
    pub confirmed_by: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
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
