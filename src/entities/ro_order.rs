use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, Set};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ro_orders")]
pub struct Model {
    /// `RO-<YYMM>-<NNNN>`
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub store_name: String,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ro_order_line::Entity")]
    Lines,
    #[sea_orm(has_many = "super::ro_dnpb::Entity")]
    DeliveryNotes,
    #[sea_orm(has_many = "super::ro_receipt_line::Entity")]
    ReceiptLines,
    #[sea_orm(has_many = "super::ro_banding_notice::Entity")]
    BandingNotices,
    #[sea_orm(has_many = "super::ro_status_history::Entity")]
    StatusHistory,
}

impl Related<super::ro_order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl Related<super::ro_dnpb::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryNotes.def()
    }
}

impl Related<super::ro_receipt_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReceiptLines.def()
    }
}

impl Related<super::ro_banding_notice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BandingNotices.def()
    }
}

impl Related<super::ro_status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }

        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(now);
        }

        Ok(active_model)
    }
}
