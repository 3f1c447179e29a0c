use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use super::{RoId, RoStatus, Warehouse, WarehouseBoxes};
use crate::entities::{ro_banding_notice, ro_dnpb, ro_order, ro_order_line, ro_receipt_line};
use crate::errors::ServiceError;

fn corrupt(table: &str, key: &str, what: impl std::fmt::Display) -> ServiceError {
    ServiceError::InternalError(format!("corrupt {} row {}: {}", table, key, what))
}

fn count(table: &str, key: &str, column: &str, value: i32) -> Result<u32, ServiceError> {
    u32::try_from(value).map_err(|_| corrupt(table, key, format!("{} is negative ({})", column, value)))
}

fn order_id(table: &str, raw: &str) -> Result<RoId, ServiceError> {
    raw.parse().map_err(|e| corrupt(table, raw, e))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoOrder {
    pub id: RoId,
    pub store_name: String,
    pub notes: Option<String>,
    pub status: RoStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

impl TryFrom<ro_order::Model> for RoOrder {
    type Error = ServiceError;

    fn try_from(model: ro_order::Model) -> Result<Self, Self::Error> {
        let id = order_id("ro_orders", &model.id)?;
        let status = model
            .status
            .parse()
            .map_err(|_| corrupt("ro_orders", &model.id, format!("unknown status '{}'", model.status)))?;

        Ok(Self {
            id,
            store_name: model.store_name,
            notes: model.notes,
            status,
            created_at: model.created_at,
            updated_at: model.updated_at,
            version: model.version,
        })
    }
}

/// An article on an order. The requested total is not stored separately:
/// it is always the sum of `boxes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    pub article_code: String,
    pub article_name: Option<String>,
    pub boxes: WarehouseBoxes,
}

impl OrderLine {
    pub fn boxes_requested(&self) -> u32 {
        self.boxes.total()
    }
}

impl TryFrom<ro_order_line::Model> for OrderLine {
    type Error = ServiceError;

    fn try_from(model: ro_order_line::Model) -> Result<Self, Self::Error> {
        let key = format!("{}/{}", model.order_id, model.article_code);
        let table = "ro_order_lines";
        let boxes = WarehouseBoxes {
            ddd: count(table, &key, "boxes_ddd", model.boxes_ddd)?,
            ljbb: count(table, &key, "boxes_ljbb", model.boxes_ljbb)?,
            mbb: count(table, &key, "boxes_mbb", model.boxes_mbb)?,
            ubb: count(table, &key, "boxes_ubb", model.boxes_ubb)?,
        };

        if i64::from(boxes.total()) != i64::from(model.boxes_requested) {
            return Err(corrupt(
                table,
                &key,
                format!(
                    "boxes_requested {} does not match bucket sum {}",
                    model.boxes_requested,
                    boxes.total()
                ),
            ));
        }

        Ok(Self {
            article_code: model.article_code,
            article_name: model.article_name,
            boxes,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnpbRecord {
    pub warehouse: Warehouse,
    pub number: String,
    /// Whether the number was found in the warehouse's ledger when recorded
    pub matched: bool,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ro_dnpb::Model> for DnpbRecord {
    type Error = ServiceError;

    fn try_from(model: ro_dnpb::Model) -> Result<Self, Self::Error> {
        let warehouse = Warehouse::from_code(&model.warehouse).ok_or_else(|| {
            corrupt(
                "ro_dnpb",
                &model.order_id,
                format!("unknown warehouse '{}'", model.warehouse),
            )
        })?;

        Ok(Self {
            warehouse,
            number: model.number,
            matched: model.matched,
            updated_at: model.updated_at,
        })
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptStatus {
    Pending,
    ConfirmedDiscrepancy,
}

/// Shipped versus physically counted pairs for one article of an arrived order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptLine {
    pub article_code: String,
    pub pairs_per_box: u32,
    /// Allocation as it stood when the order arrived
    pub boxes: WarehouseBoxes,
    pub pairs_shipped: u32,
    pub fisik: u32,
    /// `fisik - pairs_shipped`
    pub selisih: i32,
    pub status: ReceiptStatus,
    pub confirmed_by: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl ReceiptLine {
    pub fn has_discrepancy(&self) -> bool {
        self.selisih != 0
    }
}

impl TryFrom<ro_receipt_line::Model> for ReceiptLine {
    type Error = ServiceError;

    fn try_from(model: ro_receipt_line::Model) -> Result<Self, Self::Error> {
        let key = format!("{}/{}", model.order_id, model.article_code);
        let table = "ro_receipt_lines";
        let pairs_per_box = count(table, &key, "pairs_per_box", model.pairs_per_box)?;
        if pairs_per_box == 0 {
            return Err(corrupt(table, &key, "pairs_per_box is zero"));
        }
        let status = model
            .status
            .parse()
            .map_err(|_| corrupt(table, &key, format!("unknown status '{}'", model.status)))?;

        Ok(Self {
            pairs_per_box,
            boxes: WarehouseBoxes {
                ddd: count(table, &key, "boxes_ddd", model.boxes_ddd)?,
                ljbb: count(table, &key, "boxes_ljbb", model.boxes_ljbb)?,
                mbb: count(table, &key, "boxes_mbb", model.boxes_mbb)?,
                ubb: count(table, &key, "boxes_ubb", model.boxes_ubb)?,
            },
            pairs_shipped: count(table, &key, "pairs_shipped", model.pairs_shipped)?,
            fisik: count(table, &key, "fisik", model.fisik)?,
            selisih: model.selisih,
            status,
            confirmed_by: model.confirmed_by,
            confirmed_at: model.confirmed_at,
            article_code: model.article_code,
        })
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BandingStatus {
    Pending,
    Acknowledged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BandingNotice {
    pub id: Uuid,
    pub order_id: RoId,
    pub raised_by: String,
    pub raised_at: DateTime<Utc>,
    pub status: BandingStatus,
    pub message: String,
}

impl TryFrom<ro_banding_notice::Model> for BandingNotice {
    type Error = ServiceError;

    fn try_from(model: ro_banding_notice::Model) -> Result<Self, Self::Error> {
        let key = model.id.to_string();
        let status = model.status.parse().map_err(|_| {
            corrupt("ro_banding_notices", &key, format!("unknown status '{}'", model.status))
        })?;

        Ok(Self {
            id: model.id,
            order_id: order_id("ro_banding_notices", &model.order_id)?,
            raised_by: model.raised_by,
            raised_at: model.raised_at,
            status,
            message: model.message,
        })
    }
}

/// An order together with everything attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoOrderDetail {
    #[serde(flatten)]
    pub order: RoOrder,
    pub lines: Vec<OrderLine>,
    pub dnpb: Vec<DnpbRecord>,
    pub receipt: Vec<ReceiptLine>,
    pub banding: Vec<BandingNotice>,
}

impl RoOrderDetail {
    pub fn total_boxes(&self) -> u32 {
        self.lines.iter().map(OrderLine::boxes_requested).sum()
    }
}

/// One row of the order list: the order plus aggregated line totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoOrderSummary {
    pub id: RoId,
    pub store_name: String,
    pub status: RoStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub line_count: u32,
    pub boxes: WarehouseBoxes,
    pub total_boxes: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn line_model(ddd: i32, ljbb: i32, requested: i32) -> ro_order_line::Model {
        let now = Utc::now();
        ro_order_line::Model {
            order_id: "RO-2603-0001".into(),
            article_code: "A1".into(),
            article_name: Some("Runner".into()),
            boxes_requested: requested,
            boxes_ddd: ddd,
            boxes_ljbb: ljbb,
            boxes_mbb: 0,
            boxes_ubb: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn line_total_is_derived_from_buckets() {
        let line = OrderLine::try_from(line_model(6, 2, 8)).unwrap();
        assert_eq!(line.boxes_requested(), 8);
        assert_eq!(line.boxes.get(Warehouse::Ljbb), 2);
    }

    #[test]
    fn line_with_drifted_total_is_corrupt() {
        assert_matches!(
            OrderLine::try_from(line_model(6, 2, 9)),
            Err(ServiceError::InternalError(_))
        );
    }

    #[test]
    fn negative_bucket_is_corrupt() {
        assert_matches!(
            OrderLine::try_from(line_model(-1, 2, 1)),
            Err(ServiceError::InternalError(_))
        );
    }

    #[test]
    fn order_with_unknown_status_is_corrupt() {
        let now = Utc::now();
        let model = ro_order::Model {
            id: "RO-2603-0001".into(),
            store_name: "S".into(),
            notes: None,
            status: "SHIPPED".into(),
            created_at: now,
            updated_at: now,
            version: 0,
        };
        assert_matches!(RoOrder::try_from(model), Err(ServiceError::InternalError(_)));
    }

    #[test]
    fn receipt_status_wire_names() {
        assert_eq!(ReceiptStatus::ConfirmedDiscrepancy.as_ref(), "CONFIRMED_DISCREPANCY");
        assert_eq!("PENDING".parse::<ReceiptStatus>().unwrap(), ReceiptStatus::Pending);
    }
}
