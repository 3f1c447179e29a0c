use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::stock::ArticleCatalog;
use super::{find_dnpb, find_lines, find_order, EngineContext};
use crate::db::retry::retry_on_contention;
use crate::entities::{ro_order, ro_receipt_line, ro_status_history};
use crate::errors::ServiceError;
use crate::events::Event;
use crate::models::{DeliveryNoteFormat, ReceiptStatus, RoId, RoStatus, WarehouseBoxes};

/// An accepted status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub ro_id: RoId,
    pub from: RoStatus,
    pub to: RoStatus,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusHistoryEntry {
    /// `None` for the submission into `QUEUE`
    pub from: Option<RoStatus>,
    pub to: RoStatus,
    pub actor: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// Receipt line to be written when an order arrives.
#[derive(Debug, Clone)]
struct PlannedReceipt {
    article_code: String,
    pairs_per_box: u32,
    boxes: WarehouseBoxes,
    pairs_shipped: i32,
}

/// Drives orders through the status graph.
#[derive(Clone)]
pub struct RoStatusService {
    ctx: EngineContext,
    format: DeliveryNoteFormat,
    catalog: Arc<dyn ArticleCatalog>,
}

impl RoStatusService {
    pub fn new(
        ctx: EngineContext,
        format: DeliveryNoteFormat,
        catalog: Arc<dyn ArticleCatalog>,
    ) -> Self {
        Self {
            ctx,
            format,
            catalog,
        }
    }

    /// Moves an order from whatever status it is in now to `target`.
    #[instrument(skip(self), fields(ro_id = %ro_id, to = %target))]
    pub async fn transition(
        &self,
        ro_id: RoId,
        target: RoStatus,
        actor: &str,
    ) -> Result<StatusChange, ServiceError> {
        let current = find_order(&*self.ctx.db, ro_id).await?.status;
        self.transition_from(ro_id, current, target, actor).await
    }

    /// Moves an order from `expected` to `target`, failing with a conflict if
    /// the order is no longer in `expected` when the write lands.
    #[instrument(skip(self), fields(ro_id = %ro_id, from = %expected, to = %target))]
    pub async fn transition_from(
        &self,
        ro_id: RoId,
        expected: RoStatus,
        target: RoStatus,
        actor: &str,
    ) -> Result<StatusChange, ServiceError> {
        let order = find_order(&*self.ctx.db, ro_id).await?;
        if order.status != expected {
            counter!("replenishment.transition_conflicts", 1);
            return Err(ServiceError::Conflict(format!(
                "{} is {}, not {}",
                ro_id, order.status, expected
            )));
        }
        if !expected.can_transition_to(target) {
            return Err(ServiceError::InvalidTransition {
                from: expected,
                to: target,
            });
        }

        let receipt = if target == RoStatus::Arrived {
            Some(self.plan_receipt(ro_id).await?)
        } else {
            None
        };

        let now = Utc::now();
        let retry = self.ctx.config.retry_config();
        let receipt = receipt.as_deref();
        let outcome = retry_on_contention(&retry, "status transition", move || {
            self.apply_transition(ro_id, expected, target, actor, receipt, now)
        })
        .await;

        if let Err(e) = outcome {
            if matches!(e, ServiceError::Conflict(_)) {
                counter!("replenishment.transition_conflicts", 1);
            }
            warn!(error = %e, "status transition rejected");
            return Err(e);
        }

        counter!("replenishment.transitions", 1, "to" => target.to_string());
        info!(actor, "order status changed");

        self.ctx
            .publish(Event::StatusChanged {
                ro_id,
                from: expected,
                to: target,
                actor: actor.to_string(),
                at: now,
            })
            .await;

        Ok(StatusChange {
            ro_id,
            from: expected,
            to: target,
            changed_at: now,
        })
    }

    /// Every accepted status change of an order, oldest first.
    #[instrument(skip(self), fields(ro_id = %ro_id))]
    pub async fn history(&self, ro_id: RoId) -> Result<Vec<StatusHistoryEntry>, ServiceError> {
        find_order(&*self.ctx.db, ro_id).await?;

        ro_status_history::Entity::find()
            .filter(ro_status_history::Column::OrderId.eq(ro_id.to_string()))
            .order_by_asc(ro_status_history::Column::Id)
            .all(&*self.ctx.db)
            .await?
            .into_iter()
            .map(|row| {
                let parse = |raw: &str| {
                    raw.parse::<RoStatus>().map_err(|_| {
                        ServiceError::InternalError(format!(
                            "corrupt ro_status_history row {}: unknown status '{}'",
                            row.id, raw
                        ))
                    })
                };
                Ok(StatusHistoryEntry {
                    from: row.from_status.as_deref().map(parse).transpose()?,
                    to: parse(&row.to_status)?,
                    actor: row.actor.clone(),
                    changed_at: row.changed_at,
                })
            })
            .collect()
    }

    async fn apply_transition(
        &self,
        ro_id: RoId,
        expected: RoStatus,
        target: RoStatus,
        actor: &str,
        receipt: Option<&[PlannedReceipt]>,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let txn = self.ctx.db.begin().await?;

        // Write first so the transaction holds the order row before it reads.
        compare_and_set_status(&txn, ro_id, expected, target, now).await?;

        match (expected, target) {
            (RoStatus::DnpbProcess, RoStatus::ReadyToShip) => {
                self.ensure_delivery_note(&txn, ro_id).await?
            }
            (RoStatus::Arrived, RoStatus::Completed) => {
                ensure_no_open_discrepancy(&txn, ro_id).await?
            }
            _ => {}
        }

        record_history(&txn, ro_id, Some(expected), target, actor, now).await?;

        if let Some(lines) = receipt {
            insert_receipt(&txn, ro_id, lines, now).await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn ensure_delivery_note<C>(&self, conn: &C, ro_id: RoId) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        let records = find_dnpb(conn, ro_id).await?;
        if records
            .iter()
            .any(|record| self.format.is_well_formed(&record.number))
        {
            return Ok(());
        }

        Err(ServiceError::PreconditionFailed(format!(
            "{} has no valid DNPB number; record one before moving to {}",
            ro_id,
            RoStatus::ReadyToShip
        )))
    }

    /// Shipped pairs per line, from the allocation as it stands and the
    /// article's pack size.
    async fn plan_receipt(&self, ro_id: RoId) -> Result<Vec<PlannedReceipt>, ServiceError> {
        let lines = find_lines(&*self.ctx.db, ro_id).await?;
        let codes: Vec<String> = lines.iter().map(|l| l.article_code.clone()).collect();
        let pack_sizes = self.catalog.pairs_per_box(&codes).await?;
        let default_pairs = self.ctx.config.default_pairs_per_box;

        lines
            .into_iter()
            .map(|line| {
                let pairs_per_box = pack_sizes
                    .get(&line.article_code)
                    .copied()
                    .unwrap_or(default_pairs);
                let pairs_shipped = line
                    .boxes_requested()
                    .checked_mul(pairs_per_box)
                    .and_then(|pairs| i32::try_from(pairs).ok())
                    .ok_or_else(|| {
                        ServiceError::InternalError(format!(
                            "shipped pairs for {} overflow ({} boxes of {})",
                            line.article_code,
                            line.boxes_requested(),
                            pairs_per_box
                        ))
                    })?;

                Ok(PlannedReceipt {
                    article_code: line.article_code,
                    pairs_per_box,
                    boxes: line.boxes,
                    pairs_shipped,
                })
            })
            .collect()
    }
}

/// Sets the order's status to `target` only if it is still `expected`.
pub(crate) async fn compare_and_set_status<C>(
    conn: &C,
    ro_id: RoId,
    expected: RoStatus,
    target: RoStatus,
    at: DateTime<Utc>,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let result = ro_order::Entity::update_many()
        .col_expr(ro_order::Column::Status, Expr::value(target.to_string()))
        .col_expr(ro_order::Column::UpdatedAt, Expr::value(at))
        .col_expr(
            ro_order::Column::Version,
            Expr::col(ro_order::Column::Version).add(1),
        )
        .filter(ro_order::Column::Id.eq(ro_id.to_string()))
        .filter(ro_order::Column::Status.eq(expected.to_string()))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::Conflict(format!(
            "{} is no longer {}; refetch and retry",
            ro_id, expected
        )));
    }
    Ok(())
}

pub(crate) async fn record_history<C>(
    conn: &C,
    ro_id: RoId,
    from: Option<RoStatus>,
    to: RoStatus,
    actor: &str,
    at: DateTime<Utc>,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let entry = ro_status_history::ActiveModel {
        order_id: Set(ro_id.to_string()),
        from_status: Set(from.map(|s| s.to_string())),
        to_status: Set(to.to_string()),
        actor: Set(Some(actor.to_string())),
        changed_at: Set(at),
        ..Default::default()
    };
    ro_status_history::Entity::insert(entry).exec(conn).await?;
    Ok(())
}

async fn ensure_no_open_discrepancy<C>(conn: &C, ro_id: RoId) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let open = ro_receipt_line::Entity::find()
        .filter(ro_receipt_line::Column::OrderId.eq(ro_id.to_string()))
        .filter(ro_receipt_line::Column::Selisih.ne(0))
        .count(conn)
        .await?;

    if open > 0 {
        return Err(ServiceError::PreconditionFailed(format!(
            "{} has {} receipt line(s) with a discrepancy; raise banding or confirm it",
            ro_id, open
        )));
    }
    Ok(())
}

async fn insert_receipt<C>(
    conn: &C,
    ro_id: RoId,
    lines: &[PlannedReceipt],
    now: DateTime<Utc>,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    if lines.is_empty() {
        return Ok(());
    }

    let rows = lines.iter().map(|line| ro_receipt_line::ActiveModel {
        order_id: Set(ro_id.to_string()),
        article_code: Set(line.article_code.clone()),
        pairs_per_box: Set(line.pairs_per_box as i32),
        boxes_ddd: Set(line.boxes.ddd as i32),
        boxes_ljbb: Set(line.boxes.ljbb as i32),
        boxes_mbb: Set(line.boxes.mbb as i32),
        boxes_ubb: Set(line.boxes.ubb as i32),
        pairs_shipped: Set(line.pairs_shipped),
        fisik: Set(line.pairs_shipped),
        selisih: Set(0),
        status: Set(ReceiptStatus::Pending.to_string()),
        confirmed_by: Set(None),
        confirmed_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    });

    ro_receipt_line::Entity::insert_many(rows)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}
