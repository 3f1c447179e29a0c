//! Post-arrival handling: physical counts, banding notices and confirmed
//! discrepancies.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::allocation::{self, Reconciliation};
use super::ro_status::{compare_and_set_status, record_history};
use super::{find_dnpb, find_order, find_receipt, EngineContext};
use crate::db::retry::retry_on_contention;
use crate::entities::{ro_banding_notice, ro_order, ro_order_line, ro_receipt_line};
use crate::errors::ServiceError;
use crate::events::Event;
use crate::models::{
    BandingNotice, BandingStatus, DnpbRecord, ReceiptLine, ReceiptStatus, RoId, RoOrder,
    RoStatus, WarehouseBoxes,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalCount {
    pub article_code: String,
    /// Pairs counted at the store
    pub fisik: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordCountsRequest {
    #[serde(default)]
    pub counts: Vec<PhysicalCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledLine {
    pub article_code: String,
    pub pairs_per_box: u32,
    pub pairs_shipped: u32,
    pub fisik: u32,
    pub selisih: i32,
    pub fisik_boxes: u32,
    pub previous: WarehouseBoxes,
    pub reconciled: WarehouseBoxes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmOutcome {
    pub ro_id: RoId,
    pub status: RoStatus,
    pub confirmed_by: String,
    pub confirmed_at: DateTime<Utc>,
    /// Lines whose allocation was re-proportioned; lines without a
    /// discrepancy keep their allocation and are not listed
    pub lines: Vec<ReconciledLine>,
}

/// One order on the DNPB error list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmedDiscrepancy {
    pub ro_id: RoId,
    pub store_name: String,
    pub dnpb: Vec<DnpbRecord>,
    pub total_items: usize,
    pub total_selisih: i64,
    pub confirmed_by: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub details: Vec<ReceiptLine>,
}

/// Decides what happens to an arrived order whose counts disagree with what
/// was shipped.
#[derive(Clone)]
pub struct DiscrepancyService {
    ctx: EngineContext,
}

impl DiscrepancyService {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Stores the store's physical counts and recomputes each line's selisih.
    #[instrument(skip(self, counts), fields(ro_id = %ro_id, counts = counts.len()))]
    pub async fn record_physical_counts(
        &self,
        ro_id: RoId,
        counts: &[PhysicalCount],
        actor: &str,
    ) -> Result<Vec<ReceiptLine>, ServiceError> {
        let order = find_order(&*self.ctx.db, ro_id).await?;
        ensure_arrived(&order)?;
        let receipt: HashMap<String, ReceiptLine> = find_receipt(&*self.ctx.db, ro_id)
            .await?
            .into_iter()
            .map(|line| (line.article_code.clone(), line))
            .collect();

        let mut violations = Vec::new();
        if counts.is_empty() {
            violations.push("counts: at least one count is required".to_string());
        }

        let mut seen = HashSet::new();
        let mut updates = Vec::with_capacity(counts.len());
        for (index, count) in counts.iter().enumerate() {
            let code = count.article_code.trim();
            if code.is_empty() {
                violations.push(format!("counts[{}]: article_code must not be empty", index));
                continue;
            }
            if !seen.insert(code.to_string()) {
                violations.push(format!("{}: counted more than once", code));
                continue;
            }
            let Some(line) = receipt.get(code) else {
                violations.push(format!("{}: article has no receipt line on {}", code, ro_id));
                continue;
            };
            if count.fisik < 0 {
                violations.push(format!(
                    "{}: fisik must not be negative, got {}",
                    code, count.fisik
                ));
                continue;
            }
            let Ok(fisik) = i32::try_from(count.fisik) else {
                violations.push(format!("{}: fisik {} is too large", code, count.fisik));
                continue;
            };
            let selisih = fisik - line.pairs_shipped as i32;
            updates.push((code.to_string(), fisik, selisih));
        }

        if !violations.is_empty() {
            return Err(ServiceError::Violations(violations));
        }

        let now = Utc::now();
        let retry = self.ctx.config.retry_config();
        let updates_ref = &updates;
        retry_on_contention(&retry, "physical count update", move || {
            self.write_counts(ro_id, updates_ref, now)
        })
        .await?;

        let discrepant = updates.iter().filter(|(_, _, selisih)| *selisih != 0).count();
        info!(actor, discrepant, "physical counts recorded");

        find_receipt(&*self.ctx.db, ro_id).await
    }

    /// Flags an arrived order for a re-check at the store. The order and its
    /// allocation are left as they are.
    #[instrument(skip(self), fields(ro_id = %ro_id))]
    pub async fn raise_banding(&self, ro_id: RoId, actor: &str) -> Result<BandingNotice, ServiceError> {
        let order = find_order(&*self.ctx.db, ro_id).await?;
        ensure_arrived(&order)?;

        let notice = BandingNotice {
            id: Uuid::new_v4(),
            order_id: ro_id,
            raised_by: actor.to_string(),
            raised_at: Utc::now(),
            status: BandingStatus::Pending,
            message: self.ctx.config.banding_message.clone(),
        };

        let txn = self.ctx.db.begin().await?;
        hold_arrived(&txn, ro_id, notice.raised_at).await?;
        ro_banding_notice::Entity::insert(ro_banding_notice::ActiveModel {
            id: Set(notice.id),
            order_id: Set(ro_id.to_string()),
            raised_by: Set(notice.raised_by.clone()),
            raised_at: Set(notice.raised_at),
            status: Set(notice.status.to_string()),
            message: Set(notice.message.clone()),
        })
        .exec_without_returning(&txn)
        .await?;
        txn.commit().await?;

        counter!("replenishment.banding_notices", 1);
        warn!(notice_id = %notice.id, actor, "banding notice raised");

        self.ctx
            .publish(Event::BandingRaised {
                ro_id,
                notice_id: notice.id,
                raised_by: notice.raised_by.clone(),
            })
            .await;

        Ok(notice)
    }

    /// Accepts the physical counts as final: every discrepant line is
    /// re-proportioned to what arrived and the order completes directly.
    #[instrument(skip(self), fields(ro_id = %ro_id))]
    pub async fn confirm_discrepancy(
        &self,
        ro_id: RoId,
        actor: &str,
    ) -> Result<ConfirmOutcome, ServiceError> {
        let order = find_order(&*self.ctx.db, ro_id).await?;
        ensure_arrived(&order)?;

        let lines: Vec<ReconciledLine> = find_receipt(&*self.ctx.db, ro_id)
            .await?
            .into_iter()
            .filter(ReceiptLine::has_discrepancy)
            .map(|line| {
                let Reconciliation { fisik_boxes, boxes } =
                    allocation::reconcile(&line.boxes, line.fisik, line.pairs_per_box);
                ReconciledLine {
                    article_code: line.article_code,
                    pairs_per_box: line.pairs_per_box,
                    pairs_shipped: line.pairs_shipped,
                    fisik: line.fisik,
                    selisih: line.selisih,
                    fisik_boxes,
                    previous: line.boxes,
                    reconciled: boxes,
                }
            })
            .collect();

        let now = Utc::now();
        let retry = self.ctx.config.retry_config();
        let lines_ref = &lines;
        retry_on_contention(&retry, "discrepancy confirmation", move || {
            self.apply_confirmation(ro_id, lines_ref, actor, now)
        })
        .await?;

        counter!("replenishment.discrepancies_confirmed", 1);
        info!(actor, reconciled = lines.len(), "discrepancy confirmed, order completed");

        self.ctx
            .publish(Event::StatusChanged {
                ro_id,
                from: RoStatus::Arrived,
                to: RoStatus::Completed,
                actor: actor.to_string(),
                at: now,
            })
            .await;
        self.ctx
            .publish(Event::DiscrepancyConfirmed {
                ro_id,
                confirmed_by: actor.to_string(),
                reconciled_lines: lines.len(),
            })
            .await;

        Ok(ConfirmOutcome {
            ro_id,
            status: RoStatus::Completed,
            confirmed_by: actor.to_string(),
            confirmed_at: now,
            lines,
        })
    }

    /// Orders whose discrepancy was confirmed, newest confirmation first.
    #[instrument(skip(self))]
    pub async fn list_confirmed_discrepancies(
        &self,
    ) -> Result<Vec<ConfirmedDiscrepancy>, ServiceError> {
        let db = &*self.ctx.db;
        let confirmed = ro_receipt_line::Entity::find()
            .filter(ro_receipt_line::Column::Status.eq(ReceiptStatus::ConfirmedDiscrepancy.to_string()))
            .order_by_asc(ro_receipt_line::Column::OrderId)
            .all(db)
            .await?;

        let mut ro_ids: Vec<String> = confirmed.into_iter().map(|row| row.order_id).collect();
        ro_ids.dedup();

        let mut report = Vec::with_capacity(ro_ids.len());
        for raw_id in ro_ids {
            let Some(row) = ro_order::Entity::find_by_id(raw_id.clone()).one(db).await? else {
                warn!(ro_id = %raw_id, "confirmed receipt lines without an order");
                continue;
            };
            let order = RoOrder::try_from(row)?;
            let details = find_receipt(db, order.id).await?;

            report.push(ConfirmedDiscrepancy {
                ro_id: order.id,
                dnpb: find_dnpb(db, order.id).await?,
                total_items: details.len(),
                total_selisih: details.iter().map(|line| i64::from(line.selisih)).sum(),
                confirmed_by: details.iter().find_map(|line| line.confirmed_by.clone()),
                confirmed_at: details.iter().filter_map(|line| line.confirmed_at).max(),
                store_name: order.store_name,
                details,
            });
        }

        report.sort_by(|a, b| b.confirmed_at.cmp(&a.confirmed_at));
        Ok(report)
    }

    async fn write_counts(
        &self,
        ro_id: RoId,
        updates: &[(String, i32, i32)],
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let txn = self.ctx.db.begin().await?;
        hold_arrived(&txn, ro_id, now).await?;

        for (code, fisik, selisih) in updates {
            ro_receipt_line::Entity::update_many()
                .col_expr(ro_receipt_line::Column::Fisik, Expr::value(*fisik))
                .col_expr(ro_receipt_line::Column::Selisih, Expr::value(*selisih))
                .col_expr(ro_receipt_line::Column::UpdatedAt, Expr::value(now))
                .filter(ro_receipt_line::Column::OrderId.eq(ro_id.to_string()))
                .filter(ro_receipt_line::Column::ArticleCode.eq(code.as_str()))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn apply_confirmation(
        &self,
        ro_id: RoId,
        lines: &[ReconciledLine],
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let txn = self.ctx.db.begin().await?;

        compare_and_set_status(&txn, ro_id, RoStatus::Arrived, RoStatus::Completed, now).await?;

        for line in lines {
            let boxes = &line.reconciled;
            ro_order_line::Entity::update_many()
                .col_expr(ro_order_line::Column::BoxesDdd, Expr::value(boxes.ddd as i32))
                .col_expr(ro_order_line::Column::BoxesLjbb, Expr::value(boxes.ljbb as i32))
                .col_expr(ro_order_line::Column::BoxesMbb, Expr::value(boxes.mbb as i32))
                .col_expr(ro_order_line::Column::BoxesUbb, Expr::value(boxes.ubb as i32))
                .col_expr(
                    ro_order_line::Column::BoxesRequested,
                    Expr::value(boxes.total() as i32),
                )
                .col_expr(ro_order_line::Column::UpdatedAt, Expr::value(now))
                .filter(ro_order_line::Column::OrderId.eq(ro_id.to_string()))
                .filter(ro_order_line::Column::ArticleCode.eq(line.article_code.as_str()))
                .exec(&txn)
                .await?;
        }

        ro_receipt_line::Entity::update_many()
            .col_expr(
                ro_receipt_line::Column::Status,
                Expr::value(ReceiptStatus::ConfirmedDiscrepancy.to_string()),
            )
            .col_expr(
                ro_receipt_line::Column::ConfirmedBy,
                Expr::value(Some(actor.to_string())),
            )
            .col_expr(ro_receipt_line::Column::ConfirmedAt, Expr::value(Some(now)))
            .col_expr(ro_receipt_line::Column::UpdatedAt, Expr::value(now))
            .filter(ro_receipt_line::Column::OrderId.eq(ro_id.to_string()))
            .exec(&txn)
            .await?;

        record_history(&txn, ro_id, Some(RoStatus::Arrived), RoStatus::Completed, actor, now)
            .await?;

        txn.commit().await?;
        Ok(())
    }
}

fn ensure_arrived(order: &RoOrder) -> Result<(), ServiceError> {
    if order.status == RoStatus::Arrived {
        return Ok(());
    }
    Err(ServiceError::Conflict(format!(
        "{} must be {} for this action; it is {}",
        order.id,
        RoStatus::Arrived,
        order.status
    )))
}

/// Touches the order only if it is still ARRIVED, so the surrounding
/// transaction cannot interleave with a confirmation or cancellation.
async fn hold_arrived<C>(conn: &C, ro_id: RoId, now: DateTime<Utc>) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let touched = ro_order::Entity::update_many()
        .col_expr(ro_order::Column::UpdatedAt, Expr::value(now))
        .filter(ro_order::Column::Id.eq(ro_id.to_string()))
        .filter(ro_order::Column::Status.eq(RoStatus::Arrived.to_string()))
        .exec(conn)
        .await?;

    if touched.rows_affected == 0 {
        return Err(ServiceError::Conflict(format!(
            "{} is no longer {}; refetch and retry",
            ro_id,
            RoStatus::Arrived
        )));
    }
    Ok(())
}
