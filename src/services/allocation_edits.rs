use std::collections::HashSet;

use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tracing::{info, instrument, warn};

use super::allocation;
use super::{find_lines, find_order, EngineContext};
use crate::entities::{ro_order, ro_order_line};
use crate::errors::ServiceError;
use crate::events::Event;
use crate::models::{BoxCounts, RoId, RoOrder, RoStatus, WarehouseBoxes};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub article_code: String,
    #[serde(default)]
    pub boxes: BoxCounts,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchEditRequest {
    #[serde(default)]
    pub entries: Vec<AllocationEntry>,
}

/// A batch that passed structural validation and is ready to be written.
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    ro_id: RoId,
    entries: Vec<(String, WarehouseBoxes)>,
}

impl PreparedBatch {
    pub fn ro_id(&self) -> RoId {
        self.ro_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditedLine {
    pub article_code: String,
    pub boxes: WarehouseBoxes,
    pub boxes_requested: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedEdit {
    pub article_code: String,
    pub reason: String,
}

/// Per-entry result of a batch edit. A non-empty `failed` list is still a
/// successful call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchEditOutcome {
    pub updated: Vec<EditedLine>,
    pub failed: Vec<FailedEdit>,
}

impl BatchEditOutcome {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Manual per-warehouse allocation changes on orders that have not shipped.
#[derive(Clone)]
pub struct AllocationEditService {
    ctx: EngineContext,
}

impl AllocationEditService {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Validates and applies a batch in one call.
    #[instrument(skip(self, entries), fields(ro_id = %ro_id, entries = entries.len()))]
    pub async fn batch_edit(
        &self,
        ro_id: RoId,
        entries: &[AllocationEntry],
        actor: &str,
    ) -> Result<BatchEditOutcome, ServiceError> {
        let batch = self.prepare_batch(ro_id, entries).await?;
        self.apply_batch(&batch, actor).await
    }

    /// Structural validation. Any violation rejects the whole batch before
    /// anything is written.
    pub async fn prepare_batch(
        &self,
        ro_id: RoId,
        entries: &[AllocationEntry],
    ) -> Result<PreparedBatch, ServiceError> {
        let order = find_order(&*self.ctx.db, ro_id).await?;
        let on_order: HashSet<String> = find_lines(&*self.ctx.db, ro_id)
            .await?
            .into_iter()
            .map(|line| line.article_code)
            .collect();

        let mut violations = Vec::new();
        if entries.is_empty() {
            violations.push("entries: at least one entry is required".to_string());
        }

        let mut seen = HashSet::new();
        let mut prepared = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let code = entry.article_code.trim();
            if code.is_empty() {
                violations.push(format!("entries[{}]: article_code must not be empty", index));
                continue;
            }
            if !seen.insert(code.to_string()) {
                violations.push(format!("{}: appears more than once in the batch", code));
                continue;
            }
            if !on_order.contains(code) {
                violations.push(format!("{}: article is not on order {}", code, ro_id));
                continue;
            }
            match allocation::baseline(code, &entry.boxes) {
                Ok(boxes) => prepared.push((code.to_string(), boxes)),
                Err(bucket_violations) => violations.extend(bucket_violations),
            }
        }

        if !violations.is_empty() {
            counter!("replenishment.allocation_edits_rejected", 1);
            return Err(ServiceError::Violations(violations));
        }

        ensure_editable(&order)?;

        Ok(PreparedBatch {
            ro_id,
            entries: prepared,
        })
    }

    /// Writes each entry on its own. An entry whose line vanished, or whose
    /// order left the editable stages, is reported as failed; the rest still
    /// go through.
    pub async fn apply_batch(
        &self,
        batch: &PreparedBatch,
        actor: &str,
    ) -> Result<BatchEditOutcome, ServiceError> {
        let now = Utc::now();
        let mut outcome = BatchEditOutcome::default();

        for (code, boxes) in &batch.entries {
            match self.write_line(batch.ro_id, code, boxes, now).await {
                Ok(true) => outcome.updated.push(EditedLine {
                    article_code: code.clone(),
                    boxes: *boxes,
                    boxes_requested: boxes.total(),
                }),
                Ok(false) => outcome.failed.push(FailedEdit {
                    article_code: code.clone(),
                    reason: format!(
                        "line is no longer on {} or the order is past {}",
                        batch.ro_id,
                        RoStatus::DnpbProcess
                    ),
                }),
                Err(e) => {
                    warn!(ro_id = %batch.ro_id, article_code = %code, error = %e, "allocation write failed");
                    outcome.failed.push(FailedEdit {
                        article_code: code.clone(),
                        reason: e.response_message(),
                    });
                }
            }
        }

        counter!("replenishment.allocation_edits", outcome.updated.len() as u64);
        if outcome.is_partial() {
            warn!(ro_id = %batch.ro_id, failed = outcome.failed.len(), actor, "batch edit partially applied");
        } else {
            info!(ro_id = %batch.ro_id, updated = outcome.updated.len(), actor, "batch edit applied");
        }

        self.publish(batch.ro_id, &outcome).await;
        Ok(outcome)
    }

    /// Replaces the allocation of a single line.
    #[instrument(skip(self, counts), fields(ro_id = %ro_id, article_code = %article_code))]
    pub async fn edit_line(
        &self,
        ro_id: RoId,
        article_code: &str,
        counts: &BoxCounts,
        actor: &str,
    ) -> Result<EditedLine, ServiceError> {
        let article_code = article_code.trim();
        let order = find_order(&*self.ctx.db, ro_id).await?;
        let boxes = allocation::baseline(article_code, counts).map_err(ServiceError::Violations)?;

        let lines = find_lines(&*self.ctx.db, ro_id).await?;
        if !lines.iter().any(|line| line.article_code == article_code) {
            return Err(ServiceError::NotFound(format!(
                "Article {} is not on order {}",
                article_code, ro_id
            )));
        }
        ensure_editable(&order)?;

        if !self.write_line(ro_id, article_code, &boxes, Utc::now()).await? {
            return Err(ServiceError::Conflict(format!(
                "{} changed while {} was being edited; refetch and retry",
                ro_id, article_code
            )));
        }

        let edited = EditedLine {
            article_code: article_code.to_string(),
            boxes,
            boxes_requested: boxes.total(),
        };
        counter!("replenishment.allocation_edits", 1);
        info!(actor, boxes_requested = edited.boxes_requested, "line allocation edited");

        self.publish(
            ro_id,
            &BatchEditOutcome {
                updated: vec![edited.clone()],
                failed: Vec::new(),
            },
        )
        .await;
        Ok(edited)
    }

    /// Writes the four buckets and their sum together, only while the order
    /// is still in an editable status. Returns whether a row was changed.
    async fn write_line(
        &self,
        ro_id: RoId,
        article_code: &str,
        boxes: &WarehouseBoxes,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let editable: Vec<String> = RoStatus::iter()
            .filter(|status| status.allows_allocation_edits())
            .map(|status| status.to_string())
            .collect();

        let still_editable = Query::select()
            .column(ro_order::Column::Id)
            .from(ro_order::Entity)
            .and_where(ro_order::Column::Id.eq(ro_id.to_string()))
            .and_where(ro_order::Column::Status.is_in(editable))
            .to_owned();

        let result = ro_order_line::Entity::update_many()
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
            .filter(ro_order_line::Column::ArticleCode.eq(article_code))
            .filter(ro_order_line::Column::OrderId.in_subquery(still_editable))
            .exec(&*self.ctx.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn publish(&self, ro_id: RoId, outcome: &BatchEditOutcome) {
        self.ctx
            .publish(Event::AllocationEdited {
                ro_id,
                updated: outcome
                    .updated
                    .iter()
                    .map(|line| line.article_code.clone())
                    .collect(),
                failed: outcome
                    .failed
                    .iter()
                    .map(|line| line.article_code.clone())
                    .collect(),
            })
            .await;
    }
}

fn ensure_editable(order: &RoOrder) -> Result<(), ServiceError> {
    if order.status.allows_allocation_edits() {
        return Ok(());
    }
    Err(ServiceError::Conflict(format!(
        "allocations of {} can only change up to {}; it is {}",
        order.id,
        RoStatus::DnpbProcess,
        order.status
    )))
}
