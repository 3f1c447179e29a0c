use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use validator::Validate;

use super::allocation::{self, Split};
use super::order_validator::{OrderValidator, SubmitOrderRequest, ValidatedLine};
use super::ro_sequence::next_ro_id;
use super::ro_status::record_history;
use super::stock::StockSnapshotProvider;
use super::{find_banding, find_dnpb, find_lines, find_order, find_receipt, EngineContext};
use crate::db::retry::retry_on_contention;
use crate::entities::{ro_order, ro_order_line};
use crate::errors::{validation_messages, ServiceError};
use crate::events::Event;
use crate::models::{
    OrderLine, Period, RoId, RoOrder, RoOrderDetail, RoOrderSummary, RoStatus, Warehouse,
    WarehouseBoxes, MAX_BOXES_PER_BUCKET,
};

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmittedOrder {
    pub ro_id: RoId,
    pub status: RoStatus,
    pub store_name: String,
    pub line_count: usize,
    pub boxes: WarehouseBoxes,
    pub total_boxes: u32,
    pub lines: Vec<OrderLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SuggestAllocationRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub article_code: String,
    #[validate(range(min = 0, max = 100000, message = "must be between 0 and 100000"))]
    pub suggested: i64,
    pub primary: Warehouse,
    pub secondary: Warehouse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationSuggestion {
    pub article_code: String,
    pub article_name: Option<String>,
    pub suggested: u32,
    pub available: WarehouseBoxes,
    #[serde(flatten)]
    pub split: Split,
}

/// Submission and read side of replenishment orders.
#[derive(Clone)]
pub struct ReplenishmentOrderService {
    ctx: EngineContext,
    validator: OrderValidator,
    stock: Arc<dyn StockSnapshotProvider>,
}

impl ReplenishmentOrderService {
    pub fn new(
        ctx: EngineContext,
        validator: OrderValidator,
        stock: Arc<dyn StockSnapshotProvider>,
    ) -> Self {
        Self {
            ctx,
            validator,
            stock,
        }
    }

    pub async fn submit_order(
        &self,
        request: &SubmitOrderRequest,
        actor: &str,
    ) -> Result<SubmittedOrder, ServiceError> {
        self.submit_order_at(request, actor, Utc::now()).await
    }

    /// Validates the draft against live stock and, only if every line passes,
    /// creates the order and its lines in `QUEUE` under a fresh id for the
    /// period `now` falls in.
    #[instrument(skip(self, request), fields(store = %request.store_name, lines = request.lines.len()))]
    pub async fn submit_order_at(
        &self,
        request: &SubmitOrderRequest,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<SubmittedOrder, ServiceError> {
        let lines = match self.validator.validate(request).await {
            Ok(lines) => lines,
            Err(e) => {
                counter!("replenishment.submissions_rejected", 1);
                warn!(error = %e, "order submission rejected");
                return Err(e);
            }
        };

        let store_name = request.store_name.trim().to_string();
        let notes = request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
            .map(str::to_string);

        let retry = self.ctx.config.retry_config();
        let (store_ref, notes_ref, lines_ref) = (&store_name, &notes, &lines);
        let ro_id = retry_on_contention(&retry, "order submission", move || {
            self.persist(store_ref, notes_ref.as_deref(), lines_ref, actor, now)
        })
        .await?;

        let lines: Vec<OrderLine> = lines
            .into_iter()
            .map(|line| OrderLine {
                article_code: line.article_code,
                article_name: line.article_name,
                boxes: line.boxes,
            })
            .collect();
        let boxes = lines
            .iter()
            .fold(WarehouseBoxes::default(), |acc, line| acc.saturating_add(&line.boxes));

        counter!("replenishment.submissions", 1);
        info!(ro_id = %ro_id, actor, total_boxes = boxes.total(), "order submitted");

        self.ctx
            .publish(Event::OrderSubmitted {
                ro_id,
                store_name: store_name.clone(),
                line_count: lines.len(),
                total_boxes: boxes.total(),
            })
            .await;

        Ok(SubmittedOrder {
            ro_id,
            status: RoStatus::Queue,
            store_name,
            line_count: lines.len(),
            total_boxes: boxes.total(),
            boxes,
            lines,
        })
    }

    #[instrument(skip(self), fields(ro_id = %ro_id))]
    pub async fn get_order(&self, ro_id: RoId) -> Result<RoOrderDetail, ServiceError> {
        let db = &*self.ctx.db;
        let order = find_order(db, ro_id).await?;

        Ok(RoOrderDetail {
            lines: find_lines(db, ro_id).await?,
            dnpb: find_dnpb(db, ro_id).await?,
            receipt: find_receipt(db, ro_id).await?,
            banding: find_banding(db, ro_id).await?,
            order,
        })
    }

    /// Orders newest first, each with its line count and box totals.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        status: Option<RoStatus>,
    ) -> Result<Vec<RoOrderSummary>, ServiceError> {
        let db = &*self.ctx.db;

        let mut query = ro_order::Entity::find();
        if let Some(status) = status {
            query = query.filter(ro_order::Column::Status.eq(status.to_string()));
        }
        let orders = query
            .order_by_desc(ro_order::Column::CreatedAt)
            .order_by_desc(ro_order::Column::Id)
            .all(db)
            .await?;

        let ids: Vec<String> = orders.iter().map(|order| order.id.clone()).collect();
        let mut totals: HashMap<String, (u32, WarehouseBoxes)> = HashMap::new();
        if !ids.is_empty() {
            let rows = ro_order_line::Entity::find()
                .filter(ro_order_line::Column::OrderId.is_in(ids))
                .all(db)
                .await?;
            for row in rows {
                let order_id = row.order_id.clone();
                let line = OrderLine::try_from(row)?;
                let entry = totals.entry(order_id).or_default();
                entry.0 += 1;
                entry.1 = entry.1.saturating_add(&line.boxes);
            }
        }

        orders
            .into_iter()
            .map(|model| {
                let (line_count, boxes) = totals.remove(&model.id).unwrap_or_default();
                let order = RoOrder::try_from(model)?;
                Ok(RoOrderSummary {
                    id: order.id,
                    store_name: order.store_name,
                    status: order.status,
                    created_at: order.created_at,
                    updated_at: order.updated_at,
                    line_count,
                    total_boxes: boxes.total(),
                    boxes,
                })
            })
            .collect()
    }

    /// Places a suggested quantity on a primary and a secondary bucket against
    /// current stock. Shortfall is reported, not treated as an error.
    #[instrument(skip(self, request), fields(article_code = %request.article_code))]
    pub async fn suggest_allocation(
        &self,
        request: &SuggestAllocationRequest,
    ) -> Result<AllocationSuggestion, ServiceError> {
        let mut violations = match request.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => validation_messages(&errors),
        };
        if request.primary == request.secondary {
            violations.push("secondary: must differ from primary".to_string());
        }
        if !violations.is_empty() {
            return Err(ServiceError::Violations(violations));
        }

        let code = request.article_code.trim().to_string();
        let availability = self
            .stock
            .snapshot(std::slice::from_ref(&code))
            .await?
            .into_iter()
            .find(|a| a.article_code == code)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Article {} not found in stock snapshot", code))
            })?;

        // range-validated above
        let suggested = request.suggested.clamp(0, i64::from(MAX_BOXES_PER_BUCKET)) as u32;
        let split = allocation::auto_allocate(
            suggested,
            (request.primary, availability.boxes.get(request.primary)),
            (request.secondary, availability.boxes.get(request.secondary)),
        );

        if split.unallocated > 0 {
            info!(unallocated = split.unallocated, "suggestion under-fills");
        }

        Ok(AllocationSuggestion {
            article_code: code,
            article_name: availability.article_name,
            suggested,
            available: availability.boxes,
            split,
        })
    }

    async fn persist(
        &self,
        store_name: &str,
        notes: Option<&str>,
        lines: &[ValidatedLine],
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<RoId, ServiceError> {
        let txn = self.ctx.db.begin().await?;

        let ro_id = next_ro_id(&txn, Period::of(now)).await?;

        ro_order::Entity::insert(ro_order::ActiveModel {
            id: Set(ro_id.to_string()),
            store_name: Set(store_name.to_string()),
            notes: Set(notes.map(str::to_string)),
            status: Set(RoStatus::Queue.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            version: Set(0),
        })
        .exec_without_returning(&txn)
        .await?;

        let rows = lines.iter().map(|line| ro_order_line::ActiveModel {
            order_id: Set(ro_id.to_string()),
            article_code: Set(line.article_code.clone()),
            article_name: Set(line.article_name.clone()),
            boxes_requested: Set(line.boxes.total() as i32),
            boxes_ddd: Set(line.boxes.ddd as i32),
            boxes_ljbb: Set(line.boxes.ljbb as i32),
            boxes_mbb: Set(line.boxes.mbb as i32),
            boxes_ubb: Set(line.boxes.ubb as i32),
            created_at: Set(now),
            updated_at: Set(now),
        });
        ro_order_line::Entity::insert_many(rows)
            .exec_without_returning(&txn)
            .await?;

        record_history(&txn, ro_id, None, RoStatus::Queue, actor, now).await?;

        txn.commit().await?;
        Ok(ro_id)
    }
}
