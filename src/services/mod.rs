//! The replenishment order engine.
//!
//! Services are stateless between calls: every operation reads what it needs
//! from the store, and every write that has to be exclusive is a
//! compare-and-set on the order's status.

pub mod allocation;
pub mod allocation_edits;
pub mod discrepancy;
pub mod dnpb;
pub mod order_validator;
pub mod replenishment_orders;
pub mod ro_sequence;
pub mod ro_status;
pub mod stock;

use std::sync::Arc;

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::warn;
use validator::Validate;

use crate::config::EngineConfig;
use crate::db::DbPool;
use crate::entities::{ro_banding_notice, ro_dnpb, ro_order, ro_order_line, ro_receipt_line};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    BandingNotice, DeliveryNoteFormat, DnpbRecord, OrderLine, ReceiptLine, RoId, RoOrder,
};

pub use allocation_edits::AllocationEditService;
pub use discrepancy::DiscrepancyService;
pub use dnpb::{DnpbMatcher, DnpbService};
pub use order_validator::OrderValidator;
pub use replenishment_orders::ReplenishmentOrderService;
pub use ro_status::RoStatusService;
pub use stock::Collaborators;

/// What every engine service is built from.
#[derive(Clone)]
pub struct EngineContext {
    pub db: Arc<DbPool>,
    pub config: Arc<EngineConfig>,
    events: Option<Arc<EventSender>>,
}

impl EngineContext {
    pub fn new(db: Arc<DbPool>, config: EngineConfig, events: Option<Arc<EventSender>>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            events,
        }
    }

    /// Publishes after the fact; a full or closed channel never fails the
    /// operation that produced the event.
    pub(crate) async fn publish(&self, event: Event) {
        if let Some(events) = &self.events {
            if let Err(e) = events.send(event).await {
                warn!(error = %e, "failed to publish replenishment event");
            }
        }
    }
}

/// All replenishment services, sharing one context.
#[derive(Clone)]
pub struct ReplenishmentEngine {
    pub orders: ReplenishmentOrderService,
    pub status: RoStatusService,
    pub dnpb: DnpbService,
    pub allocations: AllocationEditService,
    pub discrepancies: DiscrepancyService,
}

impl ReplenishmentEngine {
    pub fn new(
        db: Arc<DbPool>,
        config: EngineConfig,
        collaborators: Collaborators,
        events: Option<Arc<EventSender>>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;
        let format = DeliveryNoteFormat::new()?;
        let ctx = EngineContext::new(db, config, events);

        Ok(Self {
            orders: ReplenishmentOrderService::new(
                ctx.clone(),
                OrderValidator::new(collaborators.stock.clone()),
                collaborators.stock.clone(),
            ),
            status: RoStatusService::new(ctx.clone(), format.clone(), collaborators.catalog),
            dnpb: DnpbService::new(
                ctx.clone(),
                DnpbMatcher::new(format, ctx.config.clone(), collaborators.ledger),
            ),
            allocations: AllocationEditService::new(ctx.clone()),
            discrepancies: DiscrepancyService::new(ctx),
        })
    }
}

pub(crate) async fn find_order<C>(conn: &C, ro_id: RoId) -> Result<RoOrder, ServiceError>
where
    C: ConnectionTrait,
{
    ro_order::Entity::find_by_id(ro_id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Replenishment order {} not found", ro_id)))?
        .try_into()
}

pub(crate) async fn find_lines<C>(conn: &C, ro_id: RoId) -> Result<Vec<OrderLine>, ServiceError>
where
    C: ConnectionTrait,
{
    ro_order_line::Entity::find()
        .filter(ro_order_line::Column::OrderId.eq(ro_id.to_string()))
        .order_by_asc(ro_order_line::Column::ArticleCode)
        .all(conn)
        .await?
        .into_iter()
        .map(OrderLine::try_from)
        .collect()
}

pub(crate) async fn find_dnpb<C>(conn: &C, ro_id: RoId) -> Result<Vec<DnpbRecord>, ServiceError>
where
    C: ConnectionTrait,
{
    let mut records = ro_dnpb::Entity::find()
        .filter(ro_dnpb::Column::OrderId.eq(ro_id.to_string()))
        .all(conn)
        .await?
        .into_iter()
        .map(DnpbRecord::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    records.sort_by_key(|r| r.warehouse);
    Ok(records)
}

pub(crate) async fn find_receipt<C>(conn: &C, ro_id: RoId) -> Result<Vec<ReceiptLine>, ServiceError>
where
    C: ConnectionTrait,
{
    ro_receipt_line::Entity::find()
        .filter(ro_receipt_line::Column::OrderId.eq(ro_id.to_string()))
        .order_by_asc(ro_receipt_line::Column::ArticleCode)
        .all(conn)
        .await?
        .into_iter()
        .map(ReceiptLine::try_from)
        .collect()
}

pub(crate) async fn find_banding<C>(conn: &C, ro_id: RoId) -> Result<Vec<BandingNotice>, ServiceError>
where
    C: ConnectionTrait,
{
    ro_banding_notice::Entity::find()
        .filter(ro_banding_notice::Column::OrderId.eq(ro_id.to_string()))
        .order_by_asc(ro_banding_notice::Column::RaisedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(BandingNotice::try_from)
        .collect()
}
