use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::stock::DeliveryNoteLedger;
use super::{find_dnpb, find_order, EngineContext};
use crate::config::EngineConfig;
use crate::db::retry::retry_on_contention;
use crate::entities::{ro_dnpb, ro_order};
use crate::errors::ServiceError;
use crate::events::Event;
use crate::models::{DeliveryNote, DeliveryNoteFormat, DnpbRecord, RoId, RoStatus, Warehouse};

/// Result of checking one delivery note number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnpbMatch {
    pub number: String,
    pub warehouse_code: String,
    /// Found in the ledger of the warehouse the number names
    pub matched: bool,
}

/// Validates delivery note numbers and looks them up in the warehouse ledgers.
#[derive(Clone)]
pub struct DnpbMatcher {
    format: DeliveryNoteFormat,
    config: Arc<EngineConfig>,
    ledger: Arc<dyn DeliveryNoteLedger>,
}

impl DnpbMatcher {
    pub fn new(
        format: DeliveryNoteFormat,
        config: Arc<EngineConfig>,
        ledger: Arc<dyn DeliveryNoteLedger>,
    ) -> Self {
        Self {
            format,
            config,
            ledger,
        }
    }

    pub fn check_format(&self, number: &str) -> Result<DeliveryNote, String> {
        self.format.parse(number)
    }

    /// Looks a well-formed number up in the ledger of the warehouse it names.
    /// Unknown warehouse codes cannot be verified and never match.
    pub async fn reconcile(&self, note: &DeliveryNote) -> Result<bool, ServiceError> {
        let Some(warehouse) = note.warehouse() else {
            debug!(dnpb = %note.number, "unknown warehouse code, not matched");
            return Ok(false);
        };
        let Some(source) = self.config.ledger_source(warehouse) else {
            warn!(warehouse = %warehouse, "no ledger source configured");
            return Ok(false);
        };

        self.ledger.contains_delivery_note(source, &note.number).await
    }

    pub async fn match_number(&self, number: &str) -> Result<DnpbMatch, ServiceError> {
        let note = self
            .check_format(number)
            .map_err(ServiceError::ValidationError)?;
        let matched = self.reconcile(&note).await?;

        Ok(DnpbMatch {
            number: note.number,
            warehouse_code: note.warehouse_code,
            matched,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetDnpbRequest {
    /// Delivery note number per warehouse bucket; blank entries are ignored
    #[serde(default)]
    pub numbers: BTreeMap<Warehouse, String>,
}

/// Records delivery note numbers on orders in the DNPB stage.
#[derive(Clone)]
pub struct DnpbService {
    ctx: EngineContext,
    matcher: DnpbMatcher,
}

impl DnpbService {
    pub fn new(ctx: EngineContext, matcher: DnpbMatcher) -> Self {
        Self { ctx, matcher }
    }

    /// Stores one number per supplied bucket and returns every record the
    /// order now carries. Buckets not mentioned are left alone.
    #[instrument(skip(self, numbers), fields(ro_id = %ro_id, buckets = numbers.len()))]
    pub async fn set_dnpb(
        &self,
        ro_id: RoId,
        numbers: &BTreeMap<Warehouse, String>,
        actor: &str,
    ) -> Result<Vec<DnpbRecord>, ServiceError> {
        let order = find_order(&*self.ctx.db, ro_id).await?;

        let entries: Vec<(Warehouse, &str)> = numbers
            .iter()
            .map(|(warehouse, number)| (*warehouse, number.trim()))
            .filter(|(_, number)| !number.is_empty())
            .collect();
        if entries.is_empty() {
            return Err(ServiceError::Violations(vec![
                "numbers: at least one DNPB number is required".to_string(),
            ]));
        }

        let mut notes = Vec::with_capacity(entries.len());
        let mut violations = Vec::new();
        for (warehouse, number) in &entries {
            match self.matcher.check_format(number) {
                Ok(note) => notes.push((*warehouse, note)),
                Err(reason) => violations.push(format!("{}: {}", warehouse, reason)),
            }
        }
        if !violations.is_empty() {
            return Err(ServiceError::Violations(violations));
        }

        if order.status != RoStatus::DnpbProcess {
            return Err(dnpb_stage_conflict(ro_id, order.status));
        }

        let mut matched = Vec::with_capacity(notes.len());
        for (warehouse, note) in &notes {
            matched.push((*warehouse, note.number.clone(), self.matcher.reconcile(note).await?));
        }

        let now = Utc::now();
        let retry = self.ctx.config.retry_config();
        let matched_ref = &matched;
        retry_on_contention(&retry, "DNPB update", move || {
            self.write_records(ro_id, matched_ref, now)
        })
        .await?;

        for (warehouse, number, is_match) in matched {
            info!(warehouse = %warehouse, dnpb = %number, matched = is_match, actor, "DNPB recorded");
            self.ctx
                .publish(Event::DnpbRecorded {
                    ro_id,
                    warehouse,
                    number,
                    matched: is_match,
                })
                .await;
        }

        find_dnpb(&*self.ctx.db, ro_id).await
    }

    #[instrument(skip(self), fields(ro_id = %ro_id))]
    pub async fn get_dnpb(&self, ro_id: RoId) -> Result<Vec<DnpbRecord>, ServiceError> {
        find_order(&*self.ctx.db, ro_id).await?;
        find_dnpb(&*self.ctx.db, ro_id).await
    }

    async fn write_records(
        &self,
        ro_id: RoId,
        records: &[(Warehouse, String, bool)],
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let txn = self.ctx.db.begin().await?;

        // Holds the order in DNPB_PROCESS for the rest of the transaction.
        let touched = ro_order::Entity::update_many()
            .col_expr(ro_order::Column::UpdatedAt, Expr::value(now))
            .filter(ro_order::Column::Id.eq(ro_id.to_string()))
            .filter(ro_order::Column::Status.eq(RoStatus::DnpbProcess.to_string()))
            .exec(&txn)
            .await?;
        if touched.rows_affected == 0 {
            let current = find_order(&txn, ro_id).await?.status;
            return Err(dnpb_stage_conflict(ro_id, current));
        }

        for (warehouse, number, matched) in records {
            let record = ro_dnpb::ActiveModel {
                order_id: Set(ro_id.to_string()),
                warehouse: Set(warehouse.code().to_string()),
                number: Set(number.clone()),
                matched: Set(*matched),
                updated_at: Set(now),
            };
            ro_dnpb::Entity::insert(record)
                .on_conflict(
                    OnConflict::columns([ro_dnpb::Column::OrderId, ro_dnpb::Column::Warehouse])
                        .update_columns([
                            ro_dnpb::Column::Number,
                            ro_dnpb::Column::Matched,
                            ro_dnpb::Column::UpdatedAt,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }
}

fn dnpb_stage_conflict(ro_id: RoId, status: RoStatus) -> ServiceError {
    ServiceError::Conflict(format!(
        "DNPB numbers can only be recorded while {} is {}; it is {}",
        ro_id,
        RoStatus::DnpbProcess,
        status
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::stock::MockDeliveryNoteLedger;
    use assert_matches::assert_matches;
    use mockall::predicate::eq;

    fn matcher(ledger: MockDeliveryNoteLedger) -> DnpbMatcher {
        DnpbMatcher::new(
            DeliveryNoteFormat::new().unwrap(),
            Arc::new(EngineConfig::default()),
            Arc::new(ledger),
        )
    }

    #[tokio::test]
    async fn known_warehouse_is_looked_up_in_its_own_ledger() {
        let mut ledger = MockDeliveryNoteLedger::new();
        ledger
            .expect_contains_delivery_note()
            .with(eq("transaksi_ddd"), eq("DNPB/DDD/WHS/2026/I/001"))
            .times(1)
            .returning(|_, _| Ok(true));

        let result = matcher(ledger)
            .match_number("DNPB/DDD/WHS/2026/I/001")
            .await
            .unwrap();
        assert!(result.matched);
        assert_eq!(result.warehouse_code, "DDD");
    }

    #[tokio::test]
    async fn unknown_warehouse_is_well_formed_but_unmatched() {
        let mut ledger = MockDeliveryNoteLedger::new();
        ledger.expect_contains_delivery_note().times(0);

        let result = matcher(ledger)
            .match_number("DNPB/XXX/WHS/2026/I/001")
            .await
            .unwrap();
        assert!(!result.matched);
    }

    #[tokio::test]
    async fn missing_prefix_is_a_format_error_without_ledger_access() {
        let mut ledger = MockDeliveryNoteLedger::new();
        ledger.expect_contains_delivery_note().times(0);

        let result = matcher(ledger).match_number("DDD/WHS/2026/I/001").await;
        assert_matches!(result, Err(ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn number_absent_from_ledger_does_not_match() {
        let mut ledger = MockDeliveryNoteLedger::new();
        ledger
            .expect_contains_delivery_note()
            .with(eq("transaksi_ljbb"), eq("DNPB/LJBB/WHS/2025/XII/042"))
            .returning(|_, _| Ok(false));

        let result = matcher(ledger)
            .match_number("DNPB/LJBB/WHS/2025/XII/042")
            .await
            .unwrap();
        assert!(!result.matched);
    }
}
