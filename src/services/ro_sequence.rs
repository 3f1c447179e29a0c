use sea_orm::sea_query::{Expr, OnConflict, Query};
use sea_orm::ConnectionTrait;
use tracing::debug;

use crate::entities::ro_sequence;
use crate::errors::ServiceError;
use crate::models::{Period, RoId};

/// Claims the next order id for `period`.
///
/// The period counter is bumped and read back by one upsert statement, so two
/// submissions can never observe the same value. Run it inside the
/// submission's transaction: if the sequence is exhausted, or anything later
/// fails, the claim rolls back with the rest of the order.
pub async fn next_ro_id<C>(conn: &C, period: Period) -> Result<RoId, ServiceError>
where
    C: ConnectionTrait,
{
    let mut upsert = Query::insert();
    upsert
        .into_table(ro_sequence::Entity)
        .columns([ro_sequence::Column::Period, ro_sequence::Column::LastSeq]);
    upsert
        .values([period.code().into(), 1i32.into()])
        .map_err(|e| ServiceError::InternalError(format!("sequence statement: {}", e)))?;
    upsert
        .on_conflict(
            OnConflict::column(ro_sequence::Column::Period)
                .value(
                    ro_sequence::Column::LastSeq,
                    Expr::col((ro_sequence::Entity, ro_sequence::Column::LastSeq)).add(1),
                )
                .to_owned(),
        )
        .returning_col(ro_sequence::Column::LastSeq);

    let backend = conn.get_database_backend();
    let row = conn
        .query_one(backend.build(&upsert))
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!("sequence upsert for {} returned no row", period))
        })?;
    let last_seq: i32 = row.try_get("", "last_seq")?;

    debug!(period = %period, last_seq, "claimed order sequence");

    let sequence = u32::try_from(last_seq).map_err(|_| {
        ServiceError::InternalError(format!("sequence for {} is negative ({})", period, last_seq))
    })?;
    RoId::new(period, sequence)
}
