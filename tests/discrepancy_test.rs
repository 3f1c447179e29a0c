mod common;

use assert_matches::assert_matches;
use common::{TestEngine, ACTOR, VALID_DNPB};
use replenishment_api::{
    errors::ServiceError,
    models::{BandingStatus, ReceiptStatus, RoId, RoStatus, WarehouseBoxes},
    services::discrepancy::PhysicalCount,
};

fn count(code: &str, fisik: i64) -> PhysicalCount {
    PhysicalCount {
        article_code: code.to_string(),
        fisik,
    }
}

/// A1: 6 DDD + 2 LJBB boxes of 12 pairs; B2: 1 MBB box of 6 pairs.
async fn arrived_order(t: &TestEngine) -> RoId {
    t.seed_stock("A1", [10, 10, 0, 0]).await;
    t.seed_stock("B2", [0, 0, 5, 0]).await;
    t.seed_pack_size("A1", 12).await;
    t.seed_pack_size("B2", 6).await;
    let order = t.submit(&[("A1", [6, 2, 0, 0]), ("B2", [0, 0, 1, 0])]).await;
    t.deliver(order.ro_id).await;
    order.ro_id
}

#[tokio::test]
async fn counts_recompute_selisih() {
    let t = TestEngine::new().await;
    let ro_id = arrived_order(&t).await;

    let receipt = t
        .engine
        .discrepancies
        .record_physical_counts(ro_id, &[count("A1", 84)], ACTOR)
        .await
        .unwrap();

    assert_eq!(receipt.len(), 2);
    assert_eq!((receipt[0].fisik, receipt[0].selisih), (84, -12));
    assert!(receipt[0].has_discrepancy());
    assert_eq!((receipt[1].fisik, receipt[1].selisih), (6, 0));
}

#[tokio::test]
async fn invalid_counts_are_all_reported() {
    let t = TestEngine::new().await;
    let ro_id = arrived_order(&t).await;

    let result = t
        .engine
        .discrepancies
        .record_physical_counts(ro_id, &[count("A1", -1), count("ZZ", 3), count("B2", 5)], ACTOR)
        .await;

    let violations = match result {
        Err(ServiceError::Violations(v)) => v,
        other => panic!("expected violations, got {:?}", other),
    };
    assert_eq!(violations.len(), 2);

    // B2 was valid but nothing is written
    let detail = t.engine.orders.get_order(ro_id).await.unwrap();
    assert_eq!(detail.receipt[1].fisik, 6);
}

#[tokio::test]
async fn confirm_reproportions_to_counted_boxes_and_completes() {
    let t = TestEngine::new().await;
    let ro_id = arrived_order(&t).await;
    t.engine
        .discrepancies
        .record_physical_counts(ro_id, &[count("A1", 84)], ACTOR)
        .await
        .unwrap();

    let outcome = t
        .engine
        .discrepancies
        .confirm_discrepancy(ro_id, "spv.gudang")
        .await
        .unwrap();

    assert_eq!(outcome.status, RoStatus::Completed);
    assert_eq!(outcome.lines.len(), 1);
    let line = &outcome.lines[0];
    assert_eq!(line.fisik_boxes, 7);
    assert_eq!(
        line.reconciled,
        WarehouseBoxes {
            ddd: 5,
            ljbb: 2,
            mbb: 0,
            ubb: 0
        }
    );

    let detail = t.engine.orders.get_order(ro_id).await.unwrap();
    assert_eq!(detail.order.status, RoStatus::Completed);
    assert_eq!(detail.lines[0].boxes_requested(), 7);
    // the line without a discrepancy keeps its allocation
    assert_eq!(detail.lines[1].boxes.mbb, 1);

    for line in &detail.receipt {
        assert_eq!(line.status, ReceiptStatus::ConfirmedDiscrepancy);
        assert_eq!(line.confirmed_by.as_deref(), Some("spv.gudang"));
    }
    // recorded figures are kept for the report
    assert_eq!(detail.receipt[0].selisih, -12);

    let history = t.engine.status.history(ro_id).await.unwrap();
    let last = history.last().unwrap();
    assert_eq!((last.from, last.to), (Some(RoStatus::Arrived), RoStatus::Completed));
}

#[tokio::test]
async fn confirmed_orders_appear_on_the_dnpb_error_list() {
    let t = TestEngine::new().await;
    let ro_id = arrived_order(&t).await;
    t.engine
        .discrepancies
        .record_physical_counts(ro_id, &[count("A1", 84), count("B2", 12)], ACTOR)
        .await
        .unwrap();
    t.engine
        .discrepancies
        .confirm_discrepancy(ro_id, ACTOR)
        .await
        .unwrap();

    let report = t
        .engine
        .discrepancies
        .list_confirmed_discrepancies()
        .await
        .unwrap();

    assert_eq!(report.len(), 1);
    let entry = &report[0];
    assert_eq!(entry.ro_id, ro_id);
    assert_eq!(entry.total_items, 2);
    assert_eq!(entry.total_selisih, -12 + 6);
    assert_eq!(entry.dnpb.len(), 1);
    assert_eq!(entry.dnpb[0].number, VALID_DNPB);
    assert_eq!(entry.confirmed_by.as_deref(), Some(ACTOR));
    assert!(entry.confirmed_at.is_some());
}

#[tokio::test]
async fn banding_leaves_the_order_arrived() {
    let t = TestEngine::new().await;
    let ro_id = arrived_order(&t).await;
    t.engine
        .discrepancies
        .record_physical_counts(ro_id, &[count("A1", 84)], ACTOR)
        .await
        .unwrap();

    let notice = t
        .engine
        .discrepancies
        .raise_banding(ro_id, "spv.gudang")
        .await
        .unwrap();
    assert_eq!(notice.status, BandingStatus::Pending);
    assert_eq!(notice.raised_by, "spv.gudang");
    assert_eq!(notice.message, t.config.engine.banding_message);

    let detail = t.engine.orders.get_order(ro_id).await.unwrap();
    assert_eq!(detail.order.status, RoStatus::Arrived);
    assert_eq!(detail.banding.len(), 1);
    assert_eq!(detail.lines[0].boxes.ddd, 6);
}

#[tokio::test]
async fn post_arrival_actions_require_arrived() {
    let t = TestEngine::new().await;
    t.seed_stock("A1", [5, 0, 0, 0]).await;
    let order = t.submit(&[("A1", [1, 0, 0, 0])]).await;

    assert_matches!(
        t.engine.discrepancies.raise_banding(order.ro_id, ACTOR).await,
        Err(ServiceError::Conflict(_))
    );
    assert_matches!(
        t.engine
            .discrepancies
            .confirm_discrepancy(order.ro_id, ACTOR)
            .await,
        Err(ServiceError::Conflict(_))
    );
}

#[tokio::test]
async fn counts_before_arrival_are_a_conflict() {
    let t = TestEngine::new().await;
    t.seed_stock("A1", [5, 0, 0, 0]).await;
    let order = t.submit(&[("A1", [1, 0, 0, 0])]).await;

    assert_matches!(
        t.engine
            .discrepancies
            .record_physical_counts(order.ro_id, &[count("A1", 10)], ACTOR)
            .await,
        Err(ServiceError::Conflict(_))
    );
}

#[tokio::test]
async fn confirming_without_discrepancy_completes_unchanged() {
    let t = TestEngine::new().await;
    let ro_id = arrived_order(&t).await;

    let outcome = t
        .engine
        .discrepancies
        .confirm_discrepancy(ro_id, ACTOR)
        .await
        .unwrap();
    assert!(outcome.lines.is_empty());

    let detail = t.engine.orders.get_order(ro_id).await.unwrap();
    assert_eq!(detail.order.status, RoStatus::Completed);
    assert_eq!(detail.total_boxes(), 9);
}
