mod common;

use assert_matches::assert_matches;
use common::{march_2026, order_request, TestEngine, ACTOR};
use futures::future::join_all;
use replenishment_api::{
    entities::{ro_order, ro_order_line, ro_sequence},
    errors::ServiceError,
    models::{RoStatus, WarehouseBoxes},
};
use sea_orm::{EntityTrait, PaginatorTrait, Set};

#[tokio::test]
async fn ids_are_sequential_within_a_month() {
    let t = TestEngine::new().await;
    t.seed_stock("A1", [10, 10, 0, 0]).await;

    let first = t
        .engine
        .orders
        .submit_order_at(&order_request("Toko Bandung", &[("A1", [2, 1, 0, 0])]), ACTOR, march_2026())
        .await
        .unwrap();
    let second = t
        .engine
        .orders
        .submit_order_at(&order_request("Toko Cimahi", &[("A1", [1, 0, 0, 0])]), ACTOR, march_2026())
        .await
        .unwrap();

    assert_eq!(first.ro_id.to_string(), "RO-2603-0001");
    assert_eq!(second.ro_id.to_string(), "RO-2603-0002");
    assert_eq!(first.status, RoStatus::Queue);
    assert_eq!(first.total_boxes, 3);
    assert_eq!(
        first.boxes,
        WarehouseBoxes {
            ddd: 2,
            ljbb: 1,
            mbb: 0,
            ubb: 0
        }
    );
}

#[tokio::test]
async fn persisted_order_matches_submission() {
    let t = TestEngine::new().await;
    t.seed_stock("A1", [10, 10, 0, 0]).await;
    t.seed_stock("B7", [0, 0, 4, 4]).await;

    let submitted = t
        .submit(&[("A1", [3, 0, 0, 0]), ("B7", [0, 0, 2, 1])])
        .await;
    let detail = t.engine.orders.get_order(submitted.ro_id).await.unwrap();

    assert_eq!(detail.order.status, RoStatus::Queue);
    assert_eq!(detail.order.store_name, "Toko Bandung");
    assert_eq!(detail.lines.len(), 2);
    assert_eq!(detail.total_boxes(), 6);
    let b7 = detail
        .lines
        .iter()
        .find(|line| line.article_code == "B7")
        .unwrap();
    assert_eq!(b7.boxes_requested(), 3);
    assert_eq!(b7.article_name.as_deref(), Some("Sneaker B7"));
    assert!(detail.dnpb.is_empty());
    assert!(detail.receipt.is_empty());

    let history = t.engine.status.history(submitted.ro_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from, None);
    assert_eq!(history[0].to, RoStatus::Queue);
    assert_eq!(history[0].actor.as_deref(), Some(ACTOR));
}

#[tokio::test]
async fn one_unavailable_line_rejects_the_whole_order() {
    let t = TestEngine::new().await;
    t.seed_stock("A1", [10, 0, 0, 0]).await;
    t.seed_stock("A2", [3, 0, 0, 0]).await;

    let result = t
        .engine
        .orders
        .submit_order(
            &order_request("Toko Bandung", &[("A1", [2, 0, 0, 0]), ("A2", [5, 0, 0, 0])]),
            ACTOR,
        )
        .await;

    let violations = match result {
        Err(ServiceError::Violations(v)) => v,
        other => panic!("expected violations, got {:?}", other),
    };
    assert!(violations.contains(&"DDD: only 3 available for A2, requested 5".to_string()));
    assert!(violations.contains(&"TOTAL: only 3 available for A2, requested 5".to_string()));

    assert_eq!(ro_order::Entity::find().count(&*t.db).await.unwrap(), 0);
    assert_eq!(ro_order_line::Entity::find().count(&*t.db).await.unwrap(), 0);
    assert_eq!(ro_sequence::Entity::find().count(&*t.db).await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_article_and_empty_lines_are_violations() {
    let t = TestEngine::new().await;

    let unknown = t
        .engine
        .orders
        .submit_order(&order_request("Toko Bandung", &[("ZZ9", [1, 0, 0, 0])]), ACTOR)
        .await;
    assert_matches!(unknown, Err(ServiceError::Violations(v)) if v == vec!["ZZ9: article not found in stock snapshot".to_string()]);

    let empty = t
        .engine
        .orders
        .submit_order(&order_request("Toko Bandung", &[]), ACTOR)
        .await;
    assert_matches!(empty, Err(ServiceError::Violations(v)) if v.contains(&"lines: at least one line is required".to_string()));
}

#[tokio::test]
async fn exhausted_period_is_reported_and_rolled_back() {
    let t = TestEngine::new().await;
    t.seed_stock("A1", [10, 0, 0, 0]).await;
    ro_sequence::Entity::insert(ro_sequence::ActiveModel {
        period: Set("2603".to_string()),
        last_seq: Set(9999),
    })
    .exec_without_returning(&*t.db)
    .await
    .unwrap();

    let result = t
        .engine
        .orders
        .submit_order_at(&order_request("Toko Bandung", &[("A1", [1, 0, 0, 0])]), ACTOR, march_2026())
        .await;

    assert_matches!(result, Err(ServiceError::SequenceExhausted(_)));
    assert_eq!(ro_order::Entity::find().count(&*t.db).await.unwrap(), 0);
    let sequence = ro_sequence::Entity::find_by_id("2603".to_string())
        .one(&*t.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sequence.last_seq, 9999);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_get_distinct_ids() {
    let t = TestEngine::new().await;
    t.seed_stock("A1", [100, 0, 0, 0]).await;

    let mut tasks = Vec::new();
    for i in 0..8 {
        let engine = t.engine.clone();
        tasks.push(tokio::spawn(async move {
            engine
                .orders
                .submit_order_at(
                    &order_request(&format!("Toko {}", i), &[("A1", [1, 0, 0, 0])]),
                    ACTOR,
                    march_2026(),
                )
                .await
        }));
    }

    let mut ids: Vec<u32> = join_all(tasks)
        .await
        .into_iter()
        .filter_map(|joined| joined.unwrap().ok())
        .map(|order| order.ro_id.sequence())
        .collect();
    let accepted = ids.len();
    ids.sort_unstable();
    ids.dedup();

    assert_eq!(ids.len(), accepted, "every accepted order has its own id");
    assert_eq!(
        ro_order::Entity::find().count(&*t.db).await.unwrap() as usize,
        accepted
    );
}
