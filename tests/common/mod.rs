#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use replenishment_api::{
    app_router,
    config::{AppConfig, EngineConfig},
    db::{self, DbPool},
    entities::{article_pack_size, article_stock, warehouse_transaction},
    events::{self, EventSender},
    models::{BoxCounts, RoId, RoStatus, Warehouse},
    services::{
        order_validator::{DraftLine, SubmitOrderRequest},
        replenishment_orders::SubmittedOrder,
        Collaborators, ReplenishmentEngine,
    },
    AppState,
};
use sea_orm::{EntityTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const ACTOR: &str = "spv.bandung";
pub const VALID_DNPB: &str = "DNPB/DDD/WHS/2026/III/001";

/// The statuses an order walks through from submission to DNPB registration.
pub const TO_DNPB_PROCESS: [RoStatus; 4] = [
    RoStatus::Approved,
    RoStatus::Picking,
    RoStatus::PickVerified,
    RoStatus::DnpbProcess,
];

/// A replenishment engine over a fresh SQLite file with migrations applied.
pub struct TestEngine {
    pub db: Arc<DbPool>,
    pub engine: Arc<ReplenishmentEngine>,
    pub config: Arc<AppConfig>,
    _event_task: tokio::task::JoinHandle<()>,
    _dir: TempDir,
}

impl TestEngine {
    pub async fn new() -> Self {
        Self::with_engine_config(EngineConfig::default()).await
    }

    pub async fn with_engine_config(engine_config: EngineConfig) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("replenishment.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 4;
        cfg.engine = engine_config;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let engine = ReplenishmentEngine::new(
            db.clone(),
            cfg.engine.clone(),
            Collaborators::database(db.clone()),
            Some(Arc::new(EventSender::new(event_tx))),
        )
        .expect("engine builds from default config");

        Self {
            db,
            engine: Arc::new(engine),
            config: Arc::new(cfg),
            _event_task: event_task,
            _dir: dir,
        }
    }

    pub fn router(&self) -> Router {
        app_router(AppState {
            db: self.db.clone(),
            config: self.config.clone(),
            engine: self.engine.clone(),
        })
    }

    /// Stocks an article; the total is the sum of the buckets.
    pub async fn seed_stock(&self, code: &str, boxes: [i32; 4]) {
        self.seed_stock_with_total(code, boxes, boxes.iter().sum())
            .await;
    }

    pub async fn seed_stock_with_total(&self, code: &str, boxes: [i32; 4], total: i32) {
        article_stock::Entity::insert(article_stock::ActiveModel {
            article_code: Set(code.to_string()),
            article_name: Set(Some(format!("Sneaker {}", code))),
            stock_ddd: Set(boxes[0]),
            stock_ljbb: Set(boxes[1]),
            stock_mbb: Set(boxes[2]),
            stock_ubb: Set(boxes[3]),
            stock_total: Set(total),
        })
        .exec_without_returning(&*self.db)
        .await
        .expect("seed article_stock");
    }

    pub async fn seed_pack_size(&self, code: &str, pairs_per_box: i32) {
        article_pack_size::Entity::insert(article_pack_size::ActiveModel {
            article_code: Set(code.to_string()),
            pairs_per_box: Set(pairs_per_box),
        })
        .exec_without_returning(&*self.db)
        .await
        .expect("seed article_pack_sizes");
    }

    pub async fn seed_ledger(&self, source: &str, article_code: &str, delivery_note: &str) {
        warehouse_transaction::Entity::insert(warehouse_transaction::ActiveModel {
            source: Set(source.to_string()),
            article_code: Set(article_code.to_string()),
            delivery_note: Set(Some(delivery_note.to_string())),
            quantity: Set(-4),
            recorded_at: Set(Utc::now()),
            ..Default::default()
        })
        .exec_without_returning(&*self.db)
        .await
        .expect("seed warehouse_transactions");
    }

    pub async fn submit(&self, lines: &[(&str, [i64; 4])]) -> SubmittedOrder {
        self.engine
            .orders
            .submit_order(&order_request("Toko Bandung", lines), ACTOR)
            .await
            .expect("order submission")
    }

    /// Applies each status change in turn.
    pub async fn advance(&self, ro_id: RoId, path: &[RoStatus]) {
        for status in path {
            self.engine
                .status
                .transition(ro_id, *status, ACTOR)
                .await
                .unwrap_or_else(|e| panic!("{} -> {}: {}", ro_id, status, e));
        }
    }

    /// Takes a submitted order all the way to ARRIVED, registering a DNPB
    /// number on the way.
    pub async fn deliver(&self, ro_id: RoId) {
        self.advance(ro_id, &TO_DNPB_PROCESS).await;
        self.engine
            .dnpb
            .set_dnpb(
                ro_id,
                &[(Warehouse::Ddd, VALID_DNPB.to_string())].into_iter().collect(),
                ACTOR,
            )
            .await
            .expect("record DNPB");
        self.advance(
            ro_id,
            &[RoStatus::ReadyToShip, RoStatus::InDelivery, RoStatus::Arrived],
        )
        .await;
    }

    /// Sends a JSON request through the full router, optionally as an actor.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        actor: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            builder = builder.header("x-actor-id", actor);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };

        let response = self
            .router()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router error during test request");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

pub fn counts(boxes: [i64; 4]) -> BoxCounts {
    BoxCounts {
        ddd: boxes[0],
        ljbb: boxes[1],
        mbb: boxes[2],
        ubb: boxes[3],
    }
}

pub fn order_request(store_name: &str, lines: &[(&str, [i64; 4])]) -> SubmitOrderRequest {
    SubmitOrderRequest {
        store_name: store_name.to_string(),
        notes: None,
        lines: lines
            .iter()
            .map(|(code, boxes)| DraftLine {
                article_code: code.to_string(),
                boxes: counts(*boxes),
            })
            .collect(),
    }
}

pub fn march_2026() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
}
