use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use validator::Validate;

use super::allocation;
use super::stock::{ArticleAvailability, StockSnapshotProvider};
use crate::errors::{validation_messages, ServiceError};
use crate::models::{BoxCounts, WarehouseBoxes};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitOrderRequest {
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub store_name: String,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub notes: Option<String>,
    #[serde(default)]
    pub lines: Vec<DraftLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftLine {
    pub article_code: String,
    #[serde(default)]
    pub boxes: BoxCounts,
}

/// A requested line that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLine {
    pub article_code: String,
    pub article_name: Option<String>,
    pub boxes: WarehouseBoxes,
}

/// Checks a draft order against its own shape and against live stock.
///
/// Validation is advisory: nothing is reserved, so stock can still move
/// between this check and the ledger-side decrement.
#[derive(Clone)]
pub struct OrderValidator {
    stock: Arc<dyn StockSnapshotProvider>,
}

impl OrderValidator {
    pub fn new(stock: Arc<dyn StockSnapshotProvider>) -> Self {
        Self { stock }
    }

    /// Returns the accepted lines, or every reason the order cannot be taken.
    #[instrument(skip(self, request), fields(store = %request.store_name, lines = request.lines.len()))]
    pub async fn validate(
        &self,
        request: &SubmitOrderRequest,
    ) -> Result<Vec<ValidatedLine>, ServiceError> {
        let (lines, mut violations) = check_structure(request);

        let mut names = HashMap::new();
        if !lines.is_empty() {
            let codes: Vec<String> = lines.iter().map(|(code, _)| code.clone()).collect();
            let snapshot = self.stock.snapshot(&codes).await?;
            violations.extend(check_availability(&lines, &snapshot));
            names = snapshot
                .into_iter()
                .map(|a| (a.article_code, a.article_name))
                .collect();
        }

        if !violations.is_empty() {
            debug!(count = violations.len(), "draft order rejected");
            return Err(ServiceError::Violations(violations));
        }

        Ok(lines
            .into_iter()
            .map(|(article_code, boxes)| ValidatedLine {
                article_name: names.remove(&article_code).flatten(),
                article_code,
                boxes,
            })
            .collect())
    }
}

/// Shape checks that need no stock data. Returns the lines that are fit for
/// a stock check alongside the violations found.
pub fn check_structure(request: &SubmitOrderRequest) -> (Vec<(String, WarehouseBoxes)>, Vec<String>) {
    let mut violations = match request.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => validation_messages(&errors),
    };

    if request.store_name.trim().is_empty() {
        violations.push("store_name: must not be empty".to_string());
    }
    if request.lines.is_empty() {
        violations.push("lines: at least one line is required".to_string());
    }

    let mut seen = HashSet::new();
    let mut lines = Vec::with_capacity(request.lines.len());

    for (index, line) in request.lines.iter().enumerate() {
        let code = line.article_code.trim();
        if code.is_empty() {
            violations.push(format!("lines[{}]: article_code must not be empty", index));
            continue;
        }
        if !seen.insert(code.to_string()) {
            violations.push(format!("{}: article appears more than once", code));
            continue;
        }

        match allocation::baseline(code, &line.boxes) {
            Ok(boxes) if boxes.is_empty() => violations.push(format!(
                "{}: at least one warehouse must request boxes",
                code
            )),
            Ok(boxes) => lines.push((code.to_string(), boxes)),
            Err(bucket_violations) => violations.extend(bucket_violations),
        }
    }

    (lines, violations)
}

/// Compares each requested bucket, and the requested total, with availability.
pub fn check_availability(
    lines: &[(String, WarehouseBoxes)],
    snapshot: &[ArticleAvailability],
) -> Vec<String> {
    let by_code: HashMap<&str, &ArticleAvailability> = snapshot
        .iter()
        .map(|a| (a.article_code.as_str(), a))
        .collect();
    let mut violations = Vec::new();

    for (code, requested) in lines {
        let Some(available) = by_code.get(code.as_str()) else {
            violations.push(format!("{}: article not found in stock snapshot", code));
            continue;
        };

        for (warehouse, boxes) in requested.used() {
            let in_stock = available.boxes.get(warehouse);
            if boxes > in_stock {
                violations.push(format!(
                    "{}: only {} available for {}, requested {}",
                    warehouse, in_stock, code, boxes
                ));
            }
        }

        if requested.total() > available.total {
            violations.push(format!(
                "TOTAL: only {} available for {}, requested {}",
                available.total,
                code,
                requested.total()
            ));
        }
    }

    violations
}
