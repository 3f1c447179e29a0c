use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::models::{RoId, RoStatus, Warehouse};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Things that happened to a replenishment order, published after the write
/// that caused them has committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderSubmitted {
        ro_id: RoId,
        store_name: String,
        line_count: usize,
        total_boxes: u32,
    },
    StatusChanged {
        ro_id: RoId,
        from: RoStatus,
        to: RoStatus,
        actor: String,
        at: DateTime<Utc>,
    },
    DnpbRecorded {
        ro_id: RoId,
        warehouse: Warehouse,
        number: String,
        matched: bool,
    },
    AllocationEdited {
        ro_id: RoId,
        updated: Vec<String>,
        failed: Vec<String>,
    },
    BandingRaised {
        ro_id: RoId,
        notice_id: uuid::Uuid,
        raised_by: String,
    },
    DiscrepancyConfirmed {
        ro_id: RoId,
        confirmed_by: String,
        reconciled_lines: usize,
    },
}

impl Event {
    pub fn ro_id(&self) -> RoId {
        match self {
            Event::OrderSubmitted { ro_id, .. }
            | Event::StatusChanged { ro_id, .. }
            | Event::DnpbRecorded { ro_id, .. }
            | Event::AllocationEdited { ro_id, .. }
            | Event::BandingRaised { ro_id, .. }
            | Event::DiscrepancyConfirmed { ro_id, .. } => *ro_id,
        }
    }
}

/// Drains the event channel, logging each event until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderSubmitted {
                ro_id,
                store_name,
                line_count,
                total_boxes,
            } => {
                info!(ro_id = %ro_id, store = %store_name, line_count, total_boxes, "order submitted");
            }
            Event::StatusChanged {
                ro_id,
                from,
                to,
                actor,
                ..
            } => {
                info!(ro_id = %ro_id, from = %from, to = %to, actor = %actor, "order status changed");
            }
            Event::DnpbRecorded {
                ro_id,
                warehouse,
                number,
                matched,
            } => {
                if *matched {
                    info!(ro_id = %ro_id, warehouse = %warehouse, dnpb = %number, "delivery note recorded");
                } else {
                    warn!(ro_id = %ro_id, warehouse = %warehouse, dnpb = %number, "delivery note recorded without ledger match");
                }
            }
            Event::AllocationEdited {
                ro_id,
                updated,
                failed,
            } => {
                if failed.is_empty() {
                    info!(ro_id = %ro_id, updated = updated.len(), "allocations edited");
                } else {
                    warn!(ro_id = %ro_id, updated = updated.len(), failed = ?failed, "allocations partially edited");
                }
            }
            Event::BandingRaised {
                ro_id,
                notice_id,
                raised_by,
            } => {
                warn!(ro_id = %ro_id, notice_id = %notice_id, raised_by = %raised_by, "banding notice raised");
            }
            Event::DiscrepancyConfirmed {
                ro_id,
                confirmed_by,
                reconciled_lines,
            } => {
                info!(ro_id = %ro_id, confirmed_by = %confirmed_by, reconciled_lines, "discrepancy confirmed");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ro_id() -> RoId {
        "RO-2603-0001".parse().unwrap()
    }

    #[tokio::test]
    async fn sent_events_reach_the_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);

        sender
            .send(Event::BandingRaised {
                ro_id: ro_id(),
                notice_id: uuid::Uuid::new_v4(),
                raised_by: "spv-1".into(),
            })
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.ro_id(), ro_id());
    }

    #[tokio::test]
    async fn send_fails_once_the_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        let result = sender
            .send(Event::AllocationEdited {
                ro_id: ro_id(),
                updated: vec!["A1".into()],
                failed: vec![],
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn processor_stops_when_senders_drop() {
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(process_events(rx));
        EventSender::new(tx.clone())
            .send(Event::DiscrepancyConfirmed {
                ro_id: ro_id(),
                confirmed_by: "spv-1".into(),
                reconciled_lines: 1,
            })
            .await
            .unwrap();
        drop(tx);
        handle.await.unwrap();
    }
}
