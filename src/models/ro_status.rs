use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::errors::ServiceError;

/// Lifecycle status of a replenishment order.
///
/// The order advances along a single chain from `Queue` to `Completed`;
/// `Cancelled` can be reached from any status that is not terminal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RoStatus {
    Queue,
    Approved,
    Picking,
    PickVerified,
    DnpbProcess,
    ReadyToShip,
    InDelivery,
    Arrived,
    Completed,
    Cancelled,
}

impl RoStatus {
    /// Statuses a transition may move to from `self`.
    pub fn allowed_next(self) -> &'static [RoStatus] {
        use RoStatus::*;
        match self {
            Queue => &[Approved, Cancelled],
            Approved => &[Picking, Cancelled],
            Picking => &[PickVerified, Cancelled],
            PickVerified => &[DnpbProcess, Cancelled],
            DnpbProcess => &[ReadyToShip, Cancelled],
            ReadyToShip => &[InDelivery, Cancelled],
            InDelivery => &[Arrived, Cancelled],
            Arrived => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, target: RoStatus) -> bool {
        self.allowed_next().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }

    /// Line allocations may only change before the order is ready to ship.
    pub fn allows_allocation_edits(self) -> bool {
        use RoStatus::*;
        match self {
            Queue | Approved | Picking | PickVerified | DnpbProcess => true,
            ReadyToShip | InDelivery | Arrived | Completed | Cancelled => false,
        }
    }

    /// Parses a status received from a caller, reporting the accepted values on failure.
    pub fn parse(value: &str) -> Result<RoStatus, ServiceError> {
        value.trim().parse().map_err(|_| {
            ServiceError::ValidationError(format!(
                "unknown status '{}'; expected one of {}",
                value,
                <RoStatus as strum::IntoEnumIterator>::iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    #[rstest]
    #[case(RoStatus::Queue, RoStatus::Approved)]
    #[case(RoStatus::Approved, RoStatus::Picking)]
    #[case(RoStatus::Picking, RoStatus::PickVerified)]
    #[case(RoStatus::PickVerified, RoStatus::DnpbProcess)]
    #[case(RoStatus::DnpbProcess, RoStatus::ReadyToShip)]
    #[case(RoStatus::ReadyToShip, RoStatus::InDelivery)]
    #[case(RoStatus::InDelivery, RoStatus::Arrived)]
    #[case(RoStatus::Arrived, RoStatus::Completed)]
    fn chain_edges_are_allowed(#[case] from: RoStatus, #[case] to: RoStatus) {
        assert!(from.can_transition_to(to));
        assert!(!to.can_transition_to(from), "{to} must not go back to {from}");
    }

    #[rstest]
    #[case(RoStatus::Queue, RoStatus::Picking)]
    #[case(RoStatus::Approved, RoStatus::DnpbProcess)]
    #[case(RoStatus::DnpbProcess, RoStatus::InDelivery)]
    #[case(RoStatus::Queue, RoStatus::Completed)]
    #[case(RoStatus::Arrived, RoStatus::Arrived)]
    fn skipping_or_repeating_is_rejected(#[case] from: RoStatus, #[case] to: RoStatus) {
        assert!(!from.can_transition_to(to));
    }

    #[test]
    fn every_non_terminal_status_can_be_cancelled() {
        for status in RoStatus::iter() {
            if status.is_terminal() {
                assert!(status.allowed_next().is_empty());
            } else {
                assert!(status.can_transition_to(RoStatus::Cancelled), "{status}");
            }
        }
    }

    #[test]
    fn only_completed_and_cancelled_are_terminal() {
        let terminal: Vec<_> = RoStatus::iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![RoStatus::Completed, RoStatus::Cancelled]);
    }

    #[test]
    fn wire_names_are_screaming_snake_case() {
        assert_eq!(RoStatus::PickVerified.to_string(), "PICK_VERIFIED");
        assert_eq!(RoStatus::parse("DNPB_PROCESS").unwrap(), RoStatus::DnpbProcess);
        assert_eq!(
            serde_json::to_string(&RoStatus::ReadyToShip).unwrap(),
            "\"READY_TO_SHIP\""
        );
        assert!(RoStatus::parse("SHIPPED").is_err());
    }
}
