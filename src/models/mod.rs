//! Domain types for replenishment orders.
//!
//! Database rows live in `crate::entities`; everything the services hand
//! around is one of the typed records below, converted once at the store
//! boundary.

pub mod delivery_note;
pub mod records;
pub mod ro_id;
pub mod ro_status;
pub mod warehouse;

pub use delivery_note::{DeliveryNote, DeliveryNoteFormat};
pub use records::{
    BandingNotice, BandingStatus, DnpbRecord, OrderLine, ReceiptLine, ReceiptStatus, RoOrder,
    RoOrderDetail, RoOrderSummary,
};
pub use ro_id::{Period, RoId, MAX_SEQUENCE};
pub use ro_status::RoStatus;
pub use warehouse::{BoxCounts, Warehouse, WarehouseBoxes};

/// Upper bound for a single bucket on a single line. Keeps every derived
/// total, and every pairs figure derived from it, inside `i32`.
pub const MAX_BOXES_PER_BUCKET: u32 = 100_000;
