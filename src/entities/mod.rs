pub mod article_pack_size;
pub mod article_stock;
pub mod ro_banding_notice;
pub mod ro_dnpb;
pub mod ro_order;
pub mod ro_order_line;
pub mod ro_receipt_line;
pub mod ro_sequence;
pub mod ro_status_history;
pub mod warehouse_transaction;
