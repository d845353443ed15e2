//! Read-only view of a finished receipt, consumed by the client-side exporter.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::receipt::line::{DisplayName, ReceiptLine};

pub const RECEIPT_TITLE: &str = "甜蜜存根";
pub const RECEIPT_SUBTITLE: &str = "MEMORY VOUCHER";

/// An uploaded photo, kept in memory for the lifetime of one playback run.
#[derive(Debug, Clone)]
pub struct ReceiptImage {
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptExport {
    pub run_id: Uuid,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub recipient: DisplayName,
    pub voucher_no: String,
    pub issued_at: DateTime<Utc>,
    pub lines: Vec<ReceiptLine>,
    pub has_image: bool,
    pub file_name: String,
}

impl ReceiptExport {
    pub fn new(
        run_id: Uuid,
        recipient: &DisplayName,
        issued_at: DateTime<Utc>,
        lines: Vec<ReceiptLine>,
        has_image: bool,
    ) -> Self {
        Self {
            run_id,
            title: RECEIPT_TITLE,
            subtitle: RECEIPT_SUBTITLE,
            recipient: recipient.clone(),
            voucher_no: voucher_number(issued_at),
            issued_at,
            lines,
            has_image,
            file_name: export_file_name(recipient),
        }
    }
}

/// `MEM-YYYY-MMDD` for the day the run started.
pub fn voucher_number(issued_at: DateTime<Utc>) -> String {
    format!("MEM-{}", issued_at.format("%Y-%m%d"))
}

pub fn export_file_name(recipient: &DisplayName) -> String {
    format!("{RECEIPT_TITLE}-{recipient}.jpg")
}
