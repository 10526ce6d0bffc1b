//! Delivery accounting

use chrono::{DateTime, Utc};
use safewatch_common::types::round2;
use safewatch_storage::models::{AlertStatus, DeliveryRecord, DeliveryReportEntry, DeliveryStatus};

/// Percentage of sent messages that were delivered, two decimals; 0 when nothing was sent
pub fn delivery_rate(delivered: i32, sent: i32) -> f64 {
    if sent <= 0 {
        return 0.0;
    }
    round2(f64::from(delivered) / f64::from(sent) * 100.0)
}

/// Cost of `sent` messages, two decimals
pub fn total_cost(sent: i32, cost_per_message: f64) -> f64 {
    round2(f64::from(sent) * cost_per_message)
}

/// Fold a delivery report into the record persisted on the alert.
///
/// The alert ends `sent` when at least one message was delivered and
/// `failed` when every attempt failed.
pub fn summarize(
    report: Vec<DeliveryReportEntry>,
    cost_per_message: f64,
    sent_at: DateTime<Utc>,
) -> DeliveryRecord {
    let sent_count = report.len() as i32;
    let delivered_count = report
        .iter()
        .filter(|entry| entry.status == DeliveryStatus::Delivered)
        .count() as i32;
    let failed_count = sent_count - delivered_count;

    let status = if delivered_count > 0 {
        AlertStatus::Sent
    } else {
        AlertStatus::Failed
    };

    DeliveryRecord {
        status,
        sent_count,
        delivered_count,
        failed_count,
        delivery_rate: delivery_rate(delivered_count, sent_count),
        total_cost: total_cost(sent_count, cost_per_message),
        report,
        sent_at,
    }
}
