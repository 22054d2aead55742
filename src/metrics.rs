// src/metrics.rs

/// Registers descriptions for the ledger's metrics.
/// Call once at startup; a no-op without the `observability` feature.
pub fn describe_metrics() {
    #[cfg(feature = "observability")]
    {
        use metrics::{describe_counter, Unit};

        describe_counter!(
            "ledger_transactions_total",
            Unit::Count,
            "Transactions submitted, inbound and outbound combined."
        );
        describe_counter!(
            "ledger_events_total",
            Unit::Count,
            "Events appended to the audit log."
        );
        describe_counter!(
            "ledger_swap_rejections_total",
            Unit::Count,
            "Swaps rejected by price protection or pool state."
        );
        describe_counter!(
            "ledger_settlements_completed_total",
            Unit::Count,
            "Pending settlements fully confirmed."
        );
    }
}

pub fn inc_transactions() {
    #[cfg(feature = "observability")]
    metrics::increment_counter!("ledger_transactions_total");
}

pub fn inc_events_appended() {
    #[cfg(feature = "observability")]
    metrics::increment_counter!("ledger_events_total");
}

pub fn inc_swap_rejections() {
    #[cfg(feature = "observability")]
    metrics::increment_counter!("ledger_swap_rejections_total");
}

pub fn inc_settlements_completed() {
    #[cfg(feature = "observability")]
    metrics::increment_counter!("ledger_settlements_completed_total");
}
