//! Game counters with Prometheus text export

use dashmap::DashMap;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fmt::Write,
    sync::atomic::{AtomicU64, Ordering},
};

/// Lifecycle and rejection counters; cheap to bump from any task
#[derive(Debug, Default)]
pub struct GameMetrics {
    rounds_created_total: AtomicU64,
    rounds_completed_total: AtomicU64,
    joins_total: AtomicU64,
    queued_joins_total: AtomicU64,
    promotions_total: AtomicU64,
    leaves_total: AtomicU64,
    picks_total: AtomicU64,
    winners_total: AtomicU64,
    websocket_connections_active: AtomicU64,
    rejections: DashMap<&'static str, AtomicU64>,
}

impl GameMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_round_created(&self) {
        self.rounds_created_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_round_completed(&self, winners: usize) {
        self.rounds_completed_total.fetch_add(1, Ordering::Relaxed);
        self.winners_total.fetch_add(winners as u64, Ordering::Relaxed);
    }

    pub fn record_join(&self, queued: bool) {
        self.joins_total.fetch_add(1, Ordering::Relaxed);
        if queued {
            self.queued_joins_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_leave(&self, promoted: bool) {
        self.leaves_total.fetch_add(1, Ordering::Relaxed);
        if promoted {
            self.promotions_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_pick(&self) {
        self.picks_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a rejected operation under its error code
    pub fn record_rejection(&self, code: &'static str) {
        self.rejections
            .entry(code)
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn websocket_opened(&self) {
        self.websocket_connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn websocket_closed(&self) {
        let _ = self.websocket_connections_active.fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |n| n.checked_sub(1),
        );
    }

    pub fn rejections_for(&self, code: &str) -> u64 {
        self.rejections
            .get(code)
            .map(|count| count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let rejections: BTreeMap<String, u64> = self
            .rejections
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            rounds_created_total: self.rounds_created_total.load(Ordering::Relaxed),
            rounds_completed_total: self.rounds_completed_total.load(Ordering::Relaxed),
            joins_total: self.joins_total.load(Ordering::Relaxed),
            queued_joins_total: self.queued_joins_total.load(Ordering::Relaxed),
            promotions_total: self.promotions_total.load(Ordering::Relaxed),
            leaves_total: self.leaves_total.load(Ordering::Relaxed),
            picks_total: self.picks_total.load(Ordering::Relaxed),
            winners_total: self.winners_total.load(Ordering::Relaxed),
            websocket_connections_active: self.websocket_connections_active.load(Ordering::Relaxed),
            rejections_total: rejections.values().sum(),
            rejections,
        }
    }

    /// Render in the Prometheus text exposition format
    pub fn to_prometheus_format(&self) -> String {
        let snapshot = self.snapshot();
        let mut output = String::new();

        let counters: [(&str, &str, u64); 8] = [
            ("luckynine_rounds_created_total", "Rounds opened", snapshot.rounds_created_total),
            ("luckynine_rounds_completed_total", "Rounds completed", snapshot.rounds_completed_total),
            ("luckynine_joins_total", "Accepted joins", snapshot.joins_total),
            ("luckynine_queued_joins_total", "Joins admitted to the queue", snapshot.queued_joins_total),
            ("luckynine_promotions_total", "Queued participants promoted to a seat", snapshot.promotions_total),
            ("luckynine_leaves_total", "Voluntary leaves", snapshot.leaves_total),
            ("luckynine_picks_total", "Accepted number picks", snapshot.picks_total),
            ("luckynine_winners_total", "Participants marked as winners", snapshot.winners_total),
        ];
        for (name, help, value) in counters {
            let _ = write!(
                output,
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n\n"
            );
        }

        let _ = write!(
            output,
            "# HELP luckynine_websocket_connections_active Open websocket streams\n\
             # TYPE luckynine_websocket_connections_active gauge\n\
             luckynine_websocket_connections_active {}\n\n",
            snapshot.websocket_connections_active
        );

        let _ = write!(
            output,
            "# HELP luckynine_rejections_total Rejected operations by error code\n\
             # TYPE luckynine_rejections_total counter\n"
        );
        for (code, count) in &snapshot.rejections {
            let _ = writeln!(output, "luckynine_rejections_total{{code=\"{}\"}} {}", code, count);
        }

        output
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub rounds_created_total: u64,
    pub rounds_completed_total: u64,
    pub joins_total: u64,
    pub queued_joins_total: u64,
    pub promotions_total: u64,
    pub leaves_total: u64,
    pub picks_total: u64,
    pub winners_total: u64,
    pub websocket_connections_active: u64,
    pub rejections_total: u64,
    pub rejections: BTreeMap<String, u64>,
}
