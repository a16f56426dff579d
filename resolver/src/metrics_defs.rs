//! Metrics definitions for the resolver.

use shared::metrics_defs::{MetricDef, MetricType};

pub const UPSTREAM_ATTEMPTS: MetricDef = MetricDef {
    name: "upstream.attempts",
    metric_type: MetricType::Counter,
    description: "Number of upstream lookup attempts, tagged by outcome",
};

pub const UPSTREAM_ATTEMPT_DURATION: MetricDef = MetricDef {
    name: "upstream.attempt.duration",
    metric_type: MetricType::Histogram,
    description: "Time spent on a single upstream attempt in seconds",
};

pub const LOOKUPS_EXHAUSTED: MetricDef = MetricDef {
    name: "lookups.exhausted",
    metric_type: MetricType::Counter,
    description: "Number of lookups that failed every configured attempt",
};

pub const ALL_METRICS: &[MetricDef] = &[
    UPSTREAM_ATTEMPTS,
    UPSTREAM_ATTEMPT_DURATION,
    LOOKUPS_EXHAUSTED,
];
