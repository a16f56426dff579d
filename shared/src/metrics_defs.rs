//! Common types for metrics definitions.
//!
//! Each crate declares its metrics as `MetricDef` consts plus an
//! `ALL_METRICS` slice, and the binary passes those slices to
//! [`register_all`] at startup so the recorder knows every metric's
//! description before the first sample arrives.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

impl MetricType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "Counter",
            MetricType::Gauge => "Gauge",
            MetricType::Histogram => "Histogram",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

/// Registers descriptions for every metric in `defs` with the installed
/// recorder. A no-op when no recorder is installed.
pub fn register_all(defs: &[MetricDef]) {
    for def in defs {
        match def.metric_type {
            MetricType::Counter => metrics::describe_counter!(def.name, def.description),
            MetricType::Gauge => metrics::describe_gauge!(def.name, def.description),
            MetricType::Histogram => metrics::describe_histogram!(def.name, def.description),
        }
    }
}

#[macro_export]
macro_rules! counter {
    ($def:expr) => {
        metrics::counter!($def.name)
    };
    ($def:expr, $($label_key:expr => $label_value:expr),+ $(,)?) => {
        metrics::counter!($def.name, $($label_key => $label_value),+)
    };
}

#[macro_export]
macro_rules! gauge {
    ($def:expr) => {
        metrics::gauge!($def.name)
    };
    ($def:expr, $($label_key:expr => $label_value:expr),+ $(,)?) => {
        metrics::gauge!($def.name, $($label_key => $label_value),+)
    };
}

#[macro_export]
macro_rules! histogram {
    ($def:expr) => {
        metrics::histogram!($def.name)
    };
    ($def:expr, $($label_key:expr => $label_value:expr),+ $(,)?) => {
        metrics::histogram!($def.name, $($label_key => $label_value),+)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COUNTER: MetricDef = MetricDef {
        name: "test.counter",
        metric_type: MetricType::Counter,
        description: "A counter used by the macro tests",
    };

    const TEST_HISTOGRAM: MetricDef = MetricDef {
        name: "test.histogram",
        metric_type: MetricType::Histogram,
        description: "A histogram used by the macro tests",
    };

    #[test]
    fn metric_type_names() {
        assert_eq!(MetricType::Counter.as_str(), "Counter");
        assert_eq!(MetricType::Gauge.as_str(), "Gauge");
        assert_eq!(MetricType::Histogram.as_str(), "Histogram");
    }

    #[test]
    fn macros_and_registration_work_without_recorder() {
        register_all(&[TEST_COUNTER, TEST_HISTOGRAM]);
        crate::counter!(TEST_COUNTER).increment(1);
        crate::counter!(TEST_COUNTER, "outcome" => "ok").increment(1);
        crate::histogram!(TEST_HISTOGRAM).record(0.25);
    }
}
