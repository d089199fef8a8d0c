use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

#[derive(Clone, Debug)]
pub struct MetricPoint {
    pub name: String,
    pub value: f64,
    pub timestamp_ms: u64,
    pub tags: HashMap<String, String>,
}

impl MetricPoint {
    pub fn now(name: impl Into<String>, value: f64, tags: HashMap<String, String>) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            name: name.into(),
            value,
            timestamp_ms,
            tags,
        }
    }
}

pub trait MetricsSink: Send + Sync {
    fn record(&self, point: MetricPoint);
    fn list(&self) -> Vec<MetricPoint> {
        Vec::new()
    }
}

pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn record(&self, _point: MetricPoint) {}
}

#[derive(Clone)]
pub struct InMemoryMetricsSink {
    points: Arc<Mutex<Vec<MetricPoint>>>,
}

impl InMemoryMetricsSink {
    pub fn new() -> Self {
        Self {
            points: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for InMemoryMetricsSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn record(&self, point: MetricPoint) {
        self.points.lock().push(point);
    }

    fn list(&self) -> Vec<MetricPoint> {
        self.points.lock().clone()
    }
}
