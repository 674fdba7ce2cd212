//! In-process metrics sink (§4.11, §6).
//!
//! Per-engine-instance state: counters are monotonic, samples are
//! append-only. Never shared across engine instances. Guarded by a `Mutex`
//! so a snapshot taken concurrently with an in-flight attempt never observes
//! a torn value.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

#[derive(Debug, Default, Clone)]
struct Inner {
    counters: BTreeMap<String, u64>,
    samples: BTreeMap<String, Vec<(u64, f64)>>,
}

/// A point-in-time copy of a [`Metrics`] instance's state.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub samples: BTreeMap<String, Vec<(u64, f64)>>,
}

impl MetricsSnapshot {
    pub fn to_json(&self) -> Value {
        let counters = self
            .counters
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(*v)))
            .collect::<serde_json::Map<_, _>>();
        let samples = self
            .samples
            .iter()
            .map(|(k, v)| {
                let arr: Vec<Value> = v
                    .iter()
                    .map(|(t, s)| serde_json::json!({"t": t, "v": s}))
                    .collect();
                (k.clone(), Value::Array(arr))
            })
            .collect::<serde_json::Map<_, _>>();
        serde_json::json!({ "counters": counters, "samples": samples })
    }
}

/// The metrics sink. One instance per engine; never shared (§5).
#[derive(Default)]
pub struct Metrics {
    inner: Mutex<Inner>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self, name: &str, delta: u64) {
        let mut inner = self.inner.lock().expect("metrics mutex poisoned");
        *inner.counters.entry(name.to_string()).or_insert(0) += delta;
    }

    pub fn set(&self, name: &str, value: u64) {
        let mut inner = self.inner.lock().expect("metrics mutex poisoned");
        inner.counters.insert(name.to_string(), value);
    }

    pub fn add_sample(&self, name: &str, value: f64) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let mut inner = self.inner.lock().expect("metrics mutex poisoned");
        inner
            .samples
            .entry(name.to_string())
            .or_default()
            .push((now, value));
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock().expect("metrics mutex poisoned");
        MetricsSnapshot {
            counters: inner.counters.clone(),
            samples: inner.samples.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        self.snapshot().to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn inc_accumulates() {
        let m = Metrics::new();
        m.inc("api_request.count", 1);
        m.inc("api_request.count", 1);
        assert_eq!(m.snapshot().counters["api_request.count"], 2);
    }

    #[test]
    fn add_sample_appends_in_order() {
        let m = Metrics::new();
        m.add_sample("api_request.latency", 0.1);
        m.add_sample("api_request.latency", 0.2);
        let snap = m.snapshot();
        let samples = &snap.samples["api_request.latency"];
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].1, 0.1);
        assert_eq!(samples[1].1, 0.2);
    }

    #[test]
    fn concurrent_snapshot_never_panics() {
        let metrics = Arc::new(Metrics::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let m = Arc::clone(&metrics);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    m.inc("api_request.count", 1);
                    m.add_sample("api_request.latency", i as f64);
                    let _ = m.snapshot();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(metrics.snapshot().counters["api_request.count"], 800);
    }
}
