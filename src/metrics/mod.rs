// Metrics module
// Prometheus counters for assessments, crisis flags and degraded outcomes

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::engine::TurnOutcome;

/// Engine metrics registered on their own registry
#[derive(Clone)]
pub struct EngineMetrics {
    registry: Registry,
    assessments_total: IntCounterVec,
    crisis_flags_total: IntCounter,
    degraded_total: IntCounter,
    sessions_active: IntGauge,
}

impl EngineMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let assessments_total = IntCounterVec::new(
            Opts::new("safeharbor_assessments_total", "Assessed turns by risk level"),
            &["level"],
        )?;
        registry.register(Box::new(assessments_total.clone()))?;

        let crisis_flags_total = IntCounter::with_opts(Opts::new(
            "safeharbor_crisis_flags_total",
            "Turns that raised the crisis flag",
        ))?;
        registry.register(Box::new(crisis_flags_total.clone()))?;

        let degraded_total = IntCounter::with_opts(Opts::new(
            "safeharbor_degraded_total",
            "Turns answered with a fail-safe outcome",
        ))?;
        registry.register(Box::new(degraded_total.clone()))?;

        let sessions_active = IntGauge::with_opts(Opts::new(
            "safeharbor_sessions_active",
            "Sessions currently held in the store",
        ))?;
        registry.register(Box::new(sessions_active.clone()))?;

        Ok(Self {
            registry,
            assessments_total,
            crisis_flags_total,
            degraded_total,
            sessions_active,
        })
    }

    /// Record one turn outcome
    pub fn observe(&self, outcome: &TurnOutcome) {
        self.assessments_total
            .with_label_values(&[outcome.risk.level().as_str()])
            .inc();
        if outcome.escalation.raise_crisis_flag {
            self.crisis_flags_total.inc();
        }
        if outcome.degraded {
            self.degraded_total.inc();
        }
    }

    pub fn set_active_sessions(&self, count: usize) {
        self.sessions_active.set(count as i64);
    }

    /// Export in the Prometheus text format
    pub fn encode_text(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Metrics output is not UTF-8")
    }
}
