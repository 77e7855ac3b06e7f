//! Prometheus-kompatible Metriken fuer das Call-Audio-Routing
//!
//! Registrierte Metriken:
//! - `callroute_route_transitions_total` – Counter: Zustandswechsel (Zielzustand)
//! - `callroute_events_total` – Counter: Verarbeitete Ereignisse (Ereignisname)
//! - `callroute_hardware_commands_total` – Counter: Hardware-Kommandos (Kommando)
//! - `callroute_hardware_failures_total` – Counter: Fehlgeschlagene Hardware-Kommandos
//! - `callroute_published_states_total` – Counter: Veroeffentlichte Zustaende
//! - `callroute_unchanged_states_total` – Counter: Unterdrueckte (unveraenderte) Zustaende
//! - `callroute_deferred_pending` – Gauge: Eingeplante verzoegerte Ereignisse

use anyhow::Result;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Callroute-Prometheus-Metriken
#[derive(Clone)]
pub struct RoutingMetrics {
    pub registry: Arc<Registry>,

    pub route_transitions_total: IntCounterVec,
    pub events_total: IntCounterVec,
    pub hardware_commands_total: IntCounterVec,
    pub hardware_failures_total: IntCounterVec,
    pub published_states_total: IntCounter,
    pub unchanged_states_total: IntCounter,
    pub deferred_pending: IntGauge,
}

impl RoutingMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let route_transitions_total = IntCounterVec::new(
            Opts::new(
                "callroute_route_transitions_total",
                "Anzahl der Zustandswechsel des Routing-Automaten",
            ),
            &["state"],
        )?;
        registry.register(Box::new(route_transitions_total.clone()))?;

        let events_total = IntCounterVec::new(
            Opts::new("callroute_events_total", "Anzahl verarbeiteter Ereignisse"),
            &["event"],
        )?;
        registry.register(Box::new(events_total.clone()))?;

        let hardware_commands_total = IntCounterVec::new(
            Opts::new(
                "callroute_hardware_commands_total",
                "Anzahl ausgefuehrter Hardware-Kommandos",
            ),
            &["command"],
        )?;
        registry.register(Box::new(hardware_commands_total.clone()))?;

        let hardware_failures_total = IntCounterVec::new(
            Opts::new(
                "callroute_hardware_failures_total",
                "Anzahl fehlgeschlagener Hardware-Kommandos",
            ),
            &["command"],
        )?;
        registry.register(Box::new(hardware_failures_total.clone()))?;

        let published_states_total = IntCounter::with_opts(Opts::new(
            "callroute_published_states_total",
            "Anzahl veroeffentlichter CallAudioState-Aenderungen",
        ))?;
        registry.register(Box::new(published_states_total.clone()))?;

        let unchanged_states_total = IntCounter::with_opts(Opts::new(
            "callroute_unchanged_states_total",
            "Ereignisse ohne Aenderung des CallAudioState",
        ))?;
        registry.register(Box::new(unchanged_states_total.clone()))?;

        let deferred_pending = IntGauge::with_opts(Opts::new(
            "callroute_deferred_pending",
            "Eingeplante verzoegerte Ereignisse",
        ))?;
        registry.register(Box::new(deferred_pending.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            route_transitions_total,
            events_total,
            hardware_commands_total,
            hardware_failures_total,
            published_states_total,
            unchanged_states_total,
            deferred_pending,
        })
    }

    /// Zaehlt einen Zustandswechsel
    pub fn transition(&self, zustand: &str) {
        self.route_transitions_total.with_label_values(&[zustand]).inc();
    }

    /// Zaehlt ein verarbeitetes Ereignis
    pub fn event(&self, name: &str) {
        self.events_total.with_label_values(&[name]).inc();
    }

    /// Zaehlt ein Hardware-Kommando und ggf. dessen Fehlschlag
    pub fn command(&self, kommando: &str, erfolgreich: bool) {
        self.hardware_commands_total
            .with_label_values(&[kommando])
            .inc();
        if !erfolgreich {
            self.hardware_failures_total
                .with_label_values(&[kommando])
                .inc();
        }
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
