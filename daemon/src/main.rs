//! Callroute Daemon – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und spielt das
//! konfigurierte Szenario gegen simulierte Hardware ab.

use anyhow::Result;
use callroute_daemon::{config::DaemonConfig, Daemon};
use callroute_observability::logging_initialisieren;

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Argument, Umgebungsvariable oder Standard
    let config_pfad = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CALLROUTE_CONFIG").ok())
        .unwrap_or_else(|| "callroute.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = DaemonConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Callroute Daemon wird initialisiert"
    );

    Daemon::neu(config).starten().await
}
