//! callroute-daemon – Bibliotheks-Root
//!
//! Verbindet den Call-Audio-Router mit simulierter Hardware und spielt ein
//! konfiguriertes Szenario ab. Jede Zustandsaenderung erscheint als
//! JSON-Zeile auf stdout.

pub mod config;
pub mod simulation;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use callroute_core::SessionToken;
use callroute_routing::{CallAudioRouter, Collaborators, RouterHandle};
use config::{DaemonConfig, Schritt};
use simulation::{KonsolenLebenszyklus, SimulatedHardware};

/// Haelt den laufenden Daemon-Zustand zusammen
pub struct Daemon {
    pub config: DaemonConfig,
}

impl Daemon {
    /// Erstellt einen neuen Daemon aus der gegebenen Konfiguration
    pub fn neu(config: DaemonConfig) -> Self {
        Self { config }
    }

    /// Startet den Router, spielt das Szenario ab und faehrt wieder herunter
    ///
    /// Reihenfolge:
    /// 1. Simulierte Hardware aufbauen und Router initialisieren
    /// 2. Hardware als Ereignisquelle abonnieren
    /// 3. Szenario-Schritte abspielen
    /// 4. Auf leere Warteschlange warten, Metriken ausgeben
    /// 5. Optional auf Ctrl-C warten, danach Shutdown
    pub async fn starten(self) -> Result<()> {
        let hardware = SimulatedHardware::neu(&self.config.hardware);
        let lebenszyklus = KonsolenLebenszyklus::neu(self.config.hardware.gespraech_routen);
        let collaborators = Collaborators {
            bluetooth: hardware.clone(),
            wired_headset: hardware.clone(),
            audio: hardware.clone(),
            calls: lebenszyklus.clone(),
        };

        let router = CallAudioRouter::initialize(self.config.routing.clone(), collaborators, None)?;
        router.subscribe(hardware.as_ref());
        tracing::info!(
            zustand = %router.current_state(),
            schritte = self.config.szenario.schritte.len(),
            "Szenario startet"
        );

        for schritt in &self.config.szenario.schritte {
            let session = self.config.szenario.sitzungen.then(SessionToken::new);
            schritt_ausfuehren(&hardware, &router.handle(), schritt, session).await;
        }
        leerlauf_abwarten(router.handle()).await?;

        tracing::info!(
            zustand = %router.current_state(),
            aktiv = router.is_active(),
            aenderungen = lebenszyklus.verlauf().len(),
            "Szenario abgeschlossen"
        );
        tracing::debug!("Metriken:\n{}", router.metrics().exportieren()?);

        if self.config.szenario.danach_warten {
            tracing::info!("Daemon laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
            tokio::signal::ctrl_c().await?;
            tracing::info!("Shutdown-Signal empfangen, Daemon wird beendet");
        }

        tokio::task::spawn_blocking(move || router.shutdown()).await?;
        Ok(())
    }
}

async fn schritt_ausfuehren(
    hardware: &Arc<SimulatedHardware>,
    router: &RouterHandle,
    schritt: &Schritt,
    session: Option<SessionToken>,
) {
    tracing::debug!(?schritt, "Szenario-Schritt");
    match schritt {
        Schritt::Ereignis { ereignis } => {
            if let Err(e) = router.enqueue(ereignis.clone(), session) {
                tracing::warn!(fehler = %e, event = ereignis.name(), "Ereignis abgelehnt");
            }
        }
        Schritt::HeadsetEinstecken => hardware.headset(true, session),
        Schritt::HeadsetAbziehen => hardware.headset(false, session),
        Schritt::BluetoothVerbinden { adresse, wearable } => {
            hardware.bluetooth_verbinden(adresse, *wearable, session)
        }
        Schritt::BluetoothTrennen { adresse } => hardware.bluetooth_trennen(adresse, session),
        Schritt::BluetoothAktiv { adresse } => hardware.bluetooth_aktiv(adresse, session),
        Schritt::MikrofonExtern { stumm } => hardware.mikrofon_extern(*stumm, session),
        Schritt::Warten { ms } => {
            // Vorher eingereihte Ereignisse sollen die Hardware schon gesehen haben
            if let Err(e) = leerlauf_abwarten(router.clone()).await {
                tracing::warn!(fehler = %e, "Warten auf Router fehlgeschlagen");
            }
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }
    }
}

/// Wartet ausserhalb der Runtime-Threads auf die leere Warteschlange
async fn leerlauf_abwarten(router: RouterHandle) -> Result<()> {
    tokio::task::spawn_blocking(move || router.wait_idle()).await??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn szenario_laeuft_durch() {
        let config = DaemonConfig::aus_toml(
            r#"
            [routing]
            bt_audio_connect_timeout_ms = 50

            [hardware]
            bluetooth_geraete = [{ adresse = "AA:01" }]

            [szenario]
            schritte = [
                { aktion = "ereignis", ereignis = { event = "switch_focus", mode = "active" } },
                { aktion = "headset_einstecken" },
                { aktion = "bluetooth_trennen", adresse = "AA:01" },
                { aktion = "warten", ms = 10 },
                { aktion = "ereignis", ereignis = { event = "switch_focus", mode = "none" } },
            ]
            "#,
        )
        .unwrap();
        Daemon::neu(config).starten().await.unwrap();
    }
}
