//! Routing-Konfiguration
//!
//! Alle verhaltenssteuernden Schalter werden einmalig bei der
//! Konstruktion uebergeben und sind danach unveraenderlich. Die Struktur
//! laesst sich direkt aus dem `[routing]`-Abschnitt einer TOML-Datei laden.

use std::time::Duration;

use callroute_audio::FormFactor;
use callroute_core::{Result, RoutingError};
use serde::{Deserialize, Serialize};

/// Unveraenderliche Konfiguration des Routing-Automaten
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Moderne Communication-Device-API verwenden (sonst Legacy-Lautsprecher-Schalter)
    pub use_communication_device_api: bool,
    /// Mute zuruecksetzen, wenn Quiescent-Bluetooth betreten wird
    pub reset_mute_on_quiescent_bluetooth: bool,
    /// Wearables bei automatischer Bluetooth-Auswahl ausschliessen
    pub exclude_wearables: bool,
    /// Bei `bt_audio_connected` Geraet und Routenmaske sofort ergaenzen
    pub update_route_mask_on_bt_connect: bool,
    /// Wartezeit auf Bluetooth-Audio nach einer Verbindungsanforderung
    pub bt_audio_connect_timeout_ms: u64,
    /// Formfaktor (bestimmt das Lautsprecher-Geraet)
    pub form_factor: FormFactor,
    /// Kapazitaet der Ereignis-Warteschlange
    pub event_queue_capacity: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            use_communication_device_api: true,
            reset_mute_on_quiescent_bluetooth: true,
            exclude_wearables: false,
            update_route_mask_on_bt_connect: true,
            bt_audio_connect_timeout_ms: 5_000,
            form_factor: FormFactor::Phone,
            event_queue_capacity: 256,
        }
    }
}

impl RoutingConfig {
    pub fn bt_audio_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.bt_audio_connect_timeout_ms)
    }

    /// Prueft die Werte auf Plausibilitaet
    pub fn validieren(&self) -> Result<()> {
        if self.event_queue_capacity == 0 {
            return Err(RoutingError::Konfiguration(
                "event_queue_capacity muss groesser 0 sein".into(),
            ));
        }
        if self.bt_audio_connect_timeout_ms == 0 {
            return Err(RoutingError::Konfiguration(
                "bt_audio_connect_timeout_ms muss groesser 0 sein".into(),
            ));
        }
        Ok(())
    }
}
