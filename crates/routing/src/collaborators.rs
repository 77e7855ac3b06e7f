//! Schnittstellen zu externen Kollaborateuren
//!
//! Der Routing-Kern kennt Bluetooth-Stack, Headset-Erkennung, Audio-Subsystem
//! und den Gespraechs-Lebenszyklus nur ueber diese Traits. Alle Aufrufe
//! erfolgen aus dem Routing-Worker und duerfen nicht blockieren; Ergebnisse
//! asynchroner Operationen kommen als spaetere Ereignisse zurueck.

use std::sync::Arc;

use callroute_audio::AudioSubsystem;
use callroute_core::{CallAudioState, DeviceId, Result, RouteMask};

/// Bluetooth-Route-Manager (Hands-Free-Profil)
pub trait BluetoothRouteManager: Send + Sync {
    /// Ob Bluetooth-Hands-Free grundsaetzlich verfuegbar ist
    fn is_available(&self) -> bool;

    /// Verbundene Kandidaten in stabiler Reihenfolge des Stacks
    fn connected_devices(&self) -> Vec<DeviceId>;

    /// Geraet, zu dem gerade Audio fliesst
    fn active_audio_device(&self) -> Option<DeviceId>;

    /// Fordert eine Audio-Verbindung an (`None` = Wahl des Stacks)
    fn connect_audio(&self, device: Option<&DeviceId>) -> Result<()>;

    fn disconnect_audio(&self) -> Result<()>;

    fn is_audio_connected_or_pending(&self) -> bool;

    fn is_inband_ringing_enabled(&self) -> bool;

    fn is_wearable(&self, device: &DeviceId) -> bool;
}

/// Erkennung kabelgebundener Headsets
pub trait WiredHeadsetTracker: Send + Sync {
    fn is_plugged_in(&self) -> bool;
}

/// Einzelnes Gespraech, das ueber Routenwechsel informiert wird
pub trait CallAudioObserver: Send + Sync {
    /// Kennung fuer Logs
    fn call_id(&self) -> String;

    fn on_call_audio_state_changed(&self, state: &CallAudioState);
}

/// Gespraechs-Lebenszyklus-Manager
pub trait CallLifecycle: Send + Sync {
    /// Wird nach jeder tatsaechlichen Zustandsaenderung aufgerufen
    fn on_call_audio_state_changed(&self, old: &CallAudioState, new: &CallAudioState);

    /// Routen, die das aktive Gespraech zulaesst
    fn route_capabilities(&self) -> RouteMask {
        RouteMask::ALLE
    }

    /// Gespraeche, die einzeln benachrichtigt werden muessen
    fn calls_to_notify(&self) -> Vec<Arc<dyn CallAudioObserver>> {
        Vec::new()
    }
}

/// Buendel aller Kollaborateure, die der Router benoetigt
#[derive(Clone)]
pub struct Collaborators {
    pub bluetooth: Arc<dyn BluetoothRouteManager>,
    pub wired_headset: Arc<dyn WiredHeadsetTracker>,
    pub audio: Arc<dyn AudioSubsystem>,
    pub calls: Arc<dyn CallLifecycle>,
}
