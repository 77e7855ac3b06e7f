//! Hardware-Sicht zum Zeitpunkt der Ereignisverarbeitung
//!
//! Vor jedem Ereignis fragt der Worker die Kollaborateure einmal ab.
//! Der Zustandsautomat arbeitet ausschliesslich auf dieser Momentaufnahme
//! und bleibt dadurch frei von Seiteneffekten. Ereignis-Argumente sind nur
//! Hinweise; massgeblich ist die Sicht.

use std::collections::BTreeSet;

use callroute_core::{DeviceId, RouteMask};

use crate::collaborators::Collaborators;

/// Momentaufnahme der Hardware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareView {
    pub bt_available: bool,
    /// Verbundene Geraete in Stack-Reihenfolge
    pub bt_devices: Vec<DeviceId>,
    pub bt_active_device: Option<DeviceId>,
    pub bt_audio_connected_or_pending: bool,
    pub inband_ringing: bool,
    pub wearables: BTreeSet<DeviceId>,
    pub wired_headset_plugged: bool,
    pub has_earpiece: bool,
    pub microphone_muted: bool,
    /// Routen, die das aktive Gespraech zulaesst
    pub call_capabilities: RouteMask,
}

impl Default for HardwareView {
    fn default() -> Self {
        Self {
            bt_available: false,
            bt_devices: Vec::new(),
            bt_active_device: None,
            bt_audio_connected_or_pending: false,
            inband_ringing: false,
            wearables: BTreeSet::new(),
            wired_headset_plugged: false,
            has_earpiece: true,
            microphone_muted: false,
            call_capabilities: RouteMask::ALLE,
        }
    }
}

impl HardwareView {
    /// Fragt alle Kollaborateure ab
    pub fn sample(c: &Collaborators) -> Self {
        let bt_available = c.bluetooth.is_available();
        let bt_devices = if bt_available {
            c.bluetooth.connected_devices()
        } else {
            Vec::new()
        };
        let wearables = bt_devices
            .iter()
            .filter(|d| c.bluetooth.is_wearable(d))
            .cloned()
            .collect();

        Self {
            bt_available,
            bt_active_device: c.bluetooth.active_audio_device(),
            bt_audio_connected_or_pending: c.bluetooth.is_audio_connected_or_pending(),
            inband_ringing: c.bluetooth.is_inband_ringing_enabled(),
            wearables,
            bt_devices,
            wired_headset_plugged: c.wired_headset.is_plugged_in(),
            has_earpiece: c.audio.has_earpiece(),
            microphone_muted: c.audio.is_microphone_muted(),
            call_capabilities: c.calls.route_capabilities(),
        }
    }

    /// Ob der Stack Geraete fuer eine Bluetooth-Route meldet
    pub fn bluetooth_usable(&self) -> bool {
        self.bt_available && !self.bt_devices.is_empty()
    }

    /// Aktives Geraet, sofern es auch als verbunden gemeldet wird
    pub fn connected_active_device(&self) -> Option<&DeviceId> {
        self.bt_active_device
            .as_ref()
            .filter(|d| self.bt_devices.contains(d))
    }
}
