//! Audio-Geraete-Beschreibungen und Plattform-Schnittstelle
//!
//! Stellt die Beschreibung physischer Audio-Geraete bereit und die
//! Zuordnung einer logischen Route zu passenden Geraetetypen.

use callroute_core::{DeviceId, RouteKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AudioResult;

/// Typ eines physischen Audio-Geraets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioDeviceType {
    BuiltinEarpiece,
    BuiltinSpeaker,
    /// Bus-Ausgang (Fahrzeug-Formfaktor statt eingebautem Lautsprecher)
    BusOutput,
    WiredHeadset,
    WiredHeadphones,
    UsbHeadset,
    BluetoothSco,
}

/// Beschreibung eines Audio-Geraets, wie sie die Plattform liefert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDeviceInfo {
    /// Plattform-interner Bezeichner
    pub id: u32,
    /// Geraetetyp
    pub typ: AudioDeviceType,
    /// Adresse (bei Bluetooth die Hardware-Adresse, sonst leer)
    pub address: String,
    /// Anzeigename
    pub name: String,
}

impl AudioDeviceInfo {
    pub fn new(id: u32, typ: AudioDeviceType, name: impl Into<String>) -> Self {
        Self {
            id,
            typ,
            address: String::new(),
            name: name.into(),
        }
    }

    /// Bluetooth-SCO-Geraet mit Hardware-Adresse
    pub fn bluetooth(id: u32, address: &DeviceId, name: impl Into<String>) -> Self {
        Self {
            id,
            typ: AudioDeviceType::BluetoothSco,
            address: address.as_str().to_string(),
            name: name.into(),
        }
    }
}

/// Formfaktor des Geraets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormFactor {
    #[default]
    Phone,
    /// Fahrzeug: Lautsprecher-Route laeuft ueber einen Bus-Ausgang
    Automotive,
}

/// Schnittstelle zum Audio-Subsystem der Plattform
///
/// Alle Aufrufe erfolgen aus dem Routing-Worker und duerfen nicht
/// blockieren.
pub trait AudioSubsystem: Send + Sync {
    /// Aktuell verfuegbare Communication Devices
    fn communication_devices(&self) -> Vec<AudioDeviceInfo>;

    /// Setzt das aktive Communication Device
    fn set_communication_device(&self, device: &AudioDeviceInfo) -> AudioResult<()>;

    /// Hebt die Auswahl des Communication Device auf
    fn clear_communication_device(&self);

    /// Legacy-Schalter fuer den Lautsprecher
    fn set_speakerphone_on(&self, on: bool);

    fn set_microphone_mute(&self, muted: bool);

    fn is_microphone_muted(&self) -> bool;

    /// Ob die moderne Geraeteauswahl-API verfuegbar ist
    fn supports_communication_device_api(&self) -> bool {
        true
    }

    /// Ob das Geraet eine eingebaute Hoermuschel besitzt
    fn has_earpiece(&self) -> bool;
}

/// Passende Geraetetypen fuer eine Route, in Praeferenz-Reihenfolge
pub fn candidate_types(route: RouteKind, form_factor: FormFactor) -> &'static [AudioDeviceType] {
    match (route, form_factor) {
        (RouteKind::Earpiece, _) => &[AudioDeviceType::BuiltinEarpiece],
        (RouteKind::Speaker, FormFactor::Phone) => &[AudioDeviceType::BuiltinSpeaker],
        (RouteKind::Speaker, FormFactor::Automotive) => {
            &[AudioDeviceType::BusOutput, AudioDeviceType::BuiltinSpeaker]
        }
        (RouteKind::WiredHeadset, _) => &[
            AudioDeviceType::WiredHeadset,
            AudioDeviceType::WiredHeadphones,
            AudioDeviceType::UsbHeadset,
        ],
        (RouteKind::Bluetooth, _) => &[AudioDeviceType::BluetoothSco],
        (RouteKind::Streaming, _) => &[],
    }
}

/// Sucht das passende Geraet fuer eine Route
///
/// Bei Bluetooth wird bevorzugt das Geraet mit der angegebenen Adresse
/// gewaehlt; ohne Treffer faellt die Suche auf das erste SCO-Geraet zurueck.
pub fn find_device_for_route(
    devices: &[AudioDeviceInfo],
    route: RouteKind,
    bt_address: Option<&DeviceId>,
    form_factor: FormFactor,
) -> Option<AudioDeviceInfo> {
    if route == RouteKind::Bluetooth {
        if let Some(addr) = bt_address {
            if let Some(d) = devices
                .iter()
                .find(|d| d.typ == AudioDeviceType::BluetoothSco && d.address == addr.as_str())
            {
                return Some(d.clone());
            }
            debug!(adresse = %addr, "Kein SCO-Geraet mit passender Adresse, nehme erstes");
        }
    }

    for typ in candidate_types(route, form_factor) {
        if let Some(d) = devices.iter().find(|d| d.typ == *typ) {
            return Some(d.clone());
        }
    }
    None
}
