//! Simulierte Hardware fuer den Daemon
//!
//! Bildet Bluetooth-Stack, Headset-Buchse und Audio-Subsystem im Speicher
//! nach. Zustandsaenderungen aus dem Szenario werden zuerst hier
//! eingetragen und danach als Ereignis an den Router gemeldet, damit die
//! Hardware-Sicht bei der Verarbeitung bereits stimmt.

use std::sync::Arc;

use callroute_audio::{AudioDeviceInfo, AudioDeviceType, AudioResult, AudioSubsystem};
use callroute_core::{
    CallAudioState, DeviceId, EventSink, EventSource, Result, RouteEvent, RouteMask, SessionToken,
};
use callroute_routing::{BluetoothRouteManager, CallLifecycle, WiredHeadsetTracker};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::HardwareEinstellungen;

#[derive(Debug)]
struct Zustand {
    hoerer: bool,
    headset: bool,
    bt_verfuegbar: bool,
    /// Verbundene Geraete in Verbindungsreihenfolge
    bt_geraete: Vec<DeviceId>,
    wearables: Vec<DeviceId>,
    bt_aktiv: Option<DeviceId>,
    bt_audio: bool,
    inband: bool,
    mikrofon_stumm: bool,
    lautsprecher: bool,
    geraet: Option<String>,
}

/// Simulierte Plattform-Hardware
pub struct SimulatedHardware {
    zustand: Mutex<Zustand>,
    sink: RwLock<Option<Arc<dyn EventSink>>>,
    bestaetigen: bool,
    moderne_api: bool,
}

impl SimulatedHardware {
    pub fn neu(einstellungen: &HardwareEinstellungen) -> Arc<Self> {
        let bt_geraete = einstellungen
            .bluetooth_geraete
            .iter()
            .map(|g| DeviceId::new(g.adresse.clone()))
            .collect();
        let wearables = einstellungen
            .bluetooth_geraete
            .iter()
            .filter(|g| g.wearable)
            .map(|g| DeviceId::new(g.adresse.clone()))
            .collect();
        let bt_aktiv = einstellungen.bluetooth_aktiv.clone().map(DeviceId::new);

        Arc::new(Self {
            zustand: Mutex::new(Zustand {
                hoerer: einstellungen.hoerer,
                headset: einstellungen.headset_eingesteckt,
                bt_verfuegbar: einstellungen.bluetooth_verfuegbar,
                bt_geraete,
                wearables,
                bt_audio: bt_aktiv.is_some(),
                bt_aktiv,
                inband: einstellungen.inband_klingeln,
                mikrofon_stumm: false,
                lautsprecher: false,
                geraet: None,
            }),
            sink: RwLock::new(None),
            bestaetigen: einstellungen.bluetooth_bestaetigt,
            moderne_api: einstellungen.geraeteauswahl_api,
        })
    }

    /// Meldet ein Ereignis an den abonnierten Router
    pub fn melden(&self, event: RouteEvent, session: Option<SessionToken>) {
        let Some(sink) = self.sink.read().clone() else {
            warn!(event = event.name(), "Kein Router abonniert, Ereignis verworfen");
            return;
        };
        if let Err(e) = sink.deliver(event, session) {
            warn!(fehler = %e, "Ereignis konnte nicht eingereiht werden");
        }
    }

    pub fn headset(&self, eingesteckt: bool, session: Option<SessionToken>) {
        self.zustand.lock().headset = eingesteckt;
        let event = if eingesteckt {
            RouteEvent::WiredHeadsetConnected
        } else {
            RouteEvent::WiredHeadsetDisconnected
        };
        self.melden(event, session);
    }

    pub fn bluetooth_verbinden(&self, adresse: &str, wearable: bool, session: Option<SessionToken>) {
        let geraet = DeviceId::from(adresse);
        {
            let mut z = self.zustand.lock();
            if !z.bt_geraete.contains(&geraet) {
                z.bt_geraete.push(geraet.clone());
            }
            if wearable && !z.wearables.contains(&geraet) {
                z.wearables.push(geraet);
            }
        }
        self.melden(RouteEvent::BtDeviceListChanged, session);
    }

    pub fn bluetooth_trennen(&self, adresse: &str, session: Option<SessionToken>) {
        let geraet = DeviceId::from(adresse);
        let war_aktiv = {
            let mut z = self.zustand.lock();
            z.bt_geraete.retain(|g| *g != geraet);
            z.wearables.retain(|g| *g != geraet);
            let war_aktiv = z.bt_aktiv.as_ref() == Some(&geraet);
            if war_aktiv {
                z.bt_aktiv = None;
                z.bt_audio = false;
            }
            war_aktiv
        };
        if war_aktiv {
            self.melden(
                RouteEvent::BtActiveDeviceGone {
                    device: Some(geraet),
                },
                session,
            );
        }
        self.melden(RouteEvent::BtDeviceListChanged, session);
    }

    /// Stack schaltet Audio auf ein Geraet (z.B. Taste am Headset)
    pub fn bluetooth_aktiv(&self, adresse: &str, session: Option<SessionToken>) {
        let geraet = DeviceId::from(adresse);
        {
            let mut z = self.zustand.lock();
            if !z.bt_geraete.contains(&geraet) {
                warn!(geraet = %geraet, "Geraet ist nicht verbunden");
                return;
            }
            z.bt_aktiv = Some(geraet.clone());
            z.bt_audio = true;
        }
        self.melden(
            RouteEvent::BtActiveDevicePresent {
                device: Some(geraet.clone()),
            },
            session,
        );
        self.melden(
            RouteEvent::BtAudioConnected {
                device: Some(geraet),
            },
            session,
        );
    }

    pub fn mikrofon_extern(&self, stumm: bool, session: Option<SessionToken>) {
        self.zustand.lock().mikrofon_stumm = stumm;
        self.melden(RouteEvent::MuteExternallyChanged, session);
    }
}

impl EventSource for SimulatedHardware {
    fn name(&self) -> &str {
        "simulation"
    }

    fn subscribe(&self, sink: Arc<dyn EventSink>) {
        *self.sink.write() = Some(sink);
    }
}

impl BluetoothRouteManager for SimulatedHardware {
    fn is_available(&self) -> bool {
        self.zustand.lock().bt_verfuegbar
    }

    fn connected_devices(&self) -> Vec<DeviceId> {
        self.zustand.lock().bt_geraete.clone()
    }

    fn active_audio_device(&self) -> Option<DeviceId> {
        self.zustand.lock().bt_aktiv.clone()
    }

    fn connect_audio(&self, device: Option<&DeviceId>) -> Result<()> {
        let ziel = {
            let mut z = self.zustand.lock();
            let ziel = device.cloned().or_else(|| z.bt_geraete.first().cloned());
            let Some(ziel) = ziel.filter(|d| z.bt_geraete.contains(d)) else {
                return Err(callroute_core::RoutingError::hardware(
                    "connect_audio",
                    "kein verbundenes Geraet",
                ));
            };
            z.bt_audio = true;
            if self.bestaetigen {
                z.bt_aktiv = Some(ziel.clone());
            }
            ziel
        };
        info!(geraet = %ziel, "Bluetooth-Audio angefordert");
        if self.bestaetigen {
            // Der Stack bestaetigt asynchron ueber die Warteschlange
            self.melden(
                RouteEvent::BtAudioConnected {
                    device: Some(ziel),
                },
                None,
            );
        }
        Ok(())
    }

    fn disconnect_audio(&self) -> Result<()> {
        let mut z = self.zustand.lock();
        z.bt_audio = false;
        z.bt_aktiv = None;
        info!("Bluetooth-Audio getrennt");
        Ok(())
    }

    fn is_audio_connected_or_pending(&self) -> bool {
        self.zustand.lock().bt_audio
    }

    fn is_inband_ringing_enabled(&self) -> bool {
        self.zustand.lock().inband
    }

    fn is_wearable(&self, device: &DeviceId) -> bool {
        self.zustand.lock().wearables.contains(device)
    }
}

impl WiredHeadsetTracker for SimulatedHardware {
    fn is_plugged_in(&self) -> bool {
        self.zustand.lock().headset
    }
}

impl AudioSubsystem for SimulatedHardware {
    fn communication_devices(&self) -> Vec<AudioDeviceInfo> {
        let z = self.zustand.lock();
        let mut geraete = vec![AudioDeviceInfo::new(
            2,
            AudioDeviceType::BuiltinSpeaker,
            "Lautsprecher",
        )];
        if z.hoerer {
            geraete.push(AudioDeviceInfo::new(
                1,
                AudioDeviceType::BuiltinEarpiece,
                "Hoerer",
            ));
        }
        if z.headset {
            geraete.push(AudioDeviceInfo::new(
                3,
                AudioDeviceType::WiredHeadset,
                "Headset",
            ));
        }
        if z.bt_audio {
            for (i, d) in z.bt_geraete.iter().enumerate() {
                geraete.push(AudioDeviceInfo::bluetooth(100 + i as u32, d, d.as_str()));
            }
        }
        geraete
    }

    fn set_communication_device(&self, device: &AudioDeviceInfo) -> AudioResult<()> {
        debug!(geraet = %device.name, "Communication Device (simuliert)");
        self.zustand.lock().geraet = Some(device.name.clone());
        Ok(())
    }

    fn clear_communication_device(&self) {
        self.zustand.lock().geraet = None;
    }

    fn set_speakerphone_on(&self, on: bool) {
        self.zustand.lock().lautsprecher = on;
    }

    fn set_microphone_mute(&self, muted: bool) {
        self.zustand.lock().mikrofon_stumm = muted;
    }

    fn is_microphone_muted(&self) -> bool {
        self.zustand.lock().mikrofon_stumm
    }

    fn supports_communication_device_api(&self) -> bool {
        self.moderne_api
    }

    fn has_earpiece(&self) -> bool {
        self.zustand.lock().hoerer
    }
}

// ---------------------------------------------------------------------------
// Konsolen-Ausgabe
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Zustandswechsel<'a> {
    alt: &'a CallAudioState,
    neu: &'a CallAudioState,
}

/// Gespraechs-Lebenszyklus, der jede Zustandsaenderung als JSON-Zeile ausgibt
pub struct KonsolenLebenszyklus {
    routen: RouteMask,
    verlauf: Mutex<Vec<CallAudioState>>,
}

impl KonsolenLebenszyklus {
    pub fn neu(routen: Option<RouteMask>) -> Arc<Self> {
        Arc::new(Self {
            routen: routen.unwrap_or(RouteMask::ALLE),
            verlauf: Mutex::new(Vec::new()),
        })
    }

    /// Alle bisher gemeldeten Zustaende
    pub fn verlauf(&self) -> Vec<CallAudioState> {
        self.verlauf.lock().clone()
    }
}

impl CallLifecycle for KonsolenLebenszyklus {
    fn on_call_audio_state_changed(&self, old: &CallAudioState, new: &CallAudioState) {
        match serde_json::to_string(&Zustandswechsel { alt: old, neu: new }) {
            Ok(zeile) => println!("{zeile}"),
            Err(e) => warn!(fehler = %e, "Zustand nicht serialisierbar"),
        }
        self.verlauf.lock().push(new.clone());
    }

    fn route_capabilities(&self) -> RouteMask {
        self.routen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BluetoothGeraet;

    #[derive(Default)]
    struct Sammler {
        ereignisse: Mutex<Vec<RouteEvent>>,
    }

    impl EventSink for Sammler {
        fn deliver(&self, event: RouteEvent, _session: Option<SessionToken>) -> Result<()> {
            self.ereignisse.lock().push(event);
            Ok(())
        }
    }

    fn hardware(geraete: &[&str]) -> (Arc<SimulatedHardware>, Arc<Sammler>) {
        let einstellungen = HardwareEinstellungen {
            bluetooth_geraete: geraete
                .iter()
                .map(|a| BluetoothGeraet {
                    adresse: a.to_string(),
                    wearable: false,
                })
                .collect(),
            ..Default::default()
        };
        let hw = SimulatedHardware::neu(&einstellungen);
        let sammler = Arc::new(Sammler::default());
        hw.subscribe(sammler.clone());
        (hw, sammler)
    }

    #[test]
    fn bestaetigte_verbindung_meldet_audio() {
        let (hw, sammler) = hardware(&["AA:01"]);
        hw.connect_audio(None).unwrap();
        assert!(hw.is_audio_connected_or_pending());
        assert_eq!(hw.active_audio_device(), Some(DeviceId::from("AA:01")));
        assert_eq!(
            sammler.ereignisse.lock().clone(),
            vec![RouteEvent::BtAudioConnected {
                device: Some(DeviceId::from("AA:01"))
            }]
        );
    }

    #[test]
    fn verbindung_ohne_geraet_schlaegt_fehl() {
        let (hw, sammler) = hardware(&[]);
        assert!(hw.connect_audio(None).is_err());
        assert!(sammler.ereignisse.lock().is_empty());
    }

    #[test]
    fn trennen_des_aktiven_geraets_meldet_verlust() {
        let (hw, sammler) = hardware(&["AA:01", "AA:02"]);
        hw.bluetooth_aktiv("AA:01", None);
        sammler.ereignisse.lock().clear();

        hw.bluetooth_trennen("AA:01", None);
        assert_eq!(hw.connected_devices(), vec![DeviceId::from("AA:02")]);
        assert_eq!(
            sammler.ereignisse.lock().clone(),
            vec![
                RouteEvent::BtActiveDeviceGone {
                    device: Some(DeviceId::from("AA:01"))
                },
                RouteEvent::BtDeviceListChanged,
            ]
        );
    }

    #[test]
    fn headset_geraet_erscheint_in_liste() {
        let (hw, _) = hardware(&[]);
        hw.headset(true, None);
        assert!(hw
            .communication_devices()
            .iter()
            .any(|d| d.typ == AudioDeviceType::WiredHeadset));
    }
}
