//! Gemeinsame Test-Kollaborateure fuer die Integrations-Tests
//!
//! Die Hardware-Sicht wird erst bei der Verarbeitung eines Ereignisses
//! abgefragt. Tests setzen deshalb zuerst den Mock-Zustand und reihen
//! danach das passende Ereignis ein.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use callroute_audio::{AudioDeviceInfo, AudioDeviceType, AudioResult, AudioSubsystem};
use callroute_core::{CallAudioState, DeviceId, Result, RouteMask};
use callroute_routing::{
    BluetoothRouteManager, CallAudioObserver, CallAudioRouter, CallLifecycle,
    Collaborators, RoutingConfig, WiredHeadsetTracker,
};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Zustand {
    bt_available: bool,
    bt_devices: Vec<DeviceId>,
    bt_active: Option<DeviceId>,
    bt_connected_or_pending: bool,
    inband: bool,
    wearables: BTreeSet<DeviceId>,
    wired: bool,
    kein_hoerer: bool,
    mic_muted: bool,
    faehigkeiten: Option<RouteMask>,
}

/// Simulierte Hardware: Bluetooth-Stack, Headset-Buchse und Audio-Subsystem
#[derive(Default)]
pub struct MockHardware {
    zustand: Mutex<Zustand>,
    aufrufe: Mutex<Vec<String>>,
    aenderungen: Mutex<Vec<(CallAudioState, CallAudioState)>>,
    gespraeche: Mutex<Vec<Arc<MockCall>>>,
}

impl MockHardware {
    pub fn neu() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Verbindet Bluetooth-Geraete; `aktiv` hat stehendes Audio
    pub fn bluetooth(&self, geraete: &[&str], aktiv: Option<&str>) {
        let mut z = self.zustand.lock();
        z.bt_available = true;
        z.bt_devices = geraete.iter().map(|g| DeviceId::from(*g)).collect();
        z.bt_active = aktiv.map(DeviceId::from);
        z.bt_connected_or_pending = aktiv.is_some();
    }

    pub fn bluetooth_trennen(&self) {
        let mut z = self.zustand.lock();
        z.bt_devices.clear();
        z.bt_active = None;
        z.bt_connected_or_pending = false;
    }

    pub fn wearable(&self, geraet: &str) {
        self.zustand.lock().wearables.insert(DeviceId::from(geraet));
    }

    pub fn inband(&self, an: bool) {
        self.zustand.lock().inband = an;
    }

    pub fn headset(&self, eingesteckt: bool) {
        self.zustand.lock().wired = eingesteckt;
    }

    pub fn ohne_hoerer(&self) {
        self.zustand.lock().kein_hoerer = true;
    }

    pub fn mikrofon(&self, stumm: bool) {
        self.zustand.lock().mic_muted = stumm;
    }

    pub fn faehigkeiten(&self, maske: RouteMask) {
        self.zustand.lock().faehigkeiten = Some(maske);
    }

    pub fn gespraech(&self, id: &str) -> Arc<MockCall> {
        let call = Arc::new(MockCall {
            id: id.to_string(),
            zustaende: Mutex::new(Vec::new()),
        });
        self.gespraeche.lock().push(call.clone());
        call
    }

    /// Protokoll der Hardware-Kommandos
    pub fn aufrufe(&self) -> Vec<String> {
        self.aufrufe.lock().clone()
    }

    pub fn aufrufe_leeren(&self) {
        self.aufrufe.lock().clear();
    }

    /// Alle Benachrichtigungen an den Lebenszyklus-Manager
    pub fn aenderungen(&self) -> Vec<(CallAudioState, CallAudioState)> {
        self.aenderungen.lock().clone()
    }

    fn protokoll(&self, eintrag: impl Into<String>) {
        self.aufrufe.lock().push(eintrag.into());
    }
}

impl BluetoothRouteManager for MockHardware {
    fn is_available(&self) -> bool {
        self.zustand.lock().bt_available
    }

    fn connected_devices(&self) -> Vec<DeviceId> {
        self.zustand.lock().bt_devices.clone()
    }

    fn active_audio_device(&self) -> Option<DeviceId> {
        self.zustand.lock().bt_active.clone()
    }

    fn connect_audio(&self, device: Option<&DeviceId>) -> Result<()> {
        self.protokoll(format!(
            "bt_verbinden:{}",
            device.map(|d| d.as_str()).unwrap_or("-")
        ));
        Ok(())
    }

    fn disconnect_audio(&self) -> Result<()> {
        self.protokoll("bt_trennen");
        let mut z = self.zustand.lock();
        z.bt_connected_or_pending = false;
        z.bt_active = None;
        Ok(())
    }

    fn is_audio_connected_or_pending(&self) -> bool {
        self.zustand.lock().bt_connected_or_pending
    }

    fn is_inband_ringing_enabled(&self) -> bool {
        self.zustand.lock().inband
    }

    fn is_wearable(&self, device: &DeviceId) -> bool {
        self.zustand.lock().wearables.contains(device)
    }
}

impl WiredHeadsetTracker for MockHardware {
    fn is_plugged_in(&self) -> bool {
        self.zustand.lock().wired
    }
}

impl AudioSubsystem for MockHardware {
    fn communication_devices(&self) -> Vec<AudioDeviceInfo> {
        let z = self.zustand.lock();
        let mut geraete = vec![AudioDeviceInfo::new(
            2,
            AudioDeviceType::BuiltinSpeaker,
            "Lautsprecher",
        )];
        if !z.kein_hoerer {
            geraete.push(AudioDeviceInfo::new(
                1,
                AudioDeviceType::BuiltinEarpiece,
                "Hoerer",
            ));
        }
        if z.wired {
            geraete.push(AudioDeviceInfo::new(
                3,
                AudioDeviceType::WiredHeadset,
                "Headset",
            ));
        }
        for (i, d) in z.bt_devices.iter().enumerate() {
            geraete.push(AudioDeviceInfo::bluetooth(10 + i as u32, d, d.as_str()));
        }
        geraete
    }

    fn set_communication_device(&self, device: &AudioDeviceInfo) -> AudioResult<()> {
        self.protokoll(format!("geraet:{}", device.name));
        Ok(())
    }

    fn clear_communication_device(&self) {
        self.protokoll("geraet_frei");
    }

    fn set_speakerphone_on(&self, on: bool) {
        self.protokoll(format!("lautsprecher:{on}"));
    }

    fn set_microphone_mute(&self, muted: bool) {
        self.protokoll(format!("mute:{muted}"));
        self.zustand.lock().mic_muted = muted;
    }

    fn is_microphone_muted(&self) -> bool {
        self.zustand.lock().mic_muted
    }

    fn has_earpiece(&self) -> bool {
        !self.zustand.lock().kein_hoerer
    }
}

impl CallLifecycle for MockHardware {
    fn on_call_audio_state_changed(&self, old: &CallAudioState, new: &CallAudioState) {
        self.aenderungen.lock().push((old.clone(), new.clone()));
    }

    fn route_capabilities(&self) -> RouteMask {
        self.zustand.lock().faehigkeiten.unwrap_or(RouteMask::ALLE)
    }

    fn calls_to_notify(&self) -> Vec<Arc<dyn CallAudioObserver>> {
        self.gespraeche
            .lock()
            .iter()
            .map(|c| c.clone() as Arc<dyn CallAudioObserver>)
            .collect()
    }
}

/// Einzelnes Gespraech, merkt sich jeden gemeldeten Zustand
pub struct MockCall {
    id: String,
    zustaende: Mutex<Vec<CallAudioState>>,
}

impl MockCall {
    pub fn zustaende(&self) -> Vec<CallAudioState> {
        self.zustaende.lock().clone()
    }
}

impl CallAudioObserver for MockCall {
    fn call_id(&self) -> String {
        self.id.clone()
    }

    fn on_call_audio_state_changed(&self, state: &CallAudioState) {
        self.zustaende.lock().push(state.clone());
    }
}

pub fn kollaborateure(hw: &Arc<MockHardware>) -> Collaborators {
    Collaborators {
        bluetooth: hw.clone(),
        wired_headset: hw.clone(),
        audio: hw.clone(),
        calls: hw.clone(),
    }
}

pub fn router(
    hw: &Arc<MockHardware>,
    config: RoutingConfig,
    initial: Option<CallAudioState>,
) -> CallAudioRouter {
    CallAudioRouter::initialize(config, kollaborateure(hw), initial)
        .expect("Router sollte starten")
}

pub fn d(name: &str) -> DeviceId {
    DeviceId::from(name)
}
