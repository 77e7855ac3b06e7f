//! Routing-Zustandsautomat
//!
//! Der Automat ist eine reine Funktion `(Modell, Hardware-Sicht, Ereignis)
//! -> (neues Modell, Effekte)`. Effekte sind Daten und werden vom
//! [`EffectRunner`](crate::effects::EffectRunner) ausgefuehrt; dadurch ist die
//! gesamte Uebergangstabelle ohne Hardware testbar.
//!
//! Zustaende:
//! - `Quiescent(r)`: kein Gespraech haelt den Fokus, Route wird nur verfolgt
//! - `Active(r)`: Route steuert die Hardware
//! - `RingingBluetooth`: Klingeln mit Bluetooth als Ziel, Verbindung verzoegert
//! - `Streaming`: erzwungene Streaming-Route, normales Routing ausgesetzt

use std::time::Duration;

use callroute_core::{
    CallAudioState, DeviceId, FocusMode, Result, RouteEvent, RouteKind, RouteMask, RoutingError,
};
use tracing::{debug, trace};

use crate::bluetooth::BluetoothDeviceSelector;
use crate::config::RoutingConfig;
use crate::deferred::TimerKind;
use crate::view::HardwareView;

// ---------------------------------------------------------------------------
// Zustaende
// ---------------------------------------------------------------------------

/// Physische Route ohne Streaming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseRoute {
    Earpiece,
    Speaker,
    WiredHeadset,
    Bluetooth,
}

impl BaseRoute {
    pub fn kind(self) -> RouteKind {
        match self {
            Self::Earpiece => RouteKind::Earpiece,
            Self::Speaker => RouteKind::Speaker,
            Self::WiredHeadset => RouteKind::WiredHeadset,
            Self::Bluetooth => RouteKind::Bluetooth,
        }
    }

    pub fn from_kind(kind: RouteKind) -> Option<Self> {
        match kind {
            RouteKind::Earpiece => Some(Self::Earpiece),
            RouteKind::Speaker => Some(Self::Speaker),
            RouteKind::WiredHeadset => Some(Self::WiredHeadset),
            RouteKind::Bluetooth => Some(Self::Bluetooth),
            RouteKind::Streaming => None,
        }
    }
}

/// Zustand des Automaten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteTag {
    Quiescent(BaseRoute),
    Active(BaseRoute),
    RingingBluetooth,
    Streaming,
}

impl RouteTag {
    pub fn route(self) -> RouteKind {
        match self {
            Self::Quiescent(r) | Self::Active(r) => r.kind(),
            Self::RingingBluetooth => RouteKind::Bluetooth,
            Self::Streaming => RouteKind::Streaming,
        }
    }

    pub fn base(self) -> Option<BaseRoute> {
        match self {
            Self::Quiescent(r) | Self::Active(r) => Some(r),
            Self::RingingBluetooth => Some(BaseRoute::Bluetooth),
            Self::Streaming => None,
        }
    }

    /// Aktive Zustaende und Streaming
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active(_) | Self::Streaming)
    }

    pub fn is_bluetooth(self) -> bool {
        self.route() == RouteKind::Bluetooth
    }

    /// Stabiler Name fuer Logs und Metrik-Labels
    pub fn name(self) -> &'static str {
        use BaseRoute::*;
        match self {
            Self::Quiescent(Earpiece) => "quiescent_earpiece",
            Self::Quiescent(Speaker) => "quiescent_speaker",
            Self::Quiescent(WiredHeadset) => "quiescent_wired_headset",
            Self::Quiescent(Bluetooth) => "quiescent_bluetooth",
            Self::Active(Earpiece) => "active_earpiece",
            Self::Active(Speaker) => "active_speaker",
            Self::Active(WiredHeadset) => "active_wired_headset",
            Self::Active(Bluetooth) => "active_bluetooth",
            Self::RingingBluetooth => "ringing_bluetooth",
            Self::Streaming => "streaming",
        }
    }
}

// ---------------------------------------------------------------------------
// Effekte
// ---------------------------------------------------------------------------

/// Seiteneffekt eines Uebergangs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// `None` = Wahl des Bluetooth-Stacks
    ConnectBluetoothAudio(Option<DeviceId>),
    DisconnectBluetoothAudio,
    SelectCommunicationDevice {
        route: RouteKind,
        device: Option<DeviceId>,
    },
    ClearCommunicationDevice,
    SetMicrophoneMute(bool),
    ScheduleTimeout {
        timer: TimerKind,
        after: Duration,
    },
    CancelTimeout(TimerKind),
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectBluetoothAudio(_) => "connect_bluetooth_audio",
            Self::DisconnectBluetoothAudio => "disconnect_bluetooth_audio",
            Self::SelectCommunicationDevice { .. } => "select_communication_device",
            Self::ClearCommunicationDevice => "clear_communication_device",
            Self::SetMicrophoneMute(_) => "set_microphone_mute",
            Self::ScheduleTimeout { .. } => "schedule_timeout",
            Self::CancelTimeout(_) => "cancel_timeout",
        }
    }

    /// Ob der Effekt die Hardware anspricht (statt nur den Worker)
    pub fn is_hardware(&self) -> bool {
        !matches!(self, Self::ScheduleTimeout { .. } | Self::CancelTimeout(_))
    }
}

/// Ergebnis eines Uebergangs
#[derive(Debug, Clone)]
pub struct Transition {
    pub model: RouteModel,
    pub effects: Vec<Effect>,
}

// ---------------------------------------------------------------------------
// Modell
// ---------------------------------------------------------------------------

/// Vor dem Streaming gesicherter Zustand
#[derive(Debug, Clone, PartialEq, Eq)]
struct SavedRouting {
    tag: RouteTag,
    state: CallAudioState,
    available_routes: RouteMask,
    bt_devices: Vec<DeviceId>,
}

/// Vollstaendiger interner Zustand des Automaten
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteModel {
    tag: RouteTag,
    state: CallAudioState,
    focus: FocusMode,
    /// Hardware-Routen ohne Gespraechs-Einschraenkung
    available_routes: RouteMask,
    /// Verbundene Bluetooth-Geraete in Stack-Reihenfolge
    bt_devices: Vec<DeviceId>,
    explicit_route: Option<RouteKind>,
    explicit_bt_device: Option<DeviceId>,
    user_left_bluetooth: bool,
    was_on_speaker: bool,
    bt_audio_pending: bool,
    /// Erwartetes Echo des eigenen Lautsprecher-Kommandos
    expected_speaker: Option<bool>,
    streaming_saved: Option<Box<SavedRouting>>,
}

impl RouteModel {
    /// Anfangszustand aus der Hardware-Erkennung (immer Quiescent)
    pub fn detect(view: &HardwareView, config: &RoutingConfig) -> Self {
        let bt_devices = if view.bt_available {
            view.bt_devices.clone()
        } else {
            Vec::new()
        };

        let mut available = RouteMask::LEER.with(RouteKind::Speaker);
        if view.wired_headset_plugged {
            available = available.with(RouteKind::WiredHeadset);
        } else if view.has_earpiece {
            available = available.with(RouteKind::Earpiece);
        }
        if !bt_devices.is_empty() {
            available = available.with(RouteKind::Bluetooth);
        }

        let mut placeholder = Self::placeholder(available, bt_devices);
        placeholder.state = placeholder
            .state
            .with_active_bluetooth_device(view.connected_active_device().cloned());

        let mut step = Step::new(placeholder, view, config);
        let (base, device) = step.baseline(true, None);
        step.model.tag = RouteTag::Quiescent(base);
        step.model.state = step
            .model
            .state
            .with_route(base.kind())
            .with_active_bluetooth_device(device);
        step.finish();
        step.model
    }

    /// Anfangszustand aus einer vorgegebenen Momentaufnahme
    pub fn from_state(initial: CallAudioState) -> Result<Self> {
        let base = BaseRoute::from_kind(initial.route()).ok_or_else(|| {
            RoutingError::UngueltigerAnfangszustand("Streaming ist kein Anfangszustand".into())
        })?;
        if let Some(verletzung) = initial.invariant_violation() {
            return Err(RoutingError::UngueltigerAnfangszustand(verletzung.to_string()));
        }

        let bt_devices = initial.available_bluetooth_devices().iter().cloned().collect();
        let mut model = Self::placeholder(initial.supported_routes(), bt_devices);
        model.tag = RouteTag::Quiescent(base);
        model.state = initial;
        Ok(model)
    }

    fn placeholder(available_routes: RouteMask, bt_devices: Vec<DeviceId>) -> Self {
        Self {
            tag: RouteTag::Quiescent(BaseRoute::Speaker),
            state: CallAudioState::simple(false, RouteKind::Speaker, available_routes),
            focus: FocusMode::None,
            available_routes,
            bt_devices,
            explicit_route: None,
            explicit_bt_device: None,
            user_left_bluetooth: false,
            was_on_speaker: false,
            bt_audio_pending: false,
            expected_speaker: None,
            streaming_saved: None,
        }
    }

    pub fn tag(&self) -> RouteTag {
        self.tag
    }

    /// Veroeffentlichter Zustand
    pub fn state(&self) -> &CallAudioState {
        &self.state
    }

    pub fn focus(&self) -> FocusMode {
        self.focus
    }

    pub fn is_active(&self) -> bool {
        self.tag.is_active()
    }

    pub fn explicit_route(&self) -> Option<RouteKind> {
        self.explicit_route
    }

    pub fn user_left_bluetooth(&self) -> bool {
        self.user_left_bluetooth
    }

    pub fn bt_audio_pending(&self) -> bool {
        self.bt_audio_pending
    }
}

/// Verarbeitet ein Ereignis gegen die Hardware-Sicht
pub fn transition(
    model: &RouteModel,
    view: &HardwareView,
    event: &RouteEvent,
    config: &RoutingConfig,
) -> Transition {
    let mut step = Step::new(model.clone(), view, config);
    step.handle(event);
    step.finish();
    Transition {
        model: step.model,
        effects: step.effects,
    }
}

// ---------------------------------------------------------------------------
// Ein Verarbeitungsschritt
// ---------------------------------------------------------------------------

struct Step<'a> {
    model: RouteModel,
    view: &'a HardwareView,
    config: &'a RoutingConfig,
    effects: Vec<Effect>,
    /// Vom Ereignis gemeldetes Geraet mit stehender Audio-Verbindung
    bt_link: Option<DeviceId>,
    bt_link_up: bool,
    /// Lautsprecher wurde ausserhalb des Automaten geschaltet
    speaker_from_hardware: bool,
}

impl<'a> Step<'a> {
    fn new(model: RouteModel, view: &'a HardwareView, config: &'a RoutingConfig) -> Self {
        Self {
            model,
            view,
            config,
            effects: Vec::new(),
            bt_link: None,
            bt_link_up: false,
            speaker_from_hardware: false,
        }
    }

    fn emit(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    // --- Erreichbarkeit ---

    fn supported(&self) -> RouteMask {
        let mask = self
            .model
            .available_routes
            .intersect(self.view.call_capabilities);
        if self.model.tag.route() == RouteKind::Speaker {
            mask.with(RouteKind::Speaker)
        } else {
            mask
        }
    }

    fn reachable(&self, base: BaseRoute) -> bool {
        match base {
            BaseRoute::Speaker => true,
            other => self
                .model
                .available_routes
                .intersect(self.view.call_capabilities)
                .contains(other.kind()),
        }
    }

    fn selector(&self) -> BluetoothDeviceSelector<'_> {
        let previous = self.model.state.active_bluetooth_device();
        BluetoothDeviceSelector {
            available: &self.model.bt_devices,
            previously_active: previous,
            previous_was_explicit: previous.is_some()
                && self.model.explicit_bt_device.as_ref() == previous,
            requested: self.model.explicit_bt_device.as_ref(),
            exclude_wearables: self.config.exclude_wearables,
            wearables: &self.view.wearables,
            excluded: None,
        }
    }

    /// Basis-Route nach Prioritaet: Bluetooth > Headset > Hoerer > Lautsprecher
    fn baseline(
        &self,
        include_bluetooth: bool,
        excluded: Option<&DeviceId>,
    ) -> (BaseRoute, Option<DeviceId>) {
        if include_bluetooth && self.reachable(BaseRoute::Bluetooth) {
            let sel = BluetoothDeviceSelector {
                excluded,
                ..self.selector()
            };
            if let Some(device) = sel.resolve().into_device() {
                return (BaseRoute::Bluetooth, Some(device));
            }
        }
        for base in [BaseRoute::WiredHeadset, BaseRoute::Earpiece] {
            if self.reachable(base) {
                return (base, None);
            }
        }
        (BaseRoute::Speaker, None)
    }

    fn tag_for(&self, base: BaseRoute) -> RouteTag {
        match self.model.focus {
            FocusMode::None => RouteTag::Quiescent(base),
            FocusMode::Active => RouteTag::Active(base),
            FocusMode::Ringing if base == BaseRoute::Bluetooth => RouteTag::RingingBluetooth,
            FocusMode::Ringing => RouteTag::Active(base),
        }
    }

    fn go_baseline(&mut self, include_bluetooth: bool, excluded: Option<&DeviceId>) {
        let (base, device) = self.baseline(include_bluetooth, excluded);
        let target = self.tag_for(base);
        self.go(target, device);
    }

    fn sync_bluetooth(&mut self) {
        let devices = if self.view.bt_available {
            self.view.bt_devices.clone()
        } else {
            Vec::new()
        };
        self.model.available_routes = if devices.is_empty() {
            self.model.available_routes.without(RouteKind::Bluetooth)
        } else {
            self.model.available_routes.with(RouteKind::Bluetooth)
        };
        self.model.bt_devices = devices;
    }

    fn sync_wired(&mut self) {
        let mut mask = self
            .model
            .available_routes
            .without(RouteKind::WiredHeadset)
            .without(RouteKind::Earpiece);
        if self.view.wired_headset_plugged {
            mask = mask.with(RouteKind::WiredHeadset);
        } else if self.view.has_earpiece {
            mask = mask.with(RouteKind::Earpiece);
        }
        self.model.available_routes = mask;
    }

    fn set_active_device(&mut self, device: Option<DeviceId>) {
        self.model.state = self.model.state.with_active_bluetooth_device(device);
    }

    // --- Uebergaenge ---

    fn go(&mut self, target: RouteTag, device: Option<DeviceId>) {
        let from = self.model.tag;
        if from == target {
            self.retarget_bluetooth(device);
            return;
        }

        debug!(von = from.name(), nach = target.name(), "Routenwechsel");
        self.exit(from, target);
        self.model.tag = target;
        self.model.state = self.model.state.with_route(target.route());
        self.enter(from, target, device);
    }

    /// Geraetewechsel innerhalb eines Bluetooth-Zustands
    fn retarget_bluetooth(&mut self, device: Option<DeviceId>) {
        let Some(device) = device else { return };
        let tag = self.model.tag;
        if !tag.is_bluetooth() || self.model.state.active_bluetooth_device() == Some(&device) {
            return;
        }
        if tag == RouteTag::Active(BaseRoute::Bluetooth) {
            debug!(device = %device, "Bluetooth-Geraet wechselt");
            self.engage_bluetooth(Some(device), tag);
        } else {
            self.set_active_device(Some(device));
        }
    }

    fn exit(&mut self, from: RouteTag, to: RouteTag) {
        match from {
            RouteTag::Active(base) => {
                if base == BaseRoute::Bluetooth {
                    self.release_bluetooth();
                }
                self.emit(Effect::ClearCommunicationDevice);
                if base == BaseRoute::Speaker && !self.speaker_from_hardware {
                    self.model.expected_speaker = Some(false);
                }
            }
            RouteTag::RingingBluetooth => {
                if to != RouteTag::Active(BaseRoute::Bluetooth) {
                    self.release_bluetooth();
                }
            }
            RouteTag::Quiescent(_) | RouteTag::Streaming => {}
        }
    }

    fn enter(&mut self, from: RouteTag, to: RouteTag, device: Option<DeviceId>) {
        match to {
            RouteTag::Active(base) => {
                let muted = self.model.state.muted();
                if !matches!(from, RouteTag::Active(_)) && self.view.microphone_muted != muted {
                    self.emit(Effect::SetMicrophoneMute(muted));
                }
                match base {
                    BaseRoute::Bluetooth => self.engage_bluetooth(device, from),
                    BaseRoute::Speaker => {
                        self.set_active_device(None);
                        if self.speaker_from_hardware {
                            self.model.expected_speaker = None;
                        } else {
                            self.emit(Effect::SelectCommunicationDevice {
                                route: RouteKind::Speaker,
                                device: None,
                            });
                            self.model.expected_speaker = Some(true);
                        }
                    }
                    other => {
                        self.set_active_device(None);
                        self.emit(Effect::SelectCommunicationDevice {
                            route: other.kind(),
                            device: None,
                        });
                    }
                }
            }
            RouteTag::Quiescent(base) => {
                self.model.expected_speaker = None;
                if base != BaseRoute::Bluetooth {
                    self.set_active_device(None);
                    return;
                }
                self.set_active_device(device);
                let left_bluetooth = matches!(
                    from,
                    RouteTag::Active(BaseRoute::Bluetooth) | RouteTag::RingingBluetooth
                );
                if self.config.reset_mute_on_quiescent_bluetooth
                    && left_bluetooth
                    && self.model.state.muted()
                {
                    debug!("Mute beim Verlassen von Bluetooth zurueckgesetzt");
                    self.model.state = self.model.state.with_muted(false);
                    if matches!(from, RouteTag::Active(_)) {
                        self.emit(Effect::SetMicrophoneMute(false));
                    }
                }
            }
            RouteTag::RingingBluetooth => {
                self.model.expected_speaker = None;
                self.set_active_device(device.clone());
                let linked = self.view.connected_active_device();
                if self.view.inband_ringing && (linked.is_none() || linked != device.as_ref()) {
                    self.emit(Effect::ConnectBluetoothAudio(device));
                    self.model.bt_audio_pending = true;
                }
            }
            RouteTag::Streaming => {}
        }
    }

    /// Bluetooth-Audio fuer Active-Bluetooth herstellen
    fn engage_bluetooth(&mut self, device: Option<DeviceId>, from: RouteTag) {
        let linked = self
            .bt_link
            .clone()
            .or_else(|| self.view.connected_active_device().cloned());
        let up = match (&linked, &device) {
            (Some(l), Some(want)) => l == want,
            (Some(_), None) => true,
            (None, _) => self.bt_link_up,
        };

        if up {
            self.cancel_liveness();
            let device = linked.or(device);
            self.emit(Effect::SelectCommunicationDevice {
                route: RouteKind::Bluetooth,
                device: device.clone(),
            });
            self.set_active_device(device);
            return;
        }

        let already_requested = from == RouteTag::RingingBluetooth
            && (self.model.bt_audio_pending || self.view.bt_audio_connected_or_pending);
        if !already_requested {
            self.emit(Effect::ConnectBluetoothAudio(device.clone()));
        }
        self.model.bt_audio_pending = true;
        self.emit(Effect::ScheduleTimeout {
            timer: TimerKind::BluetoothAudioLiveness,
            after: self.config.bt_audio_connect_timeout(),
        });
        self.set_active_device(device);
    }

    fn cancel_liveness(&mut self) {
        if self.model.bt_audio_pending {
            self.model.bt_audio_pending = false;
            self.emit(Effect::CancelTimeout(TimerKind::BluetoothAudioLiveness));
        }
    }

    fn release_bluetooth(&mut self) {
        if self.model.bt_audio_pending || self.view.bt_audio_connected_or_pending {
            self.emit(Effect::DisconnectBluetoothAudio);
        }
        self.cancel_liveness();
    }

    // --- Ereignisse ---

    fn handle(&mut self, event: &RouteEvent) {
        if self.model.tag == RouteTag::Streaming {
            match event {
                RouteEvent::SwitchFocus { mode } => self.focus_while_streaming(*mode),
                RouteEvent::StreamingForceDisabled => self.stop_streaming(),
                other => trace!(event = other.name(), "Ereignis waehrend Streaming ignoriert"),
            }
            return;
        }

        match event {
            RouteEvent::SwitchFocus { mode } => self.switch_focus(*mode),
            RouteEvent::SwitchToRoute { route, device } => self.user_route(*route, device.clone()),
            RouteEvent::UserSwitchBaselineRoute { include_bluetooth } => {
                self.user_baseline(*include_bluetooth)
            }
            RouteEvent::UserSwitchBluetooth { device } => {
                self.user_route(RouteKind::Bluetooth, device.clone())
            }
            RouteEvent::ToggleMute => self.set_mute(!self.model.state.muted()),
            RouteEvent::SetMute { on } => self.set_mute(*on),
            RouteEvent::MuteExternallyChanged => {
                if matches!(self.model.tag, RouteTag::Active(_)) {
                    self.model.state = self.model.state.with_muted(self.view.microphone_muted);
                }
            }
            RouteEvent::SpeakerOn => self.speaker_changed(true),
            RouteEvent::SpeakerOff => self.speaker_changed(false),
            RouteEvent::WiredHeadsetConnected => self.wired_connected(),
            RouteEvent::WiredHeadsetDisconnected => self.wired_disconnected(),
            RouteEvent::ConnectDock => {
                if self.model.tag.base() == Some(BaseRoute::Earpiece) {
                    let target = self.tag_for(BaseRoute::Speaker);
                    self.go(target, None);
                }
            }
            RouteEvent::DisconnectDock => {
                if self.model.tag.base() == Some(BaseRoute::Speaker)
                    && self.model.explicit_route != Some(RouteKind::Speaker)
                {
                    self.go_baseline(!self.model.user_left_bluetooth, None);
                }
            }
            RouteEvent::BtAudioConnected { device } => self.bt_audio_connected(device.as_ref()),
            RouteEvent::BtAudioDisconnected => self.bt_audio_disconnected(),
            RouteEvent::BtActiveDevicePresent { device } => self.bt_device_present(device.as_ref()),
            RouteEvent::BtActiveDeviceGone { device } => self.bt_device_gone(device.as_ref()),
            RouteEvent::BtDeviceListChanged => self.bt_device_list_changed(),
            RouteEvent::StreamingForceEnabled => self.start_streaming(),
            RouteEvent::StreamingForceDisabled => trace!("Streaming war nicht aktiv"),
            RouteEvent::BtAudioTimeout => self.bt_audio_timeout(),
        }
    }

    fn end_session(&mut self) {
        self.model.explicit_route = None;
        self.model.explicit_bt_device = None;
        self.model.user_left_bluetooth = false;
    }

    fn switch_focus(&mut self, mode: FocusMode) {
        let tag = self.model.tag;
        match mode {
            FocusMode::None => {
                self.model.focus = FocusMode::None;
                self.end_session();
                if let Some(base) = tag.base() {
                    let device = self.model.state.active_bluetooth_device().cloned();
                    self.go(RouteTag::Quiescent(base), device);
                }
            }
            FocusMode::Active => {
                self.model.focus = FocusMode::Active;
                match tag {
                    RouteTag::Quiescent(base) => self.resume(base),
                    RouteTag::RingingBluetooth => {
                        let device = self.model.state.active_bluetooth_device().cloned();
                        self.go(RouteTag::Active(BaseRoute::Bluetooth), device);
                    }
                    RouteTag::Active(_) | RouteTag::Streaming => {}
                }
            }
            FocusMode::Ringing => {
                if let RouteTag::Quiescent(base) = tag {
                    self.model.focus = FocusMode::Ringing;
                    self.resume(base);
                } else {
                    trace!(zustand = tag.name(), "Klingeln ohne Wirkung");
                }
            }
        }
    }

    /// Verlaesst Quiescent: bisherige Route, falls erreichbar, sonst Basis-Route
    fn resume(&mut self, base: BaseRoute) {
        let keep = if !self.reachable(base) {
            None
        } else if base == BaseRoute::Bluetooth {
            self.selector().resolve().into_device().map(Some)
        } else {
            Some(None)
        };

        match keep {
            Some(device) => {
                let target = self.tag_for(base);
                self.go(target, device);
            }
            None => self.go_baseline(!self.model.user_left_bluetooth, None),
        }
    }

    fn focus_while_streaming(&mut self, mode: FocusMode) {
        if mode == FocusMode::Ringing && self.model.focus == FocusMode::Active {
            return;
        }
        if mode == FocusMode::None {
            self.end_session();
        }
        self.model.focus = mode;
    }

    fn user_route(&mut self, route: RouteKind, device: Option<DeviceId>) {
        let Some(base) = BaseRoute::from_kind(route) else {
            debug!("Streaming ist nicht direkt waehlbar");
            return;
        };
        if base == BaseRoute::Bluetooth {
            self.sync_bluetooth();
        }
        if !self.reachable(base) {
            debug!(route = %route, "Route nicht erreichbar, Anfrage ignoriert");
            return;
        }

        let target_device = if base == BaseRoute::Bluetooth {
            let sel = BluetoothDeviceSelector {
                requested: device.as_ref().or(self.model.explicit_bt_device.as_ref()),
                ..self.selector()
            };
            let Some(target) = sel.connect_target() else {
                return;
            };
            if let Some(d) = device.filter(|d| self.model.bt_devices.contains(d)) {
                self.model.explicit_bt_device = Some(d);
            }
            self.model.user_left_bluetooth = false;
            target
        } else {
            if self.model.tag.is_bluetooth() {
                self.model.user_left_bluetooth = true;
            }
            None
        };

        self.model.explicit_route = Some(route);
        let target = self.tag_for(base);
        self.go(target, target_device);
    }

    fn user_baseline(&mut self, include_bluetooth: bool) {
        let (base, device) = self.baseline(include_bluetooth, None);
        if base == BaseRoute::Bluetooth {
            self.model.user_left_bluetooth = false;
        } else if self.model.tag.is_bluetooth() && !include_bluetooth {
            self.model.user_left_bluetooth = true;
        }
        self.model.explicit_route = Some(base.kind());
        let target = self.tag_for(base);
        self.go(target, device);
    }

    fn set_mute(&mut self, on: bool) {
        if self.model.state.muted() == on {
            return;
        }
        self.model.state = self.model.state.with_muted(on);
        if matches!(self.model.tag, RouteTag::Active(_)) {
            self.emit(Effect::SetMicrophoneMute(on));
        }
    }

    fn speaker_changed(&mut self, on: bool) {
        if !matches!(self.model.tag, RouteTag::Active(_)) {
            return;
        }
        if self.model.expected_speaker == Some(on) {
            trace!(on, "Echo des eigenen Lautsprecher-Kommandos");
            self.model.expected_speaker = None;
            return;
        }

        self.model.expected_speaker = None;
        self.speaker_from_hardware = true;
        let on_speaker = self.model.tag == RouteTag::Active(BaseRoute::Speaker);
        if on && !on_speaker {
            debug!("Lautsprecher extern eingeschaltet");
            self.go(RouteTag::Active(BaseRoute::Speaker), None);
        } else if !on && on_speaker {
            debug!("Lautsprecher extern ausgeschaltet");
            self.go_baseline(!self.model.user_left_bluetooth, None);
        }
    }

    fn wired_connected(&mut self) {
        if !self.view.wired_headset_plugged {
            debug!("Headset-Meldung veraltet, ignoriert");
            return;
        }
        self.sync_wired();
        if let Some(base @ (BaseRoute::Earpiece | BaseRoute::Speaker)) = self.model.tag.base() {
            self.model.was_on_speaker = base == BaseRoute::Speaker;
            let target = self.tag_for(BaseRoute::WiredHeadset);
            self.go(target, None);
        }
    }

    fn wired_disconnected(&mut self) {
        if self.view.wired_headset_plugged {
            debug!("Headset-Meldung veraltet, ignoriert");
            return;
        }
        self.sync_wired();
        if self.model.explicit_route == Some(RouteKind::WiredHeadset) {
            self.model.explicit_route = None;
        }
        if self.model.tag.base() == Some(BaseRoute::WiredHeadset) {
            if self.model.was_on_speaker {
                let target = self.tag_for(BaseRoute::Speaker);
                self.go(target, None);
            } else {
                self.go_baseline(!self.model.user_left_bluetooth, None);
            }
        }
        self.model.was_on_speaker = false;
    }

    fn bt_audio_connected(&mut self, hint: Option<&DeviceId>) {
        let device = hint.cloned().or_else(|| self.view.bt_active_device.clone());
        if self.config.update_route_mask_on_bt_connect {
            if let Some(d) = &device {
                if !self.model.bt_devices.contains(d) {
                    self.model.bt_devices.push(d.clone());
                }
            }
            if !self.model.bt_devices.is_empty() {
                self.model.available_routes =
                    self.model.available_routes.with(RouteKind::Bluetooth);
            }
        }
        self.bt_link = device.filter(|d| self.model.bt_devices.contains(d));
        self.bt_link_up = true;

        match self.model.tag {
            RouteTag::Active(BaseRoute::Bluetooth) => {
                self.cancel_liveness();
                let device = self
                    .bt_link
                    .clone()
                    .or_else(|| self.model.state.active_bluetooth_device().cloned());
                self.emit(Effect::SelectCommunicationDevice {
                    route: RouteKind::Bluetooth,
                    device: device.clone(),
                });
                self.set_active_device(device);
            }
            RouteTag::Active(_) => {
                if self.reachable(BaseRoute::Bluetooth) {
                    debug!("Zubehoer hat Audio uebernommen");
                    let device = self.bt_link.clone();
                    self.go(RouteTag::Active(BaseRoute::Bluetooth), device);
                }
            }
            RouteTag::RingingBluetooth => {
                self.model.bt_audio_pending = false;
                if let Some(d) = self.bt_link.clone() {
                    self.set_active_device(Some(d));
                }
            }
            RouteTag::Quiescent(_) | RouteTag::Streaming => {}
        }
    }

    fn bt_audio_disconnected(&mut self) {
        match self.model.tag {
            RouteTag::Active(BaseRoute::Bluetooth) => {
                if self.view.bt_audio_connected_or_pending {
                    debug!("Bluetooth-Audio weiterhin verbunden oder ausstehend");
                    return;
                }
                self.cancel_liveness();
                self.go_baseline(false, None);
            }
            RouteTag::RingingBluetooth => {
                if !self.view.bt_audio_connected_or_pending {
                    self.model.bt_audio_pending = false;
                }
            }
            _ => {}
        }
    }

    fn bt_audio_timeout(&mut self) {
        if self.model.tag != RouteTag::Active(BaseRoute::Bluetooth) || !self.model.bt_audio_pending
        {
            trace!("veralteter Bluetooth-Timeout");
            return;
        }
        if self.view.bt_audio_connected_or_pending {
            if let Some(d) = self.view.connected_active_device().cloned() {
                self.model.bt_audio_pending = false;
                self.emit(Effect::SelectCommunicationDevice {
                    route: RouteKind::Bluetooth,
                    device: Some(d.clone()),
                });
                self.set_active_device(Some(d));
            }
            return;
        }

        debug!("Bluetooth-Audio nicht zustande gekommen, Basis-Route");
        self.model.bt_audio_pending = false;
        self.go_baseline(false, None);
    }

    fn bt_device_present(&mut self, hint: Option<&DeviceId>) {
        self.sync_bluetooth();
        let active = self
            .view
            .connected_active_device()
            .cloned()
            .or_else(|| hint.filter(|d| self.model.bt_devices.contains(d)).cloned());

        let tag = self.model.tag;
        if tag.is_bluetooth() {
            self.go(tag, active);
            return;
        }

        let explicit_elsewhere = self
            .model
            .explicit_route
            .is_some_and(|r| r != RouteKind::Bluetooth);
        if self.model.user_left_bluetooth || explicit_elsewhere {
            debug!("Bluetooth-Geraet aktiv, Benutzerwahl bleibt bestehen");
            return;
        }
        if !self.reachable(BaseRoute::Bluetooth) {
            return;
        }

        let stack_choice = active.filter(|d| {
            !(self.config.exclude_wearables && self.view.wearables.contains(d))
        });
        let sel = BluetoothDeviceSelector {
            requested: stack_choice.as_ref().or(self.model.explicit_bt_device.as_ref()),
            ..self.selector()
        };
        if let Some(device) = sel.resolve().into_device() {
            let target = self.tag_for(BaseRoute::Bluetooth);
            self.go(target, Some(device));
        }
    }

    fn bt_device_gone(&mut self, hint: Option<&DeviceId>) {
        self.sync_bluetooth();
        let gone = hint
            .cloned()
            .or_else(|| self.model.state.active_bluetooth_device().cloned());
        let Some(gone) = gone else { return };

        if self.view.connected_active_device() == Some(&gone) {
            debug!(device = %gone, "Geraet bereits wieder aktiv, keine Aenderung");
            return;
        }
        if !self.model.tag.is_bluetooth() {
            return;
        }
        let ours = self
            .model
            .state
            .active_bluetooth_device()
            .map_or(true, |d| *d == gone);
        if ours {
            self.go_baseline(!self.model.user_left_bluetooth, Some(&gone));
        }
    }

    fn bt_device_list_changed(&mut self) {
        self.sync_bluetooth();
        if !self.model.tag.is_bluetooth() {
            return;
        }
        if !self.reachable(BaseRoute::Bluetooth) {
            self.go_baseline(!self.model.user_left_bluetooth, None);
            return;
        }
        // Ohne explizite Anfrage zaehlen gefilterte Wearables nicht
        match self.selector().resolve().into_device() {
            Some(device) => {
                let tag = self.model.tag;
                self.go(tag, Some(device));
            }
            None => {
                debug!("Kein waehlbares Bluetooth-Geraet mehr, Basis-Route");
                self.go_baseline(false, None);
            }
        }
    }

    fn start_streaming(&mut self) {
        let from = self.model.tag;
        self.model.streaming_saved = Some(Box::new(SavedRouting {
            tag: from,
            state: self.model.state.clone(),
            available_routes: self.model.available_routes,
            bt_devices: self.model.bt_devices.clone(),
        }));

        debug!(von = from.name(), "Streaming erzwungen");
        self.exit(from, RouteTag::Streaming);
        self.model.tag = RouteTag::Streaming;
        self.model.expected_speaker = None;
        self.model.state = CallAudioState::new(
            self.model.state.muted(),
            RouteKind::Streaming,
            RouteMask::of(&[RouteKind::Streaming]),
            None,
            std::iter::empty(),
        );
    }

    fn stop_streaming(&mut self) {
        let Some(saved) = self.model.streaming_saved.take() else {
            return;
        };
        let SavedRouting {
            tag,
            state,
            available_routes,
            bt_devices,
        } = *saved;
        let Some(base) = tag.base() else { return };

        self.model.state = state.clone();
        self.model.available_routes = available_routes;
        self.model.bt_devices = bt_devices;

        if self.hardware_diverged(base, &state) {
            debug!(route = %base.kind(), "Hardware hat sich waehrend Streaming geaendert");
            self.sync_bluetooth();
            self.sync_wired();
            self.go_baseline(!self.model.user_left_bluetooth, None);
            return;
        }

        debug!(nach = tag.name(), "Streaming beendet, Zustand wiederhergestellt");
        let target = self.tag_for(base);
        self.go(target, state.active_bluetooth_device().cloned());
        self.model.state = state;
    }

    fn hardware_diverged(&self, base: BaseRoute, saved: &CallAudioState) -> bool {
        match base {
            BaseRoute::Bluetooth => match saved.active_bluetooth_device() {
                Some(d) => !self.view.bt_available || !self.view.bt_devices.contains(d),
                None => !self.view.bluetooth_usable(),
            },
            BaseRoute::WiredHeadset => !self.view.wired_headset_plugged,
            BaseRoute::Earpiece => self.view.wired_headset_plugged || !self.view.has_earpiece,
            BaseRoute::Speaker => false,
        }
    }

    /// Stellt die Invarianten vor der Veroeffentlichung her
    fn finish(&mut self) {
        if self.model.tag == RouteTag::Streaming {
            return;
        }
        if let Some(base) = self.model.tag.base() {
            if !self.reachable(base) {
                debug!(route = %base.kind(), "Route nicht mehr erreichbar, Basis-Route");
                self.go_baseline(!self.model.user_left_bluetooth, None);
            }
        }

        let active = self
            .model
            .state
            .active_bluetooth_device()
            .filter(|d| self.model.bt_devices.contains(d))
            .cloned();
        self.model.state = CallAudioState::new(
            self.model.state.muted(),
            self.model.tag.route(),
            self.supported(),
            active,
            self.model.bt_devices.iter().cloned(),
        );
        debug_assert!(
            self.model.state.is_consistent(),
            "inkonsistenter Zustand: {}",
            self.model.state
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
