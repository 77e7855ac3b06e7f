//! Routing-Ereignisse und typisierte Ereignisquellen
//!
//! Alle Eingaben des Routing-Zustandsautomaten laufen als [`RouteEvent`]
//! ueber eine einzige Warteschlange. Externe Signalquellen (Bluetooth,
//! kabelgebundenes Headset, System-Mute) abonnieren einmalig einen
//! [`EventSink`] und liefern ihre Ereignisse darueber ein.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::types::{DeviceId, FocusMode, RouteKind, SessionToken};

/// Alle Ereignisse, die der Routing-Automat verarbeitet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RouteEvent {
    // --- Gespraechs-Lebenszyklus ---
    /// Audio-Fokus hat gewechselt
    SwitchFocus { mode: FocusMode },
    /// Explizite Routenwahl durch den Benutzer
    SwitchToRoute {
        route: RouteKind,
        #[serde(default)]
        device: Option<DeviceId>,
    },
    /// Benutzer verlangt die Basis-Route (optional ohne Bluetooth)
    UserSwitchBaselineRoute { include_bluetooth: bool },
    /// Benutzer verlangt Bluetooth (optional ein bestimmtes Geraet)
    UserSwitchBluetooth {
        #[serde(default)]
        device: Option<DeviceId>,
    },

    // --- Mute ---
    ToggleMute,
    SetMute { on: bool },
    /// Mikrofon-Mute wurde ausserhalb des Automaten geaendert
    MuteExternallyChanged,

    // --- Lautsprecher-Flag (extern gemeldet) ---
    SpeakerOn,
    SpeakerOff,

    // --- Kabelgebundenes Headset ---
    WiredHeadsetConnected,
    WiredHeadsetDisconnected,

    // --- Dock ---
    ConnectDock,
    DisconnectDock,

    // --- Bluetooth ---
    BtAudioConnected {
        #[serde(default)]
        device: Option<DeviceId>,
    },
    BtAudioDisconnected,
    BtActiveDevicePresent {
        #[serde(default)]
        device: Option<DeviceId>,
    },
    BtActiveDeviceGone {
        #[serde(default)]
        device: Option<DeviceId>,
    },
    BtDeviceListChanged,

    // --- Streaming ---
    StreamingForceEnabled,
    StreamingForceDisabled,

    /// Intern: Lebendigkeitspruefung nach einer Bluetooth-Verbindungsanforderung
    ///
    /// Wird ausschliesslich vom Automaten selbst verzoegert eingeplant.
    BtAudioTimeout,
}

impl RouteEvent {
    /// Stabiler Kurzname (Logs, Metrik-Labels)
    pub fn name(&self) -> &'static str {
        match self {
            Self::SwitchFocus { .. } => "switch_focus",
            Self::SwitchToRoute { .. } => "switch_to_route",
            Self::UserSwitchBaselineRoute { .. } => "user_switch_baseline_route",
            Self::UserSwitchBluetooth { .. } => "user_switch_bluetooth",
            Self::ToggleMute => "toggle_mute",
            Self::SetMute { .. } => "set_mute",
            Self::MuteExternallyChanged => "mute_externally_changed",
            Self::SpeakerOn => "speaker_on",
            Self::SpeakerOff => "speaker_off",
            Self::WiredHeadsetConnected => "wired_headset_connected",
            Self::WiredHeadsetDisconnected => "wired_headset_disconnected",
            Self::ConnectDock => "connect_dock",
            Self::DisconnectDock => "disconnect_dock",
            Self::BtAudioConnected { .. } => "bt_audio_connected",
            Self::BtAudioDisconnected => "bt_audio_disconnected",
            Self::BtActiveDevicePresent { .. } => "bt_active_device_present",
            Self::BtActiveDeviceGone { .. } => "bt_active_device_gone",
            Self::BtDeviceListChanged => "bt_device_list_changed",
            Self::StreamingForceEnabled => "streaming_force_enabled",
            Self::StreamingForceDisabled => "streaming_force_disabled",
            Self::BtAudioTimeout => "bt_audio_timeout",
        }
    }

    /// Ereignisse, die nur der Automat selbst erzeugen darf
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::BtAudioTimeout)
    }
}

/// Ereignis samt optionalem Korrelations-Token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedEvent {
    pub event: RouteEvent,
    pub session: Option<SessionToken>,
}

impl RoutedEvent {
    pub fn new(event: RouteEvent, session: Option<SessionToken>) -> Self {
        Self { event, session }
    }
}

impl From<RouteEvent> for RoutedEvent {
    fn from(event: RouteEvent) -> Self {
        Self::new(event, None)
    }
}

/// Empfaengerseite fuer Ereignisse externer Signalquellen
///
/// Die Implementierung im Routing-Crate legt Ereignisse nur in die
/// Warteschlange und kehrt sofort zurueck.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: RouteEvent, session: Option<SessionToken>) -> crate::Result<()>;
}

/// Typisierte Ereignisquelle (Bluetooth-Stack, Headset-Erkennung, System-Mute)
///
/// Wird einmalig bei der Konstruktion mit dem Router verbunden.
pub trait EventSource: Send + Sync {
    /// Name der Quelle fuer Logs
    fn name(&self) -> &str;

    /// Verbindet die Quelle mit dem Router
    fn subscribe(&self, sink: Arc<dyn EventSink>);
}
