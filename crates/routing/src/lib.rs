//! # callroute-routing
//!
//! Routing-Kern fuer Call-Audio:
//! - Zustandsautomat als reine Uebergangsfunktion mit Effekten als Daten
//! - Bluetooth-Geraeteauswahl mit Stabilitaets-Praeferenz
//! - Effekt-Ausfuehrung gegen Bluetooth-Stack und Audio-Subsystem
//! - Single-Consumer-Worker mit abbrechbaren verzoegerten Ereignissen
//!
//! ## Verwendung
//!
//! ```ignore
//! let router = CallAudioRouter::initialize(RoutingConfig::default(), collaborators, None)?;
//! router.enqueue(RouteEvent::SwitchFocus { mode: FocusMode::Active }, None)?;
//! router.wait_idle()?;
//! println!("{}", router.current_state());
//! ```

pub mod bluetooth;
pub mod collaborators;
pub mod config;
pub mod controller;
pub mod deferred;
pub mod effects;
pub mod machine;
pub mod view;

pub use bluetooth::{BluetoothDeviceSelector, Resolution};
pub use collaborators::{
    BluetoothRouteManager, CallAudioObserver, CallLifecycle, Collaborators, WiredHeadsetTracker,
};
pub use config::RoutingConfig;
pub use controller::{CallAudioRouter, PublishedState, RouterCommand, RouterHandle};
pub use deferred::{DeferredQueue, TimerKind};
pub use effects::EffectRunner;
pub use machine::{transition, BaseRoute, Effect, RouteModel, RouteTag, Transition};
pub use view::HardwareView;
