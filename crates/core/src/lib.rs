//! callroute-core – Gemeinsame Typen, Ereignisse und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die vom
//! Routing-Kern, dem Communication-Device-Selector und dem Daemon
//! gemeinsam genutzt werden.

pub mod audio_state;
pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use audio_state::{CallAudioState, InvariantViolation};
pub use error::{Result, RoutingError};
pub use event::{EventSink, EventSource, RouteEvent, RoutedEvent};
pub use types::{DeviceId, FocusMode, RouteKind, RouteMask, SessionToken};
