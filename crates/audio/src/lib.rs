//! callroute-audio – Communication-Device-Selector
//!
//! Bildet eine logische Route auf ein konkretes Audio-Geraet der Plattform ab:
//! - Geraetebeschreibungen und Plattform-Schnittstelle ([`AudioSubsystem`])
//! - Auswahl/Freigabe des Communication Device inklusive Legacy-Fallback

pub mod device;
pub mod error;
pub mod selector;

// Bequeme Re-Exporte der wichtigsten Typen
pub use device::{
    candidate_types, find_device_for_route, AudioDeviceInfo, AudioDeviceType, AudioSubsystem,
    FormFactor,
};
pub use error::{AudioError, AudioResult};
pub use selector::{CommunicationDeviceSelector, Selection};
