//! Fehlertypen fuer die Geraeteauswahl

use callroute_core::RouteKind;
use thiserror::Error;

/// Alle moeglichen Fehler bei der Auswahl des Communication Device
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Kein passendes Audio-Geraet fuer Route {0}")]
    GeraetNichtGefunden(RouteKind),

    #[error("Audio-Subsystem hat die Auswahl abgelehnt: {0}")]
    AuswahlAbgelehnt(String),

    #[error("Route {0} hat kein Communication Device")]
    NichtUnterstuetzt(RouteKind),
}

pub type AudioResult<T> = Result<T, AudioError>;
