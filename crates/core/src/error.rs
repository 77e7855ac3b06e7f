//! Fehlertypen fuer das Call-Audio-Routing
//!
//! Zentraler Fehler-Enum fuer die oeffentliche Schnittstelle des Routers.
//! Fehler der Hardware-Kommandos werden nur protokolliert und veraendern
//! den bereits festgeschriebenen Routing-Zustand nicht.

use thiserror::Error;

/// Globaler Result-Alias fuer das Routing
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Alle moeglichen Fehler an der Router-Schnittstelle
#[derive(Debug, Error)]
pub enum RoutingError {
    // --- Lebenszyklus ---
    #[error("Router wurde bereits heruntergefahren")]
    BereitsBeendet,

    #[error("Routing-Worker nicht erreichbar: {0}")]
    WorkerGestoppt(String),

    #[error("Ereignis-Warteschlange voll (Kapazitaet {kapazitaet})")]
    WarteschlangeVoll { kapazitaet: usize },

    // --- Zustand ---
    #[error("Ungueltiger Anfangszustand: {0}")]
    UngueltigerAnfangszustand(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Hardware ---
    #[error("Hardware-Kommando fehlgeschlagen ({kommando}): {grund}")]
    Hardware { kommando: String, grund: String },

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl RoutingError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Erstellt einen Hardware-Fehler fuer das angegebene Kommando
    pub fn hardware(kommando: impl Into<String>, grund: impl Into<String>) -> Self {
        Self::Hardware {
            kommando: kommando.into(),
            grund: grund.into(),
        }
    }

    /// Gibt true zurueck wenn ein erneuter Versuch sinnvoll sein koennte
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(self, Self::WarteschlangeVoll { .. })
    }
}
