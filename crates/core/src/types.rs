//! Gemeinsame Identifikations- und Routing-Typen
//!
//! Geraete-Adressen und Sitzungs-Tokens verwenden das Newtype-Pattern,
//! damit sie zur Compilezeit nicht mit beliebigen Strings verwechselt werden.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// DeviceId
// ---------------------------------------------------------------------------

/// Stabile Hardware-Adresse eines Bluetooth-Geraets
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Erstellt eine DeviceId aus einer Adresse (z.B. "00:11:22:33:44:55")
    pub fn new(adresse: impl Into<String>) -> Self {
        Self(adresse.into())
    }

    /// Gibt die Adresse als &str zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bt:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RouteKind
// ---------------------------------------------------------------------------

/// Logische Audio-Route eines Gespraechs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    Earpiece,
    Speaker,
    WiredHeadset,
    Bluetooth,
    Streaming,
}

impl RouteKind {
    /// Alle Routen in Bit-Reihenfolge
    pub const ALLE: [RouteKind; 5] = [
        RouteKind::Earpiece,
        RouteKind::Speaker,
        RouteKind::WiredHeadset,
        RouteKind::Bluetooth,
        RouteKind::Streaming,
    ];

    /// Bit der Route innerhalb einer [`RouteMask`]
    pub const fn bit(self) -> u8 {
        match self {
            RouteKind::Earpiece => 1 << 0,
            RouteKind::Speaker => 1 << 1,
            RouteKind::WiredHeadset => 1 << 2,
            RouteKind::Bluetooth => 1 << 3,
            RouteKind::Streaming => 1 << 4,
        }
    }

    /// Stabiler Kurzname (Logs, Metrik-Labels)
    pub fn name(self) -> &'static str {
        match self {
            RouteKind::Earpiece => "earpiece",
            RouteKind::Speaker => "speaker",
            RouteKind::WiredHeadset => "wired_headset",
            RouteKind::Bluetooth => "bluetooth",
            RouteKind::Streaming => "streaming",
        }
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// RouteMask
// ---------------------------------------------------------------------------

/// Bitmenge erreichbarer Routen
///
/// Serialisiert als Liste von Routennamen, damit Konfigurationsdateien
/// und JSON-Ausgaben lesbar bleiben.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "Vec<RouteKind>", from = "Vec<RouteKind>")]
pub struct RouteMask(u8);

impl RouteMask {
    /// Leere Maske
    pub const LEER: RouteMask = RouteMask(0);

    /// Alle Routen inklusive Streaming
    pub const ALLE: RouteMask = RouteMask(0b1_1111);

    /// Erstellt eine Maske aus einer Liste von Routen
    pub fn of(routen: &[RouteKind]) -> Self {
        routen.iter().copied().collect()
    }

    /// Rohwert der Maske
    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, route: RouteKind) -> bool {
        self.0 & route.bit() != 0
    }

    /// Gibt eine Kopie mit zusaetzlicher Route zurueck
    #[must_use]
    pub const fn with(self, route: RouteKind) -> Self {
        Self(self.0 | route.bit())
    }

    /// Gibt eine Kopie ohne die Route zurueck
    #[must_use]
    pub const fn without(self, route: RouteKind) -> Self {
        Self(self.0 & !route.bit())
    }

    /// Schnittmenge zweier Masken
    #[must_use]
    pub const fn intersect(self, other: RouteMask) -> Self {
        Self(self.0 & other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iteriert ueber die enthaltenen Routen in Bit-Reihenfolge
    pub fn iter(self) -> impl Iterator<Item = RouteKind> {
        RouteKind::ALLE.into_iter().filter(move |r| self.contains(*r))
    }
}

impl FromIterator<RouteKind> for RouteMask {
    fn from_iter<I: IntoIterator<Item = RouteKind>>(iter: I) -> Self {
        iter.into_iter().fold(RouteMask::LEER, RouteMask::with)
    }
}

impl From<Vec<RouteKind>> for RouteMask {
    fn from(routen: Vec<RouteKind>) -> Self {
        routen.into_iter().collect()
    }
}

impl From<RouteMask> for Vec<RouteKind> {
    fn from(maske: RouteMask) -> Self {
        maske.iter().collect()
    }
}

impl fmt::Display for RouteMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let namen: Vec<&str> = self.iter().map(RouteKind::name).collect();
        write!(f, "[{}]", namen.join(", "))
    }
}

// ---------------------------------------------------------------------------
// FocusMode
// ---------------------------------------------------------------------------

/// Audio-Fokus des aktuellen Gespraechs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusMode {
    /// Kein Gespraech beansprucht Audio
    #[default]
    None,
    /// Ein Gespraech ist aktiv und treibt die Hardware
    Active,
    /// Eingehendes Gespraech klingelt
    Ringing,
}

impl fmt::Display for FocusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FocusMode::None => "none",
            FocusMode::Active => "active",
            FocusMode::Ringing => "ringing",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// SessionToken
// ---------------------------------------------------------------------------

/// Opakes Token zur Korrelation von Ereignissen im Log
///
/// Hat keinerlei Einfluss auf die Routing-Entscheidungen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub Uuid);

impl SessionToken {
    /// Erstellt ein neues zufaelliges Token
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session:{}", self.0)
    }
}
