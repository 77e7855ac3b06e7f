//! CallAudioState – veroeffentlichter Audio-Zustand eines Gespraechs
//!
//! Der Wert ist unveraenderlich: jeder Uebergang erzeugt einen neuen
//! Zustand, der mit dem vorherigen verglichen wird. Gleichheit umfasst
//! genau die fuenf Felder, sodass "keine Aenderung" zuverlaessig erkannt
//! und redundante Benachrichtigungen unterdrueckt werden.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::types::{DeviceId, RouteKind, RouteMask};

/// Verletzte Invariante eines [`CallAudioState`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Die Route ist nicht in den unterstuetzten Routen enthalten
    RouteNichtUnterstuetzt { route: RouteKind, unterstuetzt: RouteMask },
    /// Das aktive Bluetooth-Geraet ist nicht in der Liste verfuegbarer Geraete
    AktivesGeraetNichtVerfuegbar(DeviceId),
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RouteNichtUnterstuetzt { route, unterstuetzt } => {
                write!(f, "Route {route} nicht in {unterstuetzt}")
            }
            Self::AktivesGeraetNichtVerfuegbar(d) => {
                write!(f, "aktives Geraet {d} nicht verfuegbar")
            }
        }
    }
}

/// Audio-Zustand, wie er an Listener veroeffentlicht wird
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallAudioState {
    muted: bool,
    route: RouteKind,
    supported_routes: RouteMask,
    active_bluetooth_device: Option<DeviceId>,
    available_bluetooth_devices: BTreeSet<DeviceId>,
}

impl CallAudioState {
    pub fn new(
        muted: bool,
        route: RouteKind,
        supported_routes: RouteMask,
        active_bluetooth_device: Option<DeviceId>,
        available_bluetooth_devices: impl IntoIterator<Item = DeviceId>,
    ) -> Self {
        Self {
            muted,
            route,
            supported_routes,
            active_bluetooth_device,
            available_bluetooth_devices: available_bluetooth_devices.into_iter().collect(),
        }
    }

    /// Zustand ohne Bluetooth-Geraete
    pub fn simple(muted: bool, route: RouteKind, supported_routes: RouteMask) -> Self {
        Self::new(muted, route, supported_routes, None, std::iter::empty())
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn route(&self) -> RouteKind {
        self.route
    }

    pub fn supported_routes(&self) -> RouteMask {
        self.supported_routes
    }

    pub fn active_bluetooth_device(&self) -> Option<&DeviceId> {
        self.active_bluetooth_device.as_ref()
    }

    pub fn available_bluetooth_devices(&self) -> &BTreeSet<DeviceId> {
        &self.available_bluetooth_devices
    }

    // --- Ableitungen: erzeugen jeweils einen neuen Wert ---

    #[must_use]
    pub fn with_muted(&self, muted: bool) -> Self {
        Self {
            muted,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_route(&self, route: RouteKind) -> Self {
        Self {
            route,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_supported_routes(&self, supported_routes: RouteMask) -> Self {
        Self {
            supported_routes,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_active_bluetooth_device(&self, device: Option<DeviceId>) -> Self {
        Self {
            active_bluetooth_device: device,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_available_bluetooth_devices(
        &self,
        devices: impl IntoIterator<Item = DeviceId>,
    ) -> Self {
        Self {
            available_bluetooth_devices: devices.into_iter().collect(),
            ..self.clone()
        }
    }

    /// Prueft beide Invarianten und liefert die erste Verletzung
    pub fn invariant_violation(&self) -> Option<InvariantViolation> {
        if !self.supported_routes.contains(self.route) {
            return Some(InvariantViolation::RouteNichtUnterstuetzt {
                route: self.route,
                unterstuetzt: self.supported_routes,
            });
        }
        match &self.active_bluetooth_device {
            Some(d) if !self.available_bluetooth_devices.contains(d) => {
                Some(InvariantViolation::AktivesGeraetNichtVerfuegbar(d.clone()))
            }
            _ => None,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.invariant_violation().is_none()
    }
}

impl fmt::Display for CallAudioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[muted={}, route={}, supported={}, active_bt={}, available_bt={}]",
            self.muted,
            self.route,
            self.supported_routes,
            self.active_bluetooth_device
                .as_ref()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".into()),
            self.available_bluetooth_devices.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bt_zustand() -> CallAudioState {
        CallAudioState::new(
            false,
            RouteKind::Bluetooth,
            RouteMask::of(&[RouteKind::Earpiece, RouteKind::Bluetooth]),
            Some(DeviceId::from("D1")),
            [DeviceId::from("D1"), DeviceId::from("D2")],
        )
    }

    #[test]
    fn gleichheit_ueber_alle_felder() {
        let a = bt_zustand();
        let b = bt_zustand();
        assert_eq!(a, b);
        assert_ne!(a, a.with_muted(true));
        assert_ne!(a, a.with_active_bluetooth_device(Some(DeviceId::from("D2"))));
    }

    #[test]
    fn ableitung_veraendert_original_nicht() {
        let a = bt_zustand();
        let b = a.with_route(RouteKind::Earpiece);
        assert_eq!(a.route(), RouteKind::Bluetooth);
        assert_eq!(b.route(), RouteKind::Earpiece);
    }

    #[test]
    fn invariante_route_in_maske() {
        let s = CallAudioState::simple(
            false,
            RouteKind::Speaker,
            RouteMask::of(&[RouteKind::Earpiece]),
        );
        assert!(matches!(
            s.invariant_violation(),
            Some(InvariantViolation::RouteNichtUnterstuetzt { .. })
        ));
    }

    #[test]
    fn invariante_aktives_geraet_verfuegbar() {
        let s = bt_zustand().with_active_bluetooth_device(Some(DeviceId::from("D9")));
        assert_eq!(
            s.invariant_violation(),
            Some(InvariantViolation::AktivesGeraetNichtVerfuegbar(DeviceId::from("D9")))
        );
        assert!(bt_zustand().is_consistent());
    }

    #[test]
    fn zustand_ist_serde_kompatibel() {
        let s = bt_zustand();
        let json = serde_json::to_string(&s).unwrap();
        let s2: CallAudioState = serde_json::from_str(&json).unwrap();
        assert_eq!(s, s2);
    }
}
