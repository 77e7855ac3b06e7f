//! Bluetooth-Geraeteauswahl
//!
//! Entscheidet, mit welchem Geraet verbunden wird, wenn die logische Route
//! Bluetooth ist und mehrere Kandidaten in Frage kommen.
//!
//! Reihenfolge:
//! 1. explizit angefordertes Geraet, sofern noch verfuegbar
//! 2. zuletzt aktives Geraet, sofern noch verfuegbar (kein Geraete-Flattern)
//! 3. erstes verfuegbares, nicht gefiltertes Geraet in Stack-Reihenfolge
//! 4. keins – Bluetooth gilt fuer die automatische Auswahl als nicht verfuegbar

use std::collections::BTreeSet;

use callroute_core::DeviceId;

/// Ergebnis der Geraeteauswahl
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Requested(DeviceId),
    Previous(DeviceId),
    FirstEligible(DeviceId),
    Unresolved,
}

impl Resolution {
    pub fn device(&self) -> Option<&DeviceId> {
        match self {
            Self::Requested(d) | Self::Previous(d) | Self::FirstEligible(d) => Some(d),
            Self::Unresolved => None,
        }
    }

    pub fn into_device(self) -> Option<DeviceId> {
        match self {
            Self::Requested(d) | Self::Previous(d) | Self::FirstEligible(d) => Some(d),
            Self::Unresolved => None,
        }
    }
}

/// Eingaben der Geraeteauswahl
#[derive(Debug, Clone, Copy)]
pub struct BluetoothDeviceSelector<'a> {
    /// Verfuegbare Geraete in stabiler Reihenfolge
    pub available: &'a [DeviceId],
    pub previously_active: Option<&'a DeviceId>,
    /// Ob das zuletzt aktive Geraet vom Benutzer gewaehlt wurde
    pub previous_was_explicit: bool,
    pub requested: Option<&'a DeviceId>,
    pub exclude_wearables: bool,
    pub wearables: &'a BTreeSet<DeviceId>,
    /// Geraet, das nicht gewaehlt werden darf (gerade verschwunden)
    pub excluded: Option<&'a DeviceId>,
}

impl<'a> BluetoothDeviceSelector<'a> {
    pub fn new(available: &'a [DeviceId], wearables: &'a BTreeSet<DeviceId>) -> Self {
        Self {
            available,
            previously_active: None,
            previous_was_explicit: false,
            requested: None,
            exclude_wearables: false,
            wearables,
            excluded: None,
        }
    }

    fn is_present(&self, device: &DeviceId) -> bool {
        self.available.contains(device) && self.excluded != Some(device)
    }

    fn is_filtered(&self, device: &DeviceId) -> bool {
        self.exclude_wearables && self.wearables.contains(device)
    }

    pub fn resolve(&self) -> Resolution {
        if let Some(d) = self.requested.filter(|d| self.is_present(d)) {
            return Resolution::Requested(d.clone());
        }

        if let Some(d) = self.previously_active.filter(|d| self.is_present(d)) {
            if self.previous_was_explicit || !self.is_filtered(d) {
                return Resolution::Previous(d.clone());
            }
        }

        self.available
            .iter()
            .find(|d| self.excluded != Some(*d) && !self.is_filtered(d))
            .map(|d| Resolution::FirstEligible(d.clone()))
            .unwrap_or(Resolution::Unresolved)
    }

    /// Ziel fuer die Verbindungsanforderung
    ///
    /// `Some(None)` bedeutet: Route ist nominell verfuegbar, der Stack waehlt.
    /// `None` bedeutet: keine Verbindung moeglich.
    pub fn connect_target(&self) -> Option<Option<DeviceId>> {
        match self.resolve().into_device() {
            Some(d) => Some(Some(d)),
            None if self.available.iter().any(|d| self.excluded != Some(d)) => Some(None),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(namen: &[&str]) -> Vec<DeviceId> {
        namen.iter().map(|n| DeviceId::from(*n)).collect()
    }

    #[test]
    fn explizite_anfrage_gewinnt() {
        let verfuegbar = ids(&["D1", "D2"]);
        let leer = BTreeSet::new();
        let d2 = DeviceId::from("D2");
        let d1 = DeviceId::from("D1");
        let sel = BluetoothDeviceSelector {
            requested: Some(&d2),
            previously_active: Some(&d1),
            ..BluetoothDeviceSelector::new(&verfuegbar, &leer)
        };
        assert_eq!(sel.resolve(), Resolution::Requested(d2));
    }

    #[test]
    fn verschwundene_anfrage_faellt_auf_vorheriges_zurueck() {
        let verfuegbar = ids(&["D1", "D2"]);
        let leer = BTreeSet::new();
        let d9 = DeviceId::from("D9");
        let d2 = DeviceId::from("D2");
        let sel = BluetoothDeviceSelector {
            requested: Some(&d9),
            previously_active: Some(&d2),
            ..BluetoothDeviceSelector::new(&verfuegbar, &leer)
        };
        assert_eq!(sel.resolve(), Resolution::Previous(d2));
    }

    #[test]
    fn stabilitaet_bevorzugt_vorheriges_geraet() {
        let verfuegbar = ids(&["D2", "D1"]);
        let leer = BTreeSet::new();
        let d1 = DeviceId::from("D1");
        let sel = BluetoothDeviceSelector {
            previously_active: Some(&d1),
            ..BluetoothDeviceSelector::new(&verfuegbar, &leer)
        };
        assert_eq!(sel.resolve(), Resolution::Previous(d1));
    }

    #[test]
    fn erstes_geraet_in_stack_reihenfolge() {
        let verfuegbar = ids(&["D3", "D1", "D2"]);
        let leer = BTreeSet::new();
        let sel = BluetoothDeviceSelector::new(&verfuegbar, &leer);
        assert_eq!(sel.resolve(), Resolution::FirstEligible(DeviceId::from("D3")));
    }

    #[test]
    fn wearables_werden_automatisch_uebersprungen() {
        let verfuegbar = ids(&["UHR", "D1"]);
        let wearables: BTreeSet<DeviceId> = ids(&["UHR"]).into_iter().collect();
        let sel = BluetoothDeviceSelector {
            exclude_wearables: true,
            ..BluetoothDeviceSelector::new(&verfuegbar, &wearables)
        };
        assert_eq!(sel.resolve(), Resolution::FirstEligible(DeviceId::from("D1")));
    }

    #[test]
    fn wearable_bleibt_explizit_waehlbar() {
        let verfuegbar = ids(&["UHR", "D1"]);
        let wearables: BTreeSet<DeviceId> = ids(&["UHR"]).into_iter().collect();
        let uhr = DeviceId::from("UHR");
        let sel = BluetoothDeviceSelector {
            exclude_wearables: true,
            requested: Some(&uhr),
            ..BluetoothDeviceSelector::new(&verfuegbar, &wearables)
        };
        assert_eq!(sel.resolve(), Resolution::Requested(uhr.clone()));

        // Zuvor explizit gewaehlt: bleibt stabil
        let sel = BluetoothDeviceSelector {
            exclude_wearables: true,
            previously_active: Some(&uhr),
            previous_was_explicit: true,
            ..BluetoothDeviceSelector::new(&verfuegbar, &wearables)
        };
        assert_eq!(sel.resolve(), Resolution::Previous(uhr));
    }

    #[test]
    fn nur_wearables_ergibt_keine_auswahl_aber_nominelles_ziel() {
        let verfuegbar = ids(&["UHR"]);
        let wearables: BTreeSet<DeviceId> = ids(&["UHR"]).into_iter().collect();
        let sel = BluetoothDeviceSelector {
            exclude_wearables: true,
            ..BluetoothDeviceSelector::new(&verfuegbar, &wearables)
        };
        assert_eq!(sel.resolve(), Resolution::Unresolved);
        assert_eq!(sel.connect_target(), Some(None));
    }

    #[test]
    fn ausgeschlossenes_geraet_wird_nie_gewaehlt() {
        let verfuegbar = ids(&["D1"]);
        let leer = BTreeSet::new();
        let d1 = DeviceId::from("D1");
        let sel = BluetoothDeviceSelector {
            previously_active: Some(&d1),
            excluded: Some(&d1),
            ..BluetoothDeviceSelector::new(&verfuegbar, &leer)
        };
        assert_eq!(sel.resolve(), Resolution::Unresolved);
        assert_eq!(sel.connect_target(), None);
    }
}
