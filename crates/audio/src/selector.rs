//! Communication-Device-Selector
//!
//! Setzt beim Betreten einer aktiven Route das passende Communication
//! Device und hebt die Auswahl beim Verlassen explizit wieder auf.
//! Ist die moderne API nicht verfuegbar oder per Konfiguration
//! abgeschaltet, wird fuer die Lautsprecher-Route der Legacy-Schalter
//! verwendet. Alle anderen Routen folgen dann dem impliziten Routing
//! der Plattform.
//!
//! Der Selector merkt sich die aktuelle Auswahl, damit doppelte
//! Set-/Clear-Aufrufe unterbleiben.

use std::sync::Arc;

use callroute_core::{DeviceId, RouteKind};
use tracing::{debug, info, warn};

use crate::device::{find_device_for_route, AudioDeviceInfo, AudioSubsystem, FormFactor};
use crate::error::{AudioError, AudioResult};

/// Ergebnis einer Auswahl
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Neues Geraet wurde gesetzt
    Geraet(AudioDeviceInfo),
    /// Geraet war bereits ausgewaehlt, kein Aufruf noetig
    Unveraendert,
    /// Legacy-Lautsprecher-Schalter wurde eingeschaltet
    LegacyLautsprecher,
    /// Im Legacy-Modus gibt es fuer diese Route nichts zu tun
    NichtNoetig,
}

/// Waehlt das Communication Device passend zur aktiven Route
pub struct CommunicationDeviceSelector {
    audio: Arc<dyn AudioSubsystem>,
    form_factor: FormFactor,
    modern_api: bool,
    /// Aktuell gesetztes Geraet (nur moderne API)
    selected: Option<AudioDeviceInfo>,
    /// Legacy-Lautsprecher wurde von uns eingeschaltet
    legacy_speaker_engaged: bool,
}

impl CommunicationDeviceSelector {
    /// Erstellt den Selector
    ///
    /// Die moderne API wird nur verwendet, wenn sie konfiguriert ist und
    /// das Audio-Subsystem sie unterstuetzt.
    pub fn new(
        audio: Arc<dyn AudioSubsystem>,
        use_communication_device_api: bool,
        form_factor: FormFactor,
    ) -> Self {
        let modern_api = use_communication_device_api && audio.supports_communication_device_api();
        if !modern_api {
            info!("Communication-Device-API deaktiviert, verwende Legacy-Lautsprecher-Schalter");
        }
        Self {
            audio,
            form_factor,
            modern_api,
            selected: None,
            legacy_speaker_engaged: false,
        }
    }

    pub fn uses_modern_api(&self) -> bool {
        self.modern_api
    }

    /// Aktuell gesetztes Geraet
    pub fn selected(&self) -> Option<&AudioDeviceInfo> {
        self.selected.as_ref()
    }

    pub fn is_legacy_speaker_engaged(&self) -> bool {
        self.legacy_speaker_engaged
    }

    /// Waehlt das Geraet fuer `route` aus
    ///
    /// Die Geraeteliste wird bei jedem Aufruf neu gelesen, da sie sich
    /// zwischen Ereignis und Hardware-Aufruf geaendert haben kann.
    pub fn select(&mut self, route: RouteKind, bt_address: Option<&DeviceId>) -> AudioResult<Selection> {
        if route == RouteKind::Streaming {
            return Err(AudioError::NichtUnterstuetzt(route));
        }

        if !self.modern_api {
            return Ok(self.select_legacy(route));
        }

        let geraete = self.audio.communication_devices();
        let geraet = find_device_for_route(&geraete, route, bt_address, self.form_factor)
            .ok_or(AudioError::GeraetNichtGefunden(route))?;

        if self.selected.as_ref() == Some(&geraet) {
            debug!(geraet = %geraet.name, "Communication Device bereits gesetzt");
            return Ok(Selection::Unveraendert);
        }

        self.audio.set_communication_device(&geraet)?;
        info!(
            route = %route,
            geraet = %geraet.name,
            id = geraet.id,
            "Communication Device gesetzt"
        );
        self.selected = Some(geraet.clone());
        Ok(Selection::Geraet(geraet))
    }

    fn select_legacy(&mut self, route: RouteKind) -> Selection {
        if route == RouteKind::Speaker {
            if self.legacy_speaker_engaged {
                return Selection::Unveraendert;
            }
            self.audio.set_speakerphone_on(true);
            self.legacy_speaker_engaged = true;
            info!("Legacy-Lautsprecher eingeschaltet");
            return Selection::LegacyLautsprecher;
        }
        // Andere Routen: Lautsprecher muss aus sein
        self.release_legacy_speaker();
        Selection::NichtNoetig
    }

    /// Hebt die Auswahl auf
    ///
    /// Gibt true zurueck wenn tatsaechlich ein Plattform-Aufruf erfolgte.
    pub fn clear(&mut self) -> bool {
        if !self.modern_api {
            return self.release_legacy_speaker();
        }
        match self.selected.take() {
            Some(geraet) => {
                self.audio.clear_communication_device();
                info!(geraet = %geraet.name, "Communication Device aufgehoben");
                true
            }
            None => {
                debug!("Kein Communication Device gesetzt, Clear uebersprungen");
                false
            }
        }
    }

    fn release_legacy_speaker(&mut self) -> bool {
        if !self.legacy_speaker_engaged {
            return false;
        }
        self.audio.set_speakerphone_on(false);
        self.legacy_speaker_engaged = false;
        info!("Legacy-Lautsprecher ausgeschaltet");
        true
    }

    /// Vergisst die gemerkte Auswahl, ohne die Plattform aufzurufen
    ///
    /// Wird verwendet, wenn das gesetzte Geraet verschwunden ist.
    pub fn forget(&mut self) {
        if let Some(geraet) = self.selected.take() {
            warn!(geraet = %geraet.name, "Gemerktes Communication Device verworfen");
        }
    }
}
