//! Daemon-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Daemon ohne Konfigurationsdatei
//! lauffaehig ist (leeres Szenario, Erkennung gegen Standard-Hardware).

use callroute_core::{RouteEvent, RouteMask};
use callroute_observability::logging::{log_format_gueltig, log_level_gueltig};
use callroute_routing::RoutingConfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Daemon-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Verhalten des Routing-Automaten
    pub routing: RoutingConfig,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Anfangszustand der simulierten Hardware
    pub hardware: HardwareEinstellungen,
    /// Abzuspielende Ereignisfolge
    pub szenario: SzenarioEinstellungen,
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Verbundenes Bluetooth-Geraet beim Start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BluetoothGeraet {
    pub adresse: String,
    #[serde(default)]
    pub wearable: bool,
}

/// Anfangszustand der simulierten Hardware
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareEinstellungen {
    /// Eingebauter Hoerer vorhanden
    pub hoerer: bool,
    pub headset_eingesteckt: bool,
    pub bluetooth_verfuegbar: bool,
    pub bluetooth_geraete: Vec<BluetoothGeraet>,
    /// Geraet mit stehendem Audio (muss in `bluetooth_geraete` enthalten sein)
    pub bluetooth_aktiv: Option<String>,
    pub inband_klingeln: bool,
    /// Bluetooth-Audio-Anforderungen automatisch bestaetigen
    pub bluetooth_bestaetigt: bool,
    /// Plattform bietet die moderne Geraeteauswahl-API
    pub geraeteauswahl_api: bool,
    /// Vom Gespraech zugelassene Routen (ohne Angabe: alle)
    pub gespraech_routen: Option<RouteMask>,
}

impl Default for HardwareEinstellungen {
    fn default() -> Self {
        Self {
            hoerer: true,
            headset_eingesteckt: false,
            bluetooth_verfuegbar: true,
            bluetooth_geraete: Vec::new(),
            bluetooth_aktiv: None,
            inband_klingeln: false,
            bluetooth_bestaetigt: true,
            geraeteauswahl_api: true,
            gespraech_routen: None,
        }
    }
}

/// Ein Schritt des Szenarios
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "aktion", rename_all = "snake_case")]
pub enum Schritt {
    /// Ereignis direkt einreihen
    Ereignis { ereignis: RouteEvent },
    HeadsetEinstecken,
    HeadsetAbziehen,
    BluetoothVerbinden {
        adresse: String,
        #[serde(default)]
        wearable: bool,
    },
    BluetoothTrennen { adresse: String },
    /// Stack meldet ein Geraet als aktiv (Audio steht)
    BluetoothAktiv { adresse: String },
    /// Mikrofon wird ausserhalb des Automaten stummgeschaltet
    MikrofonExtern { stumm: bool },
    Warten { ms: u64 },
}

/// Abzuspielende Ereignisfolge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SzenarioEinstellungen {
    /// Jeder Schritt erhaelt ein eigenes Sitzungs-Token fuer die Logs
    pub sitzungen: bool,
    /// Nach dem Szenario bis Ctrl-C weiterlaufen
    pub danach_warten: bool,
    pub schritte: Vec<Schritt>,
}

impl Default for SzenarioEinstellungen {
    fn default() -> Self {
        Self {
            sitzungen: true,
            danach_warten: false,
            schritte: Vec::new(),
        }
    }
}

impl DaemonConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Parst und prueft eine Konfiguration
    pub fn aus_toml(inhalt: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(inhalt)?;
        config.routing.validieren()?;
        if !log_level_gueltig(&config.logging.level) {
            anyhow::bail!("Unbekannter Log-Level '{}'", config.logging.level);
        }
        if !log_format_gueltig(&config.logging.format) {
            anyhow::bail!("Unbekanntes Log-Format '{}'", config.logging.format);
        }
        if let Some(aktiv) = &config.hardware.bluetooth_aktiv {
            if !config
                .hardware
                .bluetooth_geraete
                .iter()
                .any(|g| &g.adresse == aktiv)
            {
                anyhow::bail!("bluetooth_aktiv '{aktiv}' ist kein verbundenes Geraet");
            }
        }
        Ok(config)
    }
}
