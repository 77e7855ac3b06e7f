//! Ausfuehrung der Effekte eines Uebergangs
//!
//! Hardware-Kommandos sind aus Sicht des Automaten "fire and forget":
//! Fehler werden geloggt und gezaehlt, der bereits festgeschriebene
//! Uebergang bleibt bestehen. Korrekturen kommen ueber spaetere
//! Liveness-Ereignisse.

use std::sync::Arc;
use std::time::Instant;

use callroute_audio::{AudioSubsystem, CommunicationDeviceSelector};
use callroute_observability::RoutingMetrics;
use tracing::{debug, warn};

use crate::collaborators::{BluetoothRouteManager, Collaborators};
use crate::config::RoutingConfig;
use crate::deferred::DeferredQueue;
use crate::machine::Effect;

/// Fuehrt Effekte gegen die Kollaborateure aus
pub struct EffectRunner {
    bluetooth: Arc<dyn BluetoothRouteManager>,
    audio: Arc<dyn AudioSubsystem>,
    selector: CommunicationDeviceSelector,
    deferred: DeferredQueue,
    metrics: RoutingMetrics,
}

impl EffectRunner {
    pub fn new(collaborators: &Collaborators, config: &RoutingConfig, metrics: RoutingMetrics) -> Self {
        Self {
            bluetooth: collaborators.bluetooth.clone(),
            audio: collaborators.audio.clone(),
            selector: CommunicationDeviceSelector::new(
                collaborators.audio.clone(),
                config.use_communication_device_api,
                config.form_factor,
            ),
            deferred: DeferredQueue::new(),
            metrics,
        }
    }

    pub fn deferred(&self) -> &DeferredQueue {
        &self.deferred
    }

    pub fn deferred_mut(&mut self) -> &mut DeferredQueue {
        &mut self.deferred
    }

    pub fn selector(&self) -> &CommunicationDeviceSelector {
        &self.selector
    }

    /// Fuehrt alle Effekte in Reihenfolge aus
    pub fn run(&mut self, effects: &[Effect], now: Instant) {
        for effect in effects {
            let ergebnis = self.run_one(effect, now);
            if effect.is_hardware() {
                self.metrics.command(effect.name(), ergebnis.is_ok());
            }
            if let Err(grund) = ergebnis {
                warn!(kommando = effect.name(), %grund, "Hardware-Kommando fehlgeschlagen");
            }
        }
        self.metrics.deferred_pending.set(self.deferred.len() as i64);
    }

    fn run_one(&mut self, effect: &Effect, now: Instant) -> Result<(), String> {
        match effect {
            Effect::ConnectBluetoothAudio(device) => {
                debug!(device = ?device, "Bluetooth-Audio anfordern");
                self.bluetooth
                    .connect_audio(device.as_ref())
                    .map_err(|e| e.to_string())
            }
            Effect::DisconnectBluetoothAudio => {
                debug!("Bluetooth-Audio trennen");
                self.bluetooth.disconnect_audio().map_err(|e| e.to_string())
            }
            Effect::SelectCommunicationDevice { route, device } => {
                match self.selector.select(*route, device.as_ref()) {
                    Ok(_) => Ok(()),
                    Err(e) => {
                        // Das zuvor gesetzte Geraet gehoert zur verlassenen Route
                        self.selector.forget();
                        Err(e.to_string())
                    }
                }
            }
            Effect::ClearCommunicationDevice => {
                self.selector.clear();
                Ok(())
            }
            Effect::SetMicrophoneMute(muted) => {
                debug!(muted, "Mikrofon-Mute setzen");
                self.audio.set_microphone_mute(*muted);
                Ok(())
            }
            Effect::ScheduleTimeout { timer, after } => {
                debug!(timer = timer.name(), ?after, "Timer eingeplant");
                self.deferred.schedule(*timer, *after, now);
                Ok(())
            }
            Effect::CancelTimeout(timer) => {
                if self.deferred.cancel(*timer) {
                    debug!(timer = timer.name(), "Timer abgebrochen");
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CallLifecycle, WiredHeadsetTracker};
    use crate::deferred::TimerKind;
    use callroute_audio::{AudioDeviceInfo, AudioDeviceType, AudioResult};
    use callroute_core::{CallAudioState, DeviceId, Result, RouteKind, RoutingError};
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Protokoll {
        aufrufe: Mutex<Vec<String>>,
        connect_schlaegt_fehl: bool,
    }

    impl Protokoll {
        fn push(&self, s: impl Into<String>) {
            self.aufrufe.lock().push(s.into());
        }

        fn aufrufe(&self) -> Vec<String> {
            self.aufrufe.lock().clone()
        }
    }

    impl BluetoothRouteManager for Protokoll {
        fn is_available(&self) -> bool {
            true
        }
        fn connected_devices(&self) -> Vec<DeviceId> {
            vec![DeviceId::from("D1")]
        }
        fn active_audio_device(&self) -> Option<DeviceId> {
            None
        }
        fn connect_audio(&self, device: Option<&DeviceId>) -> Result<()> {
            self.push(format!("connect:{}", device.map(|d| d.as_str()).unwrap_or("-")));
            if self.connect_schlaegt_fehl {
                return Err(RoutingError::hardware("connect_audio", "Stack belegt"));
            }
            Ok(())
        }
        fn disconnect_audio(&self) -> Result<()> {
            self.push("disconnect");
            Ok(())
        }
        fn is_audio_connected_or_pending(&self) -> bool {
            false
        }
        fn is_inband_ringing_enabled(&self) -> bool {
            false
        }
        fn is_wearable(&self, _device: &DeviceId) -> bool {
            false
        }
    }

    impl AudioSubsystem for Protokoll {
        fn communication_devices(&self) -> Vec<AudioDeviceInfo> {
            vec![
                AudioDeviceInfo::new(1, AudioDeviceType::BuiltinEarpiece, "Hoerer"),
                AudioDeviceInfo::new(2, AudioDeviceType::BuiltinSpeaker, "Lautsprecher"),
            ]
        }
        fn set_communication_device(&self, device: &AudioDeviceInfo) -> AudioResult<()> {
            self.push(format!("set:{}", device.name));
            Ok(())
        }
        fn clear_communication_device(&self) {
            self.push("clear");
        }
        fn set_speakerphone_on(&self, on: bool) {
            self.push(format!("speakerphone:{on}"));
        }
        fn set_microphone_mute(&self, muted: bool) {
            self.push(format!("mute:{muted}"));
        }
        fn is_microphone_muted(&self) -> bool {
            false
        }
        fn has_earpiece(&self) -> bool {
            true
        }
    }

    impl WiredHeadsetTracker for Protokoll {
        fn is_plugged_in(&self) -> bool {
            false
        }
    }

    impl CallLifecycle for Protokoll {
        fn on_call_audio_state_changed(&self, _old: &CallAudioState, _new: &CallAudioState) {}
    }

    fn runner(protokoll: Arc<Protokoll>) -> (EffectRunner, RoutingMetrics) {
        let collaborators = Collaborators {
            bluetooth: protokoll.clone(),
            wired_headset: protokoll.clone(),
            audio: protokoll.clone(),
            calls: protokoll,
        };
        let metrics = RoutingMetrics::neu().unwrap();
        let runner = EffectRunner::new(&collaborators, &RoutingConfig::default(), metrics.clone());
        (runner, metrics)
    }

    #[test]
    fn effekte_laufen_in_reihenfolge() {
        let protokoll = Arc::new(Protokoll::default());
        let (mut runner, _) = runner(protokoll.clone());
        runner.run(
            &[
                Effect::SelectCommunicationDevice {
                    route: RouteKind::Speaker,
                    device: None,
                },
                Effect::SetMicrophoneMute(true),
                Effect::ClearCommunicationDevice,
                Effect::ConnectBluetoothAudio(Some(DeviceId::from("D1"))),
            ],
            Instant::now(),
        );
        assert_eq!(
            protokoll.aufrufe(),
            vec!["set:Lautsprecher", "mute:true", "clear", "connect:D1"]
        );
    }

    #[test]
    fn fehlgeschlagene_auswahl_ist_kein_abbruch() {
        let protokoll = Arc::new(Protokoll::default());
        let (mut runner, metrics) = runner(protokoll.clone());
        // Kein Headset in der Geraeteliste
        runner.run(
            &[
                Effect::SelectCommunicationDevice {
                    route: RouteKind::WiredHeadset,
                    device: None,
                },
                Effect::SetMicrophoneMute(false),
            ],
            Instant::now(),
        );
        assert_eq!(protokoll.aufrufe(), vec!["mute:false"]);
        assert_eq!(
            metrics
                .hardware_failures_total
                .with_label_values(&["select_communication_device"])
                .get(),
            1
        );
    }

    #[test]
    fn fehlschlag_beim_verbinden_wird_gezaehlt() {
        let protokoll = Arc::new(Protokoll {
            connect_schlaegt_fehl: true,
            ..Default::default()
        });
        let (mut runner, metrics) = runner(protokoll);
        runner.run(&[Effect::ConnectBluetoothAudio(None)], Instant::now());
        assert_eq!(
            metrics
                .hardware_failures_total
                .with_label_values(&["connect_bluetooth_audio"])
                .get(),
            1
        );
    }

    #[test]
    fn timer_werden_eingeplant_und_abgebrochen() {
        let protokoll = Arc::new(Protokoll::default());
        let (mut runner, metrics) = runner(protokoll);
        let jetzt = Instant::now();
        runner.run(
            &[Effect::ScheduleTimeout {
                timer: TimerKind::BluetoothAudioLiveness,
                after: Duration::from_secs(5),
            }],
            jetzt,
        );
        assert_eq!(runner.deferred().next_deadline(), Some(jetzt + Duration::from_secs(5)));
        assert_eq!(metrics.deferred_pending.get(), 1);

        runner.run(
            &[Effect::CancelTimeout(TimerKind::BluetoothAudioLiveness)],
            jetzt,
        );
        assert!(runner.deferred().is_empty());
        assert_eq!(metrics.deferred_pending.get(), 0);
    }
}
