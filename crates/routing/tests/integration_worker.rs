//! Integration-Tests fuer den Routing-Worker (Warteschlange, Timer, Shutdown)

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use callroute_core::{
    CallAudioState, EventSink, EventSource, FocusMode, RouteEvent, RouteKind, RouteMask,
    RoutingError,
};
use callroute_routing::{BaseRoute, CallAudioRouter, RouteTag, RoutingConfig};
use common::{d, kollaborateure, router, MockHardware};
use parking_lot::Mutex;

fn aktiv() -> RouteEvent {
    RouteEvent::SwitchFocus {
        mode: FocusMode::Active,
    }
}

fn mit_timeout(ms: u64) -> RoutingConfig {
    RoutingConfig {
        bt_audio_connect_timeout_ms: ms,
        ..Default::default()
    }
}

#[test]
fn zustand_ist_sofort_nach_start_lesbar() {
    let hw = MockHardware::neu();
    hw.headset(true);
    let r = router(&hw, RoutingConfig::default(), None);

    let zustand = r.current_state();
    assert_eq!(zustand.route(), RouteKind::WiredHeadset);
    assert_eq!(
        zustand.supported_routes(),
        RouteMask::of(&[RouteKind::Speaker, RouteKind::WiredHeadset])
    );
    assert!(!r.is_active());
}

#[test]
fn ungueltiger_anfangszustand_wird_abgelehnt() {
    let hw = MockHardware::neu();
    let ohne_route = CallAudioState::simple(
        false,
        RouteKind::Bluetooth,
        RouteMask::of(&[RouteKind::Earpiece]),
    );
    let ergebnis = CallAudioRouter::initialize(
        RoutingConfig::default(),
        kollaborateure(&hw),
        Some(ohne_route),
    );
    assert!(matches!(
        ergebnis,
        Err(RoutingError::UngueltigerAnfangszustand(_))
    ));

    let streaming = CallAudioState::simple(
        false,
        RouteKind::Streaming,
        RouteMask::of(&[RouteKind::Streaming]),
    );
    let ergebnis = CallAudioRouter::initialize(
        RoutingConfig::default(),
        kollaborateure(&hw),
        Some(streaming),
    );
    assert!(matches!(
        ergebnis,
        Err(RoutingError::UngueltigerAnfangszustand(_))
    ));
}

#[test]
fn ungueltige_konfiguration_wird_abgelehnt() {
    let hw = MockHardware::neu();
    let config = RoutingConfig {
        event_queue_capacity: 0,
        ..Default::default()
    };
    let ergebnis = CallAudioRouter::initialize(config, kollaborateure(&hw), None);
    assert!(matches!(ergebnis, Err(RoutingError::Konfiguration(_))));
}

#[test]
fn internes_ereignis_wird_abgelehnt() {
    let hw = MockHardware::neu();
    let r = router(&hw, RoutingConfig::default(), None);
    let ergebnis = r.enqueue(RouteEvent::BtAudioTimeout, None);
    assert!(matches!(ergebnis, Err(RoutingError::Intern(_))));
}

#[test]
fn nach_shutdown_wird_nichts_mehr_angenommen() {
    let hw = MockHardware::neu();
    let r = router(&hw, RoutingConfig::default(), None);
    let handle = r.handle();

    r.enqueue(aktiv(), None).unwrap();
    r.shutdown();
    // Bereits eingereihte Ereignisse werden noch verarbeitet
    assert!(r.is_active());

    assert!(matches!(
        r.enqueue(RouteEvent::ToggleMute, None),
        Err(RoutingError::BereitsBeendet)
    ));
    assert!(matches!(
        handle.enqueue(RouteEvent::ToggleMute, None),
        Err(RoutingError::BereitsBeendet)
    ));
    assert!(matches!(r.wait_idle(), Err(RoutingError::BereitsBeendet)));
    assert!(handle.is_closed());

    // Zweiter Aufruf ist wirkungslos
    r.shutdown();
}

#[test]
fn bluetooth_timeout_faellt_auf_basis_route_zurueck() {
    let hw = MockHardware::neu();
    hw.bluetooth(&["D1"], None);
    let r = router(&hw, mit_timeout(30), None);

    r.enqueue(aktiv(), None).unwrap();
    r.wait_idle().unwrap();
    assert_eq!(r.current_state().route(), RouteKind::Bluetooth);
    assert_eq!(hw.aufrufe(), vec!["bt_verbinden:D1"]);
    assert_eq!(r.metrics().deferred_pending.get(), 1);

    thread::sleep(Duration::from_millis(200));
    r.wait_idle().unwrap();

    let zustand = r.current_state();
    assert_eq!(zustand.route(), RouteKind::Earpiece);
    assert!(zustand.supported_routes().contains(RouteKind::Bluetooth));
    assert!(hw.aufrufe().contains(&"bt_trennen".to_string()));
    assert_eq!(
        r.metrics()
            .events_total
            .with_label_values(&["bt_audio_timeout"])
            .get(),
        1
    );
    assert_eq!(r.metrics().deferred_pending.get(), 0);
}

#[test]
fn bluetooth_verbindung_bricht_timeout_ab() {
    let hw = MockHardware::neu();
    hw.bluetooth(&["D1"], None);
    let r = router(&hw, mit_timeout(50), None);

    r.enqueue(aktiv(), None).unwrap();
    r.wait_idle().unwrap();

    hw.bluetooth(&["D1"], Some("D1"));
    r.enqueue(
        RouteEvent::BtAudioConnected {
            device: Some(d("D1")),
        },
        None,
    )
    .unwrap();
    r.wait_idle().unwrap();
    assert_eq!(r.metrics().deferred_pending.get(), 0);

    thread::sleep(Duration::from_millis(150));
    r.wait_idle().unwrap();

    assert_eq!(r.published().tag, RouteTag::Active(BaseRoute::Bluetooth));
    assert_eq!(r.current_state().active_bluetooth_device(), Some(&d("D1")));
    assert_eq!(
        r.metrics()
            .events_total
            .with_label_values(&["bt_audio_timeout"])
            .get(),
        0
    );
}

#[test]
fn shutdown_verwirft_eingeplante_timer() {
    let hw = MockHardware::neu();
    hw.bluetooth(&["D1"], None);
    let r = router(&hw, mit_timeout(60_000), None);

    r.enqueue(aktiv(), None).unwrap();
    r.wait_idle().unwrap();
    assert_eq!(r.metrics().deferred_pending.get(), 1);

    r.shutdown();
    assert_eq!(r.metrics().deferred_pending.get(), 0);
}

/// Ereignisquelle, die den Sink fuer spaetere Meldungen aufbewahrt
#[derive(Default)]
struct TestQuelle {
    sink: Mutex<Option<Arc<dyn EventSink>>>,
}

impl TestQuelle {
    fn melden(&self, event: RouteEvent) {
        let sink = self.sink.lock().clone().expect("nicht abonniert");
        sink.deliver(event, None).unwrap();
    }
}

impl EventSource for TestQuelle {
    fn name(&self) -> &str {
        "test"
    }

    fn subscribe(&self, sink: Arc<dyn EventSink>) {
        *self.sink.lock() = Some(sink);
    }
}

#[test]
fn ereignisquelle_speist_warteschlange() {
    let hw = MockHardware::neu();
    let r = router(&hw, RoutingConfig::default(), None);
    let quelle = TestQuelle::default();
    r.subscribe(&quelle);

    hw.headset(true);
    quelle.melden(RouteEvent::WiredHeadsetConnected);
    r.wait_idle().unwrap();

    assert_eq!(r.current_state().route(), RouteKind::WiredHeadset);
}

#[test]
fn parallele_aufrufer_werden_serialisiert() {
    let hw = MockHardware::neu();
    let r = router(&hw, RoutingConfig::default(), None);

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let handle = r.handle();
            thread::spawn(move || {
                for _ in 0..50 {
                    handle.enqueue(RouteEvent::ToggleMute, None).unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }
    r.wait_idle().unwrap();

    assert!(!r.current_state().muted());
    assert_eq!(hw.aenderungen().len(), 200);
    assert_eq!(r.metrics().published_states_total.get(), 200);
}

#[test]
fn legacy_schalter_fuer_lautsprecher() {
    let hw = MockHardware::neu();
    let config = RoutingConfig {
        use_communication_device_api: false,
        ..Default::default()
    };
    let r = router(&hw, config, None);

    r.enqueue(aktiv(), None).unwrap();
    r.enqueue(
        RouteEvent::SwitchToRoute {
            route: RouteKind::Speaker,
            device: None,
        },
        None,
    )
    .unwrap();
    r.enqueue(
        RouteEvent::SwitchToRoute {
            route: RouteKind::Earpiece,
            device: None,
        },
        None,
    )
    .unwrap();
    r.wait_idle().unwrap();

    assert_eq!(hw.aufrufe(), vec!["lautsprecher:true", "lautsprecher:false"]);
}

#[test]
fn metriken_werden_exportiert() {
    let hw = MockHardware::neu();
    let r = router(&hw, RoutingConfig::default(), None);
    r.enqueue(aktiv(), None).unwrap();
    r.wait_idle().unwrap();

    let text = r.metrics().exportieren().unwrap();
    assert!(text.contains("callroute_events_total"));
    assert!(text.contains("switch_focus"));
    assert!(text.contains("callroute_route_transitions_total"));
}
