//! CallAudioRouter – Worker-Thread und oeffentliche Schnittstelle
//!
//! Alle Ereignisse laufen ueber einen begrenzten crossbeam-Kanal in genau
//! einen Worker-Thread. Nur dieser Thread wertet den Automaten aus, fuehrt
//! Effekte aus und benachrichtigt Listener. Der veroeffentlichte Zustand
//! wird zusaetzlich in einem `RwLock` gespiegelt, damit `current_state()`
//! von beliebigen Threads gelesen werden kann.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use callroute_core::{
    CallAudioState, EventSink, EventSource, Result, RouteEvent, RoutedEvent, RoutingError,
    SessionToken,
};
use callroute_observability::RoutingMetrics;
use crossbeam_channel::{at, bounded, select, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, debug_span, error, info, warn};

use crate::collaborators::Collaborators;
use crate::config::RoutingConfig;
use crate::effects::EffectRunner;
use crate::machine::{transition, RouteModel, RouteTag, Transition};
use crate::view::HardwareView;

/// Kommandos an den Routing-Worker
#[derive(Debug)]
pub enum RouterCommand {
    Event(RoutedEvent),
    /// Antwortet, sobald alle vorher eingereihten Kommandos verarbeitet sind
    Barrier(Sender<()>),
    Shutdown,
}

/// Veroeffentlichter Zustand, lesbar von allen Threads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedState {
    pub state: CallAudioState,
    pub tag: RouteTag,
}

impl PublishedState {
    fn from_model(model: &RouteModel) -> Self {
        Self {
            state: model.state().clone(),
            tag: model.tag(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.tag.is_active()
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Klonbarer Zugang zur Ereignis-Warteschlange
#[derive(Clone)]
pub struct RouterHandle {
    tx: Sender<RouterCommand>,
    closed: Arc<AtomicBool>,
    capacity: usize,
}

impl RouterHandle {
    /// Reiht ein Ereignis ein und kehrt sofort zurueck
    pub fn enqueue(&self, event: RouteEvent, session: Option<SessionToken>) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RoutingError::BereitsBeendet);
        }
        if event.is_internal() {
            return Err(RoutingError::intern(format!(
                "{} wird nur intern eingeplant",
                event.name()
            )));
        }

        match self
            .tx
            .try_send(RouterCommand::Event(RoutedEvent::new(event, session)))
        {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(RoutingError::WarteschlangeVoll {
                kapazitaet: self.capacity,
            }),
            Err(TrySendError::Disconnected(_)) => {
                Err(RoutingError::WorkerGestoppt("Kanal geschlossen".into()))
            }
        }
    }

    /// Wartet, bis alle bisher eingereihten Ereignisse verarbeitet sind
    pub fn wait_idle(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RoutingError::BereitsBeendet);
        }
        let (ack_tx, ack_rx) = bounded(1);
        self.tx
            .send(RouterCommand::Barrier(ack_tx))
            .map_err(|e| RoutingError::WorkerGestoppt(e.to_string()))?;
        ack_rx
            .recv()
            .map_err(|e| RoutingError::WorkerGestoppt(e.to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl EventSink for RouterHandle {
    fn deliver(&self, event: RouteEvent, session: Option<SessionToken>) -> Result<()> {
        self.enqueue(event, session)
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Call-Audio-Router
///
/// Besitzt den Worker-Thread. `shutdown()` (auch beim Drop) verwirft
/// eingeplante Timer, verarbeitet bereits eingereihte Ereignisse und
/// wartet auf das Ende des Threads.
pub struct CallAudioRouter {
    handle: RouterHandle,
    shared: Arc<RwLock<PublishedState>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    metrics: RoutingMetrics,
}

impl CallAudioRouter {
    /// Erstellt den Router und startet den Worker
    ///
    /// Ohne `initial` wird der Anfangszustand aus der Hardware erkannt.
    pub fn initialize(
        config: RoutingConfig,
        collaborators: Collaborators,
        initial: Option<CallAudioState>,
    ) -> Result<Self> {
        config.validieren()?;
        let metrics = RoutingMetrics::neu()?;

        let view = HardwareView::sample(&collaborators);
        let model = match initial {
            Some(state) => RouteModel::from_state(state)?,
            None => RouteModel::detect(&view, &config),
        };
        info!(
            zustand = model.tag().name(),
            state = %model.state(),
            "Call-Audio-Router initialisiert"
        );

        let shared = Arc::new(RwLock::new(PublishedState::from_model(&model)));
        let (tx, rx) = bounded::<RouterCommand>(config.event_queue_capacity);
        let handle = RouterHandle {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
            capacity: config.event_queue_capacity,
        };

        let worker = Worker {
            runner: EffectRunner::new(&collaborators, &config, metrics.clone()),
            model,
            config,
            collaborators,
            shared: Arc::clone(&shared),
            metrics: metrics.clone(),
            rx,
        };
        let join = std::thread::Builder::new()
            .name("callroute-worker".to_string())
            .spawn(move || worker.run())
            .map_err(|e| RoutingError::WorkerGestoppt(e.to_string()))?;

        Ok(Self {
            handle,
            shared,
            worker: Mutex::new(Some(join)),
            metrics,
        })
    }

    pub fn enqueue(&self, event: RouteEvent, session: Option<SessionToken>) -> Result<()> {
        self.handle.enqueue(event, session)
    }

    /// Zuletzt veroeffentlichter Zustand
    pub fn current_state(&self) -> CallAudioState {
        self.shared.read().state.clone()
    }

    pub fn published(&self) -> PublishedState {
        self.shared.read().clone()
    }

    pub fn is_active(&self) -> bool {
        self.shared.read().is_active()
    }

    pub fn wait_idle(&self) -> Result<()> {
        self.handle.wait_idle()
    }

    pub fn handle(&self) -> RouterHandle {
        self.handle.clone()
    }

    /// Verbindet eine Ereignisquelle mit der Warteschlange
    pub fn subscribe(&self, source: &dyn EventSource) {
        info!(quelle = source.name(), "Ereignisquelle abonniert");
        source.subscribe(Arc::new(self.handle.clone()));
    }

    pub fn metrics(&self) -> &RoutingMetrics {
        &self.metrics
    }

    /// Faehrt den Worker herunter; weitere Aufrufe sind wirkungslos
    ///
    /// Darf nicht aus einem Listener-Callback aufgerufen werden.
    pub fn shutdown(&self) {
        if self.handle.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Call-Audio-Router wird heruntergefahren");
        if self.handle.tx.send(RouterCommand::Shutdown).is_err() {
            debug!("Worker bereits beendet");
        }
        if let Some(join) = self.worker.lock().take() {
            if join.join().is_err() {
                error!("Routing-Worker ist abgestuerzt");
            }
        }
    }
}

impl Drop for CallAudioRouter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

enum Weckruf {
    Kommando(Option<RouterCommand>),
    Timer,
}

struct Worker {
    model: RouteModel,
    config: RoutingConfig,
    collaborators: Collaborators,
    runner: EffectRunner,
    shared: Arc<RwLock<PublishedState>>,
    metrics: RoutingMetrics,
    rx: Receiver<RouterCommand>,
}

impl Worker {
    fn run(mut self) {
        debug!("Routing-Worker gestartet");

        loop {
            self.fire_due();

            let weckruf = match self.runner.deferred().next_deadline() {
                Some(deadline) => select! {
                    recv(self.rx) -> msg => Weckruf::Kommando(msg.ok()),
                    recv(at(deadline)) -> _ => Weckruf::Timer,
                },
                None => Weckruf::Kommando(self.rx.recv().ok()),
            };

            match weckruf {
                Weckruf::Timer => continue,
                Weckruf::Kommando(Some(RouterCommand::Event(routed))) => self.process(routed),
                Weckruf::Kommando(Some(RouterCommand::Barrier(ack))) => {
                    let _ = ack.send(());
                }
                Weckruf::Kommando(Some(RouterCommand::Shutdown)) => break,
                Weckruf::Kommando(None) => {
                    warn!("Router-Kanal geschlossen");
                    break;
                }
            }
        }

        let verworfen = self.runner.deferred().len();
        self.runner.deferred_mut().clear();
        self.metrics.deferred_pending.set(0);
        info!(verworfen, "Routing-Worker beendet");
    }

    fn fire_due(&mut self) {
        let faellig = self.runner.deferred_mut().take_due(Instant::now());
        for timer in faellig {
            debug!(timer = timer.name(), "Timer abgelaufen");
            self.process(RoutedEvent::new(timer.event(), None));
        }
    }

    fn process(&mut self, routed: RoutedEvent) {
        let RoutedEvent { event, session } = routed;
        let span = debug_span!("route_event", event = event.name(), session = ?session);
        let _enter = span.enter();

        self.metrics.event(event.name());
        let view = HardwareView::sample(&self.collaborators);
        let old = self.model.state().clone();
        let old_tag = self.model.tag();

        let Transition { model, effects } =
            transition(&self.model, &view, &event, &self.config);
        self.model = model;
        self.runner.run(&effects, Instant::now());

        if self.model.tag() != old_tag {
            self.metrics.transition(self.model.tag().name());
        }
        self.publish(&old);
    }

    /// Benachrichtigt Listener nach dem stabilisierten Uebergang
    fn publish(&self, old: &CallAudioState) {
        *self.shared.write() = PublishedState::from_model(&self.model);

        let new = self.model.state();
        if new == old {
            self.metrics.unchanged_states_total.inc();
            return;
        }

        info!(alt = %old, neu = %new, "CallAudioState geaendert");
        self.metrics.published_states_total.inc();
        self.collaborators.calls.on_call_audio_state_changed(old, new);
        for call in self.collaborators.calls.calls_to_notify() {
            debug!(call = %call.call_id(), "Gespraech benachrichtigt");
            call.on_call_audio_state_changed(new);
        }
    }
}
