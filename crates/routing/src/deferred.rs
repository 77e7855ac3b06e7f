//! Verzoegerte interne Ereignisse
//!
//! Der Automat plant Timer nur als Effekt ein; der Worker haelt sie in
//! dieser Warteschlange und wartet per `select!` auf die naechste Deadline.
//! Pro [`TimerKind`] ist hoechstens ein Timer eingeplant.

use std::time::{Duration, Instant};

use callroute_core::RouteEvent;

/// Art eines verzoegerten Ereignisses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Pruefung, ob Bluetooth-Audio nach der Anforderung tatsaechlich steht
    BluetoothAudioLiveness,
}

impl TimerKind {
    /// Ereignis, das bei Ablauf eingespeist wird
    pub fn event(self) -> RouteEvent {
        match self {
            Self::BluetoothAudioLiveness => RouteEvent::BtAudioTimeout,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::BluetoothAudioLiveness => "bt_audio_liveness",
        }
    }
}

#[derive(Debug)]
struct Eintrag {
    timer: TimerKind,
    faellig: Instant,
}

/// Eingeplante Timer des Workers
#[derive(Debug, Default)]
pub struct DeferredQueue {
    eintraege: Vec<Eintrag>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plant einen Timer ein; ein bestehender Timer derselben Art wird ersetzt
    pub fn schedule(&mut self, timer: TimerKind, after: Duration, now: Instant) {
        self.cancel(timer);
        self.eintraege.push(Eintrag {
            timer,
            faellig: now + after,
        });
    }

    /// Entfernt einen Timer; `true`, wenn einer eingeplant war
    pub fn cancel(&mut self, timer: TimerKind) -> bool {
        let vorher = self.eintraege.len();
        self.eintraege.retain(|e| e.timer != timer);
        self.eintraege.len() != vorher
    }

    pub fn is_scheduled(&self, timer: TimerKind) -> bool {
        self.eintraege.iter().any(|e| e.timer == timer)
    }

    /// Frueheste Deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.eintraege.iter().map(|e| e.faellig).min()
    }

    /// Entnimmt alle bis `now` faelligen Timer in Deadline-Reihenfolge
    pub fn take_due(&mut self, now: Instant) -> Vec<TimerKind> {
        let mut faellig: Vec<Eintrag> = Vec::new();
        let mut i = 0;
        while i < self.eintraege.len() {
            if self.eintraege[i].faellig <= now {
                faellig.push(self.eintraege.swap_remove(i));
            } else {
                i += 1;
            }
        }
        faellig.sort_by_key(|e| e.faellig);
        faellig.into_iter().map(|e| e.timer).collect()
    }

    pub fn len(&self) -> usize {
        self.eintraege.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eintraege.is_empty()
    }

    /// Verwirft alle Timer (Shutdown)
    pub fn clear(&mut self) {
        self.eintraege.clear();
    }
}
