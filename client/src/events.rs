//! Typed publish/subscribe hub shared by the connection and its consumers
//!
//! The channel is a plain value owned by the session and handed out as
//! `Rc<EventChannel>`; there is no global instance. Delivery is synchronous:
//! `emit` returns only after every matching handler has run.
//!
//! Ordering rules:
//! - handlers run in subscription order
//! - a handler unsubscribed mid-emission is not called later in that pass
//! - a handler subscribed mid-emission first sees the next emission
//! - an `emit` from inside a handler runs to completion before the outer
//!   pass continues; a handler is never re-entered, nested deliveries to a
//!   handler that is already running are skipped

use log::warn;
use shared::{AvailableCommand, Color, GamePhase, GameSnapshot, Pixel, Target};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    State,
    Sync,
    Update,
    Start,
    Stop,
    Joined,
    PlayerTurn,
    CommandSelected,
    TargetClicked,
    MoveSent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// Transport opened (`true`) or went away (`false`)
    Connect(bool),
    State(GamePhase),
    /// A snapshot was applied; carries the full new state
    Sync(GameSnapshot),
    /// A delta batch was applied; carries only the cells that changed
    Update { round: u64, changes: Vec<Pixel> },
    Start,
    Stop,
    Joined { player_id: String, color: Color },
    PlayerTurn(Vec<AvailableCommand>),
    CommandSelected(String),
    TargetClicked { x: u32, y: u32 },
    MoveSent { command: String, targets: Vec<Target> },
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::Connect(_) => EventKind::Connect,
            GameEvent::State(_) => EventKind::State,
            GameEvent::Sync(_) => EventKind::Sync,
            GameEvent::Update { .. } => EventKind::Update,
            GameEvent::Start => EventKind::Start,
            GameEvent::Stop => EventKind::Stop,
            GameEvent::Joined { .. } => EventKind::Joined,
            GameEvent::PlayerTurn(_) => EventKind::PlayerTurn,
            GameEvent::CommandSelected(_) => EventKind::CommandSelected,
            GameEvent::TargetClicked { .. } => EventKind::TargetClicked,
            GameEvent::MoveSent { .. } => EventKind::MoveSent,
        }
    }
}

/// Handle returned by [`EventChannel::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type Handler = Box<dyn FnMut(&GameEvent)>;

struct Listener {
    id: Subscription,
    kind: EventKind,
    active: Cell<bool>,
    handler: RefCell<Handler>,
}

#[derive(Default)]
pub struct EventChannel {
    listeners: RefCell<Vec<Rc<Listener>>>,
    next_id: Cell<u64>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: FnMut(&GameEvent) + 'static,
    {
        let id = Subscription(self.next_id.get());
        self.next_id.set(id.0 + 1);

        self.listeners.borrow_mut().push(Rc::new(Listener {
            id,
            kind,
            active: Cell::new(true),
            handler: RefCell::new(Box::new(handler)),
        }));

        id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        match listeners.iter().position(|l| l.id == subscription) {
            Some(index) => {
                let listener = listeners.remove(index);
                listener.active.set(false);
                true
            }
            None => false,
        }
    }

    pub fn unsubscribe_all<I>(&self, subscriptions: I)
    where
        I: IntoIterator<Item = Subscription>,
    {
        for subscription in subscriptions {
            self.unsubscribe(subscription);
        }
    }

    pub fn clear(&self) {
        for listener in self.listeners.borrow_mut().drain(..) {
            listener.active.set(false);
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|l| l.kind == kind)
            .count()
    }

    pub fn emit(&self, event: GameEvent) {
        let kind = event.kind();

        // Snapshot so handlers may subscribe/unsubscribe while we iterate
        let targets: Vec<Rc<Listener>> = self
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.kind == kind)
            .cloned()
            .collect();

        for listener in targets {
            if !listener.active.get() {
                continue;
            }

            match listener.handler.try_borrow_mut() {
                Ok(mut handler) => (*handler)(&event),
                Err(_) => warn!(
                    "Skipping re-entrant {:?} delivery to subscription {:?}",
                    kind, listener.id
                ),
            }
        }
    }
}
