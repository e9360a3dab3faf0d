//! Captioning mode state machine.
//!
//! A single ON/OFF gate controls whether captured audio is processed at all.
//! Transitions notify every registered observer synchronously before the
//! mutator returns; observers must not block. Idempotent operations do not
//! notify.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Captioning mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeState {
    Off,
    On,
}

impl ModeState {
    /// True when captioning is active.
    pub fn is_on(self) -> bool {
        self == ModeState::On
    }

    /// Lowercase name for status reporting.
    pub fn as_str(self) -> &'static str {
        match self {
            ModeState::Off => "off",
            ModeState::On => "on",
        }
    }
}

/// Listener for mode transitions.
pub trait ModeObserver: Send {
    /// Called synchronously with the new state on every real transition.
    fn on_change(&self, state: ModeState);
}

/// Observer mirroring the mode into a shared flag, for status queries from
/// other threads.
pub struct FlagObserver {
    flag: Arc<AtomicBool>,
}

impl FlagObserver {
    pub fn new(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }
}

impl ModeObserver for FlagObserver {
    fn on_change(&self, state: ModeState) {
        self.flag.store(state.is_on(), Ordering::SeqCst);
    }
}

/// Observer forwarding transitions over a channel (e.g. to a UI refresher).
pub struct ChannelObserver {
    tx: crossbeam_channel::Sender<ModeState>,
}

impl ChannelObserver {
    pub fn new(tx: crossbeam_channel::Sender<ModeState>) -> Self {
        Self { tx }
    }
}

impl ModeObserver for ChannelObserver {
    fn on_change(&self, state: ModeState) {
        // A full or disconnected channel must not stall the transition.
        let _ = self.tx.try_send(state);
    }
}

/// ON/OFF toggle state machine with an observer list.
pub struct ModeController {
    state: ModeState,
    observers: Vec<Box<dyn ModeObserver>>,
}

impl ModeController {
    /// Creates a controller in the OFF state.
    pub fn new() -> Self {
        Self {
            state: ModeState::Off,
            observers: Vec::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> ModeState {
        self.state
    }

    /// True when captioning is active.
    pub fn is_on(&self) -> bool {
        self.state.is_on()
    }

    /// Registers an observer. Observers are notified in registration order.
    pub fn register(&mut self, observer: Box<dyn ModeObserver>) {
        self.observers.push(observer);
    }

    /// Flips the state and returns the new state.
    pub fn toggle(&mut self) -> ModeState {
        self.state = match self.state {
            ModeState::Off => ModeState::On,
            ModeState::On => ModeState::Off,
        };
        self.notify(self.state);
        self.state
    }

    /// Turns captioning on. Returns the new state on a real transition,
    /// `None` when already on (no observer notification).
    pub fn turn_on(&mut self) -> Option<ModeState> {
        if self.state == ModeState::On {
            return None;
        }
        self.state = ModeState::On;
        self.notify(self.state);
        Some(self.state)
    }

    /// Turns captioning off. Returns the new state on a real transition,
    /// `None` when already off.
    pub fn turn_off(&mut self) -> Option<ModeState> {
        if self.state == ModeState::Off {
            return None;
        }
        self.state = ModeState::Off;
        self.notify(self.state);
        Some(self.state)
    }

    fn notify(&self, state: ModeState) {
        for observer in &self.observers {
            observer.on_change(state);
        }
    }
}

impl Default for ModeController {
    fn default() -> Self {
        Self::new()
    }
}
