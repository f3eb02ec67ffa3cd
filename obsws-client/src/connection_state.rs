//! Connection state machine
//!
//! Tracks the websocket lifecycle and lets any thread block until it changes.
//!
//! # Connection States
//!
//! - **Idle**: no connection and no attempt in flight
//! - **Connecting**: an attempt or a scheduled retry is in flight
//! - **Connected**: the websocket handshake completed
//! - **Running**: one service tick passed since the handshake; requests may flow
//! - **Terminated**: the client was shut down (terminal)
//!
//! # State Transitions
//!
//! ```text
//! Idle → Connecting → Connected → Running
//!   ↑        ↑  ↓          ↓         ↓
//!   └─(exhausted)── Connecting ←─────┘   (transport error or close)
//!
//! any → Terminated
//! ```
//!
//! # Waiting
//!
//! The current state lives in an atomic so reads never block. Writers store
//! the new value while holding a small mutex and then broadcast on a condition
//! variable; waiters re-check the value under the same mutex before sleeping.
//! A transition can therefore never slip between a reader's observation and
//! its wait.
//!
//! Every store also bumps an epoch counter. Callers that must not miss a
//! round trip such as `idle → connecting → idle` wait on the epoch they
//! observed rather than on the state value.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// Not connected, nothing scheduled
    Idle = 0,
    /// Attempting to connect, or waiting to retry
    Connecting = 1,
    /// Websocket established, not yet serving requests
    Connected = 2,
    /// Serving requests
    Running = 3,
    /// Shut down for good
    Terminated = 4,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ConnectionState::Idle,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Running,
            _ => ConnectionState::Terminated,
        }
    }

    /// Numeric value reported by the connection-state gauge
    pub fn as_gauge(&self) -> i64 {
        *self as u8 as i64
    }

    /// Check if a transport is established (connected or running)
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Running)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Running => "running",
            ConnectionState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Single source of truth for the connection lifecycle
#[derive(Debug)]
pub struct ConnectionStateMachine {
    state: AtomicU8,
    epoch: AtomicU64,
    lock: Mutex<()>,
    changed: Condvar,
}

impl ConnectionStateMachine {
    /// Create a state machine in the `Idle` state
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Idle as u8),
            epoch: AtomicU64::new(0),
            lock: Mutex::new(()),
            changed: Condvar::new(),
        }
    }

    /// Get the current connection state
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Check if the state machine reached its terminal state
    pub fn is_terminated(&self) -> bool {
        self.state() == ConnectionState::Terminated
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The mutex guards no data, so a poisoned lock is still usable
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move to `next` and wake every waiter
    ///
    /// Returns false, leaving the state untouched, once terminated.
    pub fn transition(&self, next: ConnectionState) -> bool {
        let _guard = self.guard();
        if self.is_terminated() {
            return false;
        }
        let prev = self.state.swap(next as u8, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_all();
        if prev != next as u8 {
            tracing::debug!(from = %ConnectionState::from_u8(prev), to = %next, "Connection state changed");
        }
        true
    }

    /// Move from `expected` to `next` only if the state is still `expected`
    pub fn compare_and_set(&self, expected: ConnectionState, next: ConnectionState) -> bool {
        let _guard = self.guard();
        let swapped = self
            .state
            .compare_exchange(expected as u8, next as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if swapped {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            self.changed.notify_all();
            tracing::debug!(from = %expected, to = %next, "Connection state changed");
        }
        swapped
    }

    /// Enter the terminal state and wake every waiter
    ///
    /// Returns true only for the call that performed the transition.
    pub fn terminate(&self) -> bool {
        let _guard = self.guard();
        let prev = self.state.swap(ConnectionState::Terminated as u8, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_all();
        prev != ConnectionState::Terminated as u8
    }

    /// Current state together with the epoch it was stored in
    pub fn snapshot(&self) -> (ConnectionState, u64) {
        let _guard = self.guard();
        (self.state(), self.epoch.load(Ordering::SeqCst))
    }

    /// Block until any transition happens after `epoch`, then return the state
    pub fn wait_epoch(&self, epoch: u64) -> ConnectionState {
        let mut guard = self.guard();
        while self.epoch.load(Ordering::SeqCst) == epoch {
            guard = self.changed.wait(guard).unwrap_or_else(|e| e.into_inner());
        }
        self.state()
    }

    /// Block until the state differs from `observed`, then return it
    pub fn wait_change(&self, observed: ConnectionState) -> ConnectionState {
        let mut guard = self.guard();
        while self.state() == observed {
            guard = self.changed.wait(guard).unwrap_or_else(|e| e.into_inner());
        }
        self.state()
    }

    /// Like [`wait_change`](Self::wait_change) but gives up after `timeout`
    ///
    /// Returns the state observed when the wait ended, which equals
    /// `observed` on timeout.
    pub fn wait_change_timeout(&self, observed: ConnectionState, timeout: Duration) -> ConnectionState {
        let deadline = Instant::now() + timeout;
        let mut guard = self.guard();
        while self.state() == observed {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            guard = self
                .changed
                .wait_timeout(guard, deadline - now)
                .map(|(g, _)| g)
                .unwrap_or_else(|e| e.into_inner().0);
        }
        self.state()
    }

    /// Block until `pred` holds for the current state or `timeout` elapses
    pub fn wait_for(&self, timeout: Duration, pred: impl Fn(ConnectionState) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let current = self.state();
            if pred(current) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.wait_change_timeout(current, deadline - now);
        }
    }
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_connection_state_transitions() {
        let machine = ConnectionStateMachine::new();
        assert_eq!(machine.state(), ConnectionState::Idle);

        assert!(machine.transition(ConnectionState::Connecting));
        assert_eq!(machine.state(), ConnectionState::Connecting);

        assert!(machine.transition(ConnectionState::Connected));
        assert!(machine.state().is_connected());

        assert!(machine.compare_and_set(ConnectionState::Connected, ConnectionState::Running));
        assert_eq!(machine.state(), ConnectionState::Running);

        // The debounce only fires from Connected
        assert!(!machine.compare_and_set(ConnectionState::Connected, ConnectionState::Running));

        assert!(machine.transition(ConnectionState::Connecting));
        assert!(machine.transition(ConnectionState::Idle));
        assert_eq!(machine.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_terminated_is_terminal() {
        let machine = ConnectionStateMachine::new();
        assert!(machine.terminate());
        assert!(!machine.terminate());

        assert!(!machine.transition(ConnectionState::Connecting));
        assert!(!machine.compare_and_set(ConnectionState::Terminated, ConnectionState::Idle));
        assert_eq!(machine.state(), ConnectionState::Terminated);
    }

    #[test]
    fn test_waiter_is_woken_by_transition() {
        let machine = Arc::new(ConnectionStateMachine::new());
        let waiter = {
            let machine = Arc::clone(&machine);
            thread::spawn(move || machine.wait_change(ConnectionState::Idle))
        };

        thread::sleep(Duration::from_millis(20));
        machine.transition(ConnectionState::Connecting);

        assert_eq!(waiter.join().unwrap(), ConnectionState::Connecting);
    }

    #[test]
    fn test_terminate_wakes_all_waiters() {
        let machine = Arc::new(ConnectionStateMachine::new());
        machine.transition(ConnectionState::Connecting);

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let machine = Arc::clone(&machine);
                thread::spawn(move || machine.wait_change(ConnectionState::Connecting))
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        machine.terminate();

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), ConnectionState::Terminated);
        }
    }

    #[test]
    fn test_wait_change_does_not_block_on_stale_observation() {
        let machine = ConnectionStateMachine::new();
        machine.transition(ConnectionState::Connecting);

        // The caller observed Idle before the transition; it must return at once
        assert_eq!(machine.wait_change(ConnectionState::Idle), ConnectionState::Connecting);
    }

    #[test]
    fn test_wait_epoch_sees_round_trip() {
        let machine = Arc::new(ConnectionStateMachine::new());
        let (state, epoch) = machine.snapshot();
        assert_eq!(state, ConnectionState::Idle);

        // idle → connecting → idle completes before the waiter starts
        machine.transition(ConnectionState::Connecting);
        machine.transition(ConnectionState::Idle);

        assert_eq!(machine.wait_epoch(epoch), ConnectionState::Idle);
        assert!(machine.snapshot().1 > epoch);
    }

    #[test]
    fn test_wait_change_timeout() {
        let machine = ConnectionStateMachine::new();
        let start = Instant::now();
        let state = machine.wait_change_timeout(ConnectionState::Idle, Duration::from_millis(30));

        assert_eq!(state, ConnectionState::Idle);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_for_predicate() {
        let machine = Arc::new(ConnectionStateMachine::new());
        let driver = {
            let machine = Arc::clone(&machine);
            thread::spawn(move || {
                for next in [
                    ConnectionState::Connecting,
                    ConnectionState::Connected,
                    ConnectionState::Running,
                ] {
                    thread::sleep(Duration::from_millis(5));
                    machine.transition(next);
                }
            })
        };

        assert!(machine.wait_for(Duration::from_secs(5), |s| s == ConnectionState::Running));
        driver.join().unwrap();
        assert!(!machine.wait_for(Duration::from_millis(10), |s| s == ConnectionState::Idle));
    }

    #[test]
    fn test_gauge_values() {
        assert_eq!(ConnectionState::Idle.as_gauge(), 0);
        assert_eq!(ConnectionState::Running.as_gauge(), 3);
        assert_eq!(ConnectionState::Terminated.as_gauge(), 4);
        assert_eq!(ConnectionState::Running.to_string(), "running");
    }
}
