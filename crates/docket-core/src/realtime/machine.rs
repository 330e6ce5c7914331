//! Connection lifecycle state machine.
//!
//! Pure and synchronous: the async driver in `client` feeds it transport
//! outcomes and performs whatever [`Action`] it returns. Keeping the
//! transitions here makes reconnect sequencing testable without sockets or
//! timers.

use std::time::Duration;

use super::BackoffPolicy;
use crate::state::ConnectionState;

/// Close code for an intentional shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code reported when a close frame carries no status.
pub const NO_STATUS_RECEIVED: u16 = 1005;
/// Close code for a dropped connection or failed connect.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Identifies one scheduled reconnect timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Work the driver must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do.
    Idle,
    /// Open a new transport connection.
    Connect,
    /// Arm `timer` to fire after `delay`, cancelling `replaces` first.
    ScheduleReconnect {
        timer: TimerId,
        delay: Duration,
        replaces: Option<TimerId>,
    },
    /// Stop for good: cancel the pending timer and close any open transport
    /// with [`NORMAL_CLOSURE`].
    Shutdown {
        cancel: Option<TimerId>,
        close_transport: bool,
    },
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    policy: BackoffPolicy,
    state: ConnectionState,
    attempt: u32,
    pending_timer: Option<TimerId>,
    next_timer: u64,
    terminated: bool,
}

impl ConnectionMachine {
    pub const fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            attempt: 0,
            pending_timer: None,
            next_timer: 0,
            terminated: false,
        }
    }

    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive abnormal closures since the last successful open.
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    pub const fn pending_timer(&self) -> Option<TimerId> {
        self.pending_timer
    }

    /// Whether an intentional close ended this connection for good.
    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Begin connecting. A no-op while connecting, connected, waiting on a
    /// reconnect timer, or after termination.
    pub fn start(&mut self) -> Action {
        if self.terminated
            || self.pending_timer.is_some()
            || self.state != ConnectionState::Disconnected
        {
            return Action::Idle;
        }
        self.state = ConnectionState::Connecting;
        Action::Connect
    }

    /// The transport finished its handshake.
    pub fn opened(&mut self) -> Action {
        if self.state != ConnectionState::Connecting {
            return Action::Idle;
        }
        self.state = ConnectionState::Connected;
        self.attempt = 0;
        Action::Idle
    }

    /// Establishing the transport failed.
    pub fn connect_failed(&mut self) -> Action {
        self.closed(ABNORMAL_CLOSURE)
    }

    /// The transport closed with `code`.
    ///
    /// A normal closure is terminal and moves to `Closing`; the owner
    /// reports the final `closed` once the transport is gone. Any other
    /// code schedules a reconnect after `policy.delay(attempt)` and bumps
    /// the attempt counter.
    pub fn closed(&mut self, code: u16) -> Action {
        match self.state {
            ConnectionState::Closing => {
                self.state = ConnectionState::Disconnected;
                Action::Idle
            }
            ConnectionState::Connecting | ConnectionState::Connected
                if code == NORMAL_CLOSURE =>
            {
                self.state = ConnectionState::Closing;
                self.terminated = true;
                Action::Shutdown {
                    cancel: self.pending_timer.take(),
                    close_transport: false,
                }
            }
            ConnectionState::Connecting | ConnectionState::Connected => {
                self.state = ConnectionState::Disconnected;
                self.schedule_reconnect()
            }
            ConnectionState::Disconnected => Action::Idle,
        }
    }

    /// A reconnect timer fired. Stale timers are ignored.
    pub fn timer_fired(&mut self, timer: TimerId) -> Action {
        if self.terminated || self.pending_timer != Some(timer) {
            return Action::Idle;
        }
        self.pending_timer = None;
        self.state = ConnectionState::Connecting;
        Action::Connect
    }

    /// Intentional shutdown requested by the owner.
    pub fn stop(&mut self) -> Action {
        self.terminated = true;
        let cancel = self.pending_timer.take();
        let close_transport = matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        );
        self.state = if close_transport {
            ConnectionState::Closing
        } else {
            ConnectionState::Disconnected
        };
        Action::Shutdown {
            cancel,
            close_transport,
        }
    }

    fn schedule_reconnect(&mut self) -> Action {
        let delay = self.policy.delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        let timer = TimerId(self.next_timer);
        self.next_timer += 1;
        let replaces = self.pending_timer.replace(timer);
        Action::ScheduleReconnect {
            timer,
            delay,
            replaces,
        }
    }
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn expect_schedule(action: Action) -> (TimerId, Duration, Option<TimerId>) {
        match action {
            Action::ScheduleReconnect {
                timer,
                delay,
                replaces,
            } => (timer, delay, replaces),
            other => panic!("expected reconnect schedule, got {other:?}"),
        }
    }

    #[test]
    fn start_is_idempotent() {
        let mut machine = ConnectionMachine::default();
        assert_eq!(machine.start(), Action::Connect);
        assert_eq!(machine.state(), ConnectionState::Connecting);
        assert_eq!(machine.start(), Action::Idle);

        machine.opened();
        assert_eq!(machine.state(), ConnectionState::Connected);
        assert_eq!(machine.start(), Action::Idle);
    }

    #[test]
    fn consecutive_abnormal_closures_back_off() {
        let mut machine = ConnectionMachine::default();
        assert_eq!(machine.start(), Action::Connect);

        let mut delays = Vec::new();
        for _ in 0..3 {
            let (timer, delay, replaces) = expect_schedule(machine.closed(ABNORMAL_CLOSURE));
            assert_eq!(replaces, None);
            assert_eq!(machine.pending_timer(), Some(timer));
            assert_eq!(machine.state(), ConnectionState::Disconnected);
            delays.push(delay.as_millis());

            assert_eq!(machine.timer_fired(timer), Action::Connect);
            assert_eq!(machine.pending_timer(), None);
            assert_eq!(machine.state(), ConnectionState::Connecting);
        }

        assert_eq!(delays, vec![1_000, 2_000, 4_000]);
        assert_eq!(machine.attempt(), 3);
    }

    #[test]
    fn successful_open_resets_attempts() {
        let mut machine = ConnectionMachine::default();
        machine.start();

        let (timer, _, _) = expect_schedule(machine.connect_failed());
        machine.timer_fired(timer);
        let (timer, delay, _) = expect_schedule(machine.closed(ABNORMAL_CLOSURE));
        assert_eq!(delay, Duration::from_secs(2));

        machine.timer_fired(timer);
        machine.opened();
        assert_eq!(machine.attempt(), 0);

        let (_, delay, _) = expect_schedule(machine.closed(ABNORMAL_CLOSURE));
        assert_eq!(delay, Duration::from_secs(1));
    }

    #[test]
    fn new_schedule_replaces_pending_timer() {
        let mut machine = ConnectionMachine::default();
        machine.start();
        let (first, _, _) = expect_schedule(machine.connect_failed());

        // A late close report for a connection that was already counted.
        machine.state = ConnectionState::Connecting;
        let (second, _, replaces) = expect_schedule(machine.connect_failed());

        assert_eq!(replaces, Some(first));
        assert_eq!(machine.pending_timer(), Some(second));
        assert_eq!(machine.timer_fired(first), Action::Idle);
        assert_eq!(machine.timer_fired(second), Action::Connect);
    }

    #[test]
    fn normal_closure_is_terminal() {
        let mut machine = ConnectionMachine::default();
        machine.start();
        machine.opened();

        assert_eq!(
            machine.closed(NORMAL_CLOSURE),
            Action::Shutdown {
                cancel: None,
                close_transport: false,
            }
        );
        assert!(machine.is_terminated());
        assert_eq!(machine.state(), ConnectionState::Closing);
        assert_eq!(machine.start(), Action::Idle);

        assert_eq!(machine.closed(NORMAL_CLOSURE), Action::Idle);
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        assert_eq!(machine.start(), Action::Idle);
    }

    #[test]
    fn stop_during_handshake_closes_transport() {
        let mut machine = ConnectionMachine::default();
        machine.start();

        assert_eq!(
            machine.stop(),
            Action::Shutdown {
                cancel: None,
                close_transport: true,
            }
        );
        assert_eq!(machine.state(), ConnectionState::Closing);
        assert_eq!(machine.closed(NORMAL_CLOSURE), Action::Idle);
        assert_eq!(machine.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn no_status_close_reconnects() {
        let mut machine = ConnectionMachine::default();
        machine.start();
        machine.opened();
        expect_schedule(machine.closed(NO_STATUS_RECEIVED));
        assert!(!machine.is_terminated());
    }

    #[test]
    fn stop_while_connected_closes_transport() {
        let mut machine = ConnectionMachine::default();
        machine.start();
        machine.opened();

        assert_eq!(
            machine.stop(),
            Action::Shutdown {
                cancel: None,
                close_transport: true,
            }
        );
        assert_eq!(machine.state(), ConnectionState::Closing);

        assert_eq!(machine.closed(NORMAL_CLOSURE), Action::Idle);
        assert_eq!(machine.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn stop_cancels_pending_reconnect() {
        let mut machine = ConnectionMachine::default();
        machine.start();
        let (timer, _, _) = expect_schedule(machine.connect_failed());

        assert_eq!(
            machine.stop(),
            Action::Shutdown {
                cancel: Some(timer),
                close_transport: false,
            }
        );
        assert_eq!(machine.pending_timer(), None);
        assert_eq!(machine.timer_fired(timer), Action::Idle);
        assert_eq!(machine.start(), Action::Idle);
    }

    #[test]
    fn start_while_reconnect_pending_is_noop() {
        let mut machine = ConnectionMachine::default();
        machine.start();
        let (timer, _, _) = expect_schedule(machine.connect_failed());

        assert_eq!(machine.start(), Action::Idle);
        assert_eq!(machine.pending_timer(), Some(timer));
    }

    #[test]
    fn attempts_are_unbounded() {
        let mut machine = ConnectionMachine::default();
        machine.start();
        for _ in 0..50 {
            let (timer, delay, _) = expect_schedule(machine.connect_failed());
            assert!(delay <= Duration::from_secs(30));
            assert_eq!(machine.timer_fired(timer), Action::Connect);
        }
        assert_eq!(machine.attempt(), 50);
    }
}
