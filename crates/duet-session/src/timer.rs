//! Shared timer state machine.
//!
//! The timer is a pure state machine: operations return the effects
//! (payloads to send, notifications to raise) instead of performing
//! I/O, so every transition is testable without a transport.
//!
//! Authority model: the host's countdown is the source of truth. A
//! guest that joined through a share link is `locked` — it may still
//! start and pause, but cannot change the session length — and shows
//! the host's ticks through a display-only overlay instead of racing
//! its own clock against the host's.

use std::time::Duration;

use pulse_core::Payload;
use tracing::{debug, trace};

pub const TIMES_UP_MESSAGE: &str = "Time's up!";

/// Configuration for a session's timer.
#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// Countdown length in seconds. Must be positive.
    pub length_seconds: u32,
    /// Hold duration at or above which a press on the main control is
    /// a reset rather than a toggle.
    pub long_press: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            length_seconds: 25 * 60,
            long_press: Duration::from_millis(600),
        }
    }
}

/// Countdown phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No countdown started (or reset).
    Idle,
    Running,
    Paused,
    /// Remaining reached 0. Only `reset` leaves this phase.
    Expired,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEffect {
    /// Send a payload on the open channel.
    Send(Payload),
    /// Raise a local notification.
    Notify(String),
}

/// The countdown, lock flag, and remote-display overlay.
#[derive(Debug)]
pub struct Timer {
    config: TimerConfig,
    phase: Phase,
    remaining_seconds: u32,
    locked: bool,
    /// Display-only value from inbound ticks. Never feeds back into
    /// `remaining_seconds`.
    overlay: Option<u32>,
}

impl Timer {
    pub fn new(config: TimerConfig) -> Self {
        let remaining_seconds = config.length_seconds;
        Self {
            config,
            phase: Phase::Idle,
            remaining_seconds,
            locked: false,
            overlay: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn length_seconds(&self) -> u32 {
        self.config.length_seconds
    }

    pub fn overlay(&self) -> Option<u32> {
        self.overlay
    }

    /// Value the UI should show: the remote overlay when present,
    /// otherwise the local countdown.
    pub fn display_seconds(&self) -> u32 {
        self.overlay.unwrap_or(self.remaining_seconds)
    }

    /// Hold threshold for the main control.
    pub fn long_press(&self) -> Duration {
        self.config.long_press
    }

    /// Mark this session as the initiator of a remote connection.
    /// One-way for the lifetime of the session.
    pub fn lock(&mut self) {
        if !self.locked {
            debug!("session locked: length is now fixed");
            self.locked = true;
        }
    }

    /// Flip between running and not. No effect while expired; the
    /// countdown must be reset first.
    pub fn toggle(&mut self) {
        self.phase = match self.phase {
            Phase::Idle | Phase::Paused => Phase::Running,
            Phase::Running => Phase::Paused,
            Phase::Expired => {
                trace!("toggle while expired ignored");
                Phase::Expired
            }
        };
    }

    /// Restore the full length and stop. Reachable both from the
    /// explicit action and from a long press on the main control.
    pub fn reset(&mut self) {
        self.remaining_seconds = self.config.length_seconds;
        self.phase = Phase::Idle;
    }

    /// Change the session length and reset the countdown to match.
    ///
    /// A no-op when locked (guests cannot resize a joined session) or
    /// when `seconds` is zero.
    pub fn set_length(&mut self, seconds: u32) {
        if self.locked {
            debug!(seconds, "set_length while locked ignored");
            return;
        }
        if seconds == 0 {
            debug!("zero-length timer rejected");
            return;
        }
        self.config.length_seconds = seconds;
        self.remaining_seconds = seconds;
    }

    /// One elapsed second while running.
    ///
    /// Decrements the countdown, clamped at 0. Reaching 0 enters
    /// `Expired` exactly once and emits one time's-up broadcast.
    /// A tick payload with the new value is always emitted while a
    /// channel is open — including when the value did not change — so
    /// a freshly connected remote converges promptly.
    pub fn on_local_tick(&mut self, channel_open: bool) -> Vec<TimerEffect> {
        if self.phase != Phase::Running {
            trace!(phase = ?self.phase, "tick outside running ignored");
            return Vec::new();
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);

        let mut effects = Vec::new();
        if channel_open {
            effects.push(TimerEffect::Send(Payload::Tick {
                seconds: self.remaining_seconds,
            }));
        }
        if self.remaining_seconds == 0 {
            self.phase = Phase::Expired;
            if channel_open {
                effects.push(TimerEffect::Send(Payload::Chat {
                    text: TIMES_UP_MESSAGE.to_string(),
                }));
            }
            effects.push(TimerEffect::Notify(TIMES_UP_MESSAGE.to_string()));
        }
        effects
    }

    /// One payload received from the remote peer.
    ///
    /// `tick` updates the overlay only; local timer state is never
    /// mutated by remote messages. `chat` raises a notification.
    pub fn on_remote_message(&mut self, payload: Payload) -> Vec<TimerEffect> {
        match payload {
            Payload::Tick { seconds } => {
                self.overlay = Some(seconds);
                Vec::new()
            }
            Payload::Chat { text } => vec![TimerEffect::Notify(text)],
        }
    }

    /// The channel closed: fall back to showing the local countdown.
    /// Idempotent.
    pub fn on_connection_closed(&mut self) {
        self.overlay = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_timer(length: u32) -> Timer {
        Timer::new(TimerConfig {
            length_seconds: length,
            ..TimerConfig::default()
        })
    }

    fn run_timer(length: u32) -> Timer {
        let mut timer = short_timer(length);
        timer.toggle();
        timer
    }

    #[test]
    fn ticks_decrement_by_one() {
        let mut timer = run_timer(3);
        timer.on_local_tick(false);
        assert_eq!(timer.remaining_seconds(), 2);
        timer.on_local_tick(false);
        assert_eq!(timer.remaining_seconds(), 1);
    }

    #[test]
    fn remaining_never_goes_below_zero() {
        let mut timer = run_timer(1);
        timer.on_local_tick(false);
        assert_eq!(timer.remaining_seconds(), 0);
        // Expired stops the countdown; even a stray tick cannot
        // underflow.
        timer.on_local_tick(false);
        assert_eq!(timer.remaining_seconds(), 0);
    }

    #[test]
    fn expiry_happens_exactly_once_with_one_broadcast() {
        let mut timer = run_timer(2);
        assert!(timer.on_local_tick(true).iter().all(|effect| matches!(
            effect,
            TimerEffect::Send(Payload::Tick { .. })
        )));

        let effects = timer.on_local_tick(true);
        assert_eq!(timer.phase(), Phase::Expired);
        assert_eq!(
            effects,
            vec![
                TimerEffect::Send(Payload::Tick { seconds: 0 }),
                TimerEffect::Send(Payload::Chat {
                    text: TIMES_UP_MESSAGE.to_string()
                }),
                TimerEffect::Notify(TIMES_UP_MESSAGE.to_string()),
            ]
        );

        // No further ticks, no second broadcast.
        assert!(timer.on_local_tick(true).is_empty());
    }

    #[test]
    fn tick_payload_emitted_only_while_channel_open() {
        let mut timer = run_timer(10);
        assert!(timer.on_local_tick(false).is_empty());
        assert_eq!(
            timer.on_local_tick(true),
            vec![TimerEffect::Send(Payload::Tick { seconds: 8 })]
        );
    }

    #[test]
    fn toggle_cycles_idle_running_paused() {
        let mut timer = short_timer(5);
        assert_eq!(timer.phase(), Phase::Idle);
        timer.toggle();
        assert_eq!(timer.phase(), Phase::Running);
        timer.toggle();
        assert_eq!(timer.phase(), Phase::Paused);
        timer.toggle();
        assert_eq!(timer.phase(), Phase::Running);
    }

    #[test]
    fn toggle_has_no_effect_while_expired() {
        let mut timer = run_timer(1);
        timer.on_local_tick(false);
        assert_eq!(timer.phase(), Phase::Expired);
        timer.toggle();
        assert_eq!(timer.phase(), Phase::Expired);
    }

    #[test]
    fn reset_leaves_expired_and_restores_length() {
        let mut timer = run_timer(1);
        timer.on_local_tick(false);
        timer.reset();
        assert_eq!(timer.phase(), Phase::Idle);
        assert_eq!(timer.remaining_seconds(), 1);
        // Usable again after reset.
        timer.toggle();
        assert_eq!(timer.phase(), Phase::Running);
    }

    #[test]
    fn set_length_updates_length_and_remaining_when_unlocked() {
        let mut timer = short_timer(10);
        timer.set_length(3);
        assert_eq!(timer.length_seconds(), 3);
        assert_eq!(timer.remaining_seconds(), 3);
    }

    #[test]
    fn set_length_is_a_noop_when_locked() {
        let mut timer = short_timer(10);
        timer.lock();
        timer.set_length(3);
        assert_eq!(timer.length_seconds(), 10);
        assert_eq!(timer.remaining_seconds(), 10);
    }

    #[test]
    fn set_length_rejects_zero() {
        let mut timer = short_timer(10);
        timer.set_length(0);
        assert_eq!(timer.length_seconds(), 10);
    }

    #[test]
    fn lock_is_one_way() {
        let mut timer = short_timer(10);
        timer.lock();
        timer.lock();
        assert!(timer.is_locked());
    }

    #[test]
    fn remote_tick_sets_overlay_without_touching_local_state() {
        let mut timer = run_timer(10);
        let effects = timer.on_remote_message(Payload::Tick { seconds: 42 });
        assert!(effects.is_empty());
        assert_eq!(timer.overlay(), Some(42));
        assert_eq!(timer.display_seconds(), 42);
        assert_eq!(timer.remaining_seconds(), 10);
        assert_eq!(timer.phase(), Phase::Running);
    }

    #[test]
    fn remote_chat_raises_a_notification() {
        let mut timer = short_timer(10);
        assert_eq!(
            timer.on_remote_message(Payload::Chat {
                text: "Ping".to_string()
            }),
            vec![TimerEffect::Notify("Ping".to_string())]
        );
    }

    #[test]
    fn connection_closed_is_idempotent() {
        let mut timer = short_timer(10);
        timer.on_remote_message(Payload::Tick { seconds: 7 });
        timer.on_connection_closed();
        assert_eq!(timer.display_seconds(), 10);
        timer.on_connection_closed();
        assert_eq!(timer.display_seconds(), 10);
        assert_eq!(timer.overlay(), None);
    }
}
