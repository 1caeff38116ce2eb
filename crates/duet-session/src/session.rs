//! Per-session event loop.
//!
//! One logical timeline per session, advanced by three sources: the
//! one-second tick deadline, inbound transport events, and local
//! commands. The loop never blocks; every wait is a `select!` arm.
//!
//! The tick deadline is re-derived from the current instant on every
//! tick instead of reusing an interval handle. Reusing handles across
//! start/stop cycles is how duplicate timers and drift creep in.

use std::time::Duration;

use duet_common::{Capabilities, NotifyOutcome, NotifySurface, Permission};
use pulse_core::{share_link, Payload};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::manager::{ConnectionManager, ManagerEvent};
use crate::timer::{Phase, Timer, TimerConfig, TimerEffect};
use crate::transport::{PeerIdentity, Transport, TransportEvent};

const TICK: Duration = Duration::from_secs(1);

/// Bounded auto-connect policy for a session started from a share
/// link. Attempts begin only after the transport reports registration;
/// there is no fixed "wait and hope" delay before the first try.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL the share link is built on.
    pub base_url: String,
    pub timer: TimerConfig,
    /// What the host environment can do, resolved once at startup.
    pub capabilities: Capabilities,
    pub retry: RetryPolicy,
    /// Peer identity parsed from an incoming share link, if any.
    /// Present exactly when this session is the guest.
    pub target: Option<PeerIdentity>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://duet.invalid/".to_string(),
            timer: TimerConfig::default(),
            capabilities: Capabilities::none(),
            retry: RetryPolicy::default(),
            target: None,
        }
    }
}

/// Local user actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start/pause the countdown.
    Toggle,
    /// Stop and restore the full length.
    Reset,
    /// A press on the main control with its hold duration; classified
    /// into toggle or reset against the long-press threshold.
    Press { held: Duration },
    /// Change the session length (no-op for locked guests).
    Resize(u32),
    /// Send a free-text chat payload on the open channel.
    Ping(String),
    /// Close the current channel.
    Close,
    /// Leave the event loop.
    Shutdown,
}

/// Outward state changes, for drivers and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Identity issued; `share_link` is ready to publish.
    Registered {
        identity: PeerIdentity,
        share_link: String,
    },
    /// The channel opened.
    Connected,
    /// The channel closed. Emitted at most once per channel.
    Disconnected,
    /// What the UI should show now. `overlay` is true when the value
    /// mirrors the remote countdown rather than the local one.
    Display { seconds: u32, overlay: bool },
    /// The local countdown reached zero.
    Expired,
}

/// Handle returned by [`Session::spawn`].
pub struct SessionHandle {
    pub commands: mpsc::UnboundedSender<Command>,
    pub updates: mpsc::UnboundedReceiver<SessionUpdate>,
    pub task: tokio::task::JoinHandle<()>,
}

/// One browser-session-equivalent: a transport endpoint, a connection
/// manager, and a timer, driven by a single event loop.
pub struct Session<T: Transport> {
    config: SessionConfig,
    transport: T,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
    notify: Box<dyn NotifySurface>,
    manager: ConnectionManager,
    timer: Timer,
    /// True once this session has initiated an outbound connection;
    /// drives the one-way lock when that connection opens.
    initiated: bool,
    attempts_left: u32,
}

impl<T: Transport + 'static> Session<T> {
    /// Spawn a session onto the current runtime.
    pub fn spawn(
        config: SessionConfig,
        transport: T,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        notify: Box<dyn NotifySurface>,
    ) -> SessionHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let session = Session::new(config, transport, events, commands_rx, updates_tx, notify);
        let task = tokio::spawn(session.run());
        SessionHandle {
            commands: commands_tx,
            updates: updates_rx,
            task,
        }
    }

    pub fn new(
        config: SessionConfig,
        transport: T,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        commands: mpsc::UnboundedReceiver<Command>,
        updates: mpsc::UnboundedSender<SessionUpdate>,
        notify: Box<dyn NotifySurface>,
    ) -> Self {
        let timer = Timer::new(config.timer.clone());
        let attempts_left = config.retry.max_attempts;
        Self {
            config,
            transport,
            events,
            commands,
            updates,
            notify,
            manager: ConnectionManager::new(),
            timer,
            initiated: false,
            attempts_left,
        }
    }

    /// Run until `Shutdown` or until both input channels close.
    pub async fn run(mut self) {
        // Armed while the countdown runs; re-created from now() on
        // every tick.
        let mut tick_deadline: Option<Instant> = None;
        // Armed while a failed auto-connect waits for its next try.
        let mut retry_deadline: Option<Instant> = None;

        loop {
            let tick = async {
                match tick_deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };
            let retry = async {
                match retry_deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = tick => {
                    tick_deadline = None;
                    self.on_tick(&mut tick_deadline);
                }

                _ = retry => {
                    retry_deadline = None;
                    self.try_connect(&mut retry_deadline);
                }

                event = self.events.recv() => {
                    let Some(event) = event else {
                        debug!("transport event stream ended");
                        break;
                    };
                    self.on_transport_event(event, &mut retry_deadline);
                }

                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("command channel closed");
                        break;
                    };
                    if command == Command::Shutdown {
                        break;
                    }
                    self.on_command(command, &mut tick_deadline);
                }
            }
        }
    }

    fn on_tick(&mut self, tick_deadline: &mut Option<Instant>) {
        let effects = self.timer.on_local_tick(self.manager.is_open());
        self.apply_effects(effects);

        if self.timer.is_running() {
            *tick_deadline = Some(Instant::now() + TICK);
        } else if self.timer.phase() == Phase::Expired {
            self.push(SessionUpdate::Expired);
        }
        self.push_display();
    }

    fn on_transport_event(
        &mut self,
        event: TransportEvent,
        retry_deadline: &mut Option<Instant>,
    ) {
        let Some(notice) = self.manager.handle_event(event) else {
            return;
        };
        match notice {
            ManagerEvent::Registered(identity) => {
                let share_link = match share_link(&self.config.base_url, &identity) {
                    Ok(url) => url.to_string(),
                    Err(err) => {
                        error!(%err, "share link construction failed");
                        String::new()
                    }
                };
                info!(%identity, "registered");
                self.push(SessionUpdate::Registered {
                    identity,
                    share_link,
                });
                if self.config.target.is_some() {
                    self.try_connect(retry_deadline);
                }
            }
            ManagerEvent::ChannelOpened => {
                info!("channel open");
                retry_deadline.take();
                if self.initiated {
                    // This session followed a link into a running
                    // session; the host keeps length authority.
                    self.timer.lock();
                }
                self.push(SessionUpdate::Connected);
                self.push_display();
            }
            ManagerEvent::ChannelMessage(payload) => {
                let effects = self.timer.on_remote_message(payload);
                self.apply_effects(effects);
                self.push_display();
            }
            ManagerEvent::ChannelClosed => {
                info!("channel closed");
                self.timer.on_connection_closed();
                self.push(SessionUpdate::Disconnected);
                self.push_display();
            }
            ManagerEvent::TransportFailed(message) => {
                error!(%message, "transport error");
                if self.initiated && !self.manager.is_open() {
                    self.schedule_retry(retry_deadline);
                }
            }
        }
    }

    fn on_command(&mut self, command: Command, tick_deadline: &mut Option<Instant>) {
        match command {
            Command::Toggle => self.toggle(tick_deadline),
            Command::Reset => {
                self.timer.reset();
                tick_deadline.take();
            }
            Command::Press { held } => {
                if held >= self.timer.long_press() {
                    self.timer.reset();
                    tick_deadline.take();
                } else {
                    self.toggle(tick_deadline);
                }
            }
            Command::Resize(seconds) => self.timer.set_length(seconds),
            Command::Ping(text) => {
                let result = self
                    .manager
                    .send(&mut self.transport, &Payload::Chat { text });
                if let Err(err) = result {
                    warn!(%err, "ping failed");
                }
            }
            Command::Close => {
                if let Some(ManagerEvent::ChannelClosed) = self.manager.close(&mut self.transport)
                {
                    self.timer.on_connection_closed();
                    self.push(SessionUpdate::Disconnected);
                }
            }
            // Shutdown never reaches here; the loop breaks on it.
            Command::Shutdown => {}
        }
        self.push_display();
    }

    fn toggle(&mut self, tick_deadline: &mut Option<Instant>) {
        self.timer.toggle();
        if self.timer.is_running() {
            *tick_deadline = Some(Instant::now() + TICK);
        } else {
            tick_deadline.take();
        }
    }

    fn try_connect(&mut self, retry_deadline: &mut Option<Instant>) {
        let Some(target) = self.config.target.clone() else {
            return;
        };
        if self.manager.initiate(&mut self.transport, &target).is_some() {
            self.initiated = true;
        } else {
            self.schedule_retry(retry_deadline);
        }
    }

    fn schedule_retry(&mut self, retry_deadline: &mut Option<Instant>) {
        if self.attempts_left == 0 {
            warn!("auto-connect attempts exhausted");
            return;
        }
        self.attempts_left -= 1;
        *retry_deadline = Some(Instant::now() + self.config.retry.delay);
        debug!(remaining = self.attempts_left, "auto-connect retry scheduled");
    }

    fn apply_effects(&mut self, effects: Vec<TimerEffect>) {
        for effect in effects {
            match effect {
                TimerEffect::Send(payload) => {
                    if let Err(err) = self.manager.send(&mut self.transport, &payload) {
                        warn!(%err, "payload send failed");
                    }
                }
                TimerEffect::Notify(message) => self.raise_notification(&message),
            }
        }
    }

    fn raise_notification(&mut self, message: &str) {
        if !self.config.capabilities.can_notify {
            // No notification surface: the original falls back to a
            // blocking alert; here that is a log line the driver shows.
            warn!(message, "notification unsupported; surfacing inline");
            return;
        }
        match self.notify.permission() {
            Permission::Granted | Permission::Undecided => {
                let outcome = self.notify.notify(message);
                if outcome != NotifyOutcome::Delivered {
                    debug!(message, ?outcome, "notification not delivered");
                }
            }
            Permission::Denied => {
                debug!(message, "notification suppressed: permission denied");
            }
        }
    }

    fn push_display(&self) {
        self.push(SessionUpdate::Display {
            seconds: self.timer.display_seconds(),
            overlay: self.timer.overlay().is_some(),
        });
    }

    fn push(&self, update: SessionUpdate) {
        // A driver that stopped listening is not an error.
        let _ = self.updates.send(update);
    }
}
