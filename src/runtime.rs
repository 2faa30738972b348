//! Tokio session driver.
//!
//! [`spawn_session`] moves a [`Controller`] onto its own task, which ticks it
//! at a fixed interval and applies requests arriving on a channel. Command
//! station callbacks and user interfaces talk to the session only through
//! the returned [`SessionHandle`], so every reservation change happens on
//! the session task.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use trainz_dispatch::config::Config;
//! use trainz_dispatch::controller::{Controller, RouteAssignment};
//! use trainz_dispatch::hal::mock::{line_layout, MockInterface};
//! use trainz_dispatch::layout::TrainId;
//! use trainz_dispatch::runtime::spawn_session;
//! use trainz_dispatch::traits::InterfaceEvent;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let controller = Controller::new(line_layout(3).unwrap(), MockInterface::new(), Config::default());
//! let session = spawn_session(controller, Duration::from_millis(50));
//!
//! session
//!     .interface_event(InterfaceEvent::Feedback { device_id: 1, contact_id: 12, detected: true })
//!     .await?;
//! let trains = session.snapshots().await?;
//!
//! let controller = session.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::controller::{Controller, DispatchReport, RouteAssignment, TrainSnapshot};
use crate::error::InvariantError;
use crate::layout::TrainId;
use crate::traits::{CommandInterface, InterfaceEvent};

/// Pending requests a session buffers before senders wait.
pub const SESSION_CHANNEL_CAPACITY: usize = 64;

/// Errors returned by a [`SessionHandle`].
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is not running")]
    Closed,

    #[error(transparent)]
    Invariant(#[from] InvariantError),

    #[error("session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

type Reply<T> = oneshot::Sender<T>;

/// Requests served by the session task, one per controller operation.
#[derive(Debug)]
pub enum SessionRequest {
    Interface(InterfaceEvent),
    Start {
        train: TrainId,
        assignment: RouteAssignment,
        reply_to: Reply<Result<DispatchReport, InvariantError>>,
    },
    Stop {
        train: TrainId,
        reply_to: Reply<Result<DispatchReport, InvariantError>>,
    },
    Finish {
        train: TrainId,
        reply_to: Reply<Result<DispatchReport, InvariantError>>,
    },
    SetUnmanaged {
        train: TrainId,
        reply_to: Reply<Result<DispatchReport, InvariantError>>,
    },
    ClearRuntimeError {
        train: TrainId,
        reply_to: Reply<Result<(), InvariantError>>,
    },
    EmergencyStop,
    Snapshots {
        reply_to: Reply<Vec<TrainSnapshot>>,
    },
    Shutdown,
}

/// Client side of a running session.
pub struct SessionHandle<I: CommandInterface> {
    requests: mpsc::Sender<SessionRequest>,
    task: JoinHandle<Controller<I>>,
}

/// Run `controller` on a new tokio task, ticking it every `tick_interval`.
pub fn spawn_session<I>(controller: Controller<I>, tick_interval: Duration) -> SessionHandle<I>
where
    I: CommandInterface + Send + 'static,
{
    let (requests, rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
    let task = tokio::spawn(run_session(controller, rx, tick_interval));
    SessionHandle { requests, task }
}

async fn run_session<I: CommandInterface>(
    mut controller: Controller<I>,
    mut requests: mpsc::Receiver<SessionRequest>,
    tick_interval: Duration,
) -> Controller<I> {
    let started = Instant::now();
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(tick_ms = tick_interval.as_millis() as u64, "session started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                controller.tick(elapsed_ms(started));
            }
            request = requests.recv() => {
                let Some(request) = request else {
                    debug!("all session handles dropped");
                    break;
                };
                if !serve(&mut controller, request, elapsed_ms(started)) {
                    break;
                }
            }
        }
    }

    info!("session stopped");
    controller
}

/// Apply one request. Returns false when the session should end.
fn serve<I: CommandInterface>(
    controller: &mut Controller<I>,
    request: SessionRequest,
    now_ms: u64,
) -> bool {
    match request {
        SessionRequest::Interface(event) => {
            controller.handle_interface_event(event, now_ms);
        }
        SessionRequest::Start {
            train,
            assignment,
            reply_to,
        } => {
            let _ = reply_to.send(controller.start(train, assignment, now_ms));
        }
        SessionRequest::Stop { train, reply_to } => {
            let _ = reply_to.send(controller.stop(train, now_ms));
        }
        SessionRequest::Finish { train, reply_to } => {
            let _ = reply_to.send(controller.finish(train, now_ms));
        }
        SessionRequest::SetUnmanaged { train, reply_to } => {
            let _ = reply_to.send(controller.set_unmanaged(train, now_ms));
        }
        SessionRequest::ClearRuntimeError { train, reply_to } => {
            let _ = reply_to.send(controller.clear_runtime_error(train));
        }
        SessionRequest::EmergencyStop => controller.emergency_stop_all(now_ms),
        SessionRequest::Snapshots { reply_to } => {
            let _ = reply_to.send(controller.snapshots());
        }
        SessionRequest::Shutdown => return false,
    }
    true
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Cloneable sender for command station notifications only.
#[derive(Clone, Debug)]
pub struct EventSender {
    requests: mpsc::Sender<SessionRequest>,
}

impl EventSender {
    pub async fn send(&self, event: InterfaceEvent) -> Result<(), SessionError> {
        self.requests
            .send(SessionRequest::Interface(event))
            .await
            .map_err(|_| SessionError::Closed)
    }
}

impl<I: CommandInterface> SessionHandle<I> {
    /// Sender for a command station callback running on another task.
    pub fn event_sender(&self) -> EventSender {
        EventSender {
            requests: self.requests.clone(),
        }
    }

    /// Forward a command station notification.
    pub async fn interface_event(&self, event: InterfaceEvent) -> Result<(), SessionError> {
        self.send(SessionRequest::Interface(event)).await
    }

    pub async fn start(
        &self,
        train: TrainId,
        assignment: RouteAssignment,
    ) -> Result<DispatchReport, SessionError> {
        let (reply_to, reply) = oneshot::channel();
        self.send(SessionRequest::Start {
            train,
            assignment,
            reply_to,
        })
        .await?;
        Ok(reply.await.map_err(|_| SessionError::Closed)??)
    }

    pub async fn stop(&self, train: TrainId) -> Result<DispatchReport, SessionError> {
        let (reply_to, reply) = oneshot::channel();
        self.send(SessionRequest::Stop { train, reply_to }).await?;
        Ok(reply.await.map_err(|_| SessionError::Closed)??)
    }

    pub async fn finish(&self, train: TrainId) -> Result<DispatchReport, SessionError> {
        let (reply_to, reply) = oneshot::channel();
        self.send(SessionRequest::Finish { train, reply_to }).await?;
        Ok(reply.await.map_err(|_| SessionError::Closed)??)
    }

    pub async fn set_unmanaged(&self, train: TrainId) -> Result<DispatchReport, SessionError> {
        let (reply_to, reply) = oneshot::channel();
        self.send(SessionRequest::SetUnmanaged { train, reply_to })
            .await?;
        Ok(reply.await.map_err(|_| SessionError::Closed)??)
    }

    pub async fn clear_runtime_error(&self, train: TrainId) -> Result<(), SessionError> {
        let (reply_to, reply) = oneshot::channel();
        self.send(SessionRequest::ClearRuntimeError { train, reply_to })
            .await?;
        Ok(reply.await.map_err(|_| SessionError::Closed)??)
    }

    /// Cut track power and unmanage every train.
    pub async fn emergency_stop(&self) -> Result<(), SessionError> {
        self.send(SessionRequest::EmergencyStop).await
    }

    pub async fn snapshots(&self) -> Result<Vec<TrainSnapshot>, SessionError> {
        let (reply_to, reply) = oneshot::channel();
        self.send(SessionRequest::Snapshots { reply_to }).await?;
        reply.await.map_err(|_| SessionError::Closed)
    }

    /// Stop the session and take the controller back.
    pub async fn shutdown(self) -> Result<Controller<I>, SessionError> {
        if self.requests.send(SessionRequest::Shutdown).await.is_err() {
            warn!("session already stopped");
        }
        Ok(self.task.await?)
    }

    async fn send(&self, request: SessionRequest) -> Result<(), SessionError> {
        self.requests
            .send(request)
            .await
            .map_err(|_| SessionError::Closed)
    }
}
