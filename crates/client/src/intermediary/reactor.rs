//! Single-owner event loop for the intermediary.
//!
//! Callers talk to the reactor through a [`ReactorHandle`]; each call sends
//! one event with a oneshot responder. Lifecycle events (install, activate,
//! control messages) are handled one at a time inside the loop. Fetches are
//! dispatched onto their own tasks through the active worker and may finish
//! in any order.
//!
//! An install runs in the background so fetches keep flowing to the active
//! worker meanwhile; further install requests queue behind it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};

use naturia_core::{CacheDb, Error, GenerationInfo, InterceptedRequest, ResponseSnapshot, Served};

use super::{Phase, Worker, WorkerSettings};
use crate::fetch::Fetcher;

const QUEUE_DEPTH: usize = 64;

type Responder<T> = oneshot::Sender<Result<T, Error>>;

/// Messages accepted on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate the waiting worker now.
    SkipWaiting,
}

/// Result of a successful activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ActivationReport {
    /// Version now serving.
    pub version: String,
    /// Generations deleted by the activation.
    pub purged: Vec<String>,
    /// Version that was serving before, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced: Option<String>,
}

/// What an install request ended in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum InstallOutcome {
    /// Installed and activated.
    Activated(ActivationReport),
    /// Installed; waiting for `SKIP_WAITING`.
    Waiting { version: String },
    /// The version is already serving; nothing was fetched.
    AlreadyActive { version: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct WorkerStatus {
    pub version: String,
    pub phase: Phase,
}

/// Snapshot of the reactor's workers and the stored generations.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct StatusReport {
    pub active: Option<WorkerStatus>,
    pub waiting: Option<WorkerStatus>,
    /// Version currently installing.
    pub installing: Option<String>,
    /// Install requests queued behind the running one.
    pub queued_installs: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_install_error: Option<String>,
    pub generations: Vec<GenerationInfo>,
}

enum Event {
    Install { settings: WorkerSettings, respond: Responder<InstallOutcome> },
    Message { message: ControlMessage, respond: Responder<Option<ActivationReport>> },
    Fetch { request: InterceptedRequest, respond: Responder<Served> },
    Status { respond: Responder<StatusReport> },
    Shutdown { respond: oneshot::Sender<()> },
}

struct InstallDone {
    worker: Worker,
    result: Result<usize, Error>,
    respond: Responder<InstallOutcome>,
}

/// The event loop. Owns the workers; only reachable through a
/// [`ReactorHandle`].
pub struct Reactor {
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    skip_waiting: bool,
    active: Option<Worker>,
    waiting: Option<Worker>,
    installing: Option<String>,
    pending: VecDeque<(WorkerSettings, Responder<InstallOutcome>)>,
    installs: JoinSet<InstallDone>,
    last_install_error: Option<String>,
    events: mpsc::Receiver<Event>,
}

impl Reactor {
    /// Spawn the reactor and return a handle to it.
    ///
    /// A generation already promoted in an earlier run is resumed as the
    /// active worker, routed with `settings`.
    pub async fn start(
        db: CacheDb, fetcher: Arc<dyn Fetcher>, settings: WorkerSettings, skip_waiting: bool,
    ) -> Result<ReactorHandle, Error> {
        let active = db
            .current_generation()
            .await?
            .map(|generation| Worker::resume(&db, generation, settings));

        if let Some(worker) = &active {
            tracing::info!(version = %worker.version(), "resuming active generation");
        }

        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let reactor = Reactor {
            db,
            fetcher,
            skip_waiting,
            active,
            waiting: None,
            installing: None,
            pending: VecDeque::new(),
            installs: JoinSet::new(),
            last_install_error: None,
            events: rx,
        };
        tokio::spawn(reactor.run());

        Ok(ReactorHandle { events: tx })
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(Event::Shutdown { respond }) => {
                        let _ = respond.send(());
                        break;
                    }
                    Some(event) => self.handle(event).await,
                    None => break,
                },
                Some(joined) = self.installs.join_next(), if !self.installs.is_empty() => {
                    self.finish_install(joined).await;
                }
            }
        }
        tracing::info!("reactor stopped");
    }

    async fn handle(&mut self, event: Event) {
        match event {
            Event::Install { settings, respond } => self.install(settings, respond),
            Event::Message { message: ControlMessage::SkipWaiting, respond } => {
                let result = match self.waiting.take() {
                    Some(worker) => self.activate(worker).await.map(Some),
                    None => Ok(None),
                };
                let _ = respond.send(result);
            }
            Event::Fetch { request, respond } => self.dispatch(request, respond),
            Event::Status { respond } => {
                let _ = respond.send(self.status().await);
            }
            Event::Shutdown { respond } => {
                let _ = respond.send(());
            }
        }
    }

    fn install(&mut self, settings: WorkerSettings, respond: Responder<InstallOutcome>) {
        if let Some(active) = &self.active
            && active.version() == settings.version
        {
            let _ = respond.send(Ok(InstallOutcome::AlreadyActive { version: settings.version }));
            return;
        }

        if self.installing.is_some() {
            self.pending.push_back((settings, respond));
            return;
        }

        tracing::info!(version = %settings.version, "installing");
        self.installing = Some(settings.version.clone());
        let mut worker = Worker::new(&self.db, settings);
        let fetcher = self.fetcher.clone();
        self.installs.spawn(async move {
            let result = worker.install(fetcher).await;
            InstallDone { worker, result, respond }
        });
    }

    async fn finish_install(&mut self, joined: Result<InstallDone, JoinError>) {
        self.installing = None;

        match joined {
            Ok(InstallDone { worker, result: Ok(_), respond }) => {
                self.last_install_error = None;
                let outcome = if self.skip_waiting || self.active.is_none() {
                    self.activate(worker).await.map(InstallOutcome::Activated)
                } else {
                    let version = worker.version().to_string();
                    if let Some(superseded) = self.waiting.replace(worker) {
                        tracing::info!(version = %superseded.version(), "waiting worker superseded");
                    }
                    Ok(InstallOutcome::Waiting { version })
                };
                let _ = respond.send(outcome);
            }
            Ok(InstallDone { result: Err(e), respond, .. }) => {
                self.last_install_error = Some(e.to_string());
                let _ = respond.send(Err(e));
            }
            Err(e) => {
                tracing::error!(error = %e, "install task failed");
                self.last_install_error = Some(e.to_string());
            }
        }

        while self.installing.is_none()
            && let Some((settings, respond)) = self.pending.pop_front()
        {
            self.install(settings, respond);
        }
    }

    async fn activate(&mut self, mut worker: Worker) -> Result<ActivationReport, Error> {
        let purged = worker.activate().await?;
        let version = worker.version().to_string();
        let replaced = self.active.replace(worker).map(|old| old.version().to_string());

        tracing::info!(%version, ?replaced, "now serving");
        Ok(ActivationReport { version, purged, replaced })
    }

    fn dispatch(&self, request: InterceptedRequest, respond: Responder<Served>) {
        match &self.active {
            Some(worker) => {
                let route = worker.route(self.fetcher.clone());
                tokio::spawn(async move {
                    let _ = respond.send(route.handle(request).await);
                });
            }
            None => {
                let fetcher = self.fetcher.clone();
                tokio::spawn(async move {
                    let result = fetcher.fetch(&request).await.map(Served::network);
                    let _ = respond.send(result);
                });
            }
        }
    }

    async fn status(&self) -> Result<StatusReport, Error> {
        Ok(StatusReport {
            active: self.active.as_ref().map(Worker::status),
            waiting: self.waiting.as_ref().map(Worker::status),
            installing: self.installing.clone(),
            queued_installs: self.pending.len(),
            last_install_error: self.last_install_error.clone(),
            generations: self.db.list_generations().await?,
        })
    }
}

/// Cloneable client side of the reactor.
#[derive(Clone, Debug)]
pub struct ReactorHandle {
    events: mpsc::Sender<Event>,
}

impl ReactorHandle {
    async fn call<T>(&self, event: impl FnOnce(Responder<T>) -> Event) -> Result<T, Error> {
        let (tx, rx) = oneshot::channel();
        self.events
            .send(event(tx))
            .await
            .map_err(|_| Error::WorkerUnavailable("reactor has shut down".into()))?;
        rx.await
            .map_err(|_| Error::WorkerUnavailable("reactor dropped the request".into()))?
    }

    /// Route a request through the active worker.
    pub async fn fetch(&self, request: InterceptedRequest) -> Result<Served, Error> {
        self.call(|respond| Event::Fetch { request, respond }).await
    }

    /// Install a version; resolves once it is activated or parked as waiting.
    pub async fn install(&self, settings: WorkerSettings) -> Result<InstallOutcome, Error> {
        self.call(|respond| Event::Install { settings, respond }).await
    }

    /// Deliver a control-channel message.
    pub async fn message(&self, message: ControlMessage) -> Result<Option<ActivationReport>, Error> {
        self.call(|respond| Event::Message { message, respond }).await
    }

    /// Activate the waiting worker, if there is one.
    pub async fn skip_waiting(&self) -> Result<Option<ActivationReport>, Error> {
        self.message(ControlMessage::SkipWaiting).await
    }

    pub async fn status(&self) -> Result<StatusReport, Error> {
        self.call(|respond| Event::Status { respond }).await
    }

    /// Stop the reactor. An install still running is abandoned.
    pub async fn shutdown(&self) -> Result<(), Error> {
        let (tx, rx) = oneshot::channel();
        self.events
            .send(Event::Shutdown { respond: tx })
            .await
            .map_err(|_| Error::WorkerUnavailable("reactor has shut down".into()))?;
        rx.await.map_err(|_| Error::WorkerUnavailable("reactor dropped the request".into()))
    }
}

/// Lets anything that talks to the network go through the intermediary.
#[async_trait]
impl Fetcher for ReactorHandle {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, Error> {
        ReactorHandle::fetch(self, request.clone()).await.map(|served| served.response)
    }
}
