//! The network intermediary: worker lifecycle, request strategies and the
//! reactor that serializes lifecycle events.
//!
//! ### Lifecycle
//! `installing -> installed -> activating -> active`. A failed install or a
//! failed activation ends in `redundant`; the previously active worker keeps
//! serving.
//!
//! ### Install
//! Every manifest resource is fetched concurrently and written into a fresh
//! generation. Any transport failure or non-2xx status fails the install and
//! the generation is never marked installed, so it can never be promoted.
//!
//! ### Activate
//! Promotes the worker's generation and purges every other one.

pub mod reactor;
mod strategy;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinSet;
use url::Url;

use naturia_core::{AppConfig, CacheDb, Destination, Error, Generation, InterceptedRequest, RequestMode};

use crate::fetch::{Fetcher, identity, resolve};

pub use reactor::{ActivationReport, ControlMessage, InstallOutcome, Reactor, ReactorHandle, StatusReport, WorkerStatus};
pub(crate) use strategy::Route;

/// What a worker needs to know to install and to route requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Generation name this worker installs and serves from.
    pub version: String,
    /// Absolute URLs written into the generation at install.
    pub manifest: Vec<Url>,
    /// Path fragments that mark a request as an API call.
    pub api_paths: Vec<String>,
    /// `error` text of the synthesized offline API response.
    pub offline_notice: String,
}

impl WorkerSettings {
    /// Resolve the configured manifest against the application origin.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let manifest = config
            .manifest
            .iter()
            .map(|entry| resolve(&origin, entry).map_err(|e| Error::InvalidUrl(format!("{entry}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            version: config.cache_version.clone(),
            manifest,
            api_paths: config.api_paths.clone(),
            offline_notice: config.offline_notice.clone(),
        })
    }

    /// Same settings under another generation name.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// Where a worker is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Installing,
    Installed,
    Activating,
    Active,
    Redundant,
}

/// One version of the intermediary, bound to one cache generation.
#[derive(Debug)]
pub struct Worker {
    db: CacheDb,
    generation: Generation,
    settings: Arc<WorkerSettings>,
    phase: Phase,
}

impl Worker {
    /// A worker about to install `settings.version`.
    pub fn new(db: &CacheDb, settings: WorkerSettings) -> Self {
        let generation = db.generation(&settings.version);
        Self { db: db.clone(), generation, settings: Arc::new(settings), phase: Phase::Installing }
    }

    /// An already-active worker over a generation promoted in an earlier run.
    pub(crate) fn resume(db: &CacheDb, generation: Generation, settings: WorkerSettings) -> Self {
        let settings = settings.with_version(generation.name());
        Self { db: db.clone(), generation, settings: Arc::new(settings), phase: Phase::Active }
    }

    pub fn version(&self) -> &str {
        &self.settings.version
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> WorkerStatus {
        WorkerStatus { version: self.version().to_string(), phase: self.phase }
    }

    /// Populate a fresh generation with the manifest.
    ///
    /// Returns the number of resources stored. On failure the worker is
    /// redundant and its generation stays unpromotable.
    pub async fn install(&mut self, fetcher: Arc<dyn Fetcher>) -> Result<usize, Error> {
        if self.phase != Phase::Installing {
            return Err(Error::GenerationNotReady(format!("{} cannot install while {:?}", self.version(), self.phase)));
        }

        match self.populate(fetcher).await {
            Ok(stored) => {
                self.phase = Phase::Installed;
                tracing::info!(version = %self.version(), stored, "install complete");
                Ok(stored)
            }
            Err(e) => {
                self.phase = Phase::Redundant;
                tracing::warn!(version = %self.version(), error = %e, "install failed");
                Err(e)
            }
        }
    }

    async fn populate(&self, fetcher: Arc<dyn Fetcher>) -> Result<usize, Error> {
        let generation = self.db.begin_generation(self.version()).await?;

        let mut fetches = JoinSet::new();
        for url in self.settings.manifest.iter().cloned() {
            let fetcher = fetcher.clone();
            fetches.spawn(async move {
                let request = InterceptedRequest::get(url, RequestMode::Cors, Destination::Empty);
                let result = fetcher.fetch(&request).await;
                (request, result)
            });
        }

        let mut stored = 0;
        while let Some(joined) = fetches.join_next().await {
            let (request, result) = joined
                .map_err(|e| Error::InstallFailed { resource: "manifest".into(), reason: e.to_string() })?;
            let resource = identity(&request.url);
            let response = match result {
                Ok(response) if response.is_success() => response,
                Ok(response) => {
                    return Err(Error::InstallFailed { resource, reason: format!("status {}", response.status) });
                }
                Err(e) => return Err(Error::InstallFailed { resource, reason: e.to_string() }),
            };
            generation.put(&request.method, &resource, &response).await?;
            stored += 1;
        }

        generation.mark_installed().await?;
        Ok(stored)
    }

    /// Promote this worker's generation and purge all others.
    ///
    /// Returns the purged generation names.
    pub async fn activate(&mut self) -> Result<Vec<String>, Error> {
        if self.phase != Phase::Installed {
            return Err(Error::GenerationNotReady(format!("{} cannot activate while {:?}", self.version(), self.phase)));
        }

        self.phase = Phase::Activating;
        match self.generation.promote().await {
            Ok(purged) => {
                self.phase = Phase::Active;
                tracing::info!(version = %self.version(), ?purged, "activated");
                Ok(purged)
            }
            Err(e) => {
                self.phase = Phase::Redundant;
                tracing::warn!(version = %self.version(), error = %e, "activation failed");
                Err(e)
            }
        }
    }

    pub(crate) fn route(&self, fetcher: Arc<dyn Fetcher>) -> Route {
        Route::new(self.generation.clone(), fetcher, self.settings.clone())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use naturia_core::GenerationState;

    #[test]
    fn test_settings_from_config_resolves_manifest() {
        let config = AppConfig { origin: "https://naturia.test".into(), ..Default::default() };
        let settings = WorkerSettings::from_config(&config).unwrap();

        assert_eq!(settings.version, "naturia-chile-v1");
        assert_eq!(settings.manifest[0].as_str(), "https://naturia.test/");
        assert_eq!(settings.manifest[1].as_str(), "https://naturia.test/static/css/styles.css");
        assert_eq!(settings.manifest[4].host_str(), Some("fonts.googleapis.com"));
    }

    #[tokio::test]
    async fn test_install_then_activate() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = ScriptedFetcher::new();
        fetcher.respond("/", 200, "<html>");
        fetcher.respond("/static/js/app.js", 200, "app()");

        let mut worker = Worker::new(&db, settings("v1", &["/", "/static/js/app.js"]));
        assert_eq!(worker.phase(), Phase::Installing);

        assert_eq!(worker.install(fetcher.clone()).await.unwrap(), 2);
        assert_eq!(worker.phase(), Phase::Installed);
        assert_eq!(db.generation("v1").state().await.unwrap(), Some(GenerationState::Installed));

        assert!(worker.activate().await.unwrap().is_empty());
        assert_eq!(worker.phase(), Phase::Active);
        assert_eq!(db.current_generation().await.unwrap().unwrap().name(), "v1");
    }

    #[tokio::test]
    async fn test_install_fails_on_error_status() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = ScriptedFetcher::new();
        fetcher.respond("/", 200, "<html>");

        let mut worker = Worker::new(&db, settings("v1", &["/", "/static/missing.css"]));
        let err = worker.install(fetcher).await.unwrap_err();

        assert!(matches!(err, Error::InstallFailed { ref resource, .. } if resource.ends_with("/static/missing.css")));
        assert_eq!(worker.phase(), Phase::Redundant);
        assert_eq!(db.generation("v1").state().await.unwrap(), Some(GenerationState::Populating));
        assert!(matches!(worker.activate().await, Err(Error::GenerationNotReady(_))));
        assert!(db.generation("v1").promote().await.is_err());
    }

    #[tokio::test]
    async fn test_install_fails_offline() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = ScriptedFetcher::new();
        fetcher.respond("/", 200, "<html>");
        fetcher.set_offline(true);

        let mut worker = Worker::new(&db, settings("v1", &["/"]));
        assert!(matches!(worker.install(fetcher).await, Err(Error::InstallFailed { .. })));
        assert_eq!(worker.phase(), Phase::Redundant);
    }

    #[tokio::test]
    async fn test_install_twice_rejected() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = ScriptedFetcher::new();

        let mut worker = Worker::new(&db, settings("v1", &[]));
        worker.install(fetcher.clone()).await.unwrap();
        assert!(matches!(worker.install(fetcher).await, Err(Error::GenerationNotReady(_))));
    }
}
