//! Per-classification request strategies.
//!
//! | Classification | Strategy |
//! |---|---|
//! | api-call | network only; offline -> synthesized 503 JSON |
//! | static-asset | cache first; miss -> fetch, persist 2xx |
//! | navigation | network first, persist 2xx root; offline -> cached root or offline page |
//! | other | network first; offline -> cached entry |

use std::sync::Arc;

use naturia_core::{Classification, Error, Generation, InterceptedRequest, ResponseSnapshot, Served};

use super::WorkerSettings;
use crate::fetch::{Fetcher, identity};

/// Everything a fetch handler needs, detached from the worker so it can
/// run on its own task.
#[derive(Clone)]
pub(crate) struct Route {
    generation: Generation,
    fetcher: Arc<dyn Fetcher>,
    settings: Arc<WorkerSettings>,
}

impl Route {
    pub(crate) fn new(generation: Generation, fetcher: Arc<dyn Fetcher>, settings: Arc<WorkerSettings>) -> Self {
        Self { generation, fetcher, settings }
    }

    pub(crate) async fn handle(&self, request: InterceptedRequest) -> Result<Served, Error> {
        let classification = request.classify(&self.settings.api_paths);
        tracing::debug!(method = %request.method, url = %request.url, ?classification, "dispatch");

        match classification {
            Classification::ApiCall => self.api(&request).await,
            Classification::StaticAsset => self.cache_first(&request).await,
            Classification::Navigation => self.navigate(&request).await,
            Classification::Other => self.network_first(&request).await,
        }
    }

    async fn api(&self, request: &InterceptedRequest) -> Result<Served, Error> {
        match self.fetcher.fetch(request).await {
            Ok(response) => Ok(Served::network(response)),
            Err(e) => {
                tracing::info!(url = %request.url, error = %e, "api call offline");
                Ok(Served::synthesized(ResponseSnapshot::offline_api_error(&self.settings.offline_notice)))
            }
        }
    }

    async fn cache_first(&self, request: &InterceptedRequest) -> Result<Served, Error> {
        if let Some(cached) = self.lookup(&request.method, &identity(&request.url)).await {
            return Ok(Served::cache(cached));
        }

        let response = self.fetcher.fetch(request).await?;
        if response.is_success() {
            self.persist(request, &response).await;
        }
        Ok(Served::network(response))
    }

    async fn navigate(&self, request: &InterceptedRequest) -> Result<Served, Error> {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if request.is_root() && response.is_success() {
                    self.persist(request, &response).await;
                }
                Ok(Served::network(response))
            }
            Err(e) => {
                tracing::info!(url = %request.url, error = %e, "navigation offline");
                let mut root = request.url.clone();
                root.set_path("/");
                root.set_query(None);

                match self.lookup("GET", &identity(&root)).await {
                    Some(cached) => Ok(Served::cache(cached)),
                    None => Ok(Served::synthesized(ResponseSnapshot::offline_page())),
                }
            }
        }
    }

    async fn network_first(&self, request: &InterceptedRequest) -> Result<Served, Error> {
        match self.fetcher.fetch(request).await {
            Ok(response) => Ok(Served::network(response)),
            Err(e) => match self.lookup(&request.method, &identity(&request.url)).await {
                Some(cached) => Ok(Served::cache(cached)),
                None => Err(Error::NoResponse(format!("{} {}: {}", request.method, request.url, e))),
            },
        }
    }

    /// Cache read; a store failure reads as a miss.
    async fn lookup(&self, method: &str, url: &str) -> Option<ResponseSnapshot> {
        match self.generation.get(method, url).await {
            Ok(Some(hit)) => {
                tracing::debug!(generation = self.generation.name(), url, "cache hit");
                Some(hit)
            }
            Ok(None) => {
                tracing::debug!(generation = self.generation.name(), url, "cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(generation = self.generation.name(), url, error = %e, "cache read failed");
                None
            }
        }
    }

    /// Write a live response into the generation.
    ///
    /// The write runs on its own task: dropping this future does not cancel
    /// it. Failures are logged and never reach the caller.
    async fn persist(&self, request: &InterceptedRequest, response: &ResponseSnapshot) {
        if request.method != "GET" {
            return;
        }

        let generation = self.generation.clone();
        let url = identity(&request.url);
        let response = response.clone();
        let write = tokio::spawn(async move {
            let result = generation.put("GET", &url, &response).await;
            (generation, url, result)
        });

        match write.await {
            Ok((generation, url, Ok(()))) => tracing::debug!(generation = generation.name(), url = %url, "stored"),
            Ok((generation, url, Err(e))) => {
                tracing::warn!(generation = generation.name(), url = %url, error = %e, "cache write failed")
            }
            Err(e) => tracing::warn!(error = %e, "cache write task failed"),
        }
    }
}
