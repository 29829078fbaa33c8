//! Client side of the NaturIA offline intermediary.
//!
//! This crate provides the network fetch seam, the intermediary itself
//! (worker lifecycle, request strategies, reactor) and a typed client for
//! the species API, shared by the server binary.

pub mod fetch;
pub mod intermediary;
pub mod species;

pub use fetch::{FetchConfig, Fetcher, HttpFetcher};
pub use intermediary::{
    ActivationReport, ControlMessage, InstallOutcome, Phase, Reactor, ReactorHandle, StatusReport, Worker,
    WorkerSettings, WorkerStatus,
};
pub use species::SpeciesClient;
