//! Natural-language calendar service.
//!
//! A submission `{requestText, category}` is turned into a structured
//! [`models::Event`] by the [`services::normalizer::EventNormalizer`], which asks
//! an external completion service for a single `createEvent` call, and is then
//! appended to an [`store::EventStore`] that display clients read in full.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use anyhow::Context;

use config::Config;
use services::completion::OpenAiCompletionService;
use services::normalizer::{DurationPolicy, EventNormalizer};
use store::{EventStore, InMemoryEventStore};

pub struct AppState {
    pub normalizer: EventNormalizer,
    pub store: Arc<dyn EventStore>,
}

impl AppState {
    /// Wire the OpenAI-backed normalizer and an empty in-memory store.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let completion = OpenAiCompletionService::new(&config.completion)
            .context("Failed to build completion client")?;
        let scheduling = &config.scheduling;
        let policy = DurationPolicy::with_exam_minutes(scheduling.exam_duration_minutes)
            .context("EXAM_DURATION_MINUTES is out of range")?;

        Ok(Self {
            normalizer: EventNormalizer::new(
                Arc::new(completion),
                policy,
                scheduling.utc_offset(),
            ),
            store: Arc::new(InMemoryEventStore::new()),
        })
    }
}
