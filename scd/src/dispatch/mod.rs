//! Event dispatch
//!
//! Once a session is open, the service pushes device arrival, removal and
//! decoded-data events. The sink reacts to each with a small, bounded amount
//! of follow-up work and reports results to the interactive context.

mod handlers;
mod sink;
mod validator;

pub use handlers::{handle_arrival, handle_decoded, handle_removal};
pub use sink::{DispatchHandle, DispatchSink, DispatchStats};
pub use validator::{AcceptAll, PayloadValidator, SuffixRule};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::capture::DataConfirmationMode;
use crate::config::DispatchConfig;

/// Most follow-up queries issued per arriving device
pub const MAX_ARRIVAL_QUERIES: usize = 2;

/// Follow-up query issued when a device arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArrivalQuery {
    Name,
    Battery,
    Firmware,
}

/// Dispatch behavior resolved from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    arrival_queries: Vec<ArrivalQuery>,
    confirmation_mode: DataConfirmationMode,
}

impl DispatchSettings {
    /// Settings with at most `MAX_ARRIVAL_QUERIES` distinct queries
    pub fn new(arrival_queries: Vec<ArrivalQuery>, confirmation_mode: DataConfirmationMode) -> Self {
        let mut queries: Vec<ArrivalQuery> = Vec::with_capacity(MAX_ARRIVAL_QUERIES);
        for query in arrival_queries {
            if !queries.contains(&query) {
                queries.push(query);
            }
        }
        if queries.len() > MAX_ARRIVAL_QUERIES {
            warn!(
                requested = queries.len(),
                max = MAX_ARRIVAL_QUERIES,
                "Too many arrival queries, keeping the first ones"
            );
            queries.truncate(MAX_ARRIVAL_QUERIES);
        }
        Self {
            arrival_queries: queries,
            confirmation_mode,
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(config.arrival_queries.clone(), config.confirmation_mode)
    }

    pub fn arrival_queries(&self) -> &[ArrivalQuery] {
        &self.arrival_queries
    }

    pub fn confirmation_mode(&self) -> DataConfirmationMode {
        self.confirmation_mode
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default())
    }
}
