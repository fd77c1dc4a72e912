//! Coordinated device reads: one fetch per step per endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::device::{DeviceClient, DeviceEndpoint, DeviceReading};
use crate::error::WriterError;

#[derive(Debug, Default)]
struct GroupState {
    counter: Option<i64>,
    members: Vec<String>,
    readings: HashMap<String, DeviceReading>,
    refreshes: usize,
}

/// Readings of one endpoint shared by every grouped source reading it.
#[derive(Debug, Default)]
pub struct GroupCache {
    state: Mutex<GroupState>,
}

impl GroupCache {
    /// Add an attribute to the set fetched together.
    pub fn register(&self, name: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.members.iter().any(|m| m == name) {
            state.members.push(name.to_string());
        }
    }

    pub fn members(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .members
            .clone()
    }

    /// Number of round trips made so far.
    pub fn refreshes(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).refreshes
    }

    /// Reading of `name`, refreshing every member when the step changed.
    pub fn fetch(
        &self,
        counter: i64,
        client: &dyn DeviceClient,
        endpoint: &DeviceEndpoint,
        name: &str,
    ) -> Result<DeviceReading, WriterError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.members.iter().any(|m| m == name) {
            state.members.push(name.to_string());
        }
        if state.counter != Some(counter) || !state.readings.contains_key(name) {
            debug!(%endpoint, counter, members = state.members.len(), "refreshing device group");
            let readings = client.read_attributes(endpoint, &state.members)?;
            if readings.len() != state.members.len() {
                return Err(WriterError::Source(format!(
                    "{} returned {} reading(s) for {} attribute(s)",
                    endpoint,
                    readings.len(),
                    state.members.len()
                )));
            }
            state.readings = state.members.iter().cloned().zip(readings).collect();
            state.counter = Some(counter);
            state.refreshes += 1;
        }
        state
            .readings
            .get(name)
            .cloned()
            .ok_or_else(|| WriterError::Source(format!("{} has no reading for '{}'", endpoint, name)))
    }
}

/// Every group cache of a pool, keyed by endpoint.
#[derive(Debug, Default)]
pub struct DeviceGroups {
    caches: Mutex<HashMap<String, Arc<GroupCache>>>,
}

impl DeviceGroups {
    pub fn cache(&self, endpoint: &str) -> Arc<GroupCache> {
        self.caches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(endpoint.to_string())
            .or_default()
            .clone()
    }
}
