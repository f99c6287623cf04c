//! Test helper utilities for broadcast-llm tests
//!
//! Fixture implementations of the registry's collaborator traits, plus
//! builders for records and targets. Shared across the unit test modules.
//!
//! IMPORTANT: These helpers are test-only and should NEVER be used in production code.

// Allow dead code in test utilities - helpers are used across different test modules
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{DispatchError, DispatchResult};
use crate::registry::{
    CredentialSource, ProviderKind, Target, TargetId, TargetRecord, TargetStore,
};

/// Store over a fixed record set, counting loads so tests can observe
/// snapshot caching and invalidation.
pub struct FixedTargetStore {
    records: Vec<TargetRecord>,
    loads: AtomicUsize,
    fail: bool,
}

impl FixedTargetStore {
    pub fn new(records: Vec<TargetRecord>) -> Self {
        Self {
            records,
            loads: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// A store whose every load fails, for reload-error propagation tests.
    pub fn failing() -> Self {
        Self {
            records: Vec::new(),
            loads: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TargetStore for FixedTargetStore {
    async fn load_targets(&self) -> DispatchResult<Vec<TargetRecord>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DispatchError::store("fixture store set to fail", None));
        }
        Ok(self.records.clone())
    }
}

/// Credential source over a fixed map, counting resolutions per reference so
/// tests can assert how often a reference was looked up.
pub struct MapCredentialSource {
    values: HashMap<String, String>,
    resolutions: Mutex<HashMap<String, usize>>,
}

impl MapCredentialSource {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            values: pairs
                .iter()
                .map(|(reference, value)| (reference.to_string(), value.to_string()))
                .collect(),
            resolutions: Mutex::new(HashMap::new()),
        }
    }

    /// A source that resolves nothing.
    pub fn empty() -> Self {
        Self::new(&[])
    }

    pub fn resolution_count(&self, reference: &str) -> usize {
        let counts = self
            .resolutions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        counts.get(reference).copied().unwrap_or(0)
    }
}

impl CredentialSource for MapCredentialSource {
    fn resolve(&self, reference: &str) -> Option<String> {
        let mut counts = self
            .resolutions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *counts.entry(reference.to_string()).or_insert(0) += 1;
        self.values.get(reference).cloned()
    }
}

/// Builds an active target record with no endpoint override.
pub fn record(id: i64, name: &str, kind: &str, credential_ref: &str) -> TargetRecord {
    TargetRecord {
        id,
        name: name.to_string(),
        kind: kind.to_string(),
        endpoint: None,
        credential_ref: credential_ref.to_string(),
        active: true,
    }
}

/// Builds a ready-made target for tests that bypass the registry.
pub fn target(id: i64, name: &str, kind: ProviderKind, credential_ref: &str) -> Arc<Target> {
    Arc::new(Target {
        id: TargetId(id),
        name: name.to_string(),
        kind,
        endpoint: None,
        credential_ref: credential_ref.to_string(),
        active: true,
    })
}
