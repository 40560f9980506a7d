//! Export table: the named values a successful run hands back to the
//! operator (addresses, URL, per-step output).

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::DeployError;
use crate::engine::deferred::{Deferred, Failure};

/// Append-only mapping from export name to deferred string.
#[derive(Default)]
pub struct Exports {
    entries: Vec<(String, Deferred<String>)>,
}

impl fmt::Debug for Exports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}

impl Exports {
    /// # Errors
    ///
    /// Returns [`DeployError::DuplicateExport`] if `name` is already present.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: Deferred<String>,
    ) -> Result<(), DeployError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(DeployError::DuplicateExport(name));
        }
        self.entries.push((name, value));
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Deferred<String>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    /// Export names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries that have already resolved successfully. Never waits.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(name, value)| match value.now_or_never() {
                Some(Ok(v)) => Some((name.clone(), v)),
                _ => None,
            })
            .collect()
    }

    /// Wait for every entry.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first entry, in registration order, that
    /// did not resolve.
    pub async fn resolve_all(&self) -> Result<BTreeMap<String, String>, Failure> {
        let mut resolved = BTreeMap::new();
        for (name, value) in &self.entries {
            resolved.insert(name.clone(), value.resolve().await?);
        }
        Ok(resolved)
    }
}
