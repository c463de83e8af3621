//! Per-connection protocol registry.
//!
//! Maps `(protocol name, role)` to the session stored under it
//! (conventionally the `Choice` reached after stripping the outer
//! `Def`). Each mediator owns one registry: it is populated during the
//! handshake and read-only afterwards, so concurrent connections never
//! interfere.

use std::collections::HashMap;

use crate::error::{Result, StpError};

use super::{Role, Session};

/// Name-keyed, write-once store of protocol entry points.
#[derive(Debug, Default)]
pub struct Registry {
    records: HashMap<(String, Role), Session>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a protocol under `(name, role)`.
    ///
    /// Entries are write-once: an already-present key fails with
    /// [`StpError::DuplicateProtocol`].
    pub fn add(&mut self, name: &str, role: Role, session: Session) -> Result<()> {
        let key = (name.to_string(), role);
        if self.records.contains_key(&key) {
            return Err(StpError::DuplicateProtocol {
                name: name.to_string(),
                role,
            });
        }
        tracing::debug!(protocol = name, %role, "registering protocol");
        self.records.insert(key, session);
        Ok(())
    }

    /// Look up the session registered under `(name, role)`.
    pub fn lookup(&self, name: &str, role: Role) -> Result<&Session> {
        self.records
            .get(&(name.to_string(), role))
            .ok_or_else(|| StpError::ProtocolNotFound {
                name: name.to_string(),
                role,
            })
    }

    /// Number of registered `(name, role)` entries.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no protocol has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lookup() {
        let mut registry = Registry::new();
        registry.add("A_server", Role::Server, Session::End).unwrap();
        assert_eq!(
            registry.lookup("A_server", Role::Server).unwrap(),
            &Session::End
        );
    }

    #[test]
    fn test_roles_do_not_collide() {
        let mut registry = Registry::new();
        registry.add("A", Role::Server, Session::End).unwrap();
        registry.add("A", Role::Client, Session::End).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_add_fails() {
        let mut registry = Registry::new();
        registry.add("A", Role::Server, Session::End).unwrap();
        let err = registry.add("A", Role::Server, Session::End).unwrap_err();
        assert!(matches!(err, StpError::DuplicateProtocol { .. }));
    }

    #[test]
    fn test_missing_lookup_fails() {
        let registry = Registry::new();
        let err = registry.lookup("Nope", Role::Client).unwrap_err();
        assert!(matches!(err, StpError::ProtocolNotFound { .. }));
    }
}
