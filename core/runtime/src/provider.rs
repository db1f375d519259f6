// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use http::Extensions;

/// Shared services available to filter factories and operations
///
/// One entry per type; values are shared as `Arc<T>`.
#[derive(Debug, Clone, Default)]
pub struct ServiceProvider {
    services: Extensions,
}

impl ServiceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `service`, replacing any previous service of the same type
    pub fn register<T: Send + Sync + 'static>(&mut self, service: T) -> &mut Self {
        self.services.insert(Arc::new(service));
        self
    }

    pub fn register_arc<T: Send + Sync + 'static>(&mut self, service: Arc<T>) -> &mut Self {
        self.services.insert(service);
        self
    }

    pub fn with<T: Send + Sync + 'static>(mut self, service: T) -> Self {
        self.register(service);
        self
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services.get::<Arc<T>>().cloned()
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.services.get::<Arc<T>>().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Clock(u64);

    #[test]
    fn test_register_and_get() {
        let mut provider = ServiceProvider::new();
        assert!(provider.get::<Clock>().is_none());

        provider.register(Clock(1));
        assert_eq!(provider.get::<Clock>().as_deref(), Some(&Clock(1)));

        let shared = Arc::new(Clock(2));
        provider.register_arc(shared.clone());
        assert!(Arc::ptr_eq(&provider.get::<Clock>().unwrap(), &shared));

        let cloned = provider.clone().with(String::from("x"));
        assert!(cloned.contains::<String>());
        assert!(!provider.contains::<String>());
    }
}
