// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::sync::Arc;

use crate::filter::Filter;
use crate::provider::ServiceProvider;
use crate::status::{BoxError, Status};

pub type FilterFactory =
    Arc<dyn Fn(&ServiceProvider) -> Result<Option<Arc<dyn Filter>>, BoxError> + Send + Sync>;

/// A filter factory together with its ordering key
#[derive(Clone)]
pub struct FilterRegistration {
    name: String,
    order: i32,
    factory: FilterFactory,
}

impl FilterRegistration {
    pub fn new<F>(name: impl Into<String>, order: i32, factory: F) -> Self
    where
        F: Fn(&ServiceProvider) -> Result<Option<Arc<dyn Filter>>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            order,
            factory: Arc::new(factory),
        }
    }

    /// Registration of an already built filter
    pub fn instance(name: impl Into<String>, order: i32, filter: Arc<dyn Filter>) -> Self {
        Self::new(name, order, move |_| Ok(Some(filter.clone())))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    /// Resolves the filter for one call
    pub fn resolve(&self, services: &ServiceProvider) -> Result<Arc<dyn Filter>, Status> {
        match (self.factory)(services) {
            Ok(Some(filter)) => Ok(filter),
            Ok(None) => Err(Status::internal(format!(
                "filter factory failed: {} produced no filter",
                self.name
            ))),
            Err(error) => Err(Status::internal(format!(
                "filter factory failed: {}: {}",
                self.name, error
            ))
            .with_source(Arc::from(error))),
        }
    }
}

impl fmt::Debug for FilterRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistration")
            .field("name", &self.name)
            .field("order", &self.order)
            .finish()
    }
}

/// Ordered filter registrations
///
/// Registrations are sorted by order key; equal keys keep registration
/// order.
#[derive(Debug, Clone, Default)]
pub struct FilterRegistry {
    registrations: Vec<FilterRegistration>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, registration: FilterRegistration) -> &mut Self {
        self.registrations.push(registration);
        self.registrations.sort_by_key(FilterRegistration::order);
        self
    }

    pub fn with(mut self, registration: FilterRegistration) -> Self {
        self.register(registration);
        self
    }

    /// Global registrations followed by `other`, merged into one ordering
    pub fn merged(&self, other: &FilterRegistry) -> FilterRegistry {
        let mut registrations = self.registrations.clone();
        registrations.extend(other.registrations.iter().cloned());
        registrations.sort_by_key(FilterRegistration::order);
        FilterRegistry { registrations }
    }

    pub fn registrations(&self) -> &[FilterRegistration] {
        &self.registrations
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Resolves every filter for one call, failing on the first factory
    /// error
    pub fn resolve(&self, services: &ServiceProvider) -> Result<Vec<Arc<dyn Filter>>, Status> {
        self.registrations
            .iter()
            .map(|registration| registration.resolve(services))
            .collect()
    }
}
