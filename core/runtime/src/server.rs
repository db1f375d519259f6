// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Server-side call routing
//!
//! A [`ServiceHost`] owns one service instance and the dispatch table bound
//! for its contract, and hands every incoming call to the server adapter
//! together with the filters registered for the target operation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::adapter::{ServerAdapter, ServerDispatch};
use crate::binding::DispatchTable;
use crate::codec::{BincodeMarshaller, Marshaller};
use crate::deadline;
use crate::filter::{FilterRegistration, FilterRegistry};
use crate::provider::ServiceProvider;
use crate::status::Status;
use crate::transport::{CallHandler, ServerCall};

pub struct ServiceHost<S> {
    service: Arc<S>,
    table: DispatchTable<S>,
    adapter: ServerAdapter,
    /// Global filters merged with per-operation ones, by operation path
    filters: HashMap<String, FilterRegistry>,
    services: Arc<ServiceProvider>,
}

impl<S: Send + Sync + 'static> ServiceHost<S> {
    pub fn builder(service: Arc<S>, table: DispatchTable<S>) -> ServiceHostBuilder<S> {
        ServiceHostBuilder {
            service,
            table,
            marshaller: Arc::new(BincodeMarshaller),
            max_timeout: deadline::max_timeout(),
            global: FilterRegistry::new(),
            operations: HashMap::new(),
            services: Arc::new(ServiceProvider::new()),
        }
    }

    pub fn contract_name(&self) -> &str {
        self.table.contract_name()
    }

    /// Paths of all served operations, sorted
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<_> = self.table.paths().collect();
        paths.sort_unstable();
        paths
    }

    /// Path of the operation serving the sync method `method`
    pub fn alias(&self, method: &str) -> Option<&str> {
        self.table.alias(method)
    }

    pub fn filters(&self, path: &str) -> Option<&FilterRegistry> {
        self.filters.get(path)
    }
}

#[async_trait]
impl<S: Send + Sync + 'static> CallHandler for ServiceHost<S> {
    async fn handle(&self, call: ServerCall) {
        let Some(binding) = self.table.get(&call.method) else {
            tracing::warn!(method = %call.method, "no operation bound to path");
            let status = Status::unimplemented(format!("unknown operation {}", call.method));
            let mut writer = call.writer;
            if let Err(e) = writer.finish(Err(status)).await {
                tracing::debug!(error = %e, "failed to reject call");
            }
            return;
        };

        tracing::debug!(method = %call.method, "dispatching call");
        let registry = self.filters.get(&call.method);
        let filters = match registry.map(|r| r.resolve(&self.services)).transpose() {
            Ok(filters) => filters.unwrap_or_default(),
            Err(status) => {
                tracing::error!(
                    method = %call.method,
                    error = %status,
                    "failed to resolve filters"
                );
                let mut writer = call.writer;
                if let Err(e) = writer.finish(Err(status)).await {
                    tracing::debug!(error = %e, "failed to reject call");
                }
                return;
            }
        };

        let dispatch = ServerDispatch {
            service: self.service.clone(),
            binding,
            filters: &filters,
            services: self.services.clone(),
        };
        self.adapter.serve(dispatch, call).await;
    }
}

pub struct ServiceHostBuilder<S> {
    service: Arc<S>,
    table: DispatchTable<S>,
    marshaller: Arc<dyn Marshaller>,
    max_timeout: Duration,
    global: FilterRegistry,
    operations: HashMap<String, FilterRegistry>,
    services: Arc<ServiceProvider>,
}

impl<S: Send + Sync + 'static> ServiceHostBuilder<S> {
    pub fn marshaller(mut self, marshaller: Arc<dyn Marshaller>) -> Self {
        self.marshaller = marshaller;
        self
    }

    /// Upper bound applied to client supplied deadlines
    pub fn max_timeout(mut self, max_timeout: Duration) -> Self {
        self.max_timeout = max_timeout;
        self
    }

    pub fn services(mut self, services: Arc<ServiceProvider>) -> Self {
        self.services = services;
        self
    }

    /// Filter applied to every operation
    pub fn filter(mut self, registration: FilterRegistration) -> Self {
        self.global.register(registration);
        self
    }

    pub fn filters(mut self, registry: &FilterRegistry) -> Self {
        self.global = self.global.merged(registry);
        self
    }

    /// Filter applied to the operation at `path` only
    pub fn operation_filter(
        mut self,
        path: impl Into<String>,
        registration: FilterRegistration,
    ) -> Self {
        self.operations
            .entry(path.into())
            .or_default()
            .register(registration);
        self
    }

    pub fn build(self) -> ServiceHost<S> {
        let mut filters = HashMap::new();
        for path in self.table.paths() {
            let registry = match self.operations.get(path) {
                Some(own) => self.global.merged(own),
                None => self.global.clone(),
            };
            filters.insert(path.to_string(), registry);
        }
        for path in self.operations.keys() {
            if self.table.get(path).is_none() {
                tracing::warn!(%path, "filters registered for an unknown operation");
            }
        }

        tracing::info!(
            contract = %self.table.contract_name(),
            operations = self.table.len(),
            "service host ready"
        );

        ServiceHost {
            service: self.service,
            table: self.table,
            adapter: ServerAdapter::new(self.marshaller, self.max_timeout),
            filters,
            services: self.services,
        }
    }
}
