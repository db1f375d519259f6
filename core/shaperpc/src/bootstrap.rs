// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Process-wide wiring of contracts, filters and shared services
//!
//! A [`Bootstrap`] owns the [`ContractCache`] so every host and client of the
//! process analyzes each contract once. The error-detail filters are always
//! registered first on both sides.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use shaperpc_contract::{
    CodegenBackend, ContractAnalyzer, ContractCache, ContractDescription, ContractError,
    ServiceContract,
};
use shaperpc_runtime::{
    BindingError, Channel, ClientErrorDetailFilter, ClientProxy, DispatchBackend,
    FilterRegistration, FilterRegistry, MethodTable, ServerErrorDetailFilter, ServiceHost,
    ServiceHostBuilder, ServiceProvider,
};
use shaperpc_tracing::TracingError;

use crate::config::{ConfigError, ConfigLoader};
use crate::contract::ContractConfiguration;
use crate::runtime::RuntimeConfiguration;

const ERROR_DETAIL_FILTER: &str = "error-detail";

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("contract error: {0}")]
    Contract(#[from] ContractError),
    #[error("binding error: {0}")]
    Binding(#[from] BindingError),
    #[error("tracing error: {0}")]
    Tracing(#[from] TracingError),
}

pub struct Bootstrap {
    cache: Arc<ContractCache>,
    server_filters: FilterRegistry,
    client_filters: FilterRegistry,
    services: Arc<ServiceProvider>,
    runtime: RuntimeConfiguration,
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self::with_configuration(&ContractConfiguration::default(), RuntimeConfiguration::default())
    }
}

impl Bootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_configuration(
        contract: &ContractConfiguration,
        runtime: RuntimeConfiguration,
    ) -> Self {
        let analyzer = ContractAnalyzer::new(contract.classifier());
        Bootstrap {
            cache: Arc::new(ContractCache::new(analyzer)),
            server_filters: FilterRegistry::new().with(FilterRegistration::instance(
                ERROR_DETAIL_FILTER,
                i32::MIN,
                Arc::new(ServerErrorDetailFilter),
            )),
            client_filters: FilterRegistry::new().with(FilterRegistration::instance(
                ERROR_DETAIL_FILTER,
                i32::MIN,
                Arc::new(ClientErrorDetailFilter),
            )),
            services: Arc::new(ServiceProvider::new()),
            runtime,
        }
    }

    pub fn from_config(loader: &mut ConfigLoader) -> Result<Self, BootstrapError> {
        let contract = loader.contract()?.clone();
        let runtime = loader.runtime().clone();
        info!(
            context_types = contract.context_types().len(),
            max_timeout = ?runtime.max_timeout(),
            "bootstrap configured"
        );
        Ok(Self::with_configuration(&contract, runtime))
    }

    /// Installs the global subscriber described by the `tracing` section
    pub fn setup_tracing(loader: &mut ConfigLoader) -> Result<(), BootstrapError> {
        loader.tracing().setup_tracing_subscriber()?;
        Ok(())
    }

    /// Filter applied to every hosted operation
    pub fn server_filter(mut self, registration: FilterRegistration) -> Self {
        self.server_filters.register(registration);
        self
    }

    /// Filter applied to every client call
    pub fn client_filter(mut self, registration: FilterRegistration) -> Self {
        self.client_filters.register(registration);
        self
    }

    /// Shares `service` with filter factories and method implementations
    pub fn service<T: Send + Sync + 'static>(mut self, service: T) -> Self {
        Arc::make_mut(&mut self.services).register(service);
        self
    }

    pub fn cache(&self) -> &Arc<ContractCache> {
        &self.cache
    }

    pub fn services(&self) -> &Arc<ServiceProvider> {
        &self.services
    }

    pub fn runtime(&self) -> &RuntimeConfiguration {
        &self.runtime
    }

    pub fn server_filters(&self) -> &FilterRegistry {
        &self.server_filters
    }

    pub fn client_filters(&self) -> &FilterRegistry {
        &self.client_filters
    }

    /// Analyzed contract of `C`, diagnostics are logged on first analysis
    pub fn describe<C: ServiceContract>(&self) -> Result<Arc<ContractDescription>, BootstrapError> {
        let entry = self.cache.entry::<C>()?;
        if entry.analyzed {
            entry.description.log_diagnostics();
        }
        Ok(entry.description)
    }

    /// Host builder for `service`, ready for per-operation filters
    pub fn host_builder<C, S>(
        &self,
        service: Arc<S>,
        methods: MethodTable<S>,
    ) -> Result<ServiceHostBuilder<S>, BootstrapError>
    where
        C: ServiceContract,
        S: Send + Sync + 'static,
    {
        let description = self.describe::<C>()?;
        let table = DispatchBackend::new(methods).generate(&description)?;
        debug!(contract = %description.contract_name, operations = table.len(), "contract bound");

        Ok(ServiceHost::builder(service, table)
            .max_timeout(self.runtime.max_timeout())
            .services(self.services.clone())
            .filters(&self.server_filters))
    }

    pub fn host<C, S>(
        &self,
        service: Arc<S>,
        methods: MethodTable<S>,
    ) -> Result<ServiceHost<S>, BootstrapError>
    where
        C: ServiceContract,
        S: Send + Sync + 'static,
    {
        Ok(self.host_builder::<C, S>(service, methods)?.build())
    }

    pub fn client<C: ServiceContract>(
        &self,
        channel: Arc<dyn Channel>,
    ) -> Result<ClientProxy, BootstrapError> {
        let description = self.describe::<C>()?;
        Ok(ClientProxy::new(&description, channel)
            .with_filters(&self.client_filters)
            .with_services(self.services.clone())
            .with_default_timeout(self.runtime.default_timeout())
            .with_max_timeout(self.runtime.max_timeout()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shaperpc_contract::{
        AsyncResult, InterfaceDescriptor, MethodDescriptor, TypeDescriptor, type_of,
    };
    use tracing_test::traced_test;

    struct Scoped;

    impl ServiceContract for Scoped {
        fn describe() -> InterfaceDescriptor {
            InterfaceDescriptor::new("Scoped")
                .service()
                .method(
                    MethodDescriptor::new("Get", type_of::<AsyncResult<i32>>())
                        .param("scope", TypeDescriptor::named("RequestScope"))
                        .operation(),
                )
                .method(MethodDescriptor::new("Helper", type_of::<i32>()))
        }
    }

    #[test]
    fn test_defaults() {
        let bootstrap = Bootstrap::new();
        assert_eq!(bootstrap.server_filters().len(), 1);
        assert_eq!(bootstrap.client_filters().len(), 1);
        assert_eq!(
            bootstrap.server_filters().registrations()[0].name(),
            ERROR_DETAIL_FILTER
        );
        assert!(bootstrap.cache().is_empty());
    }

    #[test]
    #[traced_test]
    fn test_describe_is_cached() {
        let bootstrap = Bootstrap::new();
        let first = bootstrap.describe::<Scoped>().unwrap();
        let second = bootstrap.describe::<Scoped>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(bootstrap.cache().len(), 1);
        // Helper has no operation marker, reported once
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|line| line.contains("method=Scoped.Helper")).count() {
                1 => Ok(()),
                n => Err(format!("expected one diagnostic for Helper, got {n}")),
            }
        });
    }

    #[test]
    fn test_context_types_follow_configuration() {
        // RequestScope is payload by default
        let default = Bootstrap::new().describe::<Scoped>().unwrap();
        let op = default.operation("/Scoped/Get").unwrap();
        assert_eq!(op.request().len(), 1);

        let contract = ContractConfiguration::with_context_types(vec!["RequestScope".to_string()]);
        let scoped = Bootstrap::with_configuration(&contract, RuntimeConfiguration::default());
        let description = scoped.describe::<Scoped>().unwrap();
        assert!(description.operation("/Scoped/Get").unwrap().request().is_empty());
    }

    #[test]
    fn test_services_are_shared() {
        let bootstrap = Bootstrap::new().service(42u32).server_filter(FilterRegistration::new(
            "needs-u32",
            0,
            |services| Ok(services.get::<u32>().map(|_| detail_filter())),
        ));
        assert_eq!(bootstrap.services().get::<u32>().as_deref(), Some(&42));
        assert_eq!(bootstrap.server_filters().len(), 2);
        assert!(bootstrap.server_filters().resolve(bootstrap.services()).is_ok());
    }

    fn detail_filter() -> Arc<dyn shaperpc_runtime::Filter> {
        Arc::new(ClientErrorDetailFilter)
    }
}
