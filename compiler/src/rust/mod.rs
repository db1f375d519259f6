// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::fmt::Write;

use shaperpc_contract::{
    CodegenBackend, ContractDescription, OperationDescriptor, OperationShape, ServiceDescription,
};
use tracing::{debug, info};

use crate::common::{GenerateError, GeneratedArtifact};

mod names;

use names::{const_name, module_name, snake_name, type_name};

const DEFAULT_RUNTIME_CRATE: &str = "shaperpc_runtime";

/// Renders a contract as Rust traits over the runtime message types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RustStubBackend {
    module: Option<String>,
    runtime_crate: String,
}

impl Default for RustStubBackend {
    fn default() -> Self {
        Self {
            module: None,
            runtime_crate: DEFAULT_RUNTIME_CRATE.to_string(),
        }
    }
}

impl RustStubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the generated items into `pub mod <module>`
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Path of the runtime crate in the generated `use` items
    pub fn with_runtime_crate(mut self, runtime_crate: impl Into<String>) -> Self {
        self.runtime_crate = runtime_crate.into();
        self
    }

    /// Backend configured from `module` and `runtime_crate` parameters
    pub fn from_parameters(params: &HashMap<String, String>) -> Result<Self, GenerateError> {
        let mut backend = Self::new();
        for (key, value) in params {
            match key.as_str() {
                "module" => {
                    if !is_identifier(value) {
                        return Err(GenerateError::InvalidParameter {
                            key: key.clone(),
                            reason: format!("{value} is not a module name"),
                        });
                    }
                    backend.module = Some(value.clone());
                }
                "runtime_crate" => {
                    if !value.split("::").all(is_identifier) {
                        return Err(GenerateError::InvalidParameter {
                            key: key.clone(),
                            reason: format!("{value} is not a crate path"),
                        });
                    }
                    backend.runtime_crate = value.clone();
                }
                _ => {
                    return Err(GenerateError::InvalidParameter {
                        key: key.clone(),
                        reason: "unknown parameter".to_string(),
                    });
                }
            }
        }
        Ok(backend)
    }

    fn render(&self, contract: &ContractDescription, fingerprint: u64) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "// Code generated by shaperpc-gen. DO NOT EDIT.");
        let _ = writeln!(out, "// contract: {}", contract.contract_name);
        let _ = writeln!(out, "// fingerprint: {fingerprint:016x}");
        let _ = writeln!(out);

        let indent = if self.module.is_some() { "    " } else { "" };
        if let Some(module) = &self.module {
            let _ = writeln!(out, "pub mod {module} {{");
        }

        for service in &contract.services {
            self.render_service(&mut out, indent, service);
            let _ = writeln!(out);
        }
        render_contract_registration(&mut out, indent, &self.runtime_crate, contract);

        if self.module.is_some() {
            let _ = writeln!(out, "}}");
        }
        out
    }

    fn render_service(&self, out: &mut String, indent: &str, service: &ServiceDescription) {
        let module = module_name(&service.service_name);
        let trait_name = type_name(&service.service_name);
        let rt = &self.runtime_crate;

        let _ = writeln!(out, "{indent}/// Service `{}`", service.service_name);
        let _ = writeln!(out, "{indent}pub mod {module} {{");
        let _ = writeln!(out, "{indent}    #![allow(unused_imports)]");
        let _ = writeln!(out);
        let _ = writeln!(out, "{indent}    use std::future::Future;");
        let _ = writeln!(out, "{indent}    use std::sync::Arc;");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{indent}    use {rt}::{{Message, MessageStream, MethodTable, OperationContext, OperationReply, Status}};"
        );
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{indent}    pub const SERVICE_NAME: &str = {:?};",
            service.service_name
        );
        for op in &service.operations {
            let _ = writeln!(
                out,
                "{indent}    pub const {}_PATH: &str = {:?};",
                const_name(op.operation_name()),
                op.path()
            );
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "{indent}    pub trait {trait_name}: Send + Sync + 'static {{");
        for (i, op) in service.operations.iter().enumerate() {
            if i > 0 {
                let _ = writeln!(out);
            }
            render_trait_method(out, indent, op, service);
        }
        let _ = writeln!(out, "{indent}    }}");
        let _ = writeln!(out);

        let _ = writeln!(
            out,
            "{indent}    /// Registers every operation of `{}` into `table`",
            service.service_name
        );
        let _ = writeln!(
            out,
            "{indent}    pub fn register_{module}<S: {trait_name}>(table: MethodTable<S>) -> MethodTable<S> {{"
        );
        let _ = writeln!(out, "{indent}        table");
        for op in &service.operations {
            render_registration(out, indent, op);
        }
        let _ = writeln!(out, "{indent}    }}");
        let _ = writeln!(out, "{indent}}}");
    }
}

fn render_trait_method(
    out: &mut String,
    indent: &str,
    op: &OperationDescriptor,
    service: &ServiceDescription,
) {
    let method = snake_name(op.operation_name());
    let _ = writeln!(
        out,
        "{indent}        /// `{}` ({}), request {}, response {}",
        op.path(),
        op.shape(),
        op.request(),
        op.response()
    );
    if let Some(header) = op.request_header() {
        let _ = writeln!(out, "{indent}        ///");
        let _ = writeln!(out, "{indent}        /// Request header {header}");
    }
    if let Some(header) = op.response_header() {
        let _ = writeln!(out, "{indent}        ///");
        let _ = writeln!(out, "{indent}        /// Response header {header}");
    }
    for pair in service
        .sync_over_async
        .iter()
        .filter(|p| p.operation_path == op.path())
    {
        let _ = writeln!(out, "{indent}        ///");
        let _ = writeln!(
            out,
            "{indent}        /// Also serves the sync method `{}`",
            pair.sync_method.method
        );
    }

    let (params, output) = match op.shape() {
        OperationShape::Unary => ("request: Message", "Message"),
        OperationShape::ClientStreaming => {
            ("header: Option<Message>, requests: MessageStream", "Message")
        }
        OperationShape::ServerStreaming => ("request: Message", "OperationReply"),
        OperationShape::DuplexStreaming => (
            "header: Option<Message>, requests: MessageStream",
            "OperationReply",
        ),
    };
    let _ = writeln!(
        out,
        "{indent}        fn {method}(&self, {params}, ctx: OperationContext) -> impl Future<Output = Result<{output}, Status>> + Send;"
    );
}

fn render_registration(out: &mut String, indent: &str, op: &OperationDescriptor) {
    let method = snake_name(op.operation_name());
    let key = format!("{}.{}", op.method().interface, op.method().method);
    let (helper, params, args) = match op.shape() {
        OperationShape::Unary => ("unary", "request: Message", "request"),
        OperationShape::ClientStreaming => (
            "client_streaming",
            "header: Option<Message>, requests: MessageStream",
            "header, requests",
        ),
        OperationShape::ServerStreaming => ("server_streaming", "request: Message", "request"),
        OperationShape::DuplexStreaming => (
            "duplex",
            "header: Option<Message>, requests: MessageStream",
            "header, requests",
        ),
    };
    let _ = writeln!(
        out,
        "{indent}            .{helper}({key:?}, |service: Arc<S>, {params}, ctx: OperationContext| async move {{"
    );
    let _ = writeln!(out, "{indent}                service.{method}({args}, ctx).await");
    let _ = writeln!(out, "{indent}            }})");
}

fn render_contract_registration(
    out: &mut String,
    indent: &str,
    runtime_crate: &str,
    contract: &ContractDescription,
) {
    let bounds: Vec<String> = contract
        .services
        .iter()
        .map(|s| format!("{}::{}", module_name(&s.service_name), type_name(&s.service_name)))
        .collect();

    let _ = writeln!(
        out,
        "{indent}/// Registers every operation of `{}`",
        contract.contract_name
    );
    let _ = writeln!(
        out,
        "{indent}pub fn register_contract<S: {}>(table: {runtime_crate}::MethodTable<S>) -> {runtime_crate}::MethodTable<S> {{",
        bounds.join(" + ")
    );
    let mut expr = "table".to_string();
    for service in &contract.services {
        let module = module_name(&service.service_name);
        expr = format!("{module}::register_{module}({expr})");
    }
    let _ = writeln!(out, "{indent}    {expr}");
    let _ = writeln!(out, "{indent}}}");
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl CodegenBackend for RustStubBackend {
    type Output = GeneratedArtifact;
    type Error = GenerateError;

    fn name(&self) -> &'static str {
        "rust-stub"
    }

    fn generate(&self, contract: &ContractDescription) -> Result<GeneratedArtifact, GenerateError> {
        let operations = contract.operations().count();
        if operations == 0 {
            return Err(GenerateError::NoOperations(contract.contract_name.clone()));
        }

        let fingerprint = contract.fingerprint()?;
        let artifact = GeneratedArtifact {
            file_name: format!("{}.rs", contract.artifact_name()?),
            content: self.render(contract, fingerprint),
        };
        debug!(file = %artifact.file_name, bytes = artifact.content.len(), "stubs rendered");
        info!(
            contract = %contract.contract_name,
            services = contract.services.len(),
            operations,
            "generated rust stubs"
        );
        Ok(artifact)
    }
}
