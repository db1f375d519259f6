// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Contract analysis
//!
//! Walks the inheritance closure of a root interface, classifies every
//! method, removes naming conflicts, pairs blocking methods with their async
//! counterparts and sorts the result so that two analyses of the same
//! interface are identical.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::classifier::SignatureClassifier;
use crate::description::{
    ContractDescription, Diagnostic, DiagnosticKind, InterfaceDescription, NotSupportedMethod,
    ServiceDescription, SyncOverAsync,
};
use crate::error::ContractError;
use crate::interface::{InterfaceDescriptor, MethodDescriptor};
use crate::message::MessageShapeBuilder;
use crate::naming;
use crate::operation::{MethodRef, OperationShape};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Service(usize),
    Interface(usize),
}

/// A method left out of the operation set that may still pair with an async operation
struct Candidate<'a> {
    owner: Owner,
    method: &'a MethodDescriptor,
    method_ref: MethodRef,
}

#[derive(Debug, Clone, Default)]
pub struct ContractAnalyzer {
    classifier: SignatureClassifier,
}

impl ContractAnalyzer {
    pub fn new(classifier: SignatureClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &SignatureClassifier {
        &self.classifier
    }

    /// Analyzes `root` and everything it inherits from
    ///
    /// Individual methods never fail the analysis; they end up as
    /// diagnostics. The only error is a root without any service interface.
    pub fn analyze(
        &self,
        root: &InterfaceDescriptor,
    ) -> Result<ContractDescription, ContractError> {
        let closure = interface_closure(root);
        if !closure.iter().any(|i| i.is_service()) {
            return Err(ContractError::ContractEmpty(root.full_name()));
        }

        let mut services = Vec::new();
        let mut interfaces = Vec::new();
        let mut candidates = Vec::new();

        for &interface in &closure {
            if interface.is_service() {
                let owner = Owner::Service(services.len());
                services.push(self.describe_service(interface, owner, &mut candidates));
            } else {
                let owner = Owner::Interface(interfaces.len());
                interfaces.push(describe_plain(interface, owner, &mut candidates));
            }
        }

        resolve_conflicts(&mut services);
        self.resolve_sync_over_async(&mut services, &mut interfaces, &candidates);

        services.sort_by(|a, b| a.interface_name.cmp(&b.interface_name));
        for service in &mut services {
            service.operations.sort_by(|a, b| {
                (a.operation_name(), &a.method().signature)
                    .cmp(&(b.operation_name(), &b.method().signature))
            });
            sort_not_supported(&mut service.not_supported);
            service
                .sync_over_async
                .sort_by(|a, b| a.sync_method.cmp(&b.sync_method));
            service.plain_parents.sort();
        }
        interfaces.sort_by(|a, b| a.interface_name.cmp(&b.interface_name));
        for interface in &mut interfaces {
            sort_not_supported(&mut interface.methods);
        }

        let description = ContractDescription {
            contract_name: root.full_name(),
            services,
            interfaces,
        };

        debug!(
            contract = %description.contract_name,
            services = description.services.len(),
            operations = description.operations().count(),
            diagnostics = description.diagnostics().count(),
            "contract analyzed"
        );

        Ok(description)
    }

    fn describe_service<'a>(
        &self,
        interface: &'a InterfaceDescriptor,
        owner: Owner,
        candidates: &mut Vec<Candidate<'a>>,
    ) -> ServiceDescription {
        let service_name = naming::service_name(interface);
        let mut operations = Vec::new();
        let mut not_supported = Vec::new();

        for method in interface.methods.iter().filter(|m| !m.is_static) {
            let method_ref = MethodRef::new(interface, method);

            if method.operation.is_none() {
                not_supported.push(NotSupportedMethod {
                    method: method_ref.clone(),
                    diagnostic: Diagnostic::new(
                        DiagnosticKind::NotOperation,
                        "method is not marked as an operation",
                    ),
                });
                candidates.push(Candidate {
                    owner,
                    method,
                    method_ref,
                });
                continue;
            }

            match self.classifier.describe(&service_name, interface, method) {
                Ok(operation) => operations.push(operation),
                Err(e) => not_supported.push(NotSupportedMethod {
                    method: method_ref,
                    diagnostic: Diagnostic::new(
                        DiagnosticKind::UnsupportedSignature,
                        e.to_string(),
                    ),
                }),
            }
        }

        ServiceDescription {
            interface_name: interface.full_name(),
            service_name,
            operations,
            not_supported,
            sync_over_async: Vec::new(),
            plain_parents: interface
                .extends
                .iter()
                .filter(|p| !p.is_service())
                .map(|p| p.full_name())
                .collect(),
        }
    }

    fn resolve_sync_over_async(
        &self,
        services: &mut [ServiceDescription],
        interfaces: &mut [InterfaceDescription],
        candidates: &[Candidate<'_>],
    ) {
        for candidate in candidates {
            let Ok(signature) = self.classifier.classify(candidate.method) else {
                continue;
            };
            if signature.shape != OperationShape::Unary || signature.is_async {
                continue;
            }
            let shapes = MessageShapeBuilder::build(candidate.method, &signature);
            let async_name = format!("{}Async", candidate.method.name);

            // the candidate's own service is searched first
            let mut order: Vec<usize> = (0..services.len()).collect();
            if let Owner::Service(own) = candidate.owner {
                order.retain(|&i| i != own);
                order.insert(0, own);
            }

            let found = order.into_iter().find_map(|i| {
                services[i]
                    .operations
                    .iter()
                    .find(|op| {
                        op.shape() == OperationShape::Unary
                            && op.is_async()
                            && op.method().method.eq_ignore_ascii_case(&async_name)
                            && op.request_header().is_none()
                            && op.response_header().is_none()
                            && op.request() == &shapes.request
                            && op.response() == &shapes.response
                    })
                    .map(|op| (i, op.method().clone(), op.path()))
            });

            let Some((service_index, async_method, operation_path)) = found else {
                continue;
            };

            let list = match candidate.owner {
                Owner::Service(i) => &mut services[i].not_supported,
                Owner::Interface(i) => &mut interfaces[i].methods,
            };
            list.retain(|entry| entry.method != candidate.method_ref);

            services[service_index].sync_over_async.push(SyncOverAsync {
                sync_method: candidate.method_ref.clone(),
                async_method,
                operation_path,
            });
        }
    }
}

/// Inheritance closure in pre-order, de-duplicated by full name
fn interface_closure(root: &InterfaceDescriptor) -> Vec<&InterfaceDescriptor> {
    fn visit<'a>(
        interface: &'a InterfaceDescriptor,
        seen: &mut HashSet<String>,
        out: &mut Vec<&'a InterfaceDescriptor>,
    ) {
        if !seen.insert(interface.full_name()) {
            return;
        }
        out.push(interface);
        for parent in &interface.extends {
            visit(parent, seen, out);
        }
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    visit(root, &mut seen, &mut out);
    out
}

fn describe_plain<'a>(
    interface: &'a InterfaceDescriptor,
    owner: Owner,
    candidates: &mut Vec<Candidate<'a>>,
) -> InterfaceDescription {
    let interface_name = interface.full_name();
    let mut methods = Vec::new();

    for method in interface.methods.iter().filter(|m| !m.is_static) {
        let method_ref = MethodRef::new(interface, method);
        methods.push(NotSupportedMethod {
            method: method_ref.clone(),
            diagnostic: Diagnostic::new(
                DiagnosticKind::NotOperation,
                format!("interface {interface_name} is not a service"),
            ),
        });
        candidates.push(Candidate {
            owner,
            method,
            method_ref,
        });
    }

    InterfaceDescription {
        interface_name,
        methods,
    }
}

/// Demotes every operation whose (service, operation) key is not unique
fn resolve_conflicts(services: &mut [ServiceDescription]) {
    let mut groups: HashMap<(String, String), Vec<String>> = HashMap::new();
    for op in services.iter().flat_map(|s| s.operations.iter()) {
        groups
            .entry((op.service_name().to_string(), op.operation_name().to_string()))
            .or_default()
            .push(op.method().to_string());
    }

    let conflicts: HashMap<(String, String), String> = groups
        .into_iter()
        .filter(|(_, methods)| methods.len() > 1)
        .map(|((service, operation), mut methods)| {
            methods.sort();
            let message = format!(
                "operation {} is defined by more than one method: {}",
                naming::operation_path(&service, &operation),
                methods.join("; ")
            );
            ((service, operation), message)
        })
        .collect();

    if conflicts.is_empty() {
        return;
    }

    for service in services.iter_mut() {
        let (conflicting, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut service.operations)
                .into_iter()
                .partition(|op| {
                    conflicts.contains_key(&(
                        op.service_name().to_string(),
                        op.operation_name().to_string(),
                    ))
                });

        service.operations = kept;
        for op in conflicting {
            let key = (op.service_name().to_string(), op.operation_name().to_string());
            let message = conflicts.get(&key).cloned().unwrap_or_default();
            service.not_supported.push(NotSupportedMethod {
                method: op.method().clone(),
                diagnostic: Diagnostic::new(DiagnosticKind::NamingConflict, message),
            });
        }
    }
}

fn sort_not_supported(entries: &mut [NotSupportedMethod]) {
    entries.sort_by(|a, b| {
        (&a.method.method, &a.method.signature, &a.method.interface).cmp(&(
            &b.method.method,
            &b.method.signature,
            &b.method.interface,
        ))
    });
}
