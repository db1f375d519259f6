// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Process-level entry point of shaperpc
//!
//! [`ConfigLoader`] reads the YAML configuration and [`Bootstrap`] turns it
//! into service hosts and client proxies sharing one contract cache.

pub mod bootstrap;
pub mod config;
pub mod contract;
pub mod runtime;

pub use bootstrap::{Bootstrap, BootstrapError};
pub use config::{ConfigError, ConfigLoader, configuration_schema};
pub use contract::ContractConfiguration;
pub use runtime::RuntimeConfiguration;
