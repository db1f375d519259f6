// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Ahead-of-time code generation for shaperpc contracts
//!
//! [`RustStubBackend`] renders an analyzed contract into a Rust source file
//! holding one trait per service and the functions registering an
//! implementation into a runtime method table.

pub mod common;
pub mod rust;

pub use common::{GenerateError, GeneratedArtifact, parse_parameters, write_artifact};
pub use rust::RustStubBackend;
