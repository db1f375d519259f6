// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use shaperpc_compiler::RustStubBackend;
use shaperpc_contract::{
    AsyncResult, AsyncSequence, CodegenBackend, ContractAnalyzer, InterfaceDescriptor,
    MethodDescriptor, type_of,
};

include!("testdata/ledger_contract.rs");

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=testdata/ledger_contract.rs");

    // Stubs for tests/generated_stubs.rs, so that generated code is built
    // against the current runtime API
    let description = ContractAnalyzer::default()
        .analyze(&ledger_contract())
        .expect("ledger contract should analyze");
    let artifact = RustStubBackend::new()
        .with_module("ledger_rpc")
        .generate(&description)
        .expect("ledger stubs should render");

    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("OUT_DIR must be set"));
    std::fs::write(out_dir.join("ledger_stubs.rs"), artifact.content)
        .expect("failed to write ledger stubs");
}
