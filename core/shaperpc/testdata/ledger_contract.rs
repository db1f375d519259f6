// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// Contract whose generated stubs are compiled into the test suite. Included
// by build.rs and by tests/generated_stubs.rs.

fn ledger_contract() -> InterfaceDescriptor {
    InterfaceDescriptor::new("Ledger")
        .in_namespace("bank")
        .service()
        .method(
            MethodDescriptor::new("PostAsync", type_of::<AsyncResult<i64>>())
                .param("account", type_of::<String>())
                .param("amount", type_of::<i64>())
                .operation(),
        )
        .method(
            MethodDescriptor::new("Post", type_of::<i64>())
                .param("account", type_of::<String>())
                .param("amount", type_of::<i64>()),
        )
        .method(
            MethodDescriptor::new("Import", type_of::<AsyncResult<i32>>())
                .param("account", type_of::<String>())
                .param("amounts", type_of::<AsyncSequence<i64>>())
                .operation(),
        )
        .method(
            MethodDescriptor::new("History", type_of::<AsyncSequence<i64>>())
                .param("account", type_of::<String>())
                .operation(),
        )
        .method(
            MethodDescriptor::new(
                "Mirror",
                type_of::<AsyncResult<(String, AsyncSequence<i64>)>>(),
            )
            .param("amounts", type_of::<AsyncSequence<i64>>())
            .operation(),
        )
}
