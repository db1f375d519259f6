// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Call adapters bridging bound operations and the transport

mod client;
mod server;

pub use client::{CallOptions, ClientAdapter};
pub use server::{ServerAdapter, ServerDispatch};
