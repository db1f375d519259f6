// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Call filters
//!
//! Filters wrap a call on either side. They are registered with an order
//! key, resolved per call from a [`ServiceProvider`](crate::ServiceProvider)
//! and run as a [`FilterPipeline`] in front of a terminal [`Handler`].

mod error_detail;
mod pipeline;
mod registration;

pub use error_detail::{
    ClientErrorDetailFilter, ERROR_DETAIL_KEY, ERROR_DETAIL_TYPE_KEY, FAULT_TYPE, Fault,
    ServerErrorDetailFilter, restore_fault,
};
pub use pipeline::{Filter, FilterPipeline, Handler, Next};
pub use registration::{FilterFactory, FilterRegistration, FilterRegistry};
