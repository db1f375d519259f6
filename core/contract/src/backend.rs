// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use crate::description::ContractDescription;

/// Turns an analyzed contract into executable bindings
///
/// Every operation of the description must end up with a binding of the
/// form `(service, request header?, request stream?, call context) ->
/// response header? / response stream? / response`. Whether bindings are
/// interpreted at run time or generated ahead of time is up to the backend.
pub trait CodegenBackend {
    type Output;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn generate(&self, contract: &ContractDescription) -> Result<Self::Output, Self::Error>;
}
