// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Process-wide cache of analyzed contracts
//!
//! The cache is an explicit object owned by the process bootstrap and shared
//! as `Arc<ContractCache>`. Each key is written once: the lock is held while
//! a contract is analyzed, so concurrent first requests for the same key are
//! serialized and every caller receives the same `Arc`.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::analyzer::ContractAnalyzer;
use crate::description::ContractDescription;
use crate::error::ContractError;
use crate::interface::{InterfaceDescriptor, ServiceContract};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContractKey {
    /// A Rust type implementing [`ServiceContract`]
    Type(TypeId),
    /// A raw descriptor, keyed by its full name
    Interface(String),
}

/// Result of a cache lookup
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub description: Arc<ContractDescription>,
    /// True only for the lookup that ran the analysis
    pub analyzed: bool,
}

#[derive(Debug, Default)]
pub struct ContractCache {
    analyzer: ContractAnalyzer,
    entries: Mutex<HashMap<ContractKey, Arc<ContractDescription>>>,
}

impl ContractCache {
    pub fn new(analyzer: ContractAnalyzer) -> Self {
        Self {
            analyzer,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn analyzer(&self) -> &ContractAnalyzer {
        &self.analyzer
    }

    pub fn get_or_analyze<C: ServiceContract>(
        &self,
    ) -> Result<Arc<ContractDescription>, ContractError> {
        Ok(self.entry::<C>()?.description)
    }

    /// Like [`ContractCache::get_or_analyze`], also telling whether this
    /// call did the analysis
    pub fn entry<C: ServiceContract>(&self) -> Result<CacheEntry, ContractError> {
        self.get_or_insert_with(ContractKey::Type(TypeId::of::<C>()), C::describe)
    }

    pub fn get_or_analyze_interface(
        &self,
        interface: &InterfaceDescriptor,
    ) -> Result<Arc<ContractDescription>, ContractError> {
        let entry = self.get_or_insert_with(ContractKey::Interface(interface.full_name()), || {
            interface.clone()
        })?;
        Ok(entry.description)
    }

    fn get_or_insert_with(
        &self,
        key: ContractKey,
        describe: impl FnOnce() -> InterfaceDescriptor,
    ) -> Result<CacheEntry, ContractError> {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&key) {
            return Ok(CacheEntry {
                description: existing.clone(),
                analyzed: false,
            });
        }

        let description = Arc::new(self.analyzer.analyze(&describe())?);
        debug!(contract = %description.contract_name, "contract cached");
        entries.insert(key, description.clone());
        Ok(CacheEntry {
            description,
            analyzed: true,
        })
    }

    pub fn contains<C: ServiceContract>(&self) -> bool {
        self.entries
            .lock()
            .contains_key(&ContractKey::Type(TypeId::of::<C>()))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
