// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::context::CallContext;
use crate::status::Status;

/// A step of the call pipeline
///
/// A filter continues the chain by calling [`Next::run`]. Returning without
/// calling it short-circuits the call, leaving the response as the filter
/// set it.
#[async_trait]
pub trait Filter: Send + Sync {
    async fn invoke(&self, ctx: &mut CallContext, next: Next<'_>) -> Result<(), Status>;
}

/// The end of the pipeline: the operation itself on the server, the
/// transport on the client
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &mut CallContext) -> Result<(), Status>;
}

/// Continuation handed to a filter
///
/// Each step runs at most once per call. Running the same continuation
/// again returns the result of the first run without re-entering
/// downstream filters.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    pipeline: &'a FilterPipeline<'a>,
    step: usize,
}

impl Next<'_> {
    pub async fn run(self, ctx: &mut CallContext) -> Result<(), Status> {
        self.pipeline.run_step(self.step, ctx).await
    }
}

/// Filters plus terminal handler for a single call
pub struct FilterPipeline<'a> {
    filters: &'a [Arc<dyn Filter>],
    terminal: &'a dyn Handler,
    cursor: AtomicUsize,
    results: Vec<OnceLock<Result<(), Status>>>,
}

impl<'a> FilterPipeline<'a> {
    pub fn new(filters: &'a [Arc<dyn Filter>], terminal: &'a dyn Handler) -> Self {
        Self {
            filters,
            terminal,
            cursor: AtomicUsize::new(0),
            results: (0..=filters.len()).map(|_| OnceLock::new()).collect(),
        }
    }

    pub async fn run(&self, ctx: &mut CallContext) -> Result<(), Status> {
        self.run_step(0, ctx).await
    }

    fn run_step<'s>(
        &'s self,
        step: usize,
        ctx: &'s mut CallContext,
    ) -> BoxFuture<'s, Result<(), Status>> {
        Box::pin(async move {
            if self
                .cursor
                .compare_exchange(step, step + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                // already consumed; a step still in flight reports success
                return self
                    .results
                    .get(step)
                    .and_then(|slot| slot.get().cloned())
                    .unwrap_or(Ok(()));
            }

            let result = match self.filters.get(step) {
                Some(filter) => {
                    let next = Next {
                        pipeline: self,
                        step: step + 1,
                    };
                    filter.invoke(ctx, next).await
                }
                None => self.terminal.handle(ctx).await,
            };

            if let Some(slot) = self.results.get(step) {
                let _ = slot.set(result.clone());
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CallSide;
    use crate::provider::ServiceProvider;
    use parking_lot::Mutex;
    use shaperpc_contract::{ContractAnalyzer, InterfaceDescriptor, MethodDescriptor, type_of};
    use tokio_util::sync::CancellationToken;

    type Journal = Arc<Mutex<Vec<String>>>;

    fn context() -> CallContext {
        let iface = InterfaceDescriptor::new("Svc")
            .service()
            .method(MethodDescriptor::new("Op", type_of::<i32>()).operation());
        let description = ContractAnalyzer::default().analyze(&iface).unwrap();
        let operation = description.operations().next().unwrap().clone();
        CallContext::new(
            Arc::new(operation),
            CallSide::Server,
            Arc::new(ServiceProvider::new()),
            CancellationToken::new(),
        )
    }

    struct Record {
        name: &'static str,
        journal: Journal,
        next_calls: usize,
    }

    #[async_trait]
    impl Filter for Record {
        async fn invoke(&self, ctx: &mut CallContext, next: Next<'_>) -> Result<(), Status> {
            self.journal.lock().push(self.name.to_string());
            let mut result = Ok(());
            for _ in 0..self.next_calls {
                result = next.run(ctx).await;
            }
            result
        }
    }

    struct Terminal {
        journal: Journal,
        outcome: Result<(), Status>,
    }

    #[async_trait]
    impl Handler for Terminal {
        async fn handle(&self, _ctx: &mut CallContext) -> Result<(), Status> {
            self.journal.lock().push("T".to_string());
            self.outcome.clone()
        }
    }

    fn record(name: &'static str, journal: &Journal, next_calls: usize) -> Arc<dyn Filter> {
        Arc::new(Record {
            name,
            journal: journal.clone(),
            next_calls,
        })
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let journal = Journal::default();
        let filters = vec![record("A", &journal, 1), record("B", &journal, 1)];
        let terminal = Terminal {
            journal: journal.clone(),
            outcome: Ok(()),
        };

        FilterPipeline::new(&filters, &terminal)
            .run(&mut context())
            .await
            .unwrap();
        assert_eq!(*journal.lock(), vec!["A", "B", "T"]);
    }

    #[tokio::test]
    async fn test_next_twice_runs_downstream_once() {
        let journal = Journal::default();
        let filters = vec![record("A", &journal, 2), record("B", &journal, 1)];
        let terminal = Terminal {
            journal: journal.clone(),
            outcome: Err(Status::not_found("missing")),
        };

        let result = FilterPipeline::new(&filters, &terminal)
            .run(&mut context())
            .await;
        assert_eq!(*journal.lock(), vec!["A", "B", "T"]);
        // the repeated next() reports the result of the first run
        assert_eq!(result.unwrap_err().code(), crate::status::Code::NotFound);
    }

    #[tokio::test]
    async fn test_filter_short_circuits() {
        let journal = Journal::default();
        let filters = vec![record("A", &journal, 0), record("B", &journal, 1)];
        let terminal = Terminal {
            journal: journal.clone(),
            outcome: Ok(()),
        };

        FilterPipeline::new(&filters, &terminal)
            .run(&mut context())
            .await
            .unwrap();
        assert_eq!(*journal.lock(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_empty_pipeline_runs_terminal() {
        let journal = Journal::default();
        let terminal = Terminal {
            journal: journal.clone(),
            outcome: Ok(()),
        };

        let pipeline = FilterPipeline::new(&[], &terminal);
        let mut ctx = context();
        pipeline.run(&mut ctx).await.unwrap();
        // a second run of the whole pipeline does not reach the terminal
        pipeline.run(&mut ctx).await.unwrap();
        assert_eq!(*journal.lock(), vec!["T"]);
    }
}
