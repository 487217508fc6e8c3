//! Request aggregator: fan out several interface calls concurrently and join
//! their results in call order.
//!
//! An aggregator is built for one unit of work from a set of interface ids
//! (or an id prefix). Each id gets an entry in an explicit dispatch table
//! keyed by its last segment; chained [`Aggregator::call`]s enqueue work and
//! no I/O happens until [`Aggregator::done`].

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::error;

use crate::context::GatewayContext;
use crate::proxy::{Params, Proxy, ProxyError, ResponseBody};

/// Handler invoked for one failing entry.
pub type ErrorHook = Arc<dyn Fn(&ProxyError) + Send + Sync>;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("no call named [{0}] registered in this aggregator")]
    UnknownCall(String),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

/// Outcome of one `done()` finalization.
#[derive(Debug)]
pub enum AggregateOutcome {
    /// Every queued call succeeded; results are in enqueue order.
    Complete(Vec<ResponseBody>),
    /// At least one call failed. Successful results keep their enqueue
    /// positions; the error hooks have already run, one per failure.
    Partial {
        results: Vec<Option<ResponseBody>>,
        failed: usize,
    },
}

struct QueueEntry {
    proxy: Arc<Proxy>,
    params: Params,
    on_error: Option<ErrorHook>,
}

pub struct Aggregator {
    dispatch: HashMap<String, Arc<Proxy>>,
    queue: Vec<QueueEntry>,
    fallback: Option<ErrorHook>,
}

impl Aggregator {
    /// Build the dispatch table for a set of interface ids. An entry ending
    /// in `.*` expands to every id with that literal prefix. The call name
    /// is the id's last segment; when two ids collide on it, the later one
    /// falls back to the full id with dots replaced by underscores.
    pub fn new<S: AsRef<str>>(
        ctx: &GatewayContext,
        interfaces: &[S],
    ) -> Result<Self, AggregateError> {
        let mut ids: Vec<String> = Vec::new();
        for pattern in interfaces {
            let pattern = pattern.as_ref();
            match pattern.strip_suffix('*') {
                Some(prefix) if prefix.ends_with('.') => {
                    ids.extend(ctx.registry().get_interface_ids_by_prefix(prefix));
                }
                _ => ids.push(pattern.to_string()),
            }
        }

        let mut dispatch = HashMap::with_capacity(ids.len());
        for id in ids {
            let proxy = ctx.proxy(&id)?;
            let short = id.rsplit('.').next().unwrap_or(&id).to_string();
            match dispatch.entry(short) {
                Entry::Vacant(slot) => {
                    slot.insert(proxy);
                }
                Entry::Occupied(_) => {
                    dispatch.insert(id.replace('.', "_"), proxy);
                }
            }
        }

        Ok(Aggregator {
            dispatch,
            queue: Vec::new(),
            fallback: None,
        })
    }

    /// Enqueue one call and return the builder for further chaining.
    pub fn call(self, name: &str, params: Params) -> Result<Self, AggregateError> {
        self.call_with_hook(name, params, None)
    }

    /// Enqueue one call with a per-call error hook, which takes precedence
    /// over the aggregator-level handler for this entry only.
    pub fn call_with_hook(
        mut self,
        name: &str,
        params: Params,
        on_error: Option<ErrorHook>,
    ) -> Result<Self, AggregateError> {
        let proxy = self
            .dispatch
            .get(name)
            .cloned()
            .ok_or_else(|| AggregateError::UnknownCall(name.to_string()))?;
        self.queue.push(QueueEntry {
            proxy,
            params,
            on_error,
        });
        Ok(self)
    }

    /// Register the aggregator-level error handler.
    pub fn error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ProxyError) + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(hook));
        self
    }

    /// Dispatch every queued entry concurrently and join the results.
    ///
    /// An empty queue completes immediately with zero results. Otherwise all
    /// entries are spawned back to back; completions arrive over a channel
    /// as `(enqueue index, result)` pairs and land in the slot matching the
    /// index, so result order is enqueue order no matter which call finishes
    /// first. A failing entry runs its error hook (per-call, then
    /// aggregator-level, then a default that logs) and never blocks or
    /// cancels its siblings.
    pub async fn done(self) -> AggregateOutcome {
        let Aggregator {
            queue, fallback, ..
        } = self;
        if queue.is_empty() {
            return AggregateOutcome::Complete(Vec::new());
        }

        let len = queue.len();
        let (tx, mut rx) = mpsc::channel(len);
        for (index, entry) in queue.into_iter().enumerate() {
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = entry.proxy.request(&entry.params, None).await;
                let _ = tx.send((index, entry.proxy, entry.on_error, result)).await;
            });
        }
        drop(tx);

        let mut slots: Vec<Option<ResponseBody>> = vec![None; len];
        let mut failed = 0usize;
        while let Some((index, proxy, on_error, result)) = rx.recv().await {
            match result {
                Ok(body) => slots[index] = Some(body),
                Err(err) => {
                    failed += 1;
                    match on_error.as_ref().or(fallback.as_ref()) {
                        Some(hook) => hook(&err),
                        None => error!(
                            "request for interface [{}] failed: {}",
                            proxy.profile().id,
                            err
                        ),
                    }
                }
            }
        }

        if failed == 0 {
            AggregateOutcome::Complete(slots.into_iter().flatten().collect())
        } else {
            AggregateOutcome::Partial {
                results: slots,
                failed,
            }
        }
    }
}
