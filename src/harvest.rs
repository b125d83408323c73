use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::evaluate::{evaluate_repository, EvalContext, PrRecord};

/// Fan the evaluator out across a bounded pool of workers and collect the
/// qualifying records in completion order.
///
/// The pool keeps at most `workers` evaluations in flight: the initial batch
/// fills it, then every completed evaluation feeds the next candidate in.
/// Each evaluation runs in its own task so a panic is isolated to the one
/// repository.
pub async fn run(ctx: Arc<EvalContext>, repos: Vec<String>, workers: usize) -> Vec<PrRecord> {
    let workers = workers.max(1);
    let total = repos.len();
    let mut pending = repos.into_iter();

    let mut in_flight = FuturesUnordered::new();
    for _ in 0..workers {
        if let Some(name) = pending.next() {
            in_flight.push(spawn_evaluation(ctx.clone(), name));
        }
    }

    let mut records = Vec::new();
    let mut completed = 0usize;

    while let Some(joined) = in_flight.next().await {
        completed += 1;
        match joined {
            Ok((name, Some(record))) => {
                info!(
                    repo = %name,
                    files_changed = record.files_changed,
                    "processed {completed}/{total}"
                );
                records.push(record);
            }
            Ok((name, None)) => {
                debug!(repo = %name, "processed {completed}/{total}: no qualifying pull request");
            }
            Err(e) => {
                warn!(error = %e, "repository task panicked");
            }
        }

        if let Some(name) = pending.next() {
            in_flight.push(spawn_evaluation(ctx.clone(), name));
        }
    }

    records
}

fn spawn_evaluation(
    ctx: Arc<EvalContext>,
    name: String,
) -> JoinHandle<(String, Option<PrRecord>)> {
    tokio::spawn(async move {
        let record = evaluate_repository(&ctx, &name).await;
        (name, record)
    })
}
