//! Concurrent fan-out of one prompt to many targets.
//!
//! [`Dispatcher::dispatch_all`] spawns one task per target, bounds how many
//! run their network call at once, and folds every per-target failure into a
//! [`DispatchOutcome`] instead of letting it abort the batch. Outcomes come
//! back in completion order; callers that need input order re-key on
//! [`DispatchOutcome::target_id`]. A progress callback fires exactly once per
//! completed target with a strictly increasing completed count.
//!
//! [`dispatch_with_token`](Dispatcher::dispatch_with_token) adds cooperative
//! cancellation: the token is checked before each network call, remaining
//! tasks are aborted when it fires, and targets that never produced an
//! outcome get a synthesized [`DispatchError::Cancelled`] one so the
//! one-outcome-per-target invariant holds even for abandoned batches.
//! Requests already accepted server-side are discarded, not killed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::{Id as TaskId, JoinSet};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::logging::{log_debug, log_info, log_warn};
use crate::providers::ProviderAdapter;
use crate::registry::{Target, TargetId, TargetRegistry};

/// Grace period for collecting results that slip in while aborted tasks
/// unwind after cancellation.
const CANCEL_DRAIN_GRACE: Duration = Duration::from_secs(5);

/// The per-target result of one dispatch round.
///
/// Exactly one outcome exists per target per call, success or not. Failed
/// outcomes carry the error; [`is_success`](DispatchOutcome::is_success)
/// derives from its absence.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub target_id: TargetId,
    /// Human-facing label, as [`Target::display_name`] derives it.
    pub target_name: String,
    /// Reply text; empty when the target failed.
    pub response_text: String,
    /// Total token usage when the provider reported it.
    pub tokens_used: Option<u32>,
    /// Wall time spent in the network call. Zero when the worker never
    /// dialed (missing credential, cancellation before send); workers
    /// abandoned mid-flight report time since batch start instead.
    pub elapsed: Duration,
    pub error: Option<DispatchError>,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn success(
        target: &Target,
        response_text: String,
        tokens_used: Option<u32>,
        elapsed: Duration,
    ) -> Self {
        Self {
            target_id: target.id,
            target_name: target.display_name(),
            response_text,
            tokens_used,
            elapsed,
            error: None,
        }
    }

    fn failure(target: &Target, error: DispatchError, elapsed: Duration) -> Self {
        Self {
            target_id: target.id,
            target_name: target.display_name(),
            response_text: String::new(),
            tokens_used: None,
            elapsed,
            error: Some(error),
        }
    }
}

/// Fans one prompt out to a set of targets and joins the results.
///
/// The concurrency cap and request timeout come from the adapter's
/// [`DispatchParams`](crate::config::DispatchParams); the registry resolves
/// each target's credential right before its network call.
pub struct Dispatcher {
    registry: Arc<TargetRegistry>,
    adapter: Arc<ProviderAdapter>,
}

impl Dispatcher {
    pub fn new(registry: Arc<TargetRegistry>, adapter: Arc<ProviderAdapter>) -> Self {
        Self { registry, adapter }
    }

    /// Sends `prompt` to every target and blocks until all outcomes are in.
    ///
    /// `progress(completed, total)` is invoked once per finished target from
    /// the join loop, so calls never overlap and `completed` counts strictly
    /// 1 through `total`. An empty target slice returns an empty vec without
    /// touching the network.
    pub async fn dispatch_all<F>(
        &self,
        targets: &[Arc<Target>],
        prompt: &str,
        progress: F,
    ) -> Vec<DispatchOutcome>
    where
        F: FnMut(usize, usize),
    {
        self.dispatch_with_token(targets, prompt, CancellationToken::new(), progress)
            .await
    }

    /// Like [`dispatch_all`](Dispatcher::dispatch_all), with cooperative
    /// abandonment. When `cancel` fires, workers that have not started their
    /// network call return [`DispatchError::Cancelled`], in-flight tasks are
    /// aborted client-side, and every target still ends up with exactly one
    /// outcome (and one progress call).
    pub async fn dispatch_with_token<F>(
        &self,
        targets: &[Arc<Target>],
        prompt: &str,
        cancel: CancellationToken,
        mut progress: F,
    ) -> Vec<DispatchOutcome>
    where
        F: FnMut(usize, usize),
    {
        let total = targets.len();
        if total == 0 {
            log_debug!("Dispatch requested with no targets, nothing to do");
            return Vec::new();
        }

        let batch_id = Uuid::new_v4();
        let started = Instant::now();
        log_info!(
            batch_id = %batch_id,
            targets = total,
            prompt_chars = prompt.len(),
            "Dispatch batch started"
        );

        let semaphore = Arc::new(Semaphore::new(self.adapter.params().max_concurrent.max(1)));
        let prompt: Arc<str> = Arc::from(prompt);

        let mut set: JoinSet<DispatchOutcome> = JoinSet::new();
        let mut task_targets: HashMap<TaskId, Arc<Target>> = HashMap::new();

        for target in targets {
            let registry = Arc::clone(&self.registry);
            let adapter = Arc::clone(&self.adapter);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let prompt = Arc::clone(&prompt);
            let target = Arc::clone(target);
            let target_for_map = Arc::clone(&target);

            let handle = set.spawn(async move {
                run_target(&registry, &adapter, &target, &prompt, &semaphore, &cancel).await
            });
            task_targets.insert(handle.id(), target_for_map);
        }

        let mut outcomes: Vec<DispatchOutcome> = Vec::with_capacity(total);
        let mut seen: HashSet<TargetId> = HashSet::new();
        // Every recorded outcome gets exactly one progress call, from this
        // single place, so counts are strictly increasing and never overlap.
        let record = |outcome: DispatchOutcome,
                      outcomes: &mut Vec<DispatchOutcome>,
                      seen: &mut HashSet<TargetId>,
                      progress: &mut F| {
            seen.insert(outcome.target_id);
            outcomes.push(outcome);
            progress(outcomes.len(), total);
        };

        // Single-consumer join loop: collecting here (not in the workers)
        // serializes outcome collection and progress reporting for free.
        loop {
            tokio::select! {
                biased; // prefer finished work over the cancel signal
                joined = set.join_next() => {
                    match joined {
                        Some(Ok(outcome)) => {
                            record(outcome, &mut outcomes, &mut seen, &mut progress);
                            if set.is_empty() {
                                break;
                            }
                        }
                        Some(Err(join_err)) if join_err.is_panic() => {
                            // A panicking worker must not take the batch down;
                            // attribute it to its target via the task id.
                            log_warn!(batch_id = %batch_id, "Dispatch worker panicked: {join_err}");
                            if let Some(target) = task_targets.get(&join_err.id()) {
                                let outcome = DispatchOutcome::failure(
                                    target,
                                    DispatchError::transport("dispatch worker panicked", None),
                                    started.elapsed(),
                                );
                                record(outcome, &mut outcomes, &mut seen, &mut progress);
                            }
                            if set.is_empty() {
                                break;
                            }
                        }
                        Some(Err(_)) => {
                            // Aborted before our own abort_all: nothing to record,
                            // the mark-missing pass below covers the target.
                            if set.is_empty() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = cancel.cancelled() => {
                    log_warn!(batch_id = %batch_id, pending = set.len(), "Dispatch batch cancelled, aborting remaining workers");
                    set.abort_all();
                    break;
                }
            }
        }

        // Drain outcomes that completed while abort_all unwound, bounded so a
        // hung task cannot stall the batch return.
        let drain_grace = tokio::time::sleep(CANCEL_DRAIN_GRACE);
        tokio::pin!(drain_grace);
        loop {
            tokio::select! {
                biased;
                joined = set.join_next() => {
                    match joined {
                        Some(Ok(outcome)) => record(outcome, &mut outcomes, &mut seen, &mut progress),
                        Some(Err(join_err)) if join_err.is_panic() => {
                            if let Some(target) = task_targets.get(&join_err.id()) {
                                let outcome = DispatchOutcome::failure(
                                    target,
                                    DispatchError::transport("dispatch worker panicked", None),
                                    started.elapsed(),
                                );
                                record(outcome, &mut outcomes, &mut seen, &mut progress);
                            }
                        }
                        Some(Err(_)) => {}
                        None => break,
                    }
                }
                _ = &mut drain_grace => {
                    log_warn!(batch_id = %batch_id, hung = set.len(), "Workers ignored abort, abandoning drain");
                    break;
                }
            }
        }

        // Every target gets an outcome even when the batch was abandoned.
        for target in targets {
            if !seen.contains(&target.id) {
                let outcome =
                    DispatchOutcome::failure(target, DispatchError::cancelled(), started.elapsed());
                record(outcome, &mut outcomes, &mut seen, &mut progress);
            }
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        log_info!(
            batch_id = %batch_id,
            outcomes = outcomes.len(),
            succeeded = succeeded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Dispatch batch complete"
        );
        outcomes
    }
}

/// One worker: resolve the credential, wait for a concurrency permit, send,
/// and fold whatever happened into an outcome. Never returns early with a
/// panic or an `Err`; the batch sees failures only as failed outcomes.
async fn run_target(
    registry: &TargetRegistry,
    adapter: &ProviderAdapter,
    target: &Target,
    prompt: &str,
    semaphore: &Arc<Semaphore>,
    cancel: &CancellationToken,
) -> DispatchOutcome {
    let Some(api_key) = registry.credential_for(target) else {
        return DispatchOutcome::failure(
            target,
            DispatchError::credential_missing(&target.credential_ref),
            Duration::ZERO,
        );
    };

    let _permit = match Arc::clone(semaphore).acquire_owned().await {
        Ok(permit) => permit,
        // The semaphore is never closed while workers run; treat a closed
        // semaphore like a cancelled batch rather than panic.
        Err(_) => {
            return DispatchOutcome::failure(target, DispatchError::cancelled(), Duration::ZERO)
        }
    };

    // Cooperative cancellation point: once we pass this check the request
    // goes out and runs to completion or timeout.
    if cancel.is_cancelled() {
        return DispatchOutcome::failure(target, DispatchError::cancelled(), Duration::ZERO);
    }

    let started = Instant::now();
    let sent = adapter.send(target, &api_key, prompt).await;
    let elapsed = started.elapsed();

    match sent {
        Ok(reply) => {
            log_info!(
                target = %target.name,
                elapsed_ms = elapsed.as_millis() as u64,
                tokens_used = reply.tokens_used,
                "Target replied"
            );
            DispatchOutcome::success(target, reply.text, reply.tokens_used, elapsed)
        }
        Err(error) => {
            log_warn!(
                target = %target.name,
                elapsed_ms = elapsed.as_millis() as u64,
                reason = error.reason(),
                "Target failed"
            );
            DispatchOutcome::failure(target, error, elapsed)
        }
    }
}
