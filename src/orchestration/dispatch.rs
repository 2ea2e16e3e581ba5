use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use log::warn;
use tokio::{
    task::{Id, JoinSet},
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;

use super::{FailureKind, ParticipantFailure};
use crate::{
    error::Result,
    participants::Participant,
    transport::ParticipantClient,
};

/// Successful results in selection order, and the failures.
pub type Gathered<T> = (Vec<(Participant, T)>, Vec<ParticipantFailure>);

/// Raised when the run is cancelled while waiting on participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchCancelled;

/// Sends a request to every selected participant at once and waits until all of them
/// answered or `timeout` elapsed.
///
/// Every request runs as its own task. Whatever is still running at the deadline is
/// aborted and recorded as timed out.
///
/// # Arguments
/// * `selected` - The participants with their clients, in selection order.
/// * `timeout` - The longest time to wait for the slowest participant.
/// * `cancel` - Aborts every task and returns early when triggered.
/// * `request` - Builds the request future for a single client.
///
/// # Returns
/// The gathered results or `DispatchCancelled`.
pub async fn scatter_gather<T, F, Fut>(
    selected: Vec<(Participant, Arc<dyn ParticipantClient>)>,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
    request: F,
) -> std::result::Result<Gathered<T>, DispatchCancelled>
where
    T: Send + 'static,
    F: Fn(Arc<dyn ParticipantClient>) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    let mut pending: HashMap<Id, (usize, Participant)> = HashMap::with_capacity(selected.len());

    for (i, (participant, client)) in selected.into_iter().enumerate() {
        let handle = tasks.spawn(request(client));
        pending.insert(handle.id(), (i, participant));
    }

    // a deadline past what the clock can represent never expires
    let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
    let expired = async move {
        match deadline {
            Some(deadline) => time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(expired);

    let mut successes = Vec::with_capacity(pending.len());
    let mut failures = Vec::new();

    loop {
        let joined = tokio::select! {
            _ = cancel.cancelled() => {
                tasks.abort_all();
                return Err(DispatchCancelled);
            }
            _ = &mut expired => break,
            joined = tasks.join_next_with_id() => joined,
        };

        let Some(joined) = joined else {
            break;
        };

        match joined {
            Ok((id, Ok(result))) => {
                if let Some((i, participant)) = pending.remove(&id) {
                    successes.push((i, participant, result));
                }
            }
            Ok((id, Err(e))) => {
                if let Some((_, participant)) = pending.remove(&id) {
                    warn!(participant:% = participant.id; "request failed: {e}");
                    failures.push(ParticipantFailure::new(participant.id, FailureKind::Error(e.to_string())));
                }
            }
            Err(e) => {
                if let Some((_, participant)) = pending.remove(&e.id()) {
                    warn!(participant:% = participant.id; "request task failed: {e}");
                    failures.push(ParticipantFailure::new(participant.id, FailureKind::Panicked));
                }
            }
        }
    }

    tasks.abort_all();

    let mut timed_out: Vec<_> = pending.into_values().collect();
    timed_out.sort_by_key(|(i, _)| *i);
    for (_, participant) in timed_out {
        warn!(participant:% = participant.id; "request timed out");
        failures.push(ParticipantFailure::new(participant.id, FailureKind::TimedOut));
    }

    successes.sort_by_key(|(i, ..)| *i);
    let successes = successes.into_iter().map(|(_, p, r)| (p, r)).collect();

    Ok((successes, failures))
}
