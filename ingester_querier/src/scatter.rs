//! The scatter-gather executor.
//!
//! Fans a per-ingester callback out over one or many replication sets,
//! completes once each set has a quorum of successes, and keeps the
//! session's partition context in sync with the ingesters whose responses
//! were actually used.

use std::{collections::HashSet, future::Future, sync::Arc};

use futures::{future, stream::FuturesUnordered, StreamExt};
use tracing::debug;

use crate::{
    client::{ClientPool, IngesterClient},
    error::{DynError, Error},
    ring::{ReplicaDescriptor, ReplicationSet},
    session::QuerySession,
};

/// How a single replication set is fanned out to.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct QuorumConfig {
    /// Issue only `quorum_size()` initial requests (interleaved across
    /// zones) and escalate to the remaining instances on failure, instead
    /// of issuing to all instances at once. Used when each set is one
    /// partition and any single healthy replica is authoritative.
    pub(crate) minimize_requests: bool,
}

/// A successful response, tagged with the address it came from.
#[derive(Debug)]
pub(crate) struct ResponseFromIngesters<T> {
    pub(crate) addr: Arc<str>,
    pub(crate) response: T,
}

/// Run `f` concurrently against the instances of `replication_set` until a
/// quorum of responses has been gathered.
///
/// Every successful call registers its `(addr, client)` pair in the
/// session's partition context; once the quorum is reached the outstanding
/// calls are cancelled and every instance that did not contribute to the
/// returned quorum is removed from the context again, so the context holds
/// exactly the contributing ingesters. If the quorum becomes unreachable
/// the registrations made by this call are scrubbed and the last observed
/// error is surfaced; partial results are never returned.
pub(crate) async fn for_given_ingesters<T, F, Fut>(
    pool: &dyn ClientPool,
    session: &QuerySession,
    replication_set: ReplicationSet,
    quorum: QuorumConfig,
    f: F,
) -> Result<Vec<ResponseFromIngesters<T>>, Error>
where
    T: Send,
    F: Fn(Arc<dyn IngesterClient>) -> Fut + Sync,
    Fut: Future<Output = Result<T, DynError>> + Send,
{
    let ordered = if quorum.minimize_requests {
        replication_set.zone_interleaved()
    } else {
        replication_set.instances.clone()
    };
    let total = ordered.len();
    if total == 0 {
        return Ok(vec![]);
    }
    let required = replication_set.quorum_size();

    let ctx = session.partition_context();
    let call_one = |instance: ReplicaDescriptor| {
        let f = &f;
        async move {
            let client = pool
                .client_for(&instance.addr)
                .await
                .map_err(|e| (Arc::clone(&instance.addr), e))?;
            match f(Arc::clone(&client)).await {
                Ok(response) => {
                    ctx.add_client(client, Arc::clone(&instance.addr));
                    Ok(ResponseFromIngesters {
                        addr: instance.addr,
                        response,
                    })
                }
                Err(e) => Err((instance.addr, e)),
            }
        }
    };

    let mut reserve = ordered.into_iter();
    let mut in_flight: FuturesUnordered<_> = FuturesUnordered::new();
    let initial = if quorum.minimize_requests {
        required
    } else {
        total
    };
    for instance in reserve.by_ref().take(initial) {
        in_flight.push(call_one(instance));
    }

    let mut responses = Vec::with_capacity(required);
    let mut failures = 0;
    let mut last_err: Option<DynError> = None;

    while responses.len() < required {
        let completed = in_flight.next().await;
        match completed {
            Some(Ok(resp)) => responses.push(resp),
            Some(Err((addr, e))) => {
                debug!(addr = addr.as_ref(), error = %e, "ingester call failed");
                failures += 1;
                last_err = Some(e);
                if failures > total - required {
                    break;
                }
                if let Some(instance) = reserve.next() {
                    in_flight.push(call_one(instance));
                }
            }
            None => break,
        }
    }

    // Dropping the set cancels the in-flight calls that are no longer
    // needed; none of them can register into the context afterwards.
    drop(in_flight);

    if responses.len() < required {
        for resp in &responses {
            ctx.remove_client(&resp.addr);
        }
        let source = last_err.unwrap_or_else(|| "ingester set exhausted".into());
        return Err(Error::QuorumUnreachable {
            failures,
            total,
            required,
            source,
        });
    }

    // The context must reflect exactly the quorum contributors: scrub
    // instances that were cancelled or superseded.
    let kept: HashSet<&str> = responses.iter().map(|r| r.addr.as_ref()).collect();
    for instance in &replication_set.instances {
        if !kept.contains(instance.addr.as_ref()) {
            ctx.remove_client(&instance.addr);
        }
    }

    Ok(responses)
}

/// Run `f` over every replication set concurrently, one quorum fan-out per
/// set with minimized requests, and flatten the results.
///
/// One set failing fails the whole operation.
pub(crate) async fn for_given_ingester_sets<T, F, Fut>(
    pool: &dyn ClientPool,
    session: &QuerySession,
    replication_sets: Vec<ReplicationSet>,
    f: F,
) -> Result<Vec<ResponseFromIngesters<T>>, Error>
where
    T: Send,
    F: Fn(Arc<dyn IngesterClient>) -> Fut + Sync,
    Fut: Future<Output = Result<T, DynError>> + Send,
{
    // Each replication set is one partition: a single healthy replica per
    // set is authoritative, so minimize the initially issued requests.
    let quorum = QuorumConfig {
        minimize_requests: true,
    };

    let results = future::try_join_all(
        replication_sets
            .into_iter()
            .map(|set| for_given_ingesters(pool, session, set, quorum, &f)),
    )
    .await?;

    Ok(results.into_iter().flatten().collect())
}

/// Run `f` against exactly the ingesters recorded in the session's
/// partition context.
///
/// No quorum slack applies here: a follow-up step of a partitioned query
/// must be answered by every partition of the previous step, so any single
/// failure fails the call.
pub(crate) async fn for_queried_ingesters<T, F, Fut>(
    session: &QuerySession,
    f: F,
) -> Result<Vec<ResponseFromIngesters<T>>, Error>
where
    T: Send,
    F: Fn(Arc<dyn IngesterClient>) -> Fut + Sync,
    Fut: Future<Output = Result<T, DynError>> + Send,
{
    let used = session.partition_context().used_ingesters();

    future::try_join_all(used.into_iter().map(|ingester| {
        let f = &f;
        async move {
            match f(Arc::clone(&ingester.client)).await {
                Ok(response) => Ok(ResponseFromIngesters {
                    addr: ingester.addr,
                    response,
                }),
                Err(source) => Err(Error::Ingester {
                    addr: ingester.addr,
                    source,
                }),
            }
        }
    }))
    .await
}
