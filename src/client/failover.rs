//! Failover plan construction and execution

use std::future::Future;

use super::{ClientError, ClientResult, DiscoveredInstance};
use crate::observability::Logger;

/// Build the ordered list of base urls to try: ranked instances first,
/// the authoritative source always last (and never listed twice).
pub fn failover_plan(instances: &[DiscoveredInstance], source_url: &str) -> Vec<String> {
    let source = source_url.trim_end_matches('/');

    let mut plan: Vec<String> = instances
        .iter()
        .map(|i| i.url.trim_end_matches('/').to_string())
        .filter(|url| url != source)
        .collect();
    plan.push(source.to_string());
    plan
}

/// Try `attempt` against each url in plan order.
///
/// The first success wins; every failure moves on to the next url. An
/// exhausted plan returns the last error.
pub async fn execute_with_failover<T, F, Fut>(plan: &[String], mut attempt: F) -> ClientResult<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut last_error = String::from("empty failover plan");

    for url in plan {
        match attempt(url.clone()).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                Logger::warn("FAILOVER_ATTEMPT_FAILED", &[("url", url), ("error", &error)]);
                last_error = error;
            }
        }
    }

    Err(ClientError::Exhausted(last_error))
}
