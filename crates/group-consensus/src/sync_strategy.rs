//! Pull-based sync racing: fan a sync request out to every member and take
//! the first response, instead of waiting for (or aggregating) all of
//! them — a stale or partitioned member must never hold up recovery.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_std::future::timeout;
use futures::future::select_all;

use crate::engine::SyncResponse;
use crate::error::GroupError;

pub type SyncFuture = Pin<Box<dyn Future<Output = Result<SyncResponse, GroupError>> + Send>>;

#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    pub per_attempt_timeout: Duration,
    pub retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            per_attempt_timeout: Duration::from_secs(5),
            retries: 2,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("no sync peers available")]
    NoPeers,
    #[error("all sync attempts timed out or failed")]
    Exhausted,
}

/// Races a set of per-peer sync requests, returning the first successful
/// response. A peer future that errors or times out is simply dropped
/// from the race; the attempt is retried against the *remaining* set
/// until one succeeds or `config.retries` is exhausted.
pub struct SyncStrategy {
    config: SyncConfig,
}

impl SyncStrategy {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    pub async fn race_first_success(
        &self,
        mut requests: Vec<SyncFuture>,
    ) -> Result<SyncResponse, SyncError> {
        if requests.is_empty() {
            return Err(SyncError::NoPeers);
        }

        for _attempt in 0..=self.config.retries {
            if requests.is_empty() {
                break;
            }
            let bounded: Vec<SyncFuture> = requests
                .into_iter()
                .map(|fut| {
                    let per_attempt_timeout = self.config.per_attempt_timeout;
                    let wrapped: SyncFuture = Box::pin(async move {
                        match timeout(per_attempt_timeout, fut).await {
                            Ok(result) => result,
                            Err(_) => Err(GroupError::NotFound),
                        }
                    });
                    wrapped
                })
                .collect();

            let (result, _index, rest) = select_all(bounded).await;
            match result {
                Ok(response) => return Ok(response),
                Err(_) => {
                    requests = rest;
                }
            }
        }

        Err(SyncError::Exhausted)
    }
}

/// Adds a cooldown on top of `SyncStrategy` so a flapping connection
/// doesn't re-trigger a full sync race on every reconnect event. A
/// caller that knows it must sync regardless (e.g. the user explicitly
/// requested a refresh) can bypass the cooldown with `force_sync`.
pub struct SmartSyncStrategy {
    inner: SyncStrategy,
    cooldown: Duration,
    last_sync: std::sync::Mutex<Option<std::time::Instant>>,
}

impl SmartSyncStrategy {
    pub fn new(config: SyncConfig, cooldown: Duration) -> Self {
        Self {
            inner: SyncStrategy::new(config),
            cooldown,
            last_sync: std::sync::Mutex::new(None),
        }
    }

    pub async fn maybe_sync(
        &self,
        requests: Vec<SyncFuture>,
        force_sync: bool,
    ) -> Result<Option<SyncResponse>, SyncError> {
        if !force_sync {
            let last = *self.last_sync.lock().expect("lock not poisoned");
            if let Some(last) = last {
                if last.elapsed() < self.cooldown {
                    return Ok(None);
                }
            }
        }

        let response = self.inner.race_first_success(requests).await?;
        *self.last_sync.lock().expect("lock not poisoned") = Some(std::time::Instant::now());
        Ok(Some(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_response(group_id: &str) -> SyncFuture {
        let group_id = group_id.to_string();
        Box::pin(async move {
            Ok(SyncResponse {
                group_id,
                messages: vec![],
                my_head: None,
                my_vector_clock: Default::default(),
            })
        })
    }

    fn err_response() -> SyncFuture {
        Box::pin(async move { Err(GroupError::NotFound) })
    }

    #[async_std::test]
    async fn race_returns_first_success_and_ignores_errors() {
        let strategy = SyncStrategy::new(SyncConfig::default());
        let requests = vec![err_response(), ok_response("g1"), err_response()];
        let response = strategy.race_first_success(requests).await.unwrap();
        assert_eq!(response.group_id, "g1");
    }

    #[async_std::test]
    async fn race_with_no_peers_fails_immediately() {
        let strategy = SyncStrategy::new(SyncConfig::default());
        let err = strategy.race_first_success(vec![]).await.unwrap_err();
        assert!(matches!(err, SyncError::NoPeers));
    }

    #[async_std::test]
    async fn race_exhausts_after_all_peers_fail() {
        let strategy = SyncStrategy::new(SyncConfig {
            per_attempt_timeout: Duration::from_millis(50),
            retries: 1,
        });
        let requests = vec![err_response(), err_response()];
        let err = strategy.race_first_success(requests).await.unwrap_err();
        assert!(matches!(err, SyncError::Exhausted));
    }

    #[async_std::test]
    async fn smart_strategy_suppresses_sync_within_cooldown() {
        let smart = SmartSyncStrategy::new(SyncConfig::default(), Duration::from_secs(60));
        let first = smart
            .maybe_sync(vec![ok_response("g1")], false)
            .await
            .unwrap();
        assert!(first.is_some());

        let second = smart
            .maybe_sync(vec![ok_response("g1")], false)
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[async_std::test]
    async fn smart_strategy_force_sync_bypasses_cooldown() {
        let smart = SmartSyncStrategy::new(SyncConfig::default(), Duration::from_secs(60));
        smart.maybe_sync(vec![ok_response("g1")], false).await.unwrap();

        let forced = smart
            .maybe_sync(vec![ok_response("g1")], true)
            .await
            .unwrap();
        assert!(forced.is_some());
    }
}
