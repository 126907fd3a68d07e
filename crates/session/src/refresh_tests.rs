// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;
use crate::identity::build_http_client;
use crate::mock_server::{refresh_ok, refresh_rotated, MockServer, RunningMock};
use crate::store::Role;
use crate::test_support::{profile, token_expired_for, token_valid_for};

fn seeded_store(access: &str, refresh: &str) -> Arc<CredentialStore> {
    let store = Arc::new(CredentialStore::in_memory());
    store.save_login(
        &Credential::new(access.to_owned(), refresh.to_owned()),
        &profile(Role::Student),
    );
    store
}

fn refresher(
    mock: &RunningMock,
    store: &Arc<CredentialStore>,
) -> anyhow::Result<(Arc<Refresher>, broadcast::Receiver<SessionEvent>)> {
    let (tx, rx) = broadcast::channel(16);
    let identity =
        IdentityClient::new(mock.base_url(), build_http_client(Duration::from_secs(5))?);
    Ok((Arc::new(Refresher::new(Arc::clone(store), identity, tx)), rx))
}

#[tokio::test]
async fn refresh_writes_new_access_token() -> anyhow::Result<()> {
    let fresh = token_valid_for(3600);
    let mock = MockServer::new().refresh(200, refresh_ok(&fresh)).spawn().await?;
    let store = seeded_store(&token_expired_for(60), "r1");
    let (refresher, mut rx) = refresher(&mock, &store)?;

    let cred = refresher.refresh().await?;
    assert_eq!(cred.access_token, fresh);
    assert_eq!(cred.refresh_token, "r1");
    assert!(cred.expires_at.is_some());
    assert_eq!(store.access_token().as_deref(), Some(fresh.as_str()));
    assert!(store.profile().is_some());
    assert!(!refresher.in_flight());
    assert!(matches!(rx.try_recv(), Ok(SessionEvent::Refreshed)));
    Ok(())
}

#[tokio::test]
async fn rotation_updates_both_tokens() -> anyhow::Result<()> {
    let mock = MockServer::new().refresh(200, refresh_rotated("a2", "r2")).spawn().await?;
    let store = seeded_store("a1", "r1");
    let (refresher, _rx) = refresher(&mock, &store)?;

    let cred = refresher.refresh().await?;
    assert_eq!(cred.access_token, "a2");
    assert_eq!(cred.refresh_token, "r2");
    assert_eq!(store.refresh_token().as_deref(), Some("r2"));
    Ok(())
}

#[tokio::test]
async fn missing_refresh_token_fails_without_network() -> anyhow::Result<()> {
    let mock = MockServer::new().refresh(200, refresh_ok("a2")).spawn().await?;
    let store = Arc::new(CredentialStore::in_memory());
    let (refresher, _rx) = refresher(&mock, &store)?;

    assert_eq!(refresher.refresh().await, Err(RefreshError::NoRefreshToken));
    assert_eq!(mock.calls.refreshes(), 0);
    assert!(!refresher.in_flight());
    Ok(())
}

#[tokio::test]
async fn failed_refresh_clears_store() -> anyhow::Result<()> {
    let mock = MockServer::new().refresh(401, r#"{"status":401}"#).spawn().await?;
    let store = seeded_store("a1", "r1");
    let (refresher, _rx) = refresher(&mock, &store)?;

    let result = refresher.refresh().await;
    assert!(matches!(result, Err(RefreshError::RefreshFailed(_))));
    assert!(store.credential().is_none());
    assert!(store.profile().is_none());
    assert!(!refresher.in_flight());
    Ok(())
}

#[tokio::test]
async fn concurrent_refreshes_share_one_call() -> anyhow::Result<()> {
    let fresh = token_valid_for(3600);
    let mock = MockServer::new()
        .refresh(200, refresh_ok(&fresh))
        .refresh_delay(Duration::from_millis(200))
        .spawn()
        .await?;
    let store = seeded_store("a1", "r1");
    let (refresher, _rx) = refresher(&mock, &store)?;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let r = Arc::clone(&refresher);
        handles.push(tokio::spawn(async move { r.refresh().await }));
    }
    for handle in handles {
        let cred = handle.await??;
        assert_eq!(cred.access_token, fresh);
    }
    assert_eq!(mock.calls.refreshes(), 1);
    Ok(())
}

#[tokio::test]
async fn concurrent_failures_share_one_outcome() -> anyhow::Result<()> {
    let mock = MockServer::new()
        .refresh(500, r#"{"status":500}"#)
        .refresh_delay(Duration::from_millis(200))
        .spawn()
        .await?;
    let store = seeded_store("a1", "r1");
    let (refresher, _rx) = refresher(&mock, &store)?;

    let results = futures_util::future::join_all((0..8).map(|_| refresher.refresh())).await;
    let first = results[0].clone();
    assert!(matches!(first, Err(RefreshError::RefreshFailed(_))));
    assert!(results.iter().all(|r| *r == first));
    assert_eq!(mock.calls.refreshes(), 1);
    Ok(())
}

#[tokio::test]
async fn sequential_refreshes_each_hit_the_server() -> anyhow::Result<()> {
    let mock = MockServer::new().refresh(200, refresh_ok("a2")).spawn().await?;
    let store = seeded_store("a1", "r1");
    let (refresher, _rx) = refresher(&mock, &store)?;

    refresher.refresh().await?;
    refresher.refresh().await?;
    assert_eq!(mock.calls.refreshes(), 2);
    Ok(())
}

#[tokio::test]
async fn cancelled_caller_does_not_cancel_refresh() -> anyhow::Result<()> {
    let fresh = token_valid_for(3600);
    let mock = MockServer::new()
        .refresh(200, refresh_ok(&fresh))
        .refresh_delay(Duration::from_millis(200))
        .spawn()
        .await?;
    let store = seeded_store("a1", "r1");
    let (refresher, _rx) = refresher(&mock, &store)?;

    let starter = {
        let r = Arc::clone(&refresher);
        tokio::spawn(async move { r.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(refresher.in_flight());
    starter.abort();

    let cred = refresher.refresh().await?;
    assert_eq!(cred.access_token, fresh);
    assert_eq!(mock.calls.refreshes(), 1);
    Ok(())
}

#[tokio::test]
async fn logout_during_refresh_wins() -> anyhow::Result<()> {
    let mock = MockServer::new()
        .refresh(200, refresh_ok("a2"))
        .refresh_delay(Duration::from_millis(200))
        .spawn()
        .await?;
    let store = seeded_store("a1", "r1");
    let (refresher, _rx) = refresher(&mock, &store)?;

    let pending = {
        let r = Arc::clone(&refresher);
        tokio::spawn(async move { r.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    store.clear();

    let result = pending.await?;
    assert!(matches!(result, Err(RefreshError::RefreshFailed(_))));
    assert!(store.access_token().is_none());
    Ok(())
}

#[tokio::test]
async fn relogin_during_failed_refresh_is_kept() -> anyhow::Result<()> {
    let mock = MockServer::new()
        .refresh(500, r#"{"status":500}"#)
        .refresh_delay(Duration::from_millis(200))
        .spawn()
        .await?;
    let store = seeded_store("a1", "r1");
    let (refresher, _rx) = refresher(&mock, &store)?;

    let pending = {
        let r = Arc::clone(&refresher);
        tokio::spawn(async move { r.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    store.save_login(&Credential::new("b1".to_owned(), "s1".to_owned()), &profile(Role::Admin));

    assert!(pending.await?.is_err());
    assert_eq!(store.refresh_token().as_deref(), Some("s1"));
    Ok(())
}
