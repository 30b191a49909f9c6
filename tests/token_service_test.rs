use chrono::{Duration, Utc};
use httpmock::prelude::*;
use pix_bridge::{
    config::PixConfig,
    domain::AccessToken,
    error::AppError,
    pix::build_http_client,
    repository::{SqliteTokenRepository, TokenRepository},
    service::token_service::TokenService,
};
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use uuid::Uuid;

async fn setup(server: &MockServer) -> anyhow::Result<(Arc<SqliteTokenRepository>, TokenService)> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let config = PixConfig {
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        app_key: "app-key".to_string(),
        token_url: server.url("/oauth/token"),
        cob_url: server.url("/pix/v2/cob/"),
        cobv_url: server.url("/pix/v2/cobv/"),
        ..PixConfig::default()
    };

    let repo = Arc::new(SqliteTokenRepository::new(pool));
    let service = TokenService::new(repo.clone(), build_http_client(&config)?, config);
    Ok((repo, service))
}

fn stored_token(value: &str, expires_in_seconds: i64) -> AccessToken {
    let now = Utc::now();
    AccessToken {
        id: Uuid::new_v4(),
        value: value.to_string(),
        created_at: now - Duration::hours(1),
        expires_at: now + Duration::seconds(expires_in_seconds),
    }
}

#[tokio::test]
async fn cached_token_is_reused_without_calling_the_psp() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let token_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/oauth/token")
                .header_exists("authorization")
                .body_contains("grant_type=client_credentials");
            then.status(200)
                .json_body(json!({ "access_token": "fresh", "expires_in": 600 }));
        })
        .await;

    let (_repo, service) = setup(&server).await?;

    assert_eq!(service.get_access_token().await?, "fresh");
    assert_eq!(service.get_access_token().await?, "fresh");

    token_mock.assert_hits_async(1).await;
    Ok(())
}

#[tokio::test]
async fn token_inside_safety_margin_is_replaced() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let token_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(200)
                .json_body(json!({ "access_token": "renewed", "expires_in": 3600 }));
        })
        .await;

    let (repo, service) = setup(&server).await?;
    repo.save(stored_token("stale", 120)).await?;

    assert_eq!(service.get_access_token().await?, "renewed");
    token_mock.assert_hits_async(1).await;

    // Only the new token is left behind
    let current = service.current().await?.expect("token stored");
    assert_eq!(current.value, "renewed");
    assert_eq!(repo.delete_expired(Utc::now() + Duration::days(1)).await?, 1);

    Ok(())
}

#[tokio::test]
async fn missing_expires_in_defaults_to_one_hour() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(200).json_body(json!({ "access_token": "abc" }));
        })
        .await;

    let (_repo, service) = setup(&server).await?;
    let token = service.valid_token().await?;
    let lifetime = token.expires_at - token.created_at;
    assert_eq!(lifetime.num_seconds(), 3600);

    Ok(())
}

#[tokio::test]
async fn rejected_credentials_surface_as_authentication_error() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(401).body("{\"error\":\"invalid_client\"}");
        })
        .await;

    let (_repo, service) = setup(&server).await?;
    let err = service.get_access_token().await.unwrap_err();
    match err {
        AppError::Authentication(msg) => assert!(msg.contains("401")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(service.current().await?.is_none());

    Ok(())
}

#[tokio::test]
async fn renew_always_fetches() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let token_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(200)
                .json_body(json!({ "access_token": "forced", "expires_in": 3600 }));
        })
        .await;

    let (repo, service) = setup(&server).await?;
    repo.save(stored_token("still-good", 3000)).await?;

    let token = service.renew().await?;
    assert_eq!(token.value, "forced");
    assert!(!service.is_expired(&token));
    token_mock.assert_hits_async(1).await;

    Ok(())
}

#[tokio::test]
async fn purge_expired_removes_only_dead_tokens() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let (repo, service) = setup(&server).await?;

    repo.save(stored_token("dead", -60)).await?;
    repo.save(stored_token("alive", 3600)).await?;

    assert_eq!(service.purge_expired().await?, 1);
    let current = service.current().await?.expect("live token kept");
    assert_eq!(current.value, "alive");

    Ok(())
}
