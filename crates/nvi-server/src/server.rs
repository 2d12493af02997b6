use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    routing::{get, post},
};
use nvi_auth::storage::{InMemoryIssuedTokenStorage, InMemoryJtiStorage};
use nvi_auth::{
    AuthState, CertificateChainValidator, ClientCredentialIssuer, ClientTrustPath,
    CorroboratedIdentity, IssuedTokenStorage, JtiStorage, NestedTokenValidator, ReplayGuard,
    TrustPathClassifier, TrustStore, revoke_handler, token_handler,
};
use nvi_auth_postgres::PostgresAuthStorage;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::config::{AppConfig, StorageBackend, StorageConfig};

pub struct NviServer {
    addr: SocketAddr,
    app: Router,
}

/// Builds the router over an already assembled identity state.
///
/// `/identity` is only routed when nested assertion validation is configured.
pub fn router(state: AuthState, body_limit: usize) -> Router {
    let mut app = Router::new()
        .route("/healthz", get(healthz))
        .route("/trust-path", get(trust_path))
        .route("/oauth/token", post(token_handler))
        .route("/oauth/revoke", post(revoke_handler));
    if state.nested_validator.is_some() {
        app = app.route("/identity", get(identity));
    }

    app.with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri().path(),
                        http.status_code = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

/// Loads trust anchors, connects storage and builds the router.
pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let state = build_state(cfg).await?;
    Ok(router(state, cfg.server.body_limit_bytes))
}

/// Assembles the identity state from configuration.
///
/// Every trust anchor is read here, once.
pub async fn build_state(cfg: &AppConfig) -> anyhow::Result<AuthState> {
    let auth = &cfg.auth;

    let assertion_ca = auth
        .trust
        .client_assertion_ca
        .as_ref()
        .context("auth.trust.client_assertion_ca is required")?;
    let assertion_store = TrustStore::load(assertion_ca)
        .with_context(|| format!("loading {}", assertion_ca.display()))?;
    tracing::info!(
        path = %assertion_ca.display(),
        authorities = assertion_store.len(),
        "Client assertion trust store loaded"
    );

    let (token_storage, jti_storage) = create_storage(&cfg.storage).await?;

    let issuer = ClientCredentialIssuer::new(
        auth.oauth.clone(),
        auth.mtls.clone(),
        CertificateChainValidator::new(Arc::new(assertion_store)),
        ReplayGuard::new(jti_storage),
        token_storage,
    );
    let mut state = AuthState::new(Arc::new(issuer));

    if let (Some(direct), Some(oauth)) = (
        &auth.trust.direct_certificate_ca,
        &auth.trust.oauth_certificate_ca,
    ) {
        let direct_store = TrustStore::load(direct)
            .with_context(|| format!("loading {}", direct.display()))?;
        let oauth_store =
            TrustStore::load(oauth).with_context(|| format!("loading {}", oauth.display()))?;
        let classifier = TrustPathClassifier::new(
            Arc::new(direct_store),
            Arc::new(oauth_store),
            auth.mtls.verify_success_value.clone(),
        );
        state = state.with_classifier(Arc::new(classifier));
        tracing::info!("Trust path classification enabled");
    }

    let nested = &auth.nested_token;
    if let Some(validator) =
        NestedTokenValidator::from_config(nested).context("loading nested token trust anchors")?
    {
        state = state.with_nested_validator(Arc::new(validator), nested.assertion_header.clone());
        tracing::info!(
            audience = %nested.audience,
            header = %nested.assertion_header,
            "Nested identity assertion validation enabled"
        );
    }

    Ok(state)
}

async fn create_storage(
    cfg: &StorageConfig,
) -> anyhow::Result<(Arc<dyn IssuedTokenStorage>, Arc<dyn JtiStorage>)> {
    match cfg.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; issued tokens and replay records are not persisted");
            Ok((
                Arc::new(InMemoryIssuedTokenStorage::new()),
                Arc::new(InMemoryJtiStorage::new()),
            ))
        }
        StorageBackend::Postgres => {
            let pg = cfg
                .postgres
                .as_ref()
                .context("storage.backend=postgres requires storage.postgres")?;
            let storage = PostgresAuthStorage::connect(&pg.url, pg.pool_size)
                .await
                .context("connecting to PostgreSQL")?;
            storage.ensure_schema().await.context("creating schema")?;
            tracing::info!(pool_size = pg.pool_size, "PostgreSQL storage ready");
            Ok((
                Arc::new(storage.issued_token_storage()),
                Arc::new(storage.jti_storage()),
            ))
        }
    }
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Reports which trust store recognizes the caller's client certificate.
async fn trust_path(ClientTrustPath(path): ClientTrustPath) -> Json<Value> {
    Json(json!({ "trust_path": path.map(|p| p.to_string()) }))
}

/// Corroborates the bearer owner against the nested identity assertion.
async fn identity(CorroboratedIdentity { token, assertion }: CorroboratedIdentity) -> Json<Value> {
    Json(json!({
        "owner_identity": token.owner_identity,
        "case_id": assertion.case_id(),
        "relation": assertion.matched_relation,
    }))
}

pub struct ServerBuilder {
    config: AppConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<NviServer> {
        let app = build_app(&self.config).await?;
        Ok(NviServer {
            addr: self.config.addr(),
            app,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NviServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
