//! Server startup and shutdown logic

use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use warden_rbac::{
    seed_if_empty, AdminService, CredentialVerifier, HeaderCredentialVerifier, MemoryPolicyStore,
    MemoryRecordStore, PolicyStore, RbacEnforcer, RbacMiddleware, SeaOrmPolicyStore,
};

use crate::{
    config::ServerConfig,
    logging::init_tracing,
    routes::{admin_routes, AppState},
};

/// Server application struct
pub struct Server {
    config: ServerConfig,
    state: AppState,
    middleware: Arc<RbacMiddleware>,
}

impl Server {
    /// Create a new server instance
    pub async fn new(config: ServerConfig) -> Result<Self> {
        // Initialize logging first
        init_tracing(&config.logging)?;

        let store: Box<dyn PolicyStore> = match &config.database.url {
            Some(url) => Box::new(
                SeaOrmPolicyStore::connect(url, config.database.max_connections).await?,
            ),
            None => {
                tracing::warn!("No database configured, policies are kept in memory");
                Box::new(MemoryPolicyStore::new())
            }
        };

        tracing::warn!("Using header credentials; put an authenticating proxy in front");
        Self::with_store(config, store, Arc::new(HeaderCredentialVerifier)).await
    }

    /// Build the server around an existing store and verifier, seeding the
    /// store if it is empty
    pub async fn with_store(
        config: ServerConfig,
        store: Box<dyn PolicyStore>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Result<Self> {
        let enforcer = RbacEnforcer::from_boxed(store, config.rbac.super_admin_user_id);
        let records = Arc::new(MemoryRecordStore::from_seed(
            &config.rbac.seed,
            &config.rbac.admin_role,
        ));

        let report = seed_if_empty(&enforcer, records.as_ref(), &config.rbac).await?;
        if !report.skipped {
            tracing::info!(
                grants = report.grants,
                memberships = report.memberships,
                "Initial policies written"
            );
        }

        let admin = AdminService::new(enforcer.clone(), records, &config.rbac);
        let middleware = Arc::new(RbacMiddleware::new(enforcer, verifier));

        Ok(Self {
            config,
            state: AppState { admin },
            middleware,
        })
    }

    /// Build the complete application router
    pub fn build_app(&self) -> Router {
        let protected = self
            .middleware
            .clone()
            .protect(admin_routes())
            .with_state(self.state.clone());

        Router::new()
            .route("/", get(root_handler))
            .merge(protected)
            .layer(TraceLayer::new_for_http())
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let app = self.build_app();
        let addr = self.config.socket_addr()?;

        self.log_config_summary();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Log configuration summary
    fn log_config_summary(&self) {
        tracing::info!("=== Warden Server Configuration ===");
        tracing::info!("Bind Address: {}", self.config.bind_address);
        tracing::info!(
            "Policy Store: {}",
            if self.config.database.url.is_some() { "Database" } else { "In-memory" }
        );
        tracing::info!("Super Admin: user {}", self.config.rbac.super_admin_user_id);
        tracing::info!("Admin Role: {}", self.config.rbac.admin_role);
        tracing::info!("===================================");
    }
}

/// Root handler
async fn root_handler() -> axum::response::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "service": "Warden Admin Console",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
