use crate::config::Config;
use crate::places::GooglePlacesClient;
use crate::pricing::{PricingResolver, ResolverConfig};
use crate::search::StationSearch;
use crate::state::AppState;
use crate::utils::fmt_duration;
use crate::web::create_router;
use crate::web::middleware::rate_limit::SearchRateLimiter;
use anyhow::Context;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
    sweeper: JoinHandle<()>,
}

impl App {
    /// Build the search pipeline and start the cache sweeper.
    pub fn new(config: Config) -> Result<Self, anyhow::Error> {
        if config.google_api_key.is_empty() {
            warn!("GOOGLE_API_KEY is not set; upstream searches will fail");
        }

        let provider =
            GooglePlacesClient::new(config.google_api_key.clone(), config.upstream_timeout())
                .context("Failed to create places client")?;
        let resolver = PricingResolver::new(Arc::new(provider), ResolverConfig::default());

        let normalize_options = config.normalize_options()?;
        info!(
            grid_precision = normalize_options.grid_precision,
            radius_buckets = ?normalize_options.radius_buckets,
            cache_ttl = fmt_duration(config.cache_ttl()),
            sweep_interval = fmt_duration(config.sweep_interval()),
            "search pipeline configured"
        );

        let search = StationSearch::new(resolver)
            .with_options(normalize_options)
            .with_ttl(config.cache_ttl());
        let sweeper = search.cache().spawn_sweeper(config.sweep_interval());

        let search_limit = SearchRateLimiter::new(
            config.search_rate_limit,
            config.search_rate_window(),
        )?;
        info!(
            max_requests = config.search_rate_limit,
            window = fmt_duration(config.search_rate_window()),
            "search rate limit configured"
        );

        Ok(App {
            config,
            app_state: AppState::new(search).with_search_limit(search_limit),
            sweeper,
        })
    }

    /// Serve HTTP until a shutdown signal arrives, then drain in-flight
    /// requests for at most the configured shutdown timeout.
    pub async fn run(self) -> ExitCode {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(%addr, error = %e, "failed to bind");
                return ExitCode::FAILURE;
            }
        };
        info!(%addr, "web server listening");

        let router = create_router(self.app_state.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let mut server = tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tokio::select! {
            result = &mut server => {
                error!(result = ?result, "web server exited unexpectedly");
                self.sweeper.abort();
                return ExitCode::FAILURE;
            }
            _ = shutdown_signal() => {}
        }

        let timeout = self.config.shutdown_timeout();
        info!(timeout = fmt_duration(timeout), "shutting down");
        let _ = shutdown_tx.send(());
        self.sweeper.abort();

        match tokio::time::timeout(timeout, server).await {
            Ok(Ok(Ok(()))) => {
                info!("graceful shutdown complete");
                ExitCode::SUCCESS
            }
            Ok(Ok(Err(e))) => {
                error!(error = %e, "web server failed during shutdown");
                ExitCode::FAILURE
            }
            Ok(Err(e)) => {
                error!(error = %e, "web server task panicked");
                ExitCode::FAILURE
            }
            Err(_) => {
                warn!(
                    in_flight = self.app_state.search.in_flight(),
                    "shutdown timed out, abandoning open requests"
                );
                ExitCode::FAILURE
            }
        }
    }
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
