//! HTTP server with graceful shutdown

use std::net::SocketAddr;
use std::time::Duration;

use axum::{http::StatusCode, Extension, Router};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{
    catch_panic::CatchPanicLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

use crate::{config::Config, error::Result, external_url::PublicUrl};

/// Server instance
pub struct Server {
    config: Config,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Wrap `app` in the service-wide layers
    ///
    /// Panic recovery is innermost, then tracing, the request timeout, and
    /// the configured public URL extension.
    pub fn layer(&self, app: Router) -> Result<Router> {
        let mut app = app
            .layer(CatchPanicLayer::new())
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new())
                    .on_response(DefaultOnResponse::new()),
            )
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(self.config.service.timeout_secs),
            ));

        if let Some(public_url) = &self.config.service.public_url {
            app = app.layer(Extension(PublicUrl::parse(public_url)?));
        }

        Ok(app)
    }

    /// Run the server with the given router until SIGINT or SIGTERM
    pub async fn serve(self, app: Router) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.service.port));
        let app = self.layer(app)?;

        tracing::info!("Starting {} on {}", self.config.service.name, addr);
        tracing::info!(
            "Request timeout: {} seconds, public URL: {}",
            self.config.service.timeout_secs,
            self.config
                .service
                .public_url
                .as_deref()
                .unwrap_or("from Host header")
        );

        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external_url::ExternalUrl;
    use axum::{body::Body, http::Request, routing::get};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_public_url_reaches_handlers() {
        let mut config = Config::default();
        config.service.public_url = Some("https://school.example.com".to_string());

        let app = Router::new().route(
            "/v1/",
            get(|url: ExternalUrl| async move { url.request().to_string() }),
        );
        let app = Server::new(config).layer(app).unwrap();

        let response = app
            .oneshot(Request::builder().uri("/v1/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"https://school.example.com/v1/");
    }

    #[tokio::test]
    async fn test_panics_become_500() {
        async fn boom() -> &'static str {
            panic!("handler bug")
        }

        let app = Router::new().route("/boom", get(boom));
        let app = Server::new(Config::default()).layer(app).unwrap();

        let response = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_invalid_public_url_rejected() {
        let mut config = Config::default();
        config.service.public_url = Some("not a url".to_string());
        assert!(Server::new(config).layer(Router::new()).is_err());
    }
}
