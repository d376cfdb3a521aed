use std::{net::SocketAddr, str::FromStr, sync::Arc, time::Duration};

use anyhow::anyhow;
use axum::{
    body::Body,
    extract::{
        connect_info::IntoMakeServiceWithConnectInfo, ConnectInfo, DefaultBodyLimit, Path, Request,
        State,
    },
    http::{header, Extensions, HeaderValue, StatusCode},
    middleware::{self, AddExtension, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    serve::Serve,
    Router,
};
use hyper::{
    header::{ACCEPT, CONTENT_TYPE},
    Method,
};
use log::{error, info, warn};
use reqwest_middleware::{
    reqwest::{self, Client},
    ClientBuilder, ClientWithMiddleware, Middleware,
};
use tokio::signal::unix::{signal, SignalKind};
use tokio::{net::TcpListener, select};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{
    api::routes::{
        add_member_handler, add_official_handler, close_form_handler, closed_form_handler, health,
        landing_handler, open_form_handler, payment_outcome_handler, payment_retry_handler,
        remove_member_handler, remove_official_handler, select_competition_handler, submit_handler,
    },
    config::Settings,
    domain::{SessionManager, SessionSweeper},
    infra::{BackendClient, CompetitionCatalog, RegistrationService},
};

// Multipart bodies carry one document per person; generous but bounded.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;
const SWEEP_INTERVAL_SECS: u64 = 60;

pub struct Application {
    server: Serve<
        TcpListener,
        IntoMakeServiceWithConnectInfo<Router, SocketAddr>,
        AddExtension<Router, ConnectInfo<SocketAddr>>,
    >,
    cancellation_token: CancellationToken,
    background_tasks: TaskTracker,
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, anyhow::Error> {
        let address = format!(
            "{}:{}",
            config.api_settings.domain, config.api_settings.port
        );
        let listener = SocketAddr::from_str(&address)?;
        let (app_state, background_tasks, cancellation_token) = build_app(config.clone()).await?;
        let server = build_server(listener, app_state, config.api_settings.origins).await?;
        Ok(Self {
            server,
            cancellation_token,
            background_tasks,
        })
    }

    pub async fn run_until_stopped(self) -> Result<(), anyhow::Error> {
        info!("Starting server...");
        match self.server.with_graceful_shutdown(shutdown_signal()).await {
            Ok(_) => {
                info!("Server shutdown initiated");
                self.cancellation_token.cancel();

                let timeout = tokio::time::sleep(Duration::from_secs(10));
                select! {
                    _ = self.background_tasks.wait() => {
                        info!("Background tasks completed gracefully");
                    }
                    _ = timeout => {
                        warn!("Background tasks timed out during shutdown");
                    }
                }

                info!("Shutdown complete");
                Ok(())
            }
            Err(e) => {
                error!("Server shutdown error: {}", e);
                self.cancellation_token.cancel();

                let _ = tokio::time::timeout(
                    Duration::from_secs(5),
                    self.background_tasks.wait(),
                )
                .await;

                Err(anyhow!("Error during server shutdown: {}", e))
            }
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub assets_dir: String,
    pub payment_script_url: String,
    pub payment_client_key: String,
    pub catalog: Arc<CompetitionCatalog>,
    pub registrations: Arc<RegistrationService>,
    pub sessions: Arc<SessionManager>,
}

pub async fn build_app(
    config: Settings,
) -> Result<(AppState, TaskTracker, CancellationToken), anyhow::Error> {
    info!(
        "Static UI assets configured at {}",
        config.ui_settings.assets_dir
    );

    let backend = Arc::new(BackendClient::new(
        build_reqwest_client(),
        &config.backend_settings.base_url,
        Duration::from_secs(config.backend_settings.fetch_timeout_secs),
        Duration::from_secs(config.backend_settings.submit_timeout_secs),
    ));
    info!(
        "Event backend configured at {}",
        config.backend_settings.base_url
    );

    let catalog = Arc::new(CompetitionCatalog::new(
        backend.clone(),
        Duration::from_secs(config.backend_settings.catalog_ttl_secs),
    ));
    let registrations = Arc::new(RegistrationService::new(
        backend,
        catalog.clone(),
        Duration::from_secs(config.backend_settings.registrations_ttl_secs),
    ));
    let sessions = Arc::new(SessionManager::new());

    let tracker = TaskTracker::new();
    let cancel_token = CancellationToken::new();

    let sweeper = SessionSweeper::new(
        sessions.clone(),
        cancel_token.clone(),
        Duration::from_secs(SWEEP_INTERVAL_SECS),
        Duration::from_secs(config.backend_settings.session_idle_secs),
    );
    tracker.spawn(async move {
        match sweeper.watch().await {
            Ok(_) => info!("Successfully shutdown session sweeper"),
            Err(e) => error!("Error in session sweeper: {}", e),
        }
    });
    tracker.close();

    let app_state = AppState {
        assets_dir: config.ui_settings.assets_dir,
        payment_script_url: config.payment_settings.script_url,
        payment_client_key: config.payment_settings.client_key,
        catalog,
        registrations,
        sessions,
    };
    Ok((app_state, tracker, cancel_token))
}

pub async fn build_server(
    socket_addr: SocketAddr,
    app_state: AppState,
    origins: Vec<String>,
) -> Result<
    Serve<
        TcpListener,
        IntoMakeServiceWithConnectInfo<Router, SocketAddr>,
        AddExtension<Router, ConnectInfo<SocketAddr>>,
    >,
    anyhow::Error,
> {
    let listener = TcpListener::bind(socket_addr).await?;

    info!("Setting up service");
    let app = app(app_state, origins);
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );
    info!(
        "Service running @: http://{}:{}",
        socket_addr.ip(),
        socket_addr.port()
    );
    Ok(server)
}

pub fn app(app_state: AppState, origins: Vec<String>) -> Router {
    let origins: Vec<HeaderValue> = origins
        .into_iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE])
        .allow_origin(AllowOrigin::list(origins));

    let registration_routes = Router::new()
        .route("/", get(open_form_handler))
        .route("/closed", get(closed_form_handler))
        .route("/{id}/competition", post(select_competition_handler))
        .route("/{id}/members", post(add_member_handler))
        .route("/{id}/members/{index}/remove", post(remove_member_handler))
        .route("/{id}/officials", post(add_official_handler))
        .route(
            "/{id}/officials/{index}/remove",
            post(remove_official_handler),
        )
        .route("/{id}/submit", post(submit_handler))
        .route("/{id}/payment/outcome", post(payment_outcome_handler))
        .route("/{id}/payment/retry", post(payment_retry_handler))
        .route("/{id}/close", post(close_form_handler));

    Router::new()
        .route("/", get(landing_handler))
        .nest("/register", registration_routes)
        .fallback(landing_handler)
        .route("/api/v1/health_check", get(health))
        .route("/ui/{*path}", get(serve_static_file))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn(log_request))
        .with_state(Arc::new(app_state))
        .layer(cors)
}

async fn log_request(request: Request<Body>, next: Next) -> impl IntoResponse {
    let now = time::OffsetDateTime::now_utc();
    let path = request
        .uri()
        .path_and_query()
        .map(|p| p.as_str())
        .unwrap_or_default();
    info!(target: "http_request","new request, {} {}", request.method().as_str(), path);

    let response = next.run(request).await;
    let response_time = time::OffsetDateTime::now_utc() - now;
    info!(target: "http_response", "response, code: {}, time: {}", response.status().as_str(), response_time);

    response
}

async fn serve_static_file(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Response {
    // Prevent directory traversal attacks
    if path.contains("..") {
        return (StatusCode::BAD_REQUEST, "Bad request").into_response();
    }

    let file_path = std::path::Path::new(&state.assets_dir).join(&path);

    let content = match tokio::fs::read(&file_path).await {
        Ok(c) => c,
        Err(_) => return (StatusCode::NOT_FOUND, "Not found").into_response(),
    };

    let mime_type = get_mime_type(&path);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_type)
        .body(Body::from(content))
        .unwrap_or_else(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response())
}

fn get_mime_type(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("");
    match ext {
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "html" | "htm" => "text/html; charset=utf-8",
        "json" | "map" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Outbound HTTP client. Requests are logged; nothing is retried, a failed
/// registration write must surface to the user instead of being replayed.
pub fn build_reqwest_client() -> ClientWithMiddleware {
    ClientBuilder::new(Client::new())
        .with(LoggingMiddleware)
        .build()
}

struct LoggingMiddleware;

#[async_trait::async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        extensions: &mut Extensions,
        next: reqwest_middleware::Next<'_>,
    ) -> reqwest_middleware::Result<reqwest::Response> {
        let method = req.method().clone();
        let url = req.url().clone();

        info!("Making {} request to: {}", method, url);

        let result = next.run(req, extensions).await;

        match &result {
            Ok(response) => {
                info!("{} {} -> Status: {}", method, url, response.status());
            }
            Err(error) => {
                warn!("{} {} -> Error: {:?}", method, url, error);
            }
        }

        result
    }
}

async fn shutdown_signal() {
    let mut sigint = signal(SignalKind::interrupt()).expect("Failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

    select! {
        _ = sigint.recv() => info!("Received SIGINT signal"),
        _ = sigterm.recv() => info!("Received SIGTERM signal"),
    }
}
