/* Copyright 2023- The Binedge, Lda team. All rights reserved.
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *     http://www.apache.org/licenses/LICENSE-2.0
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! A transport-agnostic-core-backed server for a store-and-forward message
//! broker: request/response endpoints, a WebSocket duplex channel, and the
//! periodic reaper, wired together over [`broker_core`].

#![deny(unsafe_code)]

use std::net::SocketAddr;
use std::process::exit;
use std::sync::Arc;

use axum::Router;
use tokio::select;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use utoipa::OpenApi;

use broker_core::{
    DeliveryEngine, MessagePool, NodeRegistry, Reaper, RateLimiter, Replicator, Settings,
    SessionRegistry, SystemClock,
};

#[macro_use]
pub mod misc;

pub mod cli;
pub mod dto;
pub mod error;
pub mod graceful_shutdown;
pub mod http;
pub mod replication_client;
pub mod routes;
pub mod state;
pub mod ws;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(title = "Broker API", description = "Store-and-forward message broker API."),
    paths(
        misc::broker_version,
        http::health,
        http::publish,
        http::replicate_in,
        http::pull,
        http::delete,
        http::register_node,
        http::list_nodes,
    ),
    components(schemas(
        misc::Version,
        dto::HealthResponse,
        dto::PublishRequest,
        dto::PublishResponse,
        dto::PulledMessage,
        dto::PullResponse,
        dto::DeleteResponse,
        dto::RegisterNodeRequest,
        dto::RegisterNodeResponse,
        dto::NodeView,
        dto::ListNodesResponse,
    ))
)]
struct ApiDoc;

/// Result for main functions.
pub type BrokerResult = Result<(), String>;

/// Main entry point for the server process.
pub fn start(command: &cli::TopLevel) -> BrokerResult {
    match &command.subcommand {
        None => serve(&cli::Serve::default())?,
        Some(cli::Command::Serve(serve_args)) => serve(serve_args)?,
        Some(cli::Command::Version(_)) => version()?,
        Some(cli::Command::Oasgen(oasgen_args)) => oasgen(oasgen_args)?,
    };

    Ok(())
}

/// Prints the broker version to stdout.
pub fn version() -> BrokerResult {
    println!(cargo_crate_version!());

    Ok(())
}

/// Generates the OpenAPI spec for the broker's HTTP surface.
pub fn oasgen(args: &cli::Oasgen) -> BrokerResult {
    if args.json {
        println!("{}", ApiDoc::openapi().to_pretty_json().unwrap());
    } else {
        println!("{}", ApiDoc::openapi().to_yaml().unwrap());
    }

    Ok(())
}

fn serve(args: &cli::Serve) -> BrokerResult {
    start_server(args)
}

fn build_state(settings: Arc<Settings>) -> AppState {
    let clock = Arc::new(SystemClock);
    let pool = Arc::new(MessagePool::new());
    let sessions = Arc::new(SessionRegistry::new(clock.clone()));
    let nodes = Arc::new(NodeRegistry::new(clock.clone()));
    let rate_limiter = Arc::new(RateLimiter::new(
        settings.rate_limit_points,
        settings.rate_limit_window,
        clock.clone(),
    ));
    let delivery = Arc::new(DeliveryEngine::new(pool.clone(), sessions.clone()));
    let replication_target = Arc::new(replication_client::HttpReplicationTarget::new());
    let replicator = Arc::new(Replicator::new(
        nodes.clone(),
        replication_target,
        settings.replication_timeout,
    ));

    AppState {
        pool,
        sessions,
        nodes,
        rate_limiter,
        delivery,
        replicator,
        clock,
        settings,
    }
}

#[tokio::main]
async fn start_server(args: &cli::Serve) -> BrokerResult {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = Arc::new(Settings::from_env());
    let state = build_state(settings.clone());

    let reaper = Arc::new(Reaper::new(
        state.pool.clone(),
        state.sessions.clone(),
        state.rate_limiter.clone(),
        state.clock.clone(),
        settings.envelope_sweep_interval,
        settings.session_sweep_interval,
        settings.bucket_sweep_interval,
        settings.session_idle_timeout,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut reaper_tasks = reaper.spawn(shutdown_rx);

    run_server(args, state, &settings).await;

    let _ = shutdown_tx.send(true);
    while reaper_tasks.join_next().await.is_some() {}

    Ok(())
}

async fn run_server(args: &cli::Serve, state: AppState, settings: &Settings) {
    let cors = if settings.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    let app = routes::routes(state).layer(cors);

    let uri_vector = if !args.uri.is_empty() {
        info!("Overriding default bind address");
        args.uri.clone()
    } else {
        info!("Using default bind address");
        vec![format!("http://0.0.0.0:{}", settings.port)]
    };

    let mut all_listeners = JoinSet::new();

    for uri in &uri_vector {
        let Some(addr) = uri.strip_prefix("http://") else {
            error!("Unsupported URI schema: {uri}. Only http:// is supported.");
            exit(1)
        };

        let listener = tokio::net::TcpListener::bind(addr).await.unwrap_or_else(|err| {
            error!("Could not bind to TCP socket at {addr}: {err}");
            exit(1)
        });

        info!("Listening on: {uri}");

        let app = app.clone();
        all_listeners.spawn(async move {
            select! {
                bind_res = axum::serve(
                    listener,
                    app.into_make_service_with_connect_info::<SocketAddr>(),
                ) => {
                    bind_res.unwrap_or_else(|err| {
                        error!("Could not bind HTTP server: {err}");
                        exit(1)
                    });
                }
                _ = graceful_shutdown::global_shutdown_starts() => {}
            }
        });
    }

    loop {
        select! {
            _ = graceful_shutdown::global_shutdown_ends() => {
                error!("Global shutdown grace period has ended; exiting abnormally");
                exit(1)
            }
            _ = all_listeners.join_next() => {
                info!("Listener has exited");
                if all_listeners.is_empty() {
                    info!("All listeners have exited; exiting normally");
                    break;
                }
            }
        }
    }
}
