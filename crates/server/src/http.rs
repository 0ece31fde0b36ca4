//! HTTP server host: binding, graceful shutdown and configuration reload.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use axum::Router;
use cmdgate_registry::RepositoryEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::routes::build_router;
use crate::state::{RouteState, ServerSettings};

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:0";
const REPOSITORY_EVENT_BUFFER: usize = 16;

/// A configured, not yet listening server.
#[derive(Debug)]
pub struct CommandServer {
    address: Option<String>,
    routes: Vec<Arc<RouteState>>,
    cancellation_token: CancellationToken,
}

impl CommandServer {
    /// Build the server from fully populated settings.
    pub fn new(mut settings: ServerSettings) -> Self {
        let cancellation_token = CancellationToken::new();
        let routes = std::mem::take(&mut settings.routes)
            .into_iter()
            .map(|route| Arc::new(RouteState::new(route, &settings, cancellation_token.child_token())))
            .collect();
        Self {
            address: settings.address,
            routes,
            cancellation_token,
        }
    }

    /// The router serving every route, without a listener.
    pub fn router(&self) -> Router {
        build_router(&self.routes)
    }

    /// Bind, start serving, and return a handle for reload and shutdown.
    pub async fn start(self) -> Result<RunningServer> {
        let bind_address = resolve_bind_address(self.address.as_deref())?;
        let listener = tokio::net::TcpListener::bind(bind_address).await?;
        let bound_address = listener.local_addr()?;
        let router = self.router();

        let routes = self
            .routes
            .into_iter()
            .map(|state| {
                let (events, listener) = state
                    .repository
                    .listen(REPOSITORY_EVENT_BUFFER, self.cancellation_token.child_token());
                RouteHandle { state, events, listener }
            })
            .collect::<Vec<_>>();
        for route in &routes {
            info!(route = %route.state.name, mount = %display_mount(&route.state.mount), "mounted route");
        }

        let server_handle = tokio::spawn({
            let shutdown = self.cancellation_token.child_token();
            async move {
                let served = axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown.cancelled().await;
                    })
                    .await;
                if let Err(error) = served {
                    warn!("HTTP server stopped with an error: {error}");
                }
            }
        });
        info!(address = %bound_address, "command server listening");

        Ok(RunningServer {
            bound_address,
            cancellation_token: self.cancellation_token,
            server_handle,
            routes,
        })
    }
}

#[derive(Debug)]
struct RouteHandle {
    state: Arc<RouteState>,
    events: mpsc::Sender<RepositoryEvent>,
    listener: JoinHandle<()>,
}

/// Runtime handle for a listening server.
#[derive(Debug)]
pub struct RunningServer {
    bound_address: SocketAddr,
    cancellation_token: CancellationToken,
    server_handle: JoinHandle<()>,
    routes: Vec<RouteHandle>,
}

impl RunningServer {
    pub fn bound_address(&self) -> SocketAddr {
        self.bound_address
    }

    /// Swap in new commands and parameter rules for routes that exist already.
    ///
    /// Routes are matched by name. Added or removed routes, and changed mounts,
    /// need a restart and are only reported. `settings` is fully loaded before
    /// this runs, so every matched route is replaced and none is left behind.
    pub fn reload(&self, settings: ServerSettings) {
        for route in &self.routes {
            if !settings.routes.iter().any(|candidate| candidate.name == route.state.name) {
                warn!(route = %route.state.name, "route removed from configuration; restart to unmount it");
            }
        }
        for next in settings.routes {
            let Some(route) = self.routes.iter().find(|route| route.state.name == next.name) else {
                warn!(route = %next.name, "new route in configuration; restart to mount it");
                continue;
            };
            if route.state.mount != next.mount {
                warn!(route = %next.name, "mount changed; restart to apply it");
            }
            let count = next.commands.len();
            route.state.replace(next);
            info!(route = %route.state.name, commands = count, "reloaded route");
        }
    }

    /// Queue an add/remove notification for the named route's repository.
    pub async fn notify(&self, route: &str, event: RepositoryEvent) -> Result<()> {
        let handle = self
            .routes
            .iter()
            .find(|handle| handle.state.name == route)
            .ok_or_else(|| anyhow!("no route named '{route}'"))?;
        handle
            .events
            .send(event)
            .await
            .map_err(|_| anyhow!("repository listener for route '{route}' has stopped"))
    }

    /// Stop accepting requests, cancel in-flight producers and wait for background tasks.
    pub async fn stop(self) -> Result<()> {
        self.cancellation_token.cancel();
        for route in self.routes {
            route
                .listener
                .await
                .map_err(|error| anyhow!("repository listener for route '{}' failed: {error}", route.state.name))?;
        }
        self.server_handle
            .await
            .map_err(|error| anyhow!("HTTP server task failed: {error}"))?;
        info!("command server stopped");
        Ok(())
    }
}

fn display_mount(mount: &str) -> &str {
    if mount.is_empty() { "/" } else { mount }
}

/// Parse the configured bind address, defaulting to a free loopback port.
pub fn resolve_bind_address(bind_address: Option<&str>) -> Result<SocketAddr> {
    let address = bind_address.unwrap_or(DEFAULT_BIND_ADDRESS);
    address
        .parse()
        .map_err(|error| anyhow!("invalid bind address '{address}': {error}"))
}
