use crate::bridge::model::StatusModel;
use anyhow::{anyhow, Context, Result};
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::Filter;

pub fn status_bind_address(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Holds the latest simulation status and serves it over HTTP on demand.
pub struct StatusBridge {
    state: Arc<RwLock<StatusModel>>,
}

impl StatusBridge {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StatusModel {
                status: "starting".into(),
                ..Default::default()
            })),
        }
    }

    /// Starts the `GET /status` endpoint on a background thread.
    pub fn serve(&self, address: SocketAddr) -> Result<()> {
        let state = self.state.clone();
        let state_filter = warp::any().map(move || state.clone());

        let status_route = warp::path("status")
            .and(warp::get())
            .and(state_filter)
            .map(|state: Arc<RwLock<StatusModel>>| match state.read() {
                Ok(model) => warp::reply::json(&*model),
                Err(_) => warp::reply::json(&serde_json::json!({"status": "unavailable"})),
            });

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("building status bridge runtime")?;
        thread::Builder::new()
            .name("status-bridge".into())
            .spawn(move || {
                runtime.block_on(async move {
                    warp::serve(status_route).run(address).await;
                });
            })
            .context("spawning status bridge thread")?;
        log::info!("status bridge listening on http://{}/status", address);
        Ok(())
    }

    pub fn publish(&self, model: &StatusModel) -> Result<()> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| anyhow!("status lock poisoned"))?;
        *guard = model.clone();
        println!(
            "[RDM] windows consumed: {:?}, compactions: {}, dropped frames: {}",
            guard.consumers.iter().map(|c| c.windows).collect::<Vec<_>>(),
            guard.metrics.compactions,
            guard.frames_dropped
        );
        Ok(())
    }

    pub fn publish_status(&self, message: &str) {
        if let Ok(mut guard) = self.state.write() {
            guard.status = message.to_string();
        }
        println!("[RDM] {}", message);
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> StatusModel {
        self.state
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Default for StatusBridge {
    fn default() -> Self {
        Self::new()
    }
}
