use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::ingest;
use crate::log_writer::RotatingLogWriter;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// Parameters for the http listener.
pub struct ServerParameters {
    /// The ip address the server should listen on.
    #[serde(default = "default_address")]
    pub address: String,
    /// The port the server should listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_address() -> String {
    String::from("0.0.0.0")
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerParameters {
    fn default() -> Self {
        ServerParameters {
            address: default_address(),
            port: default_port(),
        }
    }
}

/// Serves the ingest endpoint until `shutdown` is set.
///
/// Requests that are in flight when the shutdown is signaled are completed before returning.
pub async fn serve(
    params: ServerParameters,
    writer: Arc<RotatingLogWriter>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    let listener = TcpListener::bind((params.address.as_str(), params.port)).await?;
    log::info!(target: "sensorlogd::http", "Listening on \'{}\'", listener.local_addr()?);

    axum::serve(listener, ingest::router(writer))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
            log::info!(target: "sensorlogd::http", "Shutting down http server");
        })
        .await
}
