//! Binary RPC sub-server.
//!
//! Runs a tonic router over the `rpc` sub-listener. Connections reach it
//! with the HTTP/2 preface still unread, so tonic's HTTP/2 stack sees an
//! ordinary stream.

use crate::error::ServerError;
use crate::mux::SubListener;
use crate::shutdown::ShutdownSignal;
use tonic::transport::server::Router;

/// Serves `router` until `shutdown` fires and its connections finish.
pub async fn serve_rpc(
    router: Router,
    listener: SubListener,
    shutdown: ShutdownSignal,
) -> Result<(), ServerError> {
    tracing::info!(listener = listener.name(), "rpc sub-server serving");
    router
        .serve_with_incoming_shutdown(listener.into_stream(), shutdown.recv())
        .await?;
    tracing::info!("rpc sub-server stopped");
    Ok(())
}
