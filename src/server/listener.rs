use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::http::connection::RequestHandler;
use crate::http::io::serve_connection;
use crate::server::registry::ConnectionRegistry;

/// Accepts connections forever, serving each on its own task with a clone
/// of `handler`.
pub async fn run<H>(cfg: &Config, registry: ConnectionRegistry, handler: H) -> anyhow::Result<()>
where
    H: RequestHandler + Clone + Send + 'static,
{
    let listener = TcpListener::bind(&cfg.listen_addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    serve(listener, cfg, registry, handler).await
}

/// Accept loop over an already bound listener.
pub async fn serve<H>(
    listener: TcpListener,
    cfg: &Config,
    registry: ConnectionRegistry,
    handler: H,
) -> anyhow::Result<()>
where
    H: RequestHandler + Clone + Send + 'static,
{
    loop {
        let (socket, peer) = listener.accept().await?;
        let id = registry.register(peer).await;
        info!(connection = id, "Accepted connection from {}", peer);

        let cfg = cfg.clone();
        let registry = registry.clone();
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_connection(id, socket, handler, &cfg).await {
                tracing::error!("Connection error from {}: {}", peer, e);
            }
            registry.release(id).await;
        });
    }
}
