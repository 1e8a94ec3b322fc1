use tether::config::Config;
use tether::http::request::Request;
use tether::http::response::{Response, StatusCode};
use tether::server::{self, ConnectionRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load();
    let registry = ConnectionRegistry::new();

    tokio::select! {
        res = server::listener::run(&cfg, registry.clone(), handle_request) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!(
                live_connections = registry.live_count().await,
                "Shutdown signal received"
            );
        }
    }

    Ok(())
}

fn handle_request(mut request: Request, mut response: Response) {
    tokio::spawn(async move {
        match request.read_to_end().await {
            Ok(body) => {
                response.set_header("Content-Type", "text/plain");
                response.end(format!(
                    "Hello from Tether\n{} {} ({} body bytes)\n",
                    request.method.as_str(),
                    request.path(),
                    body.len()
                ));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Request body failed");
                response.write_head(StatusCode::BadRequest);
                response.end("");
            }
        }
    });
}
