/// LiveGrid WebSocket Server
///
/// Standalone server that gives each websocket client its own grid widget
/// over a demo dataset. `LIVEGRID_CONFIG` may name a JSON config file.

use livegrid::config::GridConfig;
use livegrid::server::run_server;
use livegrid::websocket::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("PORT must be a number: {}", e)))?;

    let config = match std::env::var("LIVEGRID_CONFIG") {
        Ok(path) => {
            let text = std::fs::read_to_string(&path)?;
            GridConfig::from_json_str(&text)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?
        }
        Err(_) => GridConfig::default(),
    };
    let state = AppState::demo(config).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    run_server(&host, port, state).await
}
