use shoplens::{create_router, init, AppState, Config, Result};

#[tokio::main]
async fn main() -> Result<()> {
    init()?;

    let config = Config::from_env()?;
    if !config.upload_dir.exists() {
        std::fs::create_dir_all(&config.upload_dir)?;
    }
    let addr = config.bind_addr;

    let state = AppState::new(config);

    // Warm the models and the feature cache without holding up the listener;
    // a failure here is retried on the first request
    let warm = state.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = warm.matcher() {
            log::error!("Failed to prepare matcher: {}", e);
        }
    });

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Server listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
