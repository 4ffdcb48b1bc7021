use std::process::ExitCode;

use ticket_service::prelude::*;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("ticket-service: {error}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(error) = init_tracing(&config) {
        eprintln!("ticket-service: {error}");
        return ExitCode::FAILURE;
    }

    let code = match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "ticket-service stopped");
            ExitCode::FAILURE
        }
    };

    shutdown_tracing();
    code
}

async fn run(config: Config) -> Result<()> {
    let state = AppState::builder().config(config.clone()).build().await?;
    let app = build_router(&state);

    Server::new(config).serve(app).await
}
