use playlist_streamer::Config;
use playlist_streamer::prompt::Prompter;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    // RUST_LOG wins over --verbose
    let default_filter = if verbose {
        "info,playlist_streamer=debug"
    } else {
        "info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[tokio::main]
async fn main() {
    // Load configuration from CLI and/or config file
    let config = Config::load();
    init_tracing(config.as_ref().is_ok_and(|config| config.verbose));

    let config = match config {
        Ok(config) => config,
        Err(error) => {
            error!("Invalid configuration: {error:#}");
            std::process::exit(2);
        }
    };

    let settings = match tokio::task::spawn_blocking(move || {
        config.resolve(&mut Prompter::stdio())
    })
    .await
    {
        Ok(Ok(settings)) => settings,
        Ok(Err(error)) => {
            error!("Invalid configuration: {error:#}");
            std::process::exit(2);
        }
        Err(error) => {
            error!(%error, "Configuration prompt aborted");
            std::process::exit(2);
        }
    };

    match playlist_streamer::run(settings).await {
        Ok(stats) => info!(?stats, "Shut down cleanly"),
        Err(error) => {
            error!("{error:#}");
            std::process::exit(1);
        }
    }
}
