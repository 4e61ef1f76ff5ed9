use anyhow::{Context, Result};
use lockplay::display::{DisplaySink, JsonLinesSink, LogSink};
use lockplay::toggle::{LedToggle, SharedToggle, ToggleProvider};
use lockplay::types::ToggleState;
use lockplay::{signals, Config, Engine};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_args(std::env::args().skip(1))?;
    log::info!(
        "Starting lockplay for {}:{}",
        config.host,
        config.service
    );

    let display: Box<dyn DisplaySink + Send> = if config.json {
        Box::new(JsonLinesSink::new(std::io::stdout()))
    } else {
        Box::new(LogSink::default())
    };

    let (toggle, shared): (Box<dyn ToggleProvider + Send>, Option<SharedToggle>) =
        match &config.led {
            Some(path) => {
                let led = LedToggle::new(path);
                log::info!("Following LED {}", led.path().display());
                (Box::new(led), None)
            }
            None => {
                let shared = SharedToggle::new(ToggleState::Disengaged);
                (Box::new(shared.clone()), Some(shared))
            }
        };

    let (engine, handle) = Engine::new(&config, display, toggle);

    // Ctrl+C; SIGTERM goes through signals::listen
    let handle_for_signal = handle.clone();
    ctrlc::set_handler(move || {
        log::info!("Received interrupt signal, closing connection...");
        handle_for_signal.shutdown();
    })
    .context("Failed to set Ctrl+C handler")?;

    signals::listen(handle, shared).context("Failed to install signal handlers")?;

    engine.run().await;
    Ok(())
}
