// sottod - daemon entry point
// Bootstraps the engine and drains the dispatch queue; command and
// dictation processing live in downstream consumers, not here.

use sotto::{error, info, EngineConfig, QueueItem, VoiceEngine};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("sotto")
        .join("settings.json")
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cfg!(debug_assertions) {
            "debug"
        } else {
            "info"
        }),
    )
    .init();

    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(default_settings_path);
    let config = match EngineConfig::load(&settings_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load {}: {}", settings_path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let handle = match VoiceEngine::new(config).start() {
        Ok(handle) => Arc::new(handle),
        Err(e) => {
            error!("Engine failed to start: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let signal_handle = handle.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Interrupt received");
        signal_handle.shutdown();
    }) {
        error!("Failed to install signal handler: {}", e);
        handle.shutdown();
        return ExitCode::FAILURE;
    }

    info!("sottod listening (settings: {})", settings_path.display());

    // Stand-in consumer: log finished recordings until shutdown
    let queue = handle.queue();
    loop {
        match queue.dequeue() {
            QueueItem::Recording {
                file_path,
                mode,
                is_trigger,
            } => {
                info!(
                    "Recording ready: {} ({}, trigger={})",
                    file_path,
                    mode.label(),
                    is_trigger
                );
            }
            QueueItem::Shutdown => break,
        }
    }

    info!("sottod exiting");
    ExitCode::SUCCESS
}
