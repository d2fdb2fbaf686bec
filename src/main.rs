use clap::Parser;
use dotenvy::dotenv;
use tracing::{info, warn};

mod cli;
mod composer;
mod config;
mod llm;
mod prompts;
mod state;
mod utils;

use cli::{CliOptions, Command};
use composer::{Composer, ComposerSettings, SystemClipboard};
use config::CONFIG;
use llm::GeminiGateway;
use utils::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let options = CliOptions::parse();
    let _guards = init_logging(options.verbose);

    let gateway = GeminiGateway::from_config();
    if !CONFIG.has_gemini_credentials() {
        warn!("GEMINI_API_KEY is not set; enhance, idea, image analysis and translation will do nothing");
    }
    info!(
        "Starting Cinematic Composer (model={}, scene language={}, target language={})",
        gateway.settings().model,
        CONFIG.description_language,
        CONFIG.target_language
    );

    let composer = Composer::new(gateway, SystemClipboard, ComposerSettings::from_config());
    let command = options.command.unwrap_or(Command::Session);
    cli::run_one_shot(composer, command).await
}
