mod commands;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod remote;
mod render;
mod voting;

use clap::Parser;
use commands::{Args, Command};
use config::{Config, Overrides};
use db::{Database, TallyStore};
use error::SurveyError;
use handlers::SurveySession;
use log::{error, info};
use remote::{HttpSubmissionClient, SubmissionClient};
use std::process::ExitCode;
use std::sync::Arc;

async fn run(args: Args) -> Result<String, SurveyError> {
    // Command line flags win over the environment
    let overrides = Overrides {
        endpoint: args.endpoint,
        strategy: args.strategy,
        database_url: args.database,
    };
    let config = Config::from_env(&overrides)?;

    let store: Arc<dyn TallyStore> = Arc::new(Database::new(&config.database_url).await?);

    let client: Option<Arc<dyn SubmissionClient>> = match &config.endpoint {
        Some(endpoint) if config.strategy.needs_endpoint() => {
            info!("Submitting to {} using the {} strategy", endpoint, config.strategy.name());
            Some(Arc::new(HttpSubmissionClient::new(endpoint.clone(), config.strategy)?))
        }
        _ => None,
    };

    let mut session = SurveySession::open(store, client, config.strategy, config.timeout).await?;

    let output = match args.command {
        Command::Vote(vote) => commands::handle_vote(&mut session, &vote).await,
        Command::Results => commands::handle_results(&session),
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::init();
    }

    match run(args).await {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
