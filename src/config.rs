use crate::error::ConfigError;
use crate::remote::SubmissionStrategy;
use std::env;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:flavor_survey.db";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub endpoint: Option<String>,
    pub strategy: SubmissionStrategy,
    pub timeout: Duration,
}

// Values given on the command line; each one wins over its environment variable
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub strategy: Option<String>,
    pub database_url: Option<String>,
}

impl Config {
    pub fn from_env(overrides: &Overrides) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok(), overrides)
    }

    // Builds the config from any key lookup, so tests don't touch the process env
    pub fn from_lookup<F>(lookup: F, overrides: &Overrides) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = overrides
            .database_url
            .clone()
            .or_else(|| lookup("DATABASE_URL"))
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let endpoint = overrides
            .endpoint
            .clone()
            .or_else(|| lookup("SURVEY_ENDPOINT"))
            .filter(|url| !url.trim().is_empty());

        // The default strategy depends on the endpoint after overrides
        let strategy = match overrides.strategy.clone().or_else(|| lookup("SURVEY_STRATEGY")) {
            Some(value) => value.parse()?,
            None if endpoint.is_some() => SubmissionStrategy::JsonPost,
            None => SubmissionStrategy::LocalOnly,
        };

        let timeout_secs = match lookup("SURVEY_TIMEOUT_SECS") {
            Some(value) => value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: "SURVEY_TIMEOUT_SECS",
                value,
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let config = Self {
            database_url,
            endpoint,
            strategy,
            timeout: Duration::from_secs(timeout_secs),
        };
        config.check()?;
        Ok(config)
    }

    /// Fails when a network strategy has nowhere to send ballots.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.strategy.needs_endpoint() && self.endpoint.is_none() {
            return Err(ConfigError::MissingEndpoint(self.strategy.name()));
        }
        Ok(())
    }
}
