mod survey;

use clap::{Parser, Subcommand};

pub use survey::{handle_results, handle_vote};

/// Ice cream flavor survey: vote for your top three flavors and see the standings.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    /// (url) Survey endpoint. Overrides SURVEY_ENDPOINT.
    #[clap(long, value_parser, global = true)]
    pub endpoint: Option<String>,

    /// (local, form or json) How ballots are sent. Overrides SURVEY_STRATEGY.
    #[clap(long, value_parser, global = true)]
    pub strategy: Option<String>,

    /// (database url) Where the local tally is kept. Overrides DATABASE_URL.
    #[clap(long, value_parser, global = true)]
    pub database: Option<String>,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Submit a ballot with up to three ranked flavors.
    Vote(VoteArgs),
    /// Show the current standings from the local tally.
    Results,
}

#[derive(Parser, Debug, Clone)]
pub struct VoteArgs {
    /// Your favorite flavor (3 points).
    #[clap(long, value_parser)]
    pub first: Option<String>,

    /// Second favorite (2 points).
    #[clap(long, value_parser)]
    pub second: Option<String>,

    /// Third favorite (1 point).
    #[clap(long, value_parser)]
    pub third: Option<String>,

    /// Your name. Left out, the vote is anonymous.
    #[clap(long, value_parser)]
    pub name: Option<String>,

    /// A flavor you would like to see on the menu.
    #[clap(long, value_parser)]
    pub suggestion: Option<String>,
}
