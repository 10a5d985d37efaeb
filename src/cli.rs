use clap::{Parser, Subcommand};

/// Scheduled data collection with execution history and dashboard metrics
#[derive(Parser, Debug)]
#[command(name = "datalake-native", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Start the scheduler and HTTP server (default)
    Serve,
    /// Apply database migrations and exit
    Migrate,
    /// Run one registered job once and print its execution as JSON
    Run {
        /// Registered job name, e.g. weather_collection
        job: String,
    },
    /// Mark executions left running by a previous process as failed
    Reconcile,
}

impl Cli {
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Serve)
    }
}
