use clap::{Args, Parser, Subcommand, ValueEnum};

/// Homecare Engine operations CLI
#[derive(Parser, Debug)]
#[command(name = "homecare")]
#[command(about = "Maintenance jobs for the Homecare scheduling database", version)]
pub struct Cli {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    pub database_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Registration number backfill and verification
    #[command(name = "registration-numbers", subcommand)]
    RegistrationNumbers(RegistrationCommand),
}

#[derive(Subcommand, Debug)]
pub enum RegistrationCommand {
    /// Show what a renumbering run would touch, without changing anything
    Plan(OutputArgs),

    /// Renumber every appointment in a single transaction
    Execute(ExecuteArgs),

    /// Check uniqueness, format and series consistency
    Verify(OutputArgs),
}

#[derive(Args, Debug, Clone, Copy, Default)]
pub struct OutputArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExecuteArgs {
    /// Skip the interactive confirmation prompt
    #[arg(long)]
    pub yes: bool,

    /// Assignment attempts per appointment before the run is aborted
    /// [default: REGISTRATION_MAX_ATTEMPTS, else 10]
    #[arg(long)]
    pub max_attempts: Option<u32>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}
