use anyhow::Result;
use clap::Parser;
use database_layer::{mask_url, DatabasePool};
use ops_cli::{config, run_registration, Cli, Command, LogFormat, TerminalPrompt};
use registration_numbering::{NumberingError, PostgresAppointmentRepository};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, fmt::time::ChronoUtc, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    // .env first so clap's env fallbacks can see it
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            if let Some(NumberingError::ConfirmationRequired) = err.downcast_ref::<NumberingError>() {
                warn!("Aborted by operator, nothing was changed");
                return ExitCode::from(2);
            }
            error!("❌ {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let database = config::database_config(cli.database_url.as_deref())?;
    info!("Database: {}", mask_url(&database.url));

    let pool = DatabasePool::connect(&database).await?;
    info!("✅ Connected to database");
    let repository = Arc::new(PostgresAppointmentRepository::new(pool.pool().clone()));

    let outcome = match cli.command {
        Command::RegistrationNumbers(command) => {
            run_registration(command, repository, &TerminalPrompt).await
        }
    };
    pool.close().await;

    let outcome = outcome?;
    println!("{}", outcome.output.trim_end());
    Ok(outcome.success)
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "homecare={level},ops_cli={level},registration_numbering={level},database_layer={level},sqlx=warn"
        )
        .into()
    });

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339()),
            )
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .init(),
    }
}
