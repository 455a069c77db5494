//! Command handlers
//!
//! Handlers take the repository as a trait object so the same code path runs
//! against PostgreSQL in production and the in-memory store in tests.

use crate::cli::{ExecuteArgs, OutputArgs, RegistrationCommand};
use crate::render;
use registration_numbering::{
    AllocatorConfig, AppointmentRepository, RegistrationNumberAllocator, ReportSummary,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Asks the operator to approve a destructive run
pub trait ConfirmationPrompt {
    fn confirm(&self, plan: &ReportSummary) -> anyhow::Result<bool>;
}

/// Interactive prompt on the controlling terminal. Declines when nobody is attending.
pub struct TerminalPrompt;

impl ConfirmationPrompt for TerminalPrompt {
    fn confirm(&self, plan: &ReportSummary) -> anyhow::Result<bool> {
        if !console::user_attended_stderr() {
            warn!("No terminal attached, refusing to prompt; pass --yes to run unattended");
            return Ok(false);
        }

        eprint!("{}", render::summary(plan));
        let answer = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Rebuild registration numbers for all {} appointments?",
                plan.total_appointments
            ))
            .default(false)
            .interact()?;
        Ok(answer)
    }
}

/// Rendered command output plus whether the process should exit cleanly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub output: String,
    pub success: bool,
}

impl CommandOutcome {
    fn ok(output: String) -> Self {
        Self {
            output,
            success: true,
        }
    }
}

pub async fn run_registration(
    command: RegistrationCommand,
    repository: Arc<dyn AppointmentRepository>,
    prompt: &dyn ConfirmationPrompt,
) -> anyhow::Result<CommandOutcome> {
    match command {
        RegistrationCommand::Plan(output) => plan(repository, output).await,
        RegistrationCommand::Execute(args) => execute(repository, args, prompt).await,
        RegistrationCommand::Verify(output) => verify(repository, output).await,
    }
}

async fn plan(
    repository: Arc<dyn AppointmentRepository>,
    output: OutputArgs,
) -> anyhow::Result<CommandOutcome> {
    let summary = RegistrationNumberAllocator::new(repository).plan().await?;
    info!(
        total = summary.total_appointments,
        initial_visits = summary.initial_visits,
        "Plan computed"
    );

    let text = if output.json {
        render::to_json(&summary)?
    } else {
        render::summary(&summary)
    };
    Ok(CommandOutcome::ok(text))
}

async fn execute(
    repository: Arc<dyn AppointmentRepository>,
    args: ExecuteArgs,
    prompt: &dyn ConfirmationPrompt,
) -> anyhow::Result<CommandOutcome> {
    let config = match args.max_attempts {
        Some(max_attempts) => AllocatorConfig::with_max_attempts(max_attempts)?,
        None => AllocatorConfig::from_env()?,
    };
    let allocator = RegistrationNumberAllocator::new(repository).with_config(config);

    let confirmed = if args.yes {
        true
    } else {
        let summary = allocator.plan().await?;
        prompt.confirm(&summary)?
    };

    let result = allocator.execute(confirmed).await?;
    let text = if args.output.json {
        render::to_json(&result)?
    } else {
        render::execution(&result)
    };
    Ok(CommandOutcome::ok(text))
}

async fn verify(
    repository: Arc<dyn AppointmentRepository>,
    output: OutputArgs,
) -> anyhow::Result<CommandOutcome> {
    let report = RegistrationNumberAllocator::new(repository).verify().await?;
    let success = report.is_consistent();
    if !success {
        warn!(
            duplicates = report.duplicate_numbers.len(),
            unnumbered = report.unnumbered_initial_visits.len(),
            malformed = report.malformed_numbers.len(),
            mismatched = report.series_mismatches.len(),
            "Registration numbers are inconsistent"
        );
    }

    let text = if output.json {
        render::to_json(&report)?
    } else {
        render::verification(&report)
    };
    Ok(CommandOutcome { output: text, success })
}
