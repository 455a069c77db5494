use crate::{
    config::AllocatorConfig,
    error::{NumberingError, Result},
    models::{AssignOutcome, SkipReason, SkippedAppointment},
    number::RegistrationNumber,
    report::{self, ExecutionResult, ReportSummary, VerificationReport},
    repository::{AppointmentRepository, RenumberingTransaction},
    service::{ServiceCatalog, ServiceResolver},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Recomputes registration numbers for every appointment in a repository
pub struct RegistrationNumberAllocator {
    repository: Arc<dyn AppointmentRepository>,
    config: AllocatorConfig,
}

impl RegistrationNumberAllocator {
    pub fn new(repository: Arc<dyn AppointmentRepository>) -> Self {
        Self {
            repository,
            config: AllocatorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AllocatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Dry run over a fresh snapshot of the repository
    ///
    /// # Errors
    ///
    /// Only loading the snapshot can fail.
    pub async fn plan(&self) -> Result<ReportSummary> {
        let appointments = self.repository.list_appointments().await?;
        let catalog = ServiceCatalog::new(self.repository.list_services().await?);

        Ok(report::plan(&appointments, &catalog))
    }

    /// # Errors
    ///
    /// Only loading the snapshot can fail.
    pub async fn verify(&self) -> Result<VerificationReport> {
        let appointments = self.repository.list_appointments().await?;
        Ok(report::verify(&appointments))
    }

    /// Rewrite every registration number in one transaction.
    ///
    /// Nothing is touched unless `confirm` is true. Any fatal error rolls the
    /// whole run back, so callers see either a full result or the error.
    ///
    /// # Errors
    ///
    /// [`NumberingError::ConfirmationRequired`] without confirmation,
    /// [`NumberingError::RetryBudgetExceeded`] when one appointment keeps
    /// conflicting, or any storage error.
    #[instrument(skip(self), fields(max_attempts = self.config.max_attempts))]
    pub async fn execute(&self, confirm: bool) -> Result<ExecutionResult> {
        if !confirm {
            warn!("Registration numbering requested without confirmation, nothing changed");
            return Err(NumberingError::ConfirmationRequired);
        }

        let mut tx = self.repository.begin_renumbering().await?;

        match self.renumber(tx.as_mut()).await {
            Ok(result) => {
                tx.commit().await?;
                info!(
                    processed = result.processed_initial_visits,
                    skipped = result.skipped_initial_visits,
                    follow_ups = result.updated_follow_ups,
                    "Registration numbering committed"
                );
                Ok(result)
            }
            Err(e) => {
                error!(error = %e, "Registration numbering failed, rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    error!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn renumber(&self, tx: &mut dyn RenumberingTransaction) -> Result<ExecutionResult> {
        let mut result = ExecutionResult {
            quarantined: tx.quarantine_all().await?,
            ..ExecutionResult::default()
        };
        info!("Quarantined {} registration numbers", result.quarantined);

        let catalog = ServiceCatalog::new(tx.services().await?);
        debug!("Resolved {} active service codes", catalog.len());
        self.assign_initial_visits(tx, &catalog, &mut result).await?;
        Self::propagate_series(tx, &mut result).await?;

        Ok(result)
    }

    async fn assign_initial_visits(
        &self,
        tx: &mut dyn RenumberingTransaction,
        resolver: &dyn ServiceResolver,
        result: &mut ExecutionResult,
    ) -> Result<()> {
        // Next sequence to try per service code, local to this run
        let mut counters: HashMap<String, u32> = HashMap::new();

        for appointment in tx.initial_visits().await? {
            let Some(code) = resolver.service_code(&appointment) else {
                warn!(
                    appointment_id = %appointment.id,
                    "Skipping initial visit with unresolvable service"
                );
                result.skipped.push(SkippedAppointment {
                    appointment_id: appointment.id,
                    reason: SkipReason::UnresolvableService,
                });
                continue;
            };
            let counter = counters.entry(code.clone()).or_insert(1);

            let mut attempts = 0;
            loop {
                let candidate = RegistrationNumber::new(code.clone(), *counter).to_string();
                attempts += 1;

                match tx.assign_registration_number(appointment.id, &candidate).await? {
                    AssignOutcome::Assigned => {
                        debug!(appointment_id = %appointment.id, number = %candidate, "Assigned");
                        result.assigned_by_service.insert(code.clone(), *counter);
                        result.processed_initial_visits += 1;
                        *counter += 1;
                        break;
                    }
                    AssignOutcome::Conflict if attempts >= self.config.max_attempts => {
                        return Err(NumberingError::RetryBudgetExceeded {
                            appointment_id: appointment.id,
                            service_code: code,
                            attempts,
                            last_candidate: candidate,
                        });
                    }
                    AssignOutcome::Conflict => {
                        warn!(
                            appointment_id = %appointment.id,
                            number = %candidate,
                            attempt = attempts,
                            "Registration number taken, trying the next one"
                        );
                        result.conflicts_resolved += 1;
                        *counter += 1;
                    }
                }
            }
        }

        result.skipped_initial_visits = result.skipped.len();
        Ok(())
    }

    async fn propagate_series(
        tx: &mut dyn RenumberingTransaction,
        result: &mut ExecutionResult,
    ) -> Result<()> {
        for head in tx.series_heads().await? {
            match head.registration_number.as_deref() {
                Some(number) if !number.is_empty() && !RegistrationNumber::is_placeholder(number) => {
                    result.updated_follow_ups += tx.propagate_to_series(head.id, number).await?;
                }
                _ => {
                    warn!(
                        head_id = %head.id,
                        "Initial visit has no registration number, series left untouched"
                    );
                    result.skipped_series += 1;
                }
            }
        }

        Ok(())
    }
}
