//! PostgreSQL-backed appointment repository
//!
//! Expects the `appointments` and `services` tables with a partial unique
//! index on `appointments (registration_number) WHERE series_parent_id IS NULL`,
//! so follow-up visits may share their initial visit's number.
//!
//! A renumbering transaction:
//! - takes a transaction-scoped advisory lock so only one run is active
//! - wraps every single-row assignment in a savepoint
//! - rolls back on drop unless committed

use crate::{
    error::{NumberingError, Result},
    models::*,
    number::PLACEHOLDER_PREFIX,
    repository::{AppointmentRepository, RenumberingTransaction},
};
use async_trait::async_trait;
use sqlx::{Acquire, PgPool, Postgres, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Advisory lock key held for the duration of a renumbering run
pub const RENUMBERING_LOCK_KEY: i64 = 0x5245_474e_554d; // "REGNUM"

/// PostgreSQL-backed appointment repository
#[derive(Clone)]
pub struct PostgresAppointmentRepository {
    pool: PgPool,
}

impl PostgresAppointmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AppointmentRepository for PostgresAppointmentRepository {
    async fn list_appointments(&self) -> Result<Vec<Appointment>> {
        let appointments = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT id, service_id, registration_number, series_parent_id, created_at
            FROM appointments
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(appointments)
    }

    async fn list_services(&self) -> Result<Vec<Service>> {
        let services =
            sqlx::query_as::<_, Service>("SELECT id, name, code, deleted_at FROM services")
                .fetch_all(&self.pool)
                .await?;

        Ok(services)
    }

    async fn begin_renumbering(&self) -> Result<Box<dyn RenumberingTransaction>> {
        let mut tx = self.pool.begin().await?;

        let locked: bool = sqlx::query_scalar("SELECT pg_try_advisory_xact_lock($1)")
            .bind(RENUMBERING_LOCK_KEY)
            .fetch_one(&mut *tx)
            .await?;

        if !locked {
            tx.rollback().await?;
            return Err(NumberingError::AlreadyRunning);
        }

        debug!("Renumbering transaction started");
        Ok(Box::new(PostgresRenumberingTransaction { tx }))
    }
}

struct PostgresRenumberingTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl RenumberingTransaction for PostgresRenumberingTransaction {
    async fn quarantine_all(&mut self) -> Result<u64> {
        let result =
            sqlx::query("UPDATE appointments SET registration_number = $1 || id::text")
                .bind(PLACEHOLDER_PREFIX)
                .execute(&mut *self.tx)
                .await?;

        Ok(result.rows_affected())
    }

    async fn services(&mut self) -> Result<Vec<Service>> {
        let services =
            sqlx::query_as::<_, Service>("SELECT id, name, code, deleted_at FROM services")
                .fetch_all(&mut *self.tx)
                .await?;

        Ok(services)
    }

    async fn initial_visits(&mut self) -> Result<Vec<Appointment>> {
        let appointments = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT id, service_id, registration_number, series_parent_id, created_at
            FROM appointments
            WHERE series_parent_id IS NULL
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(appointments)
    }

    async fn assign_registration_number(
        &mut self,
        appointment_id: Uuid,
        number: &str,
    ) -> Result<AssignOutcome> {
        let mut savepoint = self.tx.begin().await?;

        let result = sqlx::query("UPDATE appointments SET registration_number = $1 WHERE id = $2")
            .bind(number)
            .bind(appointment_id)
            .execute(&mut *savepoint)
            .await;

        match result {
            Ok(done) if done.rows_affected() == 1 => {
                savepoint.commit().await?;
                Ok(AssignOutcome::Assigned)
            }
            Ok(_) => {
                savepoint.rollback().await?;
                Err(NumberingError::StorageError(format!(
                    "Appointment {appointment_id} not found"
                )))
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                savepoint.rollback().await?;
                debug!(%appointment_id, number, "Unique violation, savepoint rolled back");
                Ok(AssignOutcome::Conflict)
            }
            Err(e) => {
                if let Err(rollback_err) = savepoint.rollback().await {
                    warn!("Failed to roll back savepoint: {}", rollback_err);
                }
                Err(e.into())
            }
        }
    }

    async fn series_heads(&mut self) -> Result<Vec<SeriesHead>> {
        let heads = sqlx::query_as::<_, SeriesHead>(
            r#"
            SELECT p.id, p.registration_number
            FROM appointments p
            WHERE p.series_parent_id IS NULL
              AND EXISTS (
                  SELECT 1 FROM appointments f WHERE f.series_parent_id = p.id
              )
            ORDER BY p.created_at ASC, p.id ASC
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(heads)
    }

    async fn propagate_to_series(&mut self, head_id: Uuid, number: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE appointments
            SET registration_number = $1
            WHERE series_parent_id = $2
              AND registration_number IS DISTINCT FROM $1
            "#,
        )
        .bind(number)
        .bind(head_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        info!("Renumbering transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        info!("Renumbering transaction rolled back");
        Ok(())
    }
}
