use crate::{
    error::{NumberingError, Result},
    models::*,
    number::RegistrationNumber,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock, RwLockReadGuard};
use tracing::debug;
use uuid::Uuid;

pub mod postgres;

pub use postgres::PostgresAppointmentRepository;

/// Appointment store used by the renumbering job
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// All appointments ordered by `created_at`, then id.
    ///
    /// Snapshot reads never wait on an open renumbering transaction. Stores
    /// without MVCC fail with [`NumberingError::AlreadyRunning`] instead.
    async fn list_appointments(&self) -> Result<Vec<Appointment>>;

    /// All services, including soft-deleted ones
    async fn list_services(&self) -> Result<Vec<Service>>;

    /// Open the single transaction a renumbering run executes in.
    /// Dropping it without `commit` discards every change.
    async fn begin_renumbering(&self) -> Result<Box<dyn RenumberingTransaction>>;
}

/// Unit of work for one renumbering run
#[async_trait]
pub trait RenumberingTransaction: Send {
    /// Bulk-rewrite every row to its `temp-{id}` placeholder
    async fn quarantine_all(&mut self) -> Result<u64>;

    async fn services(&mut self) -> Result<Vec<Service>>;

    /// Initial visits ordered by `created_at`, then id
    async fn initial_visits(&mut self) -> Result<Vec<Appointment>>;

    /// Persist `number` on one initial visit inside a nested savepoint.
    /// A uniqueness conflict is reported as [`AssignOutcome::Conflict`] and
    /// leaves earlier assignments in the run intact.
    async fn assign_registration_number(
        &mut self,
        appointment_id: Uuid,
        number: &str,
    ) -> Result<AssignOutcome>;

    /// Initial visits with at least one follow-up
    async fn series_heads(&mut self) -> Result<Vec<SeriesHead>>;

    /// Set-based update of the follow-ups of `head_id` whose number differs
    async fn propagate_to_series(&mut self, head_id: Uuid, number: &str) -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    appointments: BTreeMap<Uuid, Appointment>,
    services: Vec<Service>,
    /// Numbers held by rows the batch cannot see
    reserved_numbers: HashSet<String>,
}

impl StoreState {
    fn ordered_appointments(&self) -> Vec<Appointment> {
        let mut appointments: Vec<Appointment> = self.appointments.values().cloned().collect();
        appointments.sort_by_key(Appointment::ordering_key);
        appointments
    }
}

/// In-memory appointment repository for testing and dry runs.
///
/// A renumbering transaction holds the store's write lock and works on a
/// private copy that replaces the shared state on commit.
pub struct InMemoryAppointmentRepository {
    state: Arc<RwLock<StoreState>>,
    fail_series_propagation: Arc<AtomicBool>,
}

impl InMemoryAppointmentRepository {
    pub fn new() -> Self {
        Self::with_data(Vec::new(), Vec::new())
    }

    pub fn with_data(services: Vec<Service>, appointments: Vec<Appointment>) -> Self {
        let state = StoreState {
            appointments: appointments.into_iter().map(|a| (a.id, a)).collect(),
            services,
            reserved_numbers: HashSet::new(),
        };

        Self {
            state: Arc::new(RwLock::new(state)),
            fail_series_propagation: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn get_appointment(&self, id: Uuid) -> Option<Appointment> {
        self.state.read().await.appointments.get(&id).cloned()
    }

    /// Mark a number as taken by a row outside the renumbering batch
    pub async fn reserve_registration_number(&self, number: impl Into<String>) {
        self.state.write().await.reserved_numbers.insert(number.into());
    }

    /// Reads fail fast while a renumbering transaction holds the store
    fn snapshot(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.state
            .try_read()
            .map_err(|_| NumberingError::AlreadyRunning)
    }

    /// Make every later series propagation fail, for rollback tests
    pub fn inject_propagation_fault(&self) {
        self.fail_series_propagation.store(true, Ordering::SeqCst);
    }
}

impl Default for InMemoryAppointmentRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn list_appointments(&self) -> Result<Vec<Appointment>> {
        Ok(self.snapshot()?.ordered_appointments())
    }

    async fn list_services(&self) -> Result<Vec<Service>> {
        Ok(self.snapshot()?.services.clone())
    }

    async fn begin_renumbering(&self) -> Result<Box<dyn RenumberingTransaction>> {
        let guard = Arc::clone(&self.state)
            .try_write_owned()
            .map_err(|_| NumberingError::AlreadyRunning)?;
        let working = (*guard).clone();

        Ok(Box::new(InMemoryRenumberingTransaction {
            guard,
            working,
            fail_series_propagation: Arc::clone(&self.fail_series_propagation),
        }))
    }
}

struct InMemoryRenumberingTransaction {
    guard: OwnedRwLockWriteGuard<StoreState>,
    working: StoreState,
    fail_series_propagation: Arc<AtomicBool>,
}

impl InMemoryRenumberingTransaction {
    fn number_taken(&self, appointment_id: Uuid, number: &str) -> bool {
        self.working.reserved_numbers.contains(number)
            || self.working.appointments.values().any(|other| {
                other.id != appointment_id
                    && other.is_initial_visit()
                    && other.registration_number.as_deref() == Some(number)
            })
    }
}

#[async_trait]
impl RenumberingTransaction for InMemoryRenumberingTransaction {
    async fn quarantine_all(&mut self) -> Result<u64> {
        let mut rewritten = 0;
        for appointment in self.working.appointments.values_mut() {
            appointment.registration_number = Some(RegistrationNumber::placeholder(appointment.id));
            rewritten += 1;
        }
        Ok(rewritten)
    }

    async fn services(&mut self) -> Result<Vec<Service>> {
        Ok(self.working.services.clone())
    }

    async fn initial_visits(&mut self) -> Result<Vec<Appointment>> {
        Ok(self
            .working
            .ordered_appointments()
            .into_iter()
            .filter(Appointment::is_initial_visit)
            .collect())
    }

    async fn assign_registration_number(
        &mut self,
        appointment_id: Uuid,
        number: &str,
    ) -> Result<AssignOutcome> {
        if self.number_taken(appointment_id, number) {
            debug!(%appointment_id, number, "Registration number already taken");
            return Ok(AssignOutcome::Conflict);
        }

        let appointment = self
            .working
            .appointments
            .get_mut(&appointment_id)
            .ok_or_else(|| {
                NumberingError::StorageError(format!("Appointment {appointment_id} not found"))
            })?;
        appointment.registration_number = Some(number.to_string());

        Ok(AssignOutcome::Assigned)
    }

    async fn series_heads(&mut self) -> Result<Vec<SeriesHead>> {
        let parents: HashSet<Uuid> = self
            .working
            .appointments
            .values()
            .filter_map(|a| a.series_parent_id)
            .collect();

        Ok(self
            .working
            .ordered_appointments()
            .into_iter()
            .filter(|a| a.is_initial_visit() && parents.contains(&a.id))
            .map(|a| SeriesHead {
                id: a.id,
                registration_number: a.registration_number,
            })
            .collect())
    }

    async fn propagate_to_series(&mut self, head_id: Uuid, number: &str) -> Result<u64> {
        if self.fail_series_propagation.load(Ordering::SeqCst) {
            return Err(NumberingError::StorageError(format!(
                "Injected fault while propagating series {head_id}"
            )));
        }

        let mut updated = 0;
        for follow_up in self
            .working
            .appointments
            .values_mut()
            .filter(|a| a.series_parent_id == Some(head_id))
        {
            if follow_up.registration_number.as_deref() != Some(number) {
                follow_up.registration_number = Some(number.to_string());
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
