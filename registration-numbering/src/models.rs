use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Appointment row as seen by the renumbering job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub service_id: Option<Uuid>,
    pub registration_number: Option<String>,
    /// Set on follow-up visits only, points at the initial visit of the series
    pub series_parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn initial_visit(service_id: Option<Uuid>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_id,
            registration_number: None,
            series_parent_id: None,
            created_at,
        }
    }

    pub fn follow_up(parent: &Appointment, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_id: parent.service_id,
            registration_number: None,
            series_parent_id: Some(parent.id),
            created_at,
        }
    }

    pub fn with_registration_number(mut self, number: impl Into<String>) -> Self {
        self.registration_number = Some(number.into());
        self
    }

    pub fn is_initial_visit(&self) -> bool {
        self.series_parent_id.is_none()
    }

    /// Ordering key for initial visits: `created_at`, then id
    pub fn ordering_key(&self) -> (DateTime<Utc>, Uuid) {
        (self.created_at, self.id)
    }
}

/// Bookable home service (physiotherapy, wound care, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    /// Short code used as registration number prefix, e.g. `FH`
    pub code: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Service {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            code: code.into(),
            deleted_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Initial visit that anchors at least one follow-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SeriesHead {
    pub id: Uuid,
    pub registration_number: Option<String>,
}

/// Result of one savepointed assignment attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOutcome {
    Assigned,
    /// The candidate is already held by another initial visit
    Conflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    UnresolvableService,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnresolvableService => write!(f, "unresolvable service"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedAppointment {
    pub appointment_id: Uuid,
    pub reason: SkipReason,
}
