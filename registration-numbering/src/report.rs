use crate::models::{Appointment, SkippedAppointment};
use crate::number::RegistrationNumber;
use crate::service::ServiceResolver;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Bucket for initial visits whose service cannot be resolved
pub const UNKNOWN_SERVICE: &str = "UNKNOWN";

/// Dry-run analysis of a dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_appointments: usize,
    pub initial_visits: usize,
    pub follow_up_visits: usize,
    pub initial_visits_by_service: BTreeMap<String, usize>,
    /// Follow-ups whose parent is missing or is itself a follow-up
    pub orphaned_follow_ups: usize,
}

/// Outcome of a committed renumbering run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub quarantined: u64,
    pub processed_initial_visits: usize,
    pub skipped_initial_visits: usize,
    pub skipped: Vec<SkippedAppointment>,
    pub conflicts_resolved: usize,
    /// Highest sequence handed out per service code
    pub assigned_by_service: BTreeMap<String, u32>,
    pub updated_follow_ups: u64,
    pub skipped_series: usize,
}

/// Invariant check over a dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub checked_appointments: usize,
    /// Numbers held by more than one initial visit
    pub duplicate_numbers: Vec<String>,
    /// Initial visits with no number or only a quarantine placeholder
    pub unnumbered_initial_visits: Vec<Uuid>,
    pub malformed_numbers: Vec<Uuid>,
    /// Follow-ups whose number differs from their initial visit's
    pub series_mismatches: Vec<Uuid>,
}

impl VerificationReport {
    pub fn is_consistent(&self) -> bool {
        self.duplicate_numbers.is_empty()
            && self.unnumbered_initial_visits.is_empty()
            && self.malformed_numbers.is_empty()
            && self.series_mismatches.is_empty()
    }
}

/// Summarise what a renumbering run would touch. Never mutates.
pub fn plan(appointments: &[Appointment], resolver: &dyn ServiceResolver) -> ReportSummary {
    let by_id: HashMap<Uuid, &Appointment> = appointments.iter().map(|a| (a.id, a)).collect();
    let mut summary = ReportSummary {
        total_appointments: appointments.len(),
        ..ReportSummary::default()
    };

    for appointment in appointments {
        match appointment.series_parent_id {
            None => {
                summary.initial_visits += 1;
                let code = resolver
                    .service_code(appointment)
                    .unwrap_or_else(|| UNKNOWN_SERVICE.to_string());
                *summary.initial_visits_by_service.entry(code).or_insert(0) += 1;
            }
            Some(parent_id) => {
                summary.follow_up_visits += 1;
                let parent_is_initial = by_id
                    .get(&parent_id)
                    .is_some_and(|parent| parent.is_initial_visit());
                if !parent_is_initial {
                    summary.orphaned_follow_ups += 1;
                }
            }
        }
    }

    summary
}

/// Check uniqueness, format and series consistency. Never mutates.
pub fn verify(appointments: &[Appointment]) -> VerificationReport {
    let by_id: HashMap<Uuid, &Appointment> = appointments.iter().map(|a| (a.id, a)).collect();
    let mut holders: BTreeMap<&str, usize> = BTreeMap::new();
    let mut report = VerificationReport {
        checked_appointments: appointments.len(),
        ..VerificationReport::default()
    };

    for appointment in appointments {
        let number = appointment.registration_number.as_deref();

        if appointment.is_initial_visit() {
            match number {
                None => report.unnumbered_initial_visits.push(appointment.id),
                Some(value) if RegistrationNumber::is_placeholder(value) => {
                    report.unnumbered_initial_visits.push(appointment.id);
                }
                Some(value) => {
                    if value.parse::<RegistrationNumber>().is_err() {
                        report.malformed_numbers.push(appointment.id);
                    }
                    *holders.entry(value).or_insert(0) += 1;
                }
            }
            continue;
        }

        let expected = appointment
            .series_parent_id
            .and_then(|parent_id| by_id.get(&parent_id))
            .and_then(|parent| parent.registration_number.as_deref());
        if expected.is_none() || number != expected {
            report.series_mismatches.push(appointment.id);
        }
    }

    report.duplicate_numbers = holders
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(number, _)| number.to_string())
        .collect();

    report
}
