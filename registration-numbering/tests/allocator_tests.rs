// Allocator behaviour against the in-memory repository
use chrono::{DateTime, Duration, TimeZone, Utc};
use registration_numbering::*;
use std::sync::Arc;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn allocator_for(repository: &Arc<InMemoryAppointmentRepository>) -> RegistrationNumberAllocator {
    RegistrationNumberAllocator::new(repository.clone())
}

async fn number_of(repository: &InMemoryAppointmentRepository, appointment: &Appointment) -> Option<String> {
    repository
        .get_appointment(appointment.id)
        .await
        .and_then(|a| a.registration_number)
}

struct Scenario {
    repository: Arc<InMemoryAppointmentRepository>,
    a: Appointment,
    b: Appointment,
    c: Appointment,
    d: Appointment,
    e: Appointment,
}

/// Three FH initial visits A, B, C, follow-up D of A, one W initial visit E
fn example_scenario() -> Scenario {
    let physio = Service::new("Fisioterapi Home", "FH");
    let wound = Service::new("Wound Care", "w");

    let a = Appointment::initial_visit(Some(physio.id), at(0)).with_registration_number("FH-000042");
    let b = Appointment::initial_visit(Some(physio.id), at(10));
    let c = Appointment::initial_visit(Some(physio.id), at(20)).with_registration_number("FH-000001");
    let d = Appointment::follow_up(&a, at(30)).with_registration_number("OLD-1");
    let e = Appointment::initial_visit(Some(wound.id), at(5));

    let repository = Arc::new(InMemoryAppointmentRepository::with_data(
        vec![physio, wound],
        vec![e.clone(), c.clone(), a.clone(), d.clone(), b.clone()],
    ));

    Scenario { repository, a, b, c, d, e }
}

// =============================================================================
// EXECUTE
// =============================================================================

#[tokio::test]
async fn test_example_scenario_numbers() {
    let s = example_scenario();

    let result = allocator_for(&s.repository).execute(true).await.unwrap();

    assert_eq!(number_of(&s.repository, &s.a).await.as_deref(), Some("FH-000001"));
    assert_eq!(number_of(&s.repository, &s.b).await.as_deref(), Some("FH-000002"));
    assert_eq!(number_of(&s.repository, &s.c).await.as_deref(), Some("FH-000003"));
    assert_eq!(number_of(&s.repository, &s.d).await.as_deref(), Some("FH-000001"));
    assert_eq!(number_of(&s.repository, &s.e).await.as_deref(), Some("W-000001"));

    assert_eq!(result.quarantined, 5);
    assert_eq!(result.processed_initial_visits, 4);
    assert_eq!(result.skipped_initial_visits, 0);
    assert_eq!(result.updated_follow_ups, 1);
    assert_eq!(result.conflicts_resolved, 0);
    assert_eq!(result.assigned_by_service.get("FH"), Some(&3));
    assert_eq!(result.assigned_by_service.get("W"), Some(&1));
}

#[tokio::test]
async fn test_ties_on_created_at_are_broken_by_id() {
    let physio = Service::new("Fisioterapi Home", "FH");
    let mut first = Appointment::initial_visit(Some(physio.id), at(0));
    let mut second = Appointment::initial_visit(Some(physio.id), at(0));
    if second.id < first.id {
        std::mem::swap(&mut first, &mut second);
    }
    let repository = Arc::new(InMemoryAppointmentRepository::with_data(
        vec![physio],
        vec![second.clone(), first.clone()],
    ));

    allocator_for(&repository).execute(true).await.unwrap();

    assert_eq!(number_of(&repository, &first).await.as_deref(), Some("FH-000001"));
    assert_eq!(number_of(&repository, &second).await.as_deref(), Some("FH-000002"));
}

#[tokio::test]
async fn test_confirmation_gate_leaves_data_untouched() {
    let s = example_scenario();
    let before = s.repository.list_appointments().await.unwrap();

    let err = allocator_for(&s.repository).execute(false).await.unwrap_err();

    assert!(matches!(err, NumberingError::ConfirmationRequired));
    assert!(!err.is_fatal());
    assert_eq!(s.repository.list_appointments().await.unwrap(), before);
}

#[tokio::test]
async fn test_unresolvable_service_is_skipped_without_consuming_a_number() {
    let physio = Service::new("Fisioterapi Home", "FH");
    let mut retired = Service::new("Retired", "RT");
    retired.deleted_at = Some(at(0));

    let first = Appointment::initial_visit(Some(physio.id), at(0));
    let orphan = Appointment::initial_visit(None, at(1));
    let retired_visit = Appointment::initial_visit(Some(retired.id), at(2));
    let orphan_follow_up = Appointment::follow_up(&orphan, at(3));
    let second = Appointment::initial_visit(Some(physio.id), at(4));

    let repository = Arc::new(InMemoryAppointmentRepository::with_data(
        vec![physio, retired],
        vec![
            first.clone(),
            orphan.clone(),
            retired_visit.clone(),
            orphan_follow_up.clone(),
            second.clone(),
        ],
    ));

    let result = allocator_for(&repository).execute(true).await.unwrap();

    assert_eq!(number_of(&repository, &first).await.as_deref(), Some("FH-000001"));
    assert_eq!(number_of(&repository, &second).await.as_deref(), Some("FH-000002"));
    assert_eq!(result.processed_initial_visits, 2);
    assert_eq!(result.skipped_initial_visits, 2);
    assert!(result
        .skipped
        .iter()
        .all(|s| s.reason == SkipReason::UnresolvableService));
    assert_eq!(result.skipped_series, 1);
    assert_eq!(result.updated_follow_ups, 0);

    // Skipped rows keep their quarantine placeholder, never a real number
    let orphan_number = number_of(&repository, &orphan).await.unwrap();
    assert!(RegistrationNumber::is_placeholder(&orphan_number));
    let follow_up_number = number_of(&repository, &orphan_follow_up).await.unwrap();
    assert!(RegistrationNumber::is_placeholder(&follow_up_number));
}

#[tokio::test]
async fn test_conflict_moves_to_next_sequence() {
    let s = example_scenario();
    s.repository.reserve_registration_number("FH-000002").await;

    let result = allocator_for(&s.repository).execute(true).await.unwrap();

    assert_eq!(number_of(&s.repository, &s.a).await.as_deref(), Some("FH-000001"));
    assert_eq!(number_of(&s.repository, &s.b).await.as_deref(), Some("FH-000003"));
    assert_eq!(number_of(&s.repository, &s.c).await.as_deref(), Some("FH-000004"));
    assert_eq!(result.conflicts_resolved, 1);
    assert_eq!(result.assigned_by_service.get("FH"), Some(&4));
}

#[tokio::test]
async fn test_retry_budget_exceeded_rolls_back_everything() {
    let s = example_scenario();
    for sequence in 2..=4 {
        s.repository
            .reserve_registration_number(RegistrationNumber::new("FH", sequence).to_string())
            .await;
    }
    let before = s.repository.list_appointments().await.unwrap();

    let allocator = allocator_for(&s.repository).with_config(AllocatorConfig::with_max_attempts(3).unwrap());
    let err = allocator.execute(true).await.unwrap_err();

    assert!(
        matches!(
            &err,
            NumberingError::RetryBudgetExceeded {
                appointment_id,
                service_code,
                attempts: 3,
                last_candidate,
            } if *appointment_id == s.b.id && service_code == "FH" && last_candidate == "FH-000004"
        ),
        "unexpected error: {err}"
    );
    assert_eq!(s.repository.list_appointments().await.unwrap(), before);
}

#[tokio::test]
async fn test_default_budget_tolerates_nine_conflicts() {
    let s = example_scenario();
    for sequence in 2..=10 {
        s.repository
            .reserve_registration_number(RegistrationNumber::new("FH", sequence).to_string())
            .await;
    }

    let result = allocator_for(&s.repository).execute(true).await.unwrap();

    assert_eq!(number_of(&s.repository, &s.b).await.as_deref(), Some("FH-000011"));
    assert_eq!(result.conflicts_resolved, 9);
}

#[tokio::test]
async fn test_fault_after_assignment_restores_original_data() {
    let s = example_scenario();
    let before = s.repository.list_appointments().await.unwrap();
    s.repository.inject_propagation_fault();

    let err = allocator_for(&s.repository).execute(true).await.unwrap_err();

    assert!(matches!(err, NumberingError::StorageError(_)));
    assert!(err.is_fatal());
    assert_eq!(s.repository.list_appointments().await.unwrap(), before);
}

#[tokio::test]
async fn test_execute_twice_keeps_invariants() {
    let s = example_scenario();
    let allocator = allocator_for(&s.repository);

    let first = allocator.execute(true).await.unwrap();
    let after_first = s.repository.list_appointments().await.unwrap();
    let second = allocator.execute(true).await.unwrap();
    let after_second = s.repository.list_appointments().await.unwrap();

    assert!(allocator.verify().await.unwrap().is_consistent());
    assert_eq!(first.processed_initial_visits, second.processed_initial_visits);
    // Quarantine also resets follow-ups, so they are propagated again
    assert_eq!(second.updated_follow_ups, 1);
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn test_empty_repository() {
    let repository = Arc::new(InMemoryAppointmentRepository::new());

    let result = allocator_for(&repository).execute(true).await.unwrap();

    assert_eq!(result, ExecutionResult::default());
}

// =============================================================================
// PLAN AND VERIFY
// =============================================================================

#[tokio::test]
async fn test_plan_is_read_only_and_deterministic() {
    let s = example_scenario();
    let before = s.repository.list_appointments().await.unwrap();
    let allocator = allocator_for(&s.repository);

    let first = allocator.plan().await.unwrap();
    let second = allocator.plan().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(s.repository.list_appointments().await.unwrap(), before);
    assert_eq!(first.initial_visits, 4);
    assert_eq!(first.follow_up_visits, 1);
    assert_eq!(first.initial_visits_by_service.get("FH"), Some(&3));
    assert_eq!(first.initial_visits_by_service.get("W"), Some(&1));
}

#[tokio::test]
async fn test_verify_before_and_after_execute() {
    let s = example_scenario();
    let allocator = allocator_for(&s.repository);

    let before = allocator.verify().await.unwrap();
    assert!(!before.is_consistent());
    assert_eq!(before.unnumbered_initial_visits, vec![s.e.id, s.b.id]);
    assert_eq!(before.series_mismatches, vec![s.d.id]);

    allocator.execute(true).await.unwrap();

    let after = allocator.verify().await.unwrap();
    assert!(after.is_consistent(), "{after:?}");
    assert_eq!(after.checked_appointments, 5);
}

#[tokio::test]
async fn test_execute_refuses_concurrent_run() {
    let s = example_scenario();

    let open = s.repository.begin_renumbering().await.unwrap();
    let err = allocator_for(&s.repository).execute(true).await.unwrap_err();
    assert!(matches!(err, NumberingError::AlreadyRunning));
    open.rollback().await.unwrap();

    assert!(allocator_for(&s.repository).execute(true).await.is_ok());
}

#[tokio::test]
async fn test_codes_that_cannot_round_trip_are_skipped_and_verify_stays_clean() {
    let physio = Service::new("Fisioterapi Home", "FH");
    let awkward = [
        Service::new("Dashed", "FH-2"),
        Service::new("Spaced", "Home Care"),
        Service::new("Umlaut", "Ü"),
    ];

    let numbered = Appointment::initial_visit(Some(physio.id), at(0));
    let skipped: Vec<Appointment> = awkward
        .iter()
        .zip(1..)
        .map(|(service, minute)| Appointment::initial_visit(Some(service.id), at(minute)))
        .collect();

    let mut services = vec![physio];
    services.extend(awkward);
    let mut appointments = vec![numbered.clone()];
    appointments.extend(skipped.iter().cloned());
    let repository = Arc::new(InMemoryAppointmentRepository::with_data(services, appointments));
    let allocator = allocator_for(&repository);

    let result = allocator.execute(true).await.unwrap();

    assert_eq!(result.processed_initial_visits, 1);
    assert_eq!(result.skipped_initial_visits, 3);
    assert_eq!(number_of(&repository, &numbered).await.as_deref(), Some("FH-000001"));
    for appointment in &skipped {
        let number = number_of(&repository, appointment).await.unwrap();
        assert!(RegistrationNumber::is_placeholder(&number), "{number}");
    }

    // Nothing the run wrote is reported as malformed
    let report = allocator.verify().await.unwrap();
    assert!(report.malformed_numbers.is_empty(), "{report:?}");
    assert_eq!(report.unnumbered_initial_visits.len(), 3);
}

#[tokio::test]
async fn test_plan_fails_fast_while_a_run_is_open() {
    let s = example_scenario();

    let open = s.repository.begin_renumbering().await.unwrap();
    let plan = tokio::time::timeout(std::time::Duration::from_millis(500), allocator_for(&s.repository).plan())
        .await
        .unwrap();
    assert!(matches!(plan, Err(NumberingError::AlreadyRunning)));
    open.rollback().await.unwrap();

    assert_eq!(allocator_for(&s.repository).plan().await.unwrap().initial_visits, 4);
}
