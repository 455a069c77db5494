use crate::models::{Appointment, Service};
use crate::number::normalize_service_code;
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

/// Resolves the service code an appointment is numbered under
pub trait ServiceResolver: Send + Sync {
    /// `None` when the appointment has no usable service
    fn service_code(&self, appointment: &Appointment) -> Option<String>;
}

/// Lookup table of active services keyed by id.
///
/// Codes are normalised once here. Services whose code cannot form a valid
/// registration number are left out, so their appointments are unresolvable.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    codes: HashMap<Uuid, String>,
}

impl ServiceCatalog {
    pub fn new(services: impl IntoIterator<Item = Service>) -> Self {
        let codes = services
            .into_iter()
            .filter(Service::is_active)
            .filter_map(|service| match normalize_service_code(&service.code) {
                Some(code) => Some((service.id, code)),
                None => {
                    warn!(
                        service_id = %service.id,
                        code = %service.code,
                        "Service code cannot be used in registration numbers"
                    );
                    None
                }
            })
            .collect();

        Self { codes }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl ServiceResolver for ServiceCatalog {
    fn service_code(&self, appointment: &Appointment) -> Option<String> {
        appointment
            .service_id
            .and_then(|id| self.codes.get(&id))
            .cloned()
    }
}
