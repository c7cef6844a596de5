use windows_service::service::ServiceControlAccept;

use crate::registry::ControlAccept;

pub mod dispatcher;
pub mod scm;

// Interrogate is always accepted by the service manager and has no flag of its own.
fn accepts_to_os(accepts: ControlAccept) -> ServiceControlAccept {
    let mut os = ServiceControlAccept::empty();
    if accepts.contains(ControlAccept::STOP) {
        os |= ServiceControlAccept::STOP;
    }
    if accepts.contains(ControlAccept::SHUTDOWN) {
        os |= ServiceControlAccept::SHUTDOWN;
    }
    os
}

fn accepts_from_os(os: ServiceControlAccept) -> ControlAccept {
    let mut accepts = ControlAccept::INTERROGATE;
    if os.contains(ServiceControlAccept::STOP) {
        accepts |= ControlAccept::STOP;
    }
    if os.contains(ServiceControlAccept::SHUTDOWN) {
        accepts |= ControlAccept::SHUTDOWN;
    }
    accepts
}
