//! Supervisor (C12): owns the declared list of background services and
//! starts/stops them in order.
//!
//! Grounded directly in `utils/supervisor.py`'s `start_services`/
//! `stop_services` free functions, which iterate a list forward on start
//! (skipping disabled entries, logging per-service outcome, continuing past
//! individual failures) and in reverse on stop. This crate folds the two
//! functions and the list into one `Supervisor` type with `start_all`/
//! `stop_all` methods — same semantics, idiomatic ownership instead of
//! free functions over a bare list.

use tracing::{error, info, warn};

/// One managed background service. `start` runs once, consuming itself;
/// `stop`, if present, runs once on shutdown. Most services here actually
/// stop via their own `CancellationToken` rather than this `stop` hook, so
/// it is typically left unset.
pub struct Service {
    pub name: &'static str,
    pub enabled: bool,
    start: Option<Box<dyn FnOnce() + Send>>,
    stop: Option<Box<dyn FnOnce() + Send>>,
}

impl Service {
    pub fn new(name: &'static str, enabled: bool, start: impl FnOnce() + Send + 'static) -> Self {
        Self { name, enabled, start: Some(Box::new(start)), stop: None }
    }

    pub fn with_stop(mut self, stop: impl FnOnce() + Send + 'static) -> Self {
        self.stop = Some(Box::new(stop));
        self
    }
}

#[derive(Default)]
pub struct Supervisor {
    services: Vec<Service>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, service: Service) {
        self.services.push(service);
    }

    /// Runs every enabled service's `start` in registration order. Each
    /// `start` is expected to be non-blocking (spawn its own task, return
    /// immediately); a panic during start is caught, logged, and does not
    /// stop later services from starting.
    pub fn start_all(&mut self) {
        for service in &mut self.services {
            if !service.enabled {
                info!(service = service.name, "service disabled, skipping start");
                continue;
            }
            let Some(start) = service.start.take() else {
                warn!(service = service.name, "service already started, skipping");
                continue;
            };
            let name = service.name;
            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(start)) {
                Ok(()) => info!(service = name, "service started"),
                Err(_) => error!(service = name, "service panicked during start"),
            }
        }
    }

    /// Runs every enabled service's `stop` (if any) in reverse registration
    /// order. Individual failures are logged and do not abort the rest.
    pub fn stop_all(&mut self) {
        for service in self.services.iter_mut().rev() {
            if !service.enabled {
                continue;
            }
            let Some(stop) = service.stop.take() else {
                continue;
            };
            let name = service.name;
            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(stop)) {
                Ok(()) => info!(service = name, "service stopped"),
                Err(_) => warn!(service = name, "service panicked during stop"),
            }
        }
    }
}
