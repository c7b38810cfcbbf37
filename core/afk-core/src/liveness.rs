//! Reachability guard: is the messaging client running on this host?

use sysinfo::System;

pub trait ClientLiveness: Send + Sync {
    fn is_reachable(&self, client_app: Option<&str>) -> bool;
}

/// Looks for a running process whose name matches the configured client app.
/// No configured app means the guard always passes.
#[derive(Debug, Default)]
pub struct ProcessLiveness;

impl ClientLiveness for ProcessLiveness {
    fn is_reachable(&self, client_app: Option<&str>) -> bool {
        let Some(app) = client_app.map(str::trim).filter(|app| !app.is_empty()) else {
            return true;
        };

        let mut sys = System::new();
        sys.refresh_processes();
        let found = sys
            .processes()
            .values()
            .any(|process| process_name_matches(process.name(), app));
        tracing::debug!(app, found, "Client liveness check");
        found
    }
}

fn process_name_matches(process_name: &str, app: &str) -> bool {
    process_name.eq_ignore_ascii_case(app)
        || process_name
            .strip_suffix(".app")
            .is_some_and(|stem| stem.eq_ignore_ascii_case(app))
}
