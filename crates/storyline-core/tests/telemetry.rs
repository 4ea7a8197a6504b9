//! Global subscriber installation. Lives in its own test binary because it
//! claims the process-wide default.

use storyline_core::init_tracing;

#[test]
fn init_tracing_only_installs_once() {
    assert!(init_tracing(false, tracing::Level::INFO));
    assert!(!init_tracing(true, tracing::Level::DEBUG));
    tracing::info!(event = "telemetry.ready", "subscriber installed");
}
