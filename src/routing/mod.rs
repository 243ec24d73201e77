//! Message-intent routing: category registry, router and lookup launcher.

pub mod launcher;
pub mod registry;
pub mod router;

pub use launcher::{LaunchHandle, LaunchOutcome, Launcher, ProcessLauncher};
pub use registry::{CategoryRegistry, CategoryRule, LaunchTarget};
pub use router::{IntentRouter, RoutingResult, general_response};
