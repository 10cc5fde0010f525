pub mod host_api;

pub use host_api::{launch, spawn_frame_driver, Launched, OrchestratorHandle};
