pub mod arbiter;
pub mod commands;
pub mod config;
pub mod deadline;
pub mod error;
pub mod identity;
pub mod logger;
pub mod orchestrator;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod termination;
pub mod utils;
pub mod view;
pub mod vision;

pub use commands::{launch, spawn_frame_driver, Launched, OrchestratorHandle};
pub use config::{Config, Timings};
pub use error::{Error, Result};
pub use identity::ParticipantId;
pub use orchestrator::{Event, EventSender, Orchestrator};
pub use session::{Session, SessionSnapshot, SessionState};
pub use termination::{Actor, Termination, TerminationReason};
pub use view::{Cue, Instruction, ViewEvent, ViewModel};
pub use vision::{BlinkScores, BoundingBox, CropRect, FrameInfo, Party, VisionProvider};
