//! Prism video output crate.
//!
//! This crate owns the GPU presentation stage of a media player: it uploads
//! decoded frames and subtitle regions, places them on the display surface and
//! hands them to a rendering backend together with the configured color
//! management parameters.

pub mod backend;
pub mod config;
pub mod coords;
pub mod display;
pub mod error;
pub mod format;
pub mod logging;
pub mod params;

mod compositor;
mod control;
mod resources;
mod session;
mod textures;

pub use compositor::{FrameOutcome, FrameReport, FrameStage};
pub use control::ControlRequest;
pub use display::{Display, DisplayConfig};
pub use error::{BackendError, VoutError, VoutResult};
pub use resources::{LoadOutcome, ResourceKind};
