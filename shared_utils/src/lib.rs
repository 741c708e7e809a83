//! Ambient utilities shared by the media-conversion workspace.
//!
//! This crate carries the cross-cutting concerns that the core pipeline crate
//! (`media_pipeline`) and its CLI binary both depend on but that aren't part of the
//! pipeline's own logic: structured logging setup, subprocess plumbing shared between
//! process-spawning components, numeric type-safety wrappers, and small platform
//! utilities (thread sizing, memory pressure, path-safety for CLI args).

pub mod crf_constants;
pub mod float_compare;
pub mod logging;
pub mod path_safety;
pub use path_safety::safe_path_arg;
pub mod system_memory;
pub mod thread_manager;
pub mod types;
