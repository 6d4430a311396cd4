//! Host-protocol types shared by every upscaler crate.
//!
//! - [`ffi`] holds the result codes, feature ids and handle ranges the host
//!   sees.
//! - [`parameters`] is the generic key/value table every backend reads.
//! - [`config`] and [`state`] are the policy and session state passed into
//!   each entry point.
//! - [`inputs`] resolves the per-frame values backends translate.

pub mod backend;
pub mod config;
pub mod ffi;
pub mod handle;
pub mod inputs;
pub mod logging;
pub mod parameters;
pub mod state;

pub use backend::{ApiFlavor, BackendDescriptor, BackendKind, FeatureVersion, GraphicsApi};
pub use config::{Config, Setting};
pub use ffi::{FeatureId, NgxResult, PerfQuality};
pub use handle::{FeatureHandle, HandleOrigin, NativeHandle};
pub use inputs::{FrameClock, FrameContext, FrameInputs};
pub use parameters::{keys, ParameterError, ParameterTable};
pub use state::SessionState;
