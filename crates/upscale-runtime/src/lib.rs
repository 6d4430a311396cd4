//! Upscaler feature lifecycle.
//!
//! A [`Runtime`] per graphics API turns the host's create / evaluate /
//! release calls into backend construction, dispatch and teardown:
//!
//! - [`provider`] picks a backend for a name and falls back when it cannot
//!   be used.
//! - [`registry`] owns one [`ContextRecord`] per core handle.
//! - [`switch`] replaces a context's backend over three evaluate calls.
//! - [`exports`] is the C surface a host loads.

pub mod exports;
pub mod provider;
pub mod registry;
pub mod runtime;
pub mod switch;

pub use provider::{fallback_for, FeatureProvider};
pub use registry::{ContextRecord, ContextRegistry, RegistryError};
pub use runtime::{PassthroughOwner, Runtime};
pub use switch::{DefaultFallbackPolicy, FallbackPolicy, SwitchOutcome, SwitchPhase};
