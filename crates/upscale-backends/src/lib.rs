//! Upscaler backends behind one capability interface.
//!
//! This crate defines the [`UpscaleFeature`] trait and the adapters that
//! translate the host's generic parameter table into each vendor's dispatch
//! contract. Vendor SDKs are reached through the [`native`] seam; the
//! [`Upscaler`] enum closes the set of adapters a context can hold.

pub mod barrier;
pub mod dlss;
pub mod feature;
pub mod ffx;
pub mod native;
pub mod root_signature;
pub mod upscaler;
pub mod xess;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Platform-specific command recording.

#[cfg(target_os = "windows")]
pub mod dx12;

pub use barrier::{BarrierRecorder, OverrideBarriers, ResourceState};
pub use feature::{FeatureCommon, FeatureError, FeatureFlags, UpscaleFeature};
pub use native::{ModuleLoader, NativeRuntime, NoModules};
pub use root_signature::{RootSignatureCache, RootSignatureSink};
pub use upscaler::Upscaler;

/// Everything the runtime records on a host command list besides the
/// backend's own dispatch.
pub trait CommandRecorder: BarrierRecorder + RootSignatureSink {}

impl<T: BarrierRecorder + RootSignatureSink> CommandRecorder for T {}
