//! Seam between the adapters and the vendor SDK runtimes.
//!
//! Each vendor family exposes its own create/dispatch contract. Adapters
//! describe a frame in that vendor's terms ([`FfxDispatchDesc`],
//! [`XessExecuteDesc`], [`NgxEvaluateDesc`]) and hand it to a
//! [`NativeRuntime`] resolved by a [`ModuleLoader`]. Hosts plug in loaders
//! backed by the real modules; tests plug in fakes.

use std::path::Path;

use anyhow::Result;

use upscale_core::{
    ApiFlavor, FeatureVersion, GraphicsApi, NativeHandle, ParameterTable, PerfQuality,
};

use crate::feature::{FeatureError, FeatureFlags};

/// One vendor runtime context.
pub trait NativeRuntime<D>: Send {
    /// Version reported by the loaded module.
    fn version(&self) -> FeatureVersion;

    /// Create the native context.
    fn create(&mut self, device: NativeHandle, desc: &CreateDesc<'_>) -> Result<()>;

    /// Record one frame's work on `command_list`.
    fn dispatch(&mut self, command_list: NativeHandle, desc: &D) -> Result<(), FeatureError>;

    /// Release the native context. Called at most once, never during process
    /// shutdown.
    fn destroy(&mut self);
}

/// Everything a vendor needs to size its context.
#[derive(Debug, Clone, Copy)]
pub struct CreateDesc<'a> {
    pub command_list: NativeHandle,
    pub max_render_size: (u32, u32),
    pub display_size: (u32, u32),
    pub flags: FeatureFlags,
    pub perf_quality: PerfQuality,
    /// The host table the feature is created from; passthrough backends
    /// forward it untouched.
    pub host_params: &'a ParameterTable,
}

/// FidelityFX generation an [`FfxModule`] implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfxGeneration {
    Fsr212,
    Fsr22,
    Fsr31,
}

impl FfxGeneration {
    /// Version assumed when a module does not report one.
    pub fn baseline_version(self) -> FeatureVersion {
        match self {
            FfxGeneration::Fsr212 => FeatureVersion::new(2, 1, 2),
            FfxGeneration::Fsr22 => FeatureVersion::new(2, 2, 1),
            FfxGeneration::Fsr31 => FeatureVersion::new(3, 1, 0),
        }
    }
}

/// NGX feature a passthrough module wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NgxFeature {
    SuperSampling,
    RayReconstruction,
}

/// Per-frame FidelityFX upscale dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FfxDispatchDesc {
    pub color: NativeHandle,
    pub depth: NativeHandle,
    pub motion_vectors: NativeHandle,
    pub exposure: NativeHandle,
    pub reactive: NativeHandle,
    pub transparency_and_composition: NativeHandle,
    pub output: NativeHandle,
    pub jitter_offset: (f32, f32),
    pub motion_vector_scale: (f32, f32),
    pub render_size: (u32, u32),
    /// Only 3.1 and later take this; earlier generations leave it `None`.
    pub upscale_size: Option<(u32, u32)>,
    pub enable_sharpening: bool,
    pub sharpness: f32,
    pub frame_time_delta: f32,
    pub pre_exposure: f32,
    pub reset: bool,
    pub camera_near: f32,
    pub camera_far: f32,
    pub camera_fov_angle_vertical: f32,
    pub view_space_to_meters_factor: f32,
}

/// Per-frame XeSS execute call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XessExecuteDesc {
    pub color: NativeHandle,
    pub velocity: NativeHandle,
    pub depth: NativeHandle,
    pub exposure_scale_texture: NativeHandle,
    pub response_pixel_mask: NativeHandle,
    pub output: NativeHandle,
    pub jitter_offset: (f32, f32),
    pub velocity_scale: (f32, f32),
    pub exposure_scale: f32,
    pub reset_history: bool,
    pub input_size: (u32, u32),
}

/// Per-frame NGX evaluate. The vendor reads the host table directly.
#[derive(Debug, Clone, Copy)]
pub struct NgxEvaluateDesc<'a> {
    pub feature: NgxFeature,
    pub params: &'a ParameterTable,
}

pub type FfxModule = Box<dyn NativeRuntime<FfxDispatchDesc>>;
pub type XessModule = Box<dyn NativeRuntime<XessExecuteDesc>>;
pub type NgxModule = Box<dyn for<'a> NativeRuntime<NgxEvaluateDesc<'a>>>;

/// Resolves vendor runtimes for one process.
///
/// `None` means the module could not be found or loaded; the adapter is still
/// built and reports `module_loaded() == false`.
pub trait ModuleLoader: Send + Sync {
    fn load_ffx(
        &self,
        api: GraphicsApi,
        flavor: ApiFlavor,
        generation: FfxGeneration,
    ) -> Option<FfxModule>;

    fn load_xess(&self, api: GraphicsApi, flavor: ApiFlavor) -> Option<XessModule>;

    fn load_ngx(&self, api: GraphicsApi, feature: NgxFeature, path: &Path) -> Option<NgxModule>;
}

/// Loader that finds nothing. Every adapter it backs reports an unloaded
/// module.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoModules;

impl ModuleLoader for NoModules {
    fn load_ffx(&self, _: GraphicsApi, _: ApiFlavor, _: FfxGeneration) -> Option<FfxModule> {
        None
    }

    fn load_xess(&self, _: GraphicsApi, _: ApiFlavor) -> Option<XessModule> {
        None
    }

    fn load_ngx(&self, _: GraphicsApi, _: NgxFeature, _: &Path) -> Option<NgxModule> {
        None
    }
}
