//! Common interface every upscaler backend implements.

use anyhow::Result;
use bitflags::bitflags;
use tracing::{debug, error, info};

use upscale_core::{
    keys, BackendDescriptor, Config, FeatureHandle, FeatureVersion, NativeHandle, ParameterTable,
    PerfQuality,
};

bitflags! {
    /// Feature creation flags, as the host passes them in
    /// `DLSS.Feature.Create.Flags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FeatureFlags: u32 {
        const IS_HDR = 1 << 0;
        const MV_LOW_RES = 1 << 1;
        const MV_JITTERED = 1 << 2;
        const DEPTH_INVERTED = 1 << 3;
        const DO_SHARPENING = 1 << 5;
        const AUTO_EXPOSURE = 1 << 6;
    }
}

/// Why a dispatch did not happen.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error("feature is not initialised")]
    NotInitialized,
    #[error("feature is already initialised")]
    AlreadyInitialized,
    #[error("native module for {0} is not loaded")]
    ModuleNotLoaded(&'static str),
    #[error("required input '{0}' is missing")]
    MissingInput(&'static str),
    #[error("native dispatch failed: {0}")]
    Dispatch(String),
    /// The device was removed; the feature must be rebuilt.
    #[error("device lost during dispatch")]
    DeviceLost,
    /// The native context no longer matches its inputs and must be rebuilt.
    #[error("native context must be recreated")]
    NeedsRecreate,
}

impl FeatureError {
    /// Errors that are cured by rebuilding the same backend.
    pub fn needs_rebuild(&self) -> bool {
        matches!(self, FeatureError::DeviceLost | FeatureError::NeedsRecreate)
    }
}

/// Capability interface of one upscaler instance.
///
/// Instances are created by the provider, initialised once, then evaluated
/// every frame until they are dropped. Dropping releases the native context
/// unless the process is shutting down.
pub trait UpscaleFeature {
    /// One-time setup. An `Err` means the instance is unusable and the caller
    /// must replace it.
    fn init(
        &mut self,
        device: NativeHandle,
        command_list: NativeHandle,
        params: &mut ParameterTable,
    ) -> Result<()>;

    /// Dispatch one frame.
    fn evaluate(
        &mut self,
        command_list: NativeHandle,
        params: &mut ParameterTable,
        cfg: &Config,
    ) -> Result<(), FeatureError>;

    /// Whether the native runtime was resolved when the instance was built.
    fn module_loaded(&self) -> bool;

    fn is_inited(&self) -> bool {
        self.common().inited
    }

    fn name(&self) -> &'static str;

    fn descriptor(&self) -> BackendDescriptor;

    fn version(&self) -> FeatureVersion {
        self.descriptor().version
    }

    fn common(&self) -> &FeatureCommon;

    fn common_mut(&mut self) -> &mut FeatureCommon;

    /// Pick up a new output size from `params`. Returns whether it changed.
    fn update_output_resolution(&mut self, params: &ParameterTable) -> bool {
        self.common_mut().update_output_resolution(params)
    }
}

/// State every backend carries, read from the creation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCommon {
    pub handle: FeatureHandle,
    pub render_width: u32,
    pub render_height: u32,
    pub display_width: u32,
    pub display_height: u32,
    pub target_width: u32,
    pub target_height: u32,
    pub flags: FeatureFlags,
    pub perf_quality: PerfQuality,
    pub sharpness: f32,
    pub inited: bool,
}

impl FeatureCommon {
    pub fn from_params(handle: FeatureHandle, params: &ParameterTable) -> Self {
        let flags = FeatureFlags::from_bits_truncate(params.get_or(keys::FEATURE_CREATE_FLAGS, 0u32));
        let perf_quality = PerfQuality::from_value(params.get_or(keys::PERF_QUALITY_VALUE, 1u32));

        let display_width = params.get_or(keys::OUT_WIDTH, 0u32);
        let display_height = params.get_or(keys::OUT_HEIGHT, 0u32);

        let (render_width, render_height) = match (
            params.get::<u32>(keys::WIDTH),
            params.get::<u32>(keys::HEIGHT),
        ) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => {
                let scale = perf_quality.scale_factor();
                let w = (display_width as f32 / scale) as u32;
                let h = (display_height as f32 / scale) as u32;
                debug!("No render size in params, derived {}x{} from {:?}", w, h, perf_quality);
                (w, h)
            }
        };

        info!(
            "Feature {}: render {}x{}, display {}x{}, flags {:?}",
            handle, render_width, render_height, display_width, display_height, flags
        );

        Self {
            handle,
            render_width,
            render_height,
            display_width,
            display_height,
            target_width: display_width,
            target_height: display_height,
            flags,
            perf_quality,
            sharpness: params.get_or(keys::SHARPNESS, 0.0f32),
            inited: false,
        }
    }

    pub fn render_size(&self) -> (u32, u32) {
        (self.render_width, self.render_height)
    }

    pub fn display_size(&self) -> (u32, u32) {
        (self.display_width, self.display_height)
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    pub fn is_hdr(&self) -> bool {
        self.flags.contains(FeatureFlags::IS_HDR)
    }

    pub fn depth_inverted(&self) -> bool {
        self.flags.contains(FeatureFlags::DEPTH_INVERTED)
    }

    pub fn jittered_mv(&self) -> bool {
        self.flags.contains(FeatureFlags::MV_JITTERED)
    }

    pub fn low_res_mv(&self) -> bool {
        self.flags.contains(FeatureFlags::MV_LOW_RES)
    }

    pub fn auto_exposure(&self) -> bool {
        self.flags.contains(FeatureFlags::AUTO_EXPOSURE)
    }

    pub fn sharpening(&self) -> bool {
        self.flags.contains(FeatureFlags::DO_SHARPENING)
    }

    /// Write the values a replacement backend needs to be built with the same
    /// shape as this one.
    pub fn snapshot_into(&self, params: &mut ParameterTable) {
        params.set(keys::FEATURE_CREATE_FLAGS, self.flags.bits());
        params.set(keys::WIDTH, self.render_width);
        params.set(keys::HEIGHT, self.render_height);
        params.set(keys::OUT_WIDTH, self.display_width);
        params.set(keys::OUT_HEIGHT, self.display_height);
        params.set(keys::PERF_QUALITY_VALUE, self.perf_quality as u32);
    }

    pub fn update_output_resolution(&mut self, params: &ParameterTable) -> bool {
        let (Some(w), Some(h)) = (
            params.get::<u32>(keys::OUT_WIDTH),
            params.get::<u32>(keys::OUT_HEIGHT),
        ) else {
            return false;
        };

        if w == 0 || h == 0 || (w, h) == self.display_size() {
            return false;
        }

        info!(
            "Output resolution changed {}x{} -> {}x{}",
            self.display_width, self.display_height, w, h
        );
        self.display_width = w;
        self.display_height = h;
        self.target_width = w;
        self.target_height = h;
        true
    }
}

/// The resource bound to `key`, or null.
pub(crate) fn resource(params: &ParameterTable, key: &str) -> NativeHandle {
    params.get::<NativeHandle>(key).unwrap_or(NativeHandle::NULL)
}

pub(crate) fn required(
    params: &ParameterTable,
    key: &'static str,
) -> Result<NativeHandle, FeatureError> {
    let handle = resource(params, key);
    if handle.is_null() {
        error!("{} not exist!!", key);
        return Err(FeatureError::MissingInput(key));
    }
    debug!("{} exist..", key);
    Ok(handle)
}
