//! FidelityFX Super Resolution adapter (2.1.2, 2.2 and 3.1).

use anyhow::{bail, Context, Result};
use tracing::{debug, error, info, warn};

use upscale_core::state::is_shutting_down;
use upscale_core::{
    keys, BackendDescriptor, BackendKind, Config, FeatureHandle, FrameClock, FrameContext,
    FrameInputs, GraphicsApi, NativeHandle, ParameterTable,
};

use crate::feature::{required, resource, FeatureCommon, FeatureError, FeatureFlags, UpscaleFeature};
use crate::native::{CreateDesc, FfxDispatchDesc, FfxGeneration, FfxModule, ModuleLoader};

pub struct FsrFeature {
    kind: BackendKind,
    api: GraphicsApi,
    generation: FfxGeneration,
    common: FeatureCommon,
    runtime: Option<FfxModule>,
    clock: FrameClock,
}

impl FsrFeature {
    pub fn new(
        kind: BackendKind,
        api: GraphicsApi,
        handle: FeatureHandle,
        params: &ParameterTable,
        loader: &dyn ModuleLoader,
    ) -> Self {
        let generation = generation_of(kind);
        let runtime = loader.load_ffx(api, kind.flavor(), generation);
        if runtime.is_none() {
            warn!("FSR {:?} module not found for {}", generation, api);
        }

        Self {
            kind,
            api,
            generation,
            common: FeatureCommon::from_params(handle, params),
            runtime,
            clock: FrameClock::new(),
        }
    }

    fn dispatch_desc(
        &mut self,
        params: &ParameterTable,
        cfg: &Config,
    ) -> Result<FfxDispatchDesc, FeatureError> {
        let frame = FrameContext {
            render_size: self.common.render_size(),
            target_size: self.common.target_size(),
            depth_inverted: self.common.depth_inverted(),
        };
        let inputs = FrameInputs::read(params, cfg, frame, &mut self.clock);

        let color = required(params, keys::COLOR)?;
        let motion_vectors = required(params, keys::MOTION_VECTORS)?;
        let output = required(params, keys::OUTPUT)?;

        let depth = resource(params, keys::DEPTH);
        if depth.is_null() {
            error!("Depth not exist!!");
            if self.common.low_res_mv() {
                return Err(FeatureError::MissingInput(keys::DEPTH));
            }
        }

        let exposure = if self.common.auto_exposure() {
            debug!("AutoExposure enabled!");
            NativeHandle::NULL
        } else {
            let exposure = resource(params, keys::EXPOSURE_TEXTURE);
            if exposure.is_null() {
                warn!("AutoExposure disabled but ExposureTexture is missing, rebuilding with auto exposure");
                self.common.flags.insert(FeatureFlags::AUTO_EXPOSURE);
                return Err(FeatureError::NeedsRecreate);
            }
            exposure
        };

        let reactive = match resource(params, keys::FSR_REACTIVE) {
            handle if !handle.is_null() => handle,
            _ => resource(params, keys::REACTIVE_MASK),
        };

        let upscale_size = match self.generation {
            FfxGeneration::Fsr31 => Some(upscale_size(params, cfg, inputs.upscale_size)),
            _ => None,
        };

        let mut motion_vector_scale = inputs.motion_vector_scale;
        if self.generation == FfxGeneration::Fsr31 {
            let velocity = cfg.fsr.velocity.value_or_default();
            motion_vector_scale = (motion_vector_scale.0 * velocity, motion_vector_scale.1 * velocity);
        }

        Ok(FfxDispatchDesc {
            color,
            depth,
            motion_vectors,
            exposure,
            reactive,
            transparency_and_composition: resource(params, keys::FSR_TRANSPARENCY_AND_COMP),
            output,
            jitter_offset: inputs.jitter,
            motion_vector_scale,
            render_size: inputs.render_size,
            upscale_size,
            enable_sharpening: inputs.sharpening_enabled,
            sharpness: inputs.sharpness,
            frame_time_delta: inputs.frame_time_delta_ms,
            pre_exposure: inputs.pre_exposure,
            reset: inputs.reset,
            camera_near: inputs.camera_near,
            camera_far: inputs.camera_far,
            camera_fov_angle_vertical: inputs.camera_fov_vertical,
            view_space_to_meters_factor: inputs.view_space_to_meters,
        })
    }
}

impl UpscaleFeature for FsrFeature {
    fn init(
        &mut self,
        device: NativeHandle,
        command_list: NativeHandle,
        params: &mut ParameterTable,
    ) -> Result<()> {
        if self.common.inited {
            return Err(FeatureError::AlreadyInitialized.into());
        }
        let Some(runtime) = self.runtime.as_mut() else {
            bail!(FeatureError::ModuleNotLoaded("FSR"));
        };

        let desc = CreateDesc {
            command_list,
            max_render_size: self.common.render_size(),
            display_size: self.common.display_size(),
            flags: self.common.flags,
            perf_quality: self.common.perf_quality,
            host_params: params,
        };
        runtime
            .create(device, &desc)
            .with_context(|| format!("FSR {} context create failed", runtime.version()))?;

        info!("{} {} context created for {}", self.name(), self.version(), self.common.handle);
        self.common.inited = true;
        Ok(())
    }

    fn evaluate(
        &mut self,
        command_list: NativeHandle,
        params: &mut ParameterTable,
        cfg: &Config,
    ) -> Result<(), FeatureError> {
        if !self.common.inited {
            return Err(FeatureError::NotInitialized);
        }
        if self.runtime.is_none() {
            return Err(FeatureError::ModuleNotLoaded("FSR"));
        }

        let desc = self.dispatch_desc(params, cfg)?;
        match self.runtime.as_mut() {
            Some(runtime) => runtime.dispatch(command_list, &desc),
            None => Err(FeatureError::ModuleNotLoaded("FSR")),
        }
    }

    fn module_loaded(&self) -> bool {
        self.runtime.is_some()
    }

    fn name(&self) -> &'static str {
        "FSR"
    }

    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            kind: self.kind,
            api: self.api,
            version: self
                .runtime
                .as_ref()
                .map(|runtime| runtime.version())
                .unwrap_or_else(|| self.generation.baseline_version()),
        }
    }

    fn common(&self) -> &FeatureCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut FeatureCommon {
        &mut self.common
    }
}

impl Drop for FsrFeature {
    fn drop(&mut self) {
        if is_shutting_down() || !self.common.inited {
            return;
        }
        if let Some(runtime) = self.runtime.as_mut() {
            debug!("Destroying FSR context for {}", self.common.handle);
            runtime.destroy();
        }
    }
}

fn generation_of(kind: BackendKind) -> FfxGeneration {
    match kind {
        BackendKind::Fsr21 | BackendKind::Fsr21On12 => FfxGeneration::Fsr212,
        BackendKind::Fsr31 | BackendKind::Fsr31On12 => FfxGeneration::Fsr31,
        _ => FfxGeneration::Fsr22,
    }
}

/// FSR 3.1 takes the upscale size per dispatch; the host can override it with
/// the `FSR.upscaleSize.*` keys.
fn upscale_size(params: &ParameterTable, cfg: &Config, target: (u32, u32)) -> (u32, u32) {
    if !cfg.fsr.use_fsr_input_values.value_or_default() {
        return target;
    }
    match (
        params.get::<u32>(keys::FSR_UPSCALE_WIDTH),
        params.get::<u32>(keys::FSR_UPSCALE_HEIGHT),
    ) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => target,
    }
}
