//! XeSS adapter, native and through D3D11-on-12.

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use upscale_core::state::is_shutting_down;
use upscale_core::{
    keys, BackendDescriptor, BackendKind, Config, FeatureHandle, FeatureVersion, FrameClock,
    FrameContext, FrameInputs, GraphicsApi, NativeHandle, ParameterTable,
};

use crate::feature::{required, resource, FeatureCommon, FeatureError, UpscaleFeature};
use crate::native::{CreateDesc, ModuleLoader, XessExecuteDesc, XessModule};

const BASELINE_VERSION: FeatureVersion = FeatureVersion::new(1, 3, 0);

pub struct XessFeature {
    kind: BackendKind,
    api: GraphicsApi,
    common: FeatureCommon,
    runtime: Option<XessModule>,
    clock: FrameClock,
}

impl XessFeature {
    pub fn new(
        kind: BackendKind,
        api: GraphicsApi,
        handle: FeatureHandle,
        params: &ParameterTable,
        loader: &dyn ModuleLoader,
    ) -> Self {
        let runtime = loader.load_xess(api, kind.flavor());
        if runtime.is_none() {
            warn!("XeSS module not found for {}", api);
        }

        Self {
            kind,
            api,
            common: FeatureCommon::from_params(handle, params),
            runtime,
            clock: FrameClock::new(),
        }
    }

    fn execute_desc(
        &mut self,
        params: &ParameterTable,
        cfg: &Config,
    ) -> Result<XessExecuteDesc, FeatureError> {
        let frame = FrameContext {
            render_size: self.common.render_size(),
            target_size: self.common.target_size(),
            depth_inverted: self.common.depth_inverted(),
        };
        let inputs = FrameInputs::read(params, cfg, frame, &mut self.clock);

        let exposure_scale_texture = if self.common.auto_exposure() {
            NativeHandle::NULL
        } else {
            resource(params, keys::EXPOSURE_TEXTURE)
        };

        Ok(XessExecuteDesc {
            color: required(params, keys::COLOR)?,
            velocity: required(params, keys::MOTION_VECTORS)?,
            depth: required(params, keys::DEPTH)?,
            exposure_scale_texture,
            response_pixel_mask: resource(params, keys::REACTIVE_MASK),
            output: required(params, keys::OUTPUT)?,
            jitter_offset: inputs.jitter,
            velocity_scale: inputs.motion_vector_scale,
            exposure_scale: inputs.pre_exposure,
            reset_history: inputs.reset,
            input_size: inputs.render_size,
        })
    }
}

impl UpscaleFeature for XessFeature {
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
            bail!(FeatureError::ModuleNotLoaded("XeSS"));
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
            .context("xessD3D12Init failed")?;

        info!("XeSS {} initialised for {}", self.version(), self.common.handle);
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

        let desc = self.execute_desc(params, cfg)?;
        let Some(runtime) = self.runtime.as_mut() else {
            return Err(FeatureError::ModuleNotLoaded("XeSS"));
        };
        runtime.dispatch(command_list, &desc)
    }

    fn module_loaded(&self) -> bool {
        self.runtime.is_some()
    }

    fn name(&self) -> &'static str {
        "XeSS"
    }

    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            kind: self.kind,
            api: self.api,
            version: self
                .runtime
                .as_ref()
                .map(|runtime| runtime.version())
                .unwrap_or(BASELINE_VERSION),
        }
    }

    fn common(&self) -> &FeatureCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut FeatureCommon {
        &mut self.common
    }
}

impl Drop for XessFeature {
    fn drop(&mut self) {
        if is_shutting_down() || !self.common.inited {
            return;
        }
        if let Some(runtime) = self.runtime.as_mut() {
            debug!("Destroying XeSS context for {}", self.common.handle);
            runtime.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_params, frame_params, FakeLoader, Vendor};
    use upscale_core::ApiFlavor;

    #[test]
    fn d3d11_on_12_flavor_reaches_the_loader() {
        let loader = FakeLoader::all();
        let xess = XessFeature::new(
            BackendKind::Xess11On12,
            GraphicsApi::Dx11,
            FeatureHandle::from_raw(1_000_300),
            &create_params(),
            &loader,
        );
        assert!(xess.module_loaded());
        assert_eq!(loader.log(Vendor::Xess).last_flavor(), Some(ApiFlavor::Dx11On12));
    }

    #[test]
    fn execute_carries_scales_and_history_reset() {
        let loader = FakeLoader::all();
        let mut xess = XessFeature::new(
            BackendKind::Xess,
            GraphicsApi::Dx12,
            FeatureHandle::from_raw(1_000_301),
            &create_params(),
            &loader,
        );
        xess.init(NativeHandle::from_addr(1), NativeHandle::from_addr(2), &mut create_params())
            .unwrap();

        let mut params = frame_params();
        params.set(keys::MV_SCALE_X, -1280.0f32);
        params.set(keys::MV_SCALE_Y, -720.0f32);
        params.set(keys::PRE_EXPOSURE, 0.5f32);
        params.set(keys::RESET, 1u32);
        xess.evaluate(NativeHandle::from_addr(2), &mut params, &Config::default())
            .unwrap();

        let desc = loader.log(Vendor::Xess).last_xess().unwrap();
        assert_eq!(desc.velocity_scale, (-1280.0, -720.0));
        assert_eq!(desc.exposure_scale, 0.5);
        assert!(desc.reset_history);
        assert_eq!(desc.input_size, (1280, 720));
    }

    #[test]
    fn evaluate_before_init_is_refused() {
        let loader = FakeLoader::all();
        let mut xess = XessFeature::new(
            BackendKind::Xess,
            GraphicsApi::Dx12,
            FeatureHandle::from_raw(1_000_302),
            &create_params(),
            &loader,
        );
        let err = xess
            .evaluate(NativeHandle::from_addr(2), &mut frame_params(), &Config::default())
            .unwrap_err();
        assert!(matches!(err, FeatureError::NotInitialized));
    }
}
