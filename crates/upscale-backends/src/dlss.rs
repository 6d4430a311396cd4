//! DLSS and DLSS-D passthrough.
//!
//! These wrap the vendor's own NGX feature. The host table is handed over
//! as-is; only the sharpness policy is applied on top.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use upscale_core::state::is_shutting_down;
use upscale_core::{
    keys, BackendDescriptor, BackendKind, Config, FeatureHandle, FeatureVersion, GraphicsApi,
    NativeHandle, ParameterTable,
};

use crate::feature::{FeatureCommon, FeatureError, UpscaleFeature};
use crate::native::{CreateDesc, ModuleLoader, NgxEvaluateDesc, NgxFeature, NgxModule};

const BASELINE_VERSION: FeatureVersion = FeatureVersion::new(3, 7, 0);

pub struct DlssFeature {
    kind: BackendKind,
    api: GraphicsApi,
    feature: NgxFeature,
    common: FeatureCommon,
    runtime: Option<NgxModule>,
}

impl DlssFeature {
    /// `module_path` is where the vendor module was found; without one the
    /// feature is built unloaded.
    pub fn new(
        kind: BackendKind,
        api: GraphicsApi,
        handle: FeatureHandle,
        params: &ParameterTable,
        loader: &dyn ModuleLoader,
        module_path: Option<&Path>,
    ) -> Self {
        let feature = match kind {
            BackendKind::Dlssd => NgxFeature::RayReconstruction,
            _ => NgxFeature::SuperSampling,
        };

        let runtime = match module_path {
            Some(path) => loader.load_ngx(api, feature, path),
            None => None,
        };
        if runtime.is_none() {
            warn!("{:?} module not available for {}", feature, api);
        }

        Self {
            kind,
            api,
            feature,
            common: FeatureCommon::from_params(handle, params),
            runtime,
        }
    }
}

impl UpscaleFeature for DlssFeature {
    fn init(
        &mut self,
        device: NativeHandle,
        command_list: NativeHandle,
        params: &mut ParameterTable,
    ) -> Result<()> {
        if self.common.inited {
            return Err(FeatureError::AlreadyInitialized.into());
        }
        let name = self.name();
        let Some(runtime) = self.runtime.as_mut() else {
            bail!(FeatureError::ModuleNotLoaded(name));
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
            .with_context(|| format!("{} feature create failed", name))?;

        info!("{} {} created for {}", name, self.version(), self.common.handle);
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
        let name = self.name();
        let Some(runtime) = self.runtime.as_mut() else {
            return Err(FeatureError::ModuleNotLoaded(name));
        };

        if cfg.rcas_enabled.value_or_default() {
            params.set(keys::SHARPNESS, 0.0f32);
        } else if cfg.override_sharpness.value_or_default() {
            params.set(keys::SHARPNESS, cfg.sharpness.value_or_default());
        }

        let desc = NgxEvaluateDesc {
            feature: self.feature,
            params: &*params,
        };
        runtime.dispatch(command_list, &desc)
    }

    fn module_loaded(&self) -> bool {
        self.runtime.is_some()
    }

    fn name(&self) -> &'static str {
        match self.feature {
            NgxFeature::SuperSampling => "DLSS",
            NgxFeature::RayReconstruction => "DLSSD",
        }
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

impl Drop for DlssFeature {
    fn drop(&mut self) {
        if is_shutting_down() || !self.common.inited {
            return;
        }
        if let Some(runtime) = self.runtime.as_mut() {
            debug!("Releasing NGX feature for {}", self.common.handle);
            runtime.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::testing::{create_params, frame_params, FakeLoader, Vendor};

    fn dlss(loader: &FakeLoader, path: Option<&Path>) -> DlssFeature {
        DlssFeature::new(
            BackendKind::Dlss,
            GraphicsApi::Dx12,
            FeatureHandle::from_raw(1_000_400),
            &create_params(),
            loader,
            path,
        )
    }

    #[test]
    fn without_a_module_path_nothing_is_loaded() {
        let loader = FakeLoader::all();
        assert!(!dlss(&loader, None).module_loaded());
        assert_eq!(loader.log(Vendor::Ngx).loaded(), 0);
    }

    #[test]
    fn host_table_passes_through_with_sharpness_override() {
        let loader = FakeLoader::all();
        let path = PathBuf::from("nvngx_dlss.dll");
        let mut feature = dlss(&loader, Some(&path));
        feature
            .init(NativeHandle::from_addr(1), NativeHandle::from_addr(2), &mut create_params())
            .unwrap();

        let mut cfg = Config::default();
        cfg.override_sharpness.set(true);
        cfg.sharpness.set(0.8);

        let mut params = frame_params();
        params.set("Custom.Vendor.Key", 7u32);
        feature
            .evaluate(NativeHandle::from_addr(2), &mut params, &cfg)
            .unwrap();

        let seen = loader.log(Vendor::Ngx).last_ngx().unwrap();
        assert_eq!(seen.get::<u32>("Custom.Vendor.Key"), Some(7));
        assert_eq!(seen.get::<f32>(keys::SHARPNESS), Some(0.8));
    }

    #[test]
    fn ray_reconstruction_reports_its_own_name() {
        let loader = FakeLoader::all();
        let path = PathBuf::from("nvngx_dlssd.dll");
        let feature = DlssFeature::new(
            BackendKind::Dlssd,
            GraphicsApi::Vulkan,
            FeatureHandle::from_raw(1_000_401),
            &create_params(),
            &loader,
            Some(&path),
        );
        assert_eq!(feature.name(), "DLSSD");
        assert_eq!(feature.descriptor().kind.display_key(), "dlss");
    }
}
