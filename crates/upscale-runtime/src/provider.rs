//! Picks and builds the backend for a name, per graphics API.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use upscale_backends::{ModuleLoader, UpscaleFeature, Upscaler};
use upscale_core::{BackendKind, Config, FeatureHandle, GraphicsApi, ParameterTable, SessionState};

pub struct FeatureProvider {
    api: GraphicsApi,
    loader: Arc<dyn ModuleLoader>,
}

impl FeatureProvider {
    pub fn new(api: GraphicsApi, loader: Arc<dyn ModuleLoader>) -> Self {
        Self { api, loader }
    }

    pub fn api(&self) -> GraphicsApi {
        self.api
    }

    /// Backend substituted whenever the requested one cannot be used.
    pub fn fallback(&self) -> BackendKind {
        fallback_for(self.api)
    }

    /// Build the backend named `name` for `handle`.
    ///
    /// Unknown names, DLSS without its module or with DLSS disabled, and
    /// backends whose native module did not load are all replaced by the
    /// API's fallback. The effective name is recorded in `cfg`. The flag is
    /// whether the returned backend's module loaded.
    pub fn get_feature(
        &self,
        name: &str,
        handle: FeatureHandle,
        params: &ParameterTable,
        cfg: &mut Config,
        state: &SessionState,
    ) -> (Upscaler, bool) {
        let fallback = self.fallback();

        let (kind, ngx_module) = match name.parse::<BackendKind>() {
            Ok(kind) if !kind.available_on(self.api) => {
                warn!("{} is not available on {}, using {}", kind, self.api, fallback);
                (fallback, None)
            }
            Ok(kind) if kind.is_passthrough() => {
                match ngx_module_path(kind, state) {
                    Some(path) if cfg.dlss_enabled.value_or_default() => (kind, Some(path)),
                    _ => {
                        info!("{} unavailable, using {}", kind, fallback);
                        (fallback, None)
                    }
                }
            }
            Ok(kind) => (kind, None),
            Err(err) => {
                warn!("{}, using {}", err, fallback);
                (fallback, None)
            }
        };

        let mut upscaler = self.build(kind, handle, params, ngx_module);
        let mut effective = kind;

        if !upscaler.module_loaded() && kind != fallback {
            warn!("{} module not loaded, falling back to {}", kind, fallback);
            upscaler = self.build(fallback, handle, params, None);
            effective = fallback;
        }

        let loaded = upscaler.module_loaded();
        if !loaded {
            warn!("Fallback {} reports no module either", effective);
        }

        cfg.set_upscaler(self.api, effective.display_key());
        (upscaler, loaded)
    }

    /// Construct the replacement during a switch.
    pub fn change_feature(
        &self,
        name: &str,
        handle: FeatureHandle,
        params: &ParameterTable,
        cfg: &mut Config,
        state: &SessionState,
    ) -> (Upscaler, bool) {
        info!("Creating new {} upscaler for {}", name, handle);
        self.get_feature(name, handle, params, cfg, state)
    }

    fn build(
        &self,
        kind: BackendKind,
        handle: FeatureHandle,
        params: &ParameterTable,
        ngx_module: Option<&Path>,
    ) -> Upscaler {
        Upscaler::build(kind, self.api, handle, params, self.loader.as_ref(), ngx_module)
    }
}

pub fn fallback_for(api: GraphicsApi) -> BackendKind {
    match api {
        GraphicsApi::Dx12 => BackendKind::Fsr21,
        GraphicsApi::Dx11 | GraphicsApi::Vulkan => BackendKind::Fsr22,
    }
}

fn ngx_module_path(kind: BackendKind, state: &SessionState) -> Option<&Path> {
    match kind {
        BackendKind::Dlss => state.dlss_path.as_deref(),
        BackendKind::Dlssd => state.dlssd_path.as_deref(),
        _ => None,
    }
}
