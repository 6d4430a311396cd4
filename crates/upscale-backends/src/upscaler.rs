//! The closed set of backends a context can hold.

use std::path::Path;

use anyhow::Result;

use upscale_core::{
    BackendDescriptor, BackendKind, Config, FeatureHandle, GraphicsApi, NativeHandle,
    ParameterTable,
};

use crate::dlss::DlssFeature;
use crate::feature::{FeatureCommon, FeatureError, UpscaleFeature};
use crate::ffx::FsrFeature;
use crate::native::ModuleLoader;
use crate::xess::XessFeature;

pub enum Upscaler {
    Fsr(FsrFeature),
    Xess(XessFeature),
    Dlss(DlssFeature),
}

macro_rules! delegate {
    ($self:ident, $inner:ident => $body:expr) => {
        match $self {
            Upscaler::Fsr($inner) => $body,
            Upscaler::Xess($inner) => $body,
            Upscaler::Dlss($inner) => $body,
        }
    };
}

impl Upscaler {
    /// Build the adapter for `kind`. The result may report
    /// `module_loaded() == false`; picking a fallback is the caller's call.
    pub fn build(
        kind: BackendKind,
        api: GraphicsApi,
        handle: FeatureHandle,
        params: &ParameterTable,
        loader: &dyn ModuleLoader,
        ngx_module: Option<&Path>,
    ) -> Self {
        match kind {
            BackendKind::Xess | BackendKind::Xess11On12 => {
                Upscaler::Xess(XessFeature::new(kind, api, handle, params, loader))
            }
            BackendKind::Fsr21
            | BackendKind::Fsr21On12
            | BackendKind::Fsr22
            | BackendKind::Fsr22On12
            | BackendKind::Fsr31
            | BackendKind::Fsr31On12 => {
                Upscaler::Fsr(FsrFeature::new(kind, api, handle, params, loader))
            }
            BackendKind::Dlss | BackendKind::Dlssd => Upscaler::Dlss(DlssFeature::new(
                kind, api, handle, params, loader, ngx_module,
            )),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.descriptor().kind
    }
}

impl UpscaleFeature for Upscaler {
    fn init(
        &mut self,
        device: NativeHandle,
        command_list: NativeHandle,
        params: &mut ParameterTable,
    ) -> Result<()> {
        delegate!(self, f => f.init(device, command_list, params))
    }

    fn evaluate(
        &mut self,
        command_list: NativeHandle,
        params: &mut ParameterTable,
        cfg: &Config,
    ) -> Result<(), FeatureError> {
        delegate!(self, f => f.evaluate(command_list, params, cfg))
    }

    fn module_loaded(&self) -> bool {
        delegate!(self, f => f.module_loaded())
    }

    fn is_inited(&self) -> bool {
        delegate!(self, f => f.is_inited())
    }

    fn name(&self) -> &'static str {
        delegate!(self, f => f.name())
    }

    fn descriptor(&self) -> BackendDescriptor {
        delegate!(self, f => f.descriptor())
    }

    fn common(&self) -> &FeatureCommon {
        delegate!(self, f => f.common())
    }

    fn common_mut(&mut self) -> &mut FeatureCommon {
        delegate!(self, f => f.common_mut())
    }

    fn update_output_resolution(&mut self, params: &ParameterTable) -> bool {
        delegate!(self, f => f.update_output_resolution(params))
    }
}
