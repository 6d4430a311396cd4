//! In-process stand-ins for the vendor runtimes.
//!
//! [`FakeLoader`] hands out runtimes that record what they were asked to do
//! into a shared [`ModuleLog`] per vendor, so tests can drive the adapters and
//! the switch machinery without any GPU or vendor module.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use parking_lot::Mutex;

use upscale_core::{
    keys, ApiFlavor, FeatureVersion, GraphicsApi, NativeHandle, ParameterTable,
};

use crate::feature::{FeatureError, FeatureFlags};
use crate::native::{
    CreateDesc, FfxDispatchDesc, FfxGeneration, FfxModule, ModuleLoader, NativeRuntime,
    NgxEvaluateDesc, NgxFeature, NgxModule, XessExecuteDesc, XessModule,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    Ffx,
    Xess,
    Ngx,
}

#[derive(Default)]
struct LogState {
    loaded: usize,
    created: usize,
    destroyed: usize,
    dispatches: usize,
    fail_create: bool,
    dispatch_error: Option<fn() -> FeatureError>,
    version: Option<FeatureVersion>,
    last_flavor: Option<ApiFlavor>,
    last_ffx: Option<FfxDispatchDesc>,
    last_xess: Option<XessExecuteDesc>,
    last_ngx: Option<ParameterTable>,
}

/// What every runtime of one vendor has been asked to do.
#[derive(Default)]
pub struct ModuleLog {
    state: Mutex<LogState>,
}

impl ModuleLog {
    pub fn loaded(&self) -> usize {
        self.state.lock().loaded
    }

    pub fn created(&self) -> usize {
        self.state.lock().created
    }

    pub fn destroyed(&self) -> usize {
        self.state.lock().destroyed
    }

    pub fn dispatches(&self) -> usize {
        self.state.lock().dispatches
    }

    pub fn last_flavor(&self) -> Option<ApiFlavor> {
        self.state.lock().last_flavor
    }

    pub fn last_ffx(&self) -> Option<FfxDispatchDesc> {
        self.state.lock().last_ffx.clone()
    }

    pub fn last_xess(&self) -> Option<XessExecuteDesc> {
        self.state.lock().last_xess.clone()
    }

    pub fn last_ngx(&self) -> Option<ParameterTable> {
        self.state.lock().last_ngx.clone()
    }

    /// Make every later `create` fail.
    pub fn fail_create(&self, fail: bool) {
        self.state.lock().fail_create = fail;
    }

    /// Make every later dispatch fail with the error `make` builds.
    pub fn fail_dispatch(&self, make: Option<fn() -> FeatureError>) {
        self.state.lock().dispatch_error = make;
    }

    pub fn set_version(&self, version: FeatureVersion) {
        self.state.lock().version = Some(version);
    }

    fn on_create(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_create {
            bail!("fake create failure");
        }
        state.created += 1;
        Ok(())
    }

    fn on_dispatch(&self, record: impl FnOnce(&mut LogState)) -> Result<(), FeatureError> {
        let mut state = self.state.lock();
        if let Some(make) = state.dispatch_error {
            return Err(make());
        }
        state.dispatches += 1;
        record(&mut state);
        Ok(())
    }
}

struct FakeRuntime {
    log: Arc<ModuleLog>,
    default_version: FeatureVersion,
}

impl FakeRuntime {
    fn version(&self) -> FeatureVersion {
        self.log.state.lock().version.unwrap_or(self.default_version)
    }

    fn destroy(&mut self) {
        self.log.state.lock().destroyed += 1;
    }
}

impl NativeRuntime<FfxDispatchDesc> for FakeRuntime {
    fn version(&self) -> FeatureVersion {
        FakeRuntime::version(self)
    }

    fn create(&mut self, _: NativeHandle, _: &CreateDesc<'_>) -> Result<()> {
        self.log.on_create()
    }

    fn dispatch(&mut self, _: NativeHandle, desc: &FfxDispatchDesc) -> Result<(), FeatureError> {
        self.log.on_dispatch(|state| state.last_ffx = Some(desc.clone()))
    }

    fn destroy(&mut self) {
        FakeRuntime::destroy(self)
    }
}

impl NativeRuntime<XessExecuteDesc> for FakeRuntime {
    fn version(&self) -> FeatureVersion {
        FakeRuntime::version(self)
    }

    fn create(&mut self, _: NativeHandle, _: &CreateDesc<'_>) -> Result<()> {
        self.log.on_create()
    }

    fn dispatch(&mut self, _: NativeHandle, desc: &XessExecuteDesc) -> Result<(), FeatureError> {
        self.log.on_dispatch(|state| state.last_xess = Some(desc.clone()))
    }

    fn destroy(&mut self) {
        FakeRuntime::destroy(self)
    }
}

impl<'a> NativeRuntime<NgxEvaluateDesc<'a>> for FakeRuntime {
    fn version(&self) -> FeatureVersion {
        FakeRuntime::version(self)
    }

    fn create(&mut self, _: NativeHandle, _: &CreateDesc<'_>) -> Result<()> {
        self.log.on_create()
    }

    fn dispatch(&mut self, _: NativeHandle, desc: &NgxEvaluateDesc<'a>) -> Result<(), FeatureError> {
        self.log.on_dispatch(|state| state.last_ngx = Some(desc.params.clone()))
    }

    fn destroy(&mut self) {
        FakeRuntime::destroy(self)
    }
}

/// Loader backed by [`FakeRuntime`]s, with per-vendor logs.
pub struct FakeLoader {
    ffx: Arc<ModuleLog>,
    xess: Arc<ModuleLog>,
    ngx: Arc<ModuleLog>,
    missing: HashSet<Vendor>,
}

impl FakeLoader {
    /// Every vendor module is present.
    pub fn all() -> Self {
        Self {
            ffx: Arc::default(),
            xess: Arc::default(),
            ngx: Arc::default(),
            missing: HashSet::new(),
        }
    }

    /// No vendor module is present.
    pub fn empty() -> Self {
        Self::all()
            .without(Vendor::Ffx)
            .without(Vendor::Xess)
            .without(Vendor::Ngx)
    }

    pub fn without(mut self, vendor: Vendor) -> Self {
        self.missing.insert(vendor);
        self
    }

    pub fn log(&self, vendor: Vendor) -> &ModuleLog {
        match vendor {
            Vendor::Ffx => &self.ffx,
            Vendor::Xess => &self.xess,
            Vendor::Ngx => &self.ngx,
        }
    }

    fn runtime(&self, vendor: Vendor, flavor: ApiFlavor, version: FeatureVersion) -> Option<FakeRuntime> {
        let log = match vendor {
            Vendor::Ffx => &self.ffx,
            Vendor::Xess => &self.xess,
            Vendor::Ngx => &self.ngx,
        };
        {
            let mut state = log.state.lock();
            state.loaded += 1;
            state.last_flavor = Some(flavor);
        }
        if self.missing.contains(&vendor) {
            return None;
        }
        Some(FakeRuntime {
            log: Arc::clone(log),
            default_version: version,
        })
    }
}

impl ModuleLoader for FakeLoader {
    fn load_ffx(
        &self,
        _: GraphicsApi,
        flavor: ApiFlavor,
        generation: FfxGeneration,
    ) -> Option<FfxModule> {
        self.runtime(Vendor::Ffx, flavor, generation.baseline_version())
            .map(|runtime| Box::new(runtime) as FfxModule)
    }

    fn load_xess(&self, _: GraphicsApi, flavor: ApiFlavor) -> Option<XessModule> {
        self.runtime(Vendor::Xess, flavor, FeatureVersion::new(1, 3, 1))
            .map(|runtime| Box::new(runtime) as XessModule)
    }

    fn load_ngx(&self, _: GraphicsApi, _: NgxFeature, _: &Path) -> Option<NgxModule> {
        self.runtime(Vendor::Ngx, ApiFlavor::Native, FeatureVersion::new(3, 7, 10))
            .map(|runtime| Box::new(runtime) as NgxModule)
    }
}

/// Creation parameters for a 1280x720 -> 2560x1440 feature.
pub fn create_params() -> ParameterTable {
    let mut params = ParameterTable::new();
    params.set(keys::WIDTH, 1280u32);
    params.set(keys::HEIGHT, 720u32);
    params.set(keys::OUT_WIDTH, 2560u32);
    params.set(keys::OUT_HEIGHT, 1440u32);
    params.set(keys::PERF_QUALITY_VALUE, 2u32);
    params.set(keys::FEATURE_CREATE_FLAGS, FeatureFlags::MV_LOW_RES.bits());
    params
}

/// Per-frame parameters with every input resource bound.
pub fn frame_params() -> ParameterTable {
    let mut params = create_params();
    params.set(keys::COLOR, NativeHandle::from_addr(0x1000));
    params.set(keys::MOTION_VECTORS, NativeHandle::from_addr(0x2000));
    params.set(keys::DEPTH, NativeHandle::from_addr(0x3000));
    params.set(keys::EXPOSURE_TEXTURE, NativeHandle::from_addr(0x4000));
    params.set(keys::OUTPUT, NativeHandle::from_addr(0x5000));
    params.set(keys::MV_SCALE_X, 1.0f32);
    params.set(keys::MV_SCALE_Y, 1.0f32);
    params
}
