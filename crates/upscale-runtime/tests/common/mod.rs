//! Shared fixtures for the runtime integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;

use upscale_backends::testing::{frame_params, FakeLoader};
use upscale_backends::{BarrierRecorder, ResourceState, RootSignatureSink};
use upscale_core::config::SwitchTiming;
use upscale_core::{
    Config, FeatureHandle, FeatureId, GraphicsApi, NativeHandle, NgxResult, ParameterTable,
};
use upscale_runtime::{PassthroughOwner, Runtime};

pub const DEVICE: NativeHandle = NativeHandle::from_addr(0xD0);
pub const CMD: NativeHandle = NativeHandle::from_addr(0xC0);

/// Default config with every switch delay removed.
pub fn config() -> Config {
    let mut config = Config::default();
    config.switch_timing = SwitchTiming::immediate();
    config
}

pub fn runtime(api: GraphicsApi, loader: &Arc<FakeLoader>, config: Config) -> Runtime {
    Runtime::new(api, loader.clone())
        .with_config(config)
        .with_device(DEVICE)
}

/// A runtime with one super-sampling feature already created.
pub fn created(api: GraphicsApi, loader: &Arc<FakeLoader>, config: Config) -> (Runtime, FeatureHandle) {
    let mut rt = runtime(api, loader, config);
    let handle = rt
        .create_feature(DEVICE, CMD, FeatureId::SuperSampling, &mut frame_params())
        .expect("create_feature");
    (rt, handle)
}

pub fn evaluate_n(rt: &mut Runtime, handle: FeatureHandle, params: &mut ParameterTable, n: usize) -> Vec<NgxResult> {
    (0..n).map(|_| rt.evaluate_feature(CMD, handle, params)).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Barrier(NativeHandle, ResourceState, ResourceState),
    Compute(NativeHandle),
    Graphics(NativeHandle),
}

/// Command recorder whose calls stay inspectable after it is boxed.
#[derive(Clone, Default)]
pub struct SharedRecorder(pub Arc<Mutex<Vec<Recorded>>>);

impl SharedRecorder {
    pub fn take(&self) -> Vec<Recorded> {
        std::mem::take(&mut *self.0.lock())
    }
}

impl BarrierRecorder for SharedRecorder {
    fn transition(&mut self, _: NativeHandle, resource: NativeHandle, before: ResourceState, after: ResourceState) {
        self.0.lock().push(Recorded::Barrier(resource, before, after));
    }
}

impl RootSignatureSink for SharedRecorder {
    fn set_compute(&mut self, _: NativeHandle, signature: NativeHandle) {
        self.0.lock().push(Recorded::Compute(signature));
    }

    fn set_graphics(&mut self, _: NativeHandle, signature: NativeHandle) {
        self.0.lock().push(Recorded::Graphics(signature));
    }
}

/// Passthrough owner that hands out fixed handles and counts calls.
#[derive(Clone)]
pub struct FakePassthrough {
    pub next_handle: u32,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl FakePassthrough {
    pub fn new(next_handle: u32) -> Self {
        Self {
            next_handle,
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl PassthroughOwner for FakePassthrough {
    fn create(&mut self, _: NativeHandle, feature: FeatureId, _: &mut ParameterTable) -> Result<FeatureHandle, NgxResult> {
        self.calls.lock().push(format!("create {:?}", feature));
        Ok(FeatureHandle::from_raw(self.next_handle))
    }

    fn evaluate(&mut self, _: NativeHandle, handle: FeatureHandle, _: &mut ParameterTable) -> NgxResult {
        self.calls.lock().push(format!("evaluate {}", handle));
        NgxResult::Success
    }

    fn release(&mut self, handle: FeatureHandle) -> NgxResult {
        self.calls.lock().push(format!("release {}", handle));
        NgxResult::Success
    }
}
