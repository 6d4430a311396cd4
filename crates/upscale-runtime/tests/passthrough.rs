//! Handles the core does not own are routed by numeric range.

mod common;

use std::sync::Arc;

use upscale_backends::testing::{frame_params, FakeLoader};
use upscale_core::{FeatureHandle, FeatureId, GraphicsApi, NgxResult};

use common::{config, runtime, FakePassthrough, CMD, DEVICE};

#[test]
fn non_upscaling_features_need_a_passthrough() {
    let loader = Arc::new(FakeLoader::all());
    let mut rt = runtime(GraphicsApi::Dx12, &loader, config());

    assert_eq!(
        rt.create_feature(DEVICE, CMD, FeatureId::DeepDvc, &mut frame_params()),
        Err(NgxResult::FeatureNotSupported)
    );
    assert!(rt.registry().is_empty());
}

#[test]
fn native_handles_go_to_the_vendor_runtime_while_dlss_is_enabled() {
    let loader = Arc::new(FakeLoader::all());
    let native = FakePassthrough::new(17);
    let mut rt = runtime(GraphicsApi::Dx12, &loader, config())
        .with_native_passthrough(Box::new(native.clone()));

    let handle = rt
        .create_feature(DEVICE, CMD, FeatureId::DeepDvc, &mut frame_params())
        .unwrap();
    assert_eq!(handle, FeatureHandle::from_raw(17));
    assert!(rt.registry().is_empty());

    assert_eq!(rt.evaluate_feature(CMD, handle, &mut frame_params()), NgxResult::Success);
    assert_eq!(rt.release_feature(handle), NgxResult::Success);
    assert_eq!(
        native.calls(),
        vec!["create DeepDvc", "evaluate 17", "release 17"]
    );

    rt.config_mut().dlss_enabled.set(false);
    assert_eq!(
        rt.evaluate_feature(CMD, handle, &mut frame_params()),
        NgxResult::FeatureNotFound
    );
    assert_eq!(rt.release_feature(handle), NgxResult::FeatureNotFound);
}

#[test]
fn native_range_without_a_passthrough_is_not_found() {
    let loader = Arc::new(FakeLoader::all());
    let mut rt = runtime(GraphicsApi::Vulkan, &loader, config());
    let native = FeatureHandle::from_raw(3);

    assert_eq!(
        rt.evaluate_feature(CMD, native, &mut frame_params()),
        NgxResult::FeatureNotFound
    );
    assert_eq!(rt.release_feature(native), NgxResult::FeatureNotFound);
}

#[test]
fn frame_generation_goes_to_its_owner() {
    let loader = Arc::new(FakeLoader::all());
    let frame_gen = FakePassthrough::new(2_000_005);
    let mut rt = runtime(GraphicsApi::Dx12, &loader, config())
        .with_frame_gen(Box::new(frame_gen.clone()));

    let handle = rt
        .create_feature(DEVICE, CMD, FeatureId::FrameGeneration, &mut frame_params())
        .unwrap();
    assert_eq!(handle.id(), 2_000_005);

    assert_eq!(rt.evaluate_feature(CMD, handle, &mut frame_params()), NgxResult::Success);
    assert_eq!(rt.release_feature(handle), NgxResult::Success);
    assert_eq!(
        frame_gen.calls(),
        vec!["create FrameGeneration", "evaluate 2000005", "release 2000005"]
    );
}

#[test]
fn upscaling_handles_never_reach_a_passthrough() {
    let loader = Arc::new(FakeLoader::all());
    let native = FakePassthrough::new(17);
    let mut rt = runtime(GraphicsApi::Dx12, &loader, config())
        .with_native_passthrough(Box::new(native.clone()));

    let handle = rt
        .create_feature(DEVICE, CMD, FeatureId::SuperSampling, &mut frame_params())
        .unwrap();
    assert!(handle.is_core());
    assert_eq!(rt.evaluate_feature(CMD, handle, &mut frame_params()), NgxResult::Success);
    assert!(native.calls().is_empty());
}
