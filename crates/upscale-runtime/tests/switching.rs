//! Backend switches driven through evaluate, and the switch steps directly.

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use upscale_backends::testing::{create_params, frame_params, FakeLoader, Vendor};
use upscale_backends::{UpscaleFeature, Upscaler};
use upscale_core::state::GameQuirks;
use upscale_core::{
    keys, BackendKind, FeatureHandle, GraphicsApi, NativeHandle, NgxResult, ParameterTable,
    SessionState,
};
use upscale_runtime::switch::{advance, SwitchContext};
use upscale_runtime::{
    ContextRecord, DefaultFallbackPolicy, FeatureProvider, RegistryError, SwitchOutcome,
    SwitchPhase,
};

use common::{config, created, evaluate_n, CMD, DEVICE};

#[test]
fn requested_switch_completes_in_three_evaluates() {
    let loader = Arc::new(FakeLoader::all());
    let (mut rt, handle) = created(GraphicsApi::Dx12, &loader, config());
    let mut params = frame_params();

    rt.request_backend(handle, "fsr31").unwrap();

    assert_eq!(rt.evaluate_feature(CMD, handle, &mut params), NgxResult::Success);
    assert_eq!(rt.switch_counter(handle), Some(1));
    assert_eq!(rt.backend_kind(handle), None);
    assert_eq!(rt.state().current_feature, None);
    assert_eq!(loader.log(Vendor::Xess).destroyed(), 1);

    assert_eq!(rt.evaluate_feature(CMD, handle, &mut params), NgxResult::Success);
    assert_eq!(rt.switch_counter(handle), Some(2));
    assert_eq!(rt.backend_kind(handle), None);
    assert_eq!(loader.log(Vendor::Ffx).created(), 0);

    assert_eq!(rt.evaluate_feature(CMD, handle, &mut params), NgxResult::Success);
    assert_eq!(rt.switch_counter(handle), Some(0));
    assert_eq!(rt.backend_kind(handle), Some(BackendKind::Fsr31));
    assert_eq!(rt.state().current_feature, Some(handle));
    assert!(!rt.state().change_backend(handle));
    assert!(rt.state().new_backend.is_empty());
    assert_eq!(rt.config().upscaler(GraphicsApi::Dx12), "fsr31");

    // no dispatch happened while switching
    assert_eq!(loader.log(Vendor::Ffx).dispatches(), 0);
    assert_eq!(rt.evaluate_feature(CMD, handle, &mut params), NgxResult::Success);
    assert_eq!(loader.log(Vendor::Ffx).dispatches(), 1);
}

#[test]
fn failed_init_rearms_towards_a_different_backend() {
    let loader = Arc::new(FakeLoader::all());
    let (mut rt, handle) = created(GraphicsApi::Dx12, &loader, config());
    let mut params = frame_params();

    loader.log(Vendor::Ffx).fail_create(true);
    rt.request_backend(handle, "fsr31").unwrap();
    evaluate_n(&mut rt, handle, &mut params, 3);

    // cycle ended; the failed instance is live but unusable
    assert_eq!(rt.switch_counter(handle), Some(0));
    let record = rt.registry().get(handle).unwrap();
    let live = record.feature.as_ref().unwrap();
    assert_eq!(live.kind(), BackendKind::Fsr31);
    assert!(!live.is_inited());
    assert!(rt.state().change_backend(handle));
    assert_eq!(rt.state().new_backend, "fsr21");

    loader.log(Vendor::Ffx).fail_create(false);
    evaluate_n(&mut rt, handle, &mut params, 3);
    assert_eq!(rt.backend_kind(handle), Some(BackendKind::Fsr21));
    assert!(!rt.state().change_backend(handle));
    assert_eq!(rt.evaluate_feature(CMD, handle, &mut params), NgxResult::Success);
}

#[test]
fn repeated_init_failures_never_retry_the_same_backend() {
    let loader = Arc::new(FakeLoader::all());
    let (mut rt, handle) = created(GraphicsApi::Dx11, &loader, config());
    let mut params = frame_params();

    loader.log(Vendor::Ffx).fail_create(true);
    rt.request_backend(handle, "fsr22").unwrap();

    let mut failed = BackendKind::Fsr22;
    for _ in 0..4 {
        evaluate_n(&mut rt, handle, &mut params, 3);
        assert_eq!(rt.backend_kind(handle), Some(failed));
        let next = rt.state().new_backend.clone();
        assert_ne!(next, failed.key());
        failed = next.parse().unwrap();
    }
}

#[test]
fn release_mid_switch_removes_the_context_immediately() {
    let loader = Arc::new(FakeLoader::all());
    let (mut rt, handle) = created(GraphicsApi::Vulkan, &loader, config());
    let mut params = frame_params();

    rt.request_backend(handle, "xess").unwrap();
    evaluate_n(&mut rt, handle, &mut params, 2);
    assert_eq!(rt.switch_counter(handle), Some(2));

    assert_eq!(rt.release_feature(handle), NgxResult::Success);
    assert!(!rt.registry().contains(handle));
    assert!(!rt.state().change_backend(handle));
    assert_eq!(
        rt.evaluate_feature(CMD, handle, &mut params),
        NgxResult::FeatureNotFound
    );
    // the replacement was never initialised, so there was nothing to destroy
    assert_eq!(loader.log(Vendor::Xess).destroyed(), 0);
}

#[test]
fn request_for_an_unknown_handle_is_refused() {
    let loader = Arc::new(FakeLoader::all());
    let (mut rt, _) = created(GraphicsApi::Vulkan, &loader, config());
    let stray = FeatureHandle::from_raw(1_999_998);

    assert_eq!(
        rt.request_backend(stray, "xess"),
        Err(RegistryError::NotFound(stray))
    );
}

#[test]
fn init_failure_at_create_switches_to_the_fallback() {
    let loader = Arc::new(FakeLoader::all());
    loader.log(Vendor::Xess).fail_create(true);
    let (mut rt, handle) = created(GraphicsApi::Dx12, &loader, config());

    assert_eq!(rt.backend_kind(handle), Some(BackendKind::Xess));
    assert!(rt.state().change_backend(handle));
    assert_eq!(rt.state().new_backend, "fsr21");

    evaluate_n(&mut rt, handle, &mut frame_params(), 3);
    assert_eq!(rt.backend_kind(handle), Some(BackendKind::Fsr21));
    assert_eq!(rt.config().upscaler(GraphicsApi::Dx12), "fsr21");
}

#[test]
fn empty_request_rebuilds_the_configured_backend() {
    let loader = Arc::new(FakeLoader::all());
    let (mut rt, handle) = created(GraphicsApi::Vulkan, &loader, config());

    rt.request_backend(handle, "").unwrap();
    evaluate_n(&mut rt, handle, &mut frame_params(), 3);

    assert_eq!(rt.backend_kind(handle), Some(BackendKind::Fsr21));
    assert_eq!(loader.log(Vendor::Ffx).created(), 2);
}

#[test]
fn disabled_dlss_request_means_the_configured_backend() {
    let loader = Arc::new(FakeLoader::all());
    let mut cfg = config();
    cfg.dlss_enabled.set(false);
    let (mut rt, handle) = created(GraphicsApi::Dx12, &loader, cfg);
    rt.state_mut().dlss_path = Some(PathBuf::from("nvngx_dlss.dll"));

    rt.request_backend(handle, "dlss").unwrap();
    evaluate_n(&mut rt, handle, &mut frame_params(), 3);

    assert_eq!(rt.backend_kind(handle), Some(BackendKind::Xess));
    assert_eq!(loader.log(Vendor::Ngx).loaded(), 0);
}

#[test]
fn scratch_params_leave_the_host_table_alone() {
    let loader = Arc::new(FakeLoader::all());
    let (mut rt, handle) = created(GraphicsApi::Dx12, &loader, config());

    let mut params = frame_params();
    params.set(keys::WIDTH, 999u32);
    rt.request_backend(handle, "fsr22").unwrap();

    rt.evaluate_feature(CMD, handle, &mut params);
    assert_eq!(params.get::<u32>(keys::WIDTH), Some(999));
    assert!(!params.is_scratch());

    evaluate_n(&mut rt, handle, &mut params, 2);
    let record = rt.registry().get(handle).unwrap();
    assert_eq!(record.feature.as_ref().unwrap().common().render_size(), (1280, 720));
}

#[test]
fn passthrough_target_is_built_from_the_host_table() {
    let loader = Arc::new(FakeLoader::all());
    let (mut rt, handle) = created(GraphicsApi::Dx12, &loader, config());
    rt.state_mut().dlss_path = Some(PathBuf::from("nvngx_dlss.dll"));

    let mut params = frame_params();
    params.set(keys::WIDTH, 999u32);
    rt.request_backend(handle, "dlss").unwrap();

    rt.evaluate_feature(CMD, handle, &mut params);
    // the live backend's shape was written into the host's own table
    assert_eq!(params.get::<u32>(keys::WIDTH), Some(1280));

    evaluate_n(&mut rt, handle, &mut params, 2);
    assert_eq!(rt.backend_kind(handle), Some(BackendKind::Dlss));
    assert_eq!(rt.config().upscaler(GraphicsApi::Dx12), "dlss");
    assert_eq!(params.get::<u32>(keys::WIDTH), Some(1280));

    assert_eq!(rt.evaluate_feature(CMD, handle, &mut params), NgxResult::Success);
    assert_eq!(loader.log(Vendor::Ngx).dispatches(), 1);
}

#[test]
fn passthrough_switch_builds_from_the_teardown_frame_table() {
    let loader = Arc::new(FakeLoader::all());
    let (mut rt, handle) = created(GraphicsApi::Dx12, &loader, config());
    rt.state_mut().dlss_path = Some(PathBuf::from("nvngx_dlss.dll"));
    rt.request_backend(handle, "dlss").unwrap();

    let mut teardown_frame = frame_params();
    rt.evaluate_feature(CMD, handle, &mut teardown_frame);
    assert_eq!(teardown_frame.get::<u32>(keys::WIDTH), Some(1280));

    // later frames hand over a table without any creation keys
    let mut later = ParameterTable::new();
    evaluate_n(&mut rt, handle, &mut later, 2);

    assert_eq!(rt.backend_kind(handle), Some(BackendKind::Dlss));
    let record = rt.registry().get(handle).unwrap();
    let live = record.feature.as_ref().unwrap();
    assert!(live.is_inited());
    assert_eq!(live.common().render_size(), (1280, 720));
    assert_eq!(live.common().display_size(), (2560, 1440));
    assert!(later.is_empty());
}

#[test]
fn fast_feature_reset_quirk_uses_the_short_settle_delay() {
    let loader = Arc::new(FakeLoader::all());
    let mut cfg = config();
    cfg.switch_timing.settle.set(Duration::from_secs(30));
    let (mut rt, handle) = created(GraphicsApi::Dx12, &loader, cfg);
    rt.state_mut().quirks |= GameQuirks::FAST_FEATURE_RESET;

    rt.request_backend(handle, "fsr31").unwrap();
    let started = Instant::now();
    evaluate_n(&mut rt, handle, &mut frame_params(), 3);

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(rt.backend_kind(handle), Some(BackendKind::Fsr31));
}

#[test]
fn delayed_d3d11_init_waits_after_the_replacement_init() {
    let loader = Arc::new(FakeLoader::all());
    let mut cfg = config();
    cfg.dx11_delayed_init.set(true);
    cfg.switch_timing.dx11_post_init.set(Duration::from_millis(30));
    let (mut rt, handle) = created(GraphicsApi::Dx11, &loader, cfg);
    let mut params = frame_params();

    rt.request_backend(handle, "fsr22").unwrap();
    evaluate_n(&mut rt, handle, &mut params, 2);

    let started = Instant::now();
    assert_eq!(rt.evaluate_feature(CMD, handle, &mut params), NgxResult::Success);
    assert!(started.elapsed() >= Duration::from_millis(30));
    assert_eq!(rt.backend_kind(handle), Some(BackendKind::Fsr22));
    assert!(!rt.state().change_backend(handle));
}

// ---------------------------------------------------------------------------
// Switch steps without a runtime
// ---------------------------------------------------------------------------

fn xess_record(loader: &FakeLoader, handle: FeatureHandle) -> ContextRecord {
    ContextRecord::new(Upscaler::build(
        BackendKind::Xess,
        GraphicsApi::Dx12,
        handle,
        &create_params(),
        loader,
        None,
    ))
}

#[test]
fn missing_live_backend_abandons_the_switch() {
    let loader = Arc::new(FakeLoader::all());
    let provider = FeatureProvider::new(GraphicsApi::Dx12, loader.clone());
    let mut cfg = config();
    let mut state = SessionState::new();
    let handle = FeatureHandle::allocate().unwrap();
    state.request_switch(handle, "fsr31");

    let mut record = ContextRecord {
        feature: None,
        phase: SwitchPhase::Idle,
    };
    let mut ctx = SwitchContext {
        provider: &provider,
        policy: &DefaultFallbackPolicy,
        cfg: &mut cfg,
        state: &mut state,
        device: DEVICE,
        command_list: CMD,
    };

    let outcome = advance(&mut record, handle, &mut frame_params(), &mut ctx);
    assert_eq!(outcome, SwitchOutcome::Handled);
    assert!(record.phase.is_idle());
    assert!(!state.change_backend(handle));
    assert!(state.new_backend.is_empty());
}

#[test]
fn failed_construction_stays_torn_down_and_retries() {
    let all = Arc::new(FakeLoader::all());
    let none = Arc::new(FakeLoader::empty());
    let working = FeatureProvider::new(GraphicsApi::Dx12, all.clone());
    let broken = FeatureProvider::new(GraphicsApi::Dx12, none.clone());

    let mut cfg = config();
    let mut state = SessionState::new();
    let handle = FeatureHandle::allocate().unwrap();
    let mut record = xess_record(&all, handle);
    let mut params = frame_params();
    state.request_switch(handle, "fsr22");

    let mut step = |record: &mut ContextRecord, provider: &FeatureProvider| {
        let mut ctx = SwitchContext {
            provider,
            policy: &DefaultFallbackPolicy,
            cfg: &mut cfg,
            state: &mut state,
            device: DEVICE,
            command_list: NativeHandle::from_addr(0xC1),
        };
        advance(record, handle, &mut params, &mut ctx)
    };

    assert_eq!(step(&mut record, &working), SwitchOutcome::Handled);
    assert_eq!(record.switch_counter(), 1);

    assert_eq!(step(&mut record, &broken), SwitchOutcome::Failed);
    assert_eq!(record.switch_counter(), 1);
    assert!(record.feature.is_none());

    assert_eq!(step(&mut record, &working), SwitchOutcome::Handled);
    assert_eq!(record.switch_counter(), 2);

    assert_eq!(step(&mut record, &working), SwitchOutcome::Handled);
    assert_eq!(record.switch_counter(), 0);
    assert_eq!(record.feature.as_ref().map(Upscaler::kind), Some(BackendKind::Fsr22));
    assert!(!state.change_backend(handle));
}

#[test]
fn advance_is_a_no_op_without_a_pending_switch() {
    let loader = Arc::new(FakeLoader::all());
    let provider = FeatureProvider::new(GraphicsApi::Dx12, loader.clone());
    let mut cfg = config();
    let mut state = SessionState::new();
    let handle = FeatureHandle::allocate().unwrap();
    let mut record = xess_record(&loader, handle);

    let mut ctx = SwitchContext {
        provider: &provider,
        policy: &DefaultFallbackPolicy,
        cfg: &mut cfg,
        state: &mut state,
        device: DEVICE,
        command_list: CMD,
    };
    assert_eq!(
        advance(&mut record, handle, &mut frame_params(), &mut ctx),
        SwitchOutcome::NotPending
    );
    assert!(record.feature.is_some());
}
