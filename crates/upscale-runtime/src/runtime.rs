//! Host-facing create / evaluate / release for one graphics API.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use upscale_backends::{
    CommandRecorder, FeatureError, ModuleLoader, OverrideBarriers, RootSignatureCache,
    UpscaleFeature,
};
use upscale_core::state::{is_shutting_down, set_shutting_down};
use upscale_core::{
    BackendKind, Config, FeatureHandle, FeatureId, GraphicsApi, HandleOrigin, NativeHandle,
    NgxResult, ParameterTable, SessionState,
};

use crate::provider::FeatureProvider;
use crate::registry::{ContextRecord, ContextRegistry, RegistryError};
use crate::switch::{self, DefaultFallbackPolicy, FallbackPolicy, SwitchContext, SwitchOutcome};

/// Owner of handles the core does not manage: the vendor's own runtime for
/// native handles, or a frame-generation module.
pub trait PassthroughOwner: Send {
    fn create(
        &mut self,
        command_list: NativeHandle,
        feature: FeatureId,
        params: &mut ParameterTable,
    ) -> Result<FeatureHandle, NgxResult>;

    fn evaluate(
        &mut self,
        command_list: NativeHandle,
        handle: FeatureHandle,
        params: &mut ParameterTable,
    ) -> NgxResult;

    fn release(&mut self, handle: FeatureHandle) -> NgxResult;
}

/// Everything one graphics API's entry points share.
pub struct Runtime {
    provider: FeatureProvider,
    registry: ContextRegistry,
    config: Config,
    state: SessionState,
    policy: Box<dyn FallbackPolicy>,
    native: Option<Box<dyn PassthroughOwner>>,
    frame_gen: Option<Box<dyn PassthroughOwner>>,
    recorder: Option<Box<dyn CommandRecorder>>,
    root_signatures: Arc<RootSignatureCache>,
    device: NativeHandle,
}

impl Runtime {
    pub fn new(api: GraphicsApi, loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            provider: FeatureProvider::new(api, loader),
            registry: ContextRegistry::new(),
            config: Config::default(),
            state: SessionState::new(),
            policy: Box::new(DefaultFallbackPolicy),
            native: None,
            frame_gen: None,
            recorder: None,
            root_signatures: Arc::new(RootSignatureCache::new()),
            device: NativeHandle::NULL,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_state(mut self, state: SessionState) -> Self {
        self.state = state;
        self
    }

    pub fn with_policy(mut self, policy: Box<dyn FallbackPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_native_passthrough(mut self, owner: Box<dyn PassthroughOwner>) -> Self {
        self.native = Some(owner);
        self
    }

    pub fn with_frame_gen(mut self, owner: Box<dyn PassthroughOwner>) -> Self {
        self.frame_gen = Some(owner);
        self
    }

    /// Records barriers and root signatures on the host's command lists.
    pub fn with_recorder(mut self, recorder: Box<dyn CommandRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Share a cache the host's command-list hooks already write into.
    pub fn with_root_signatures(mut self, cache: Arc<RootSignatureCache>) -> Self {
        self.root_signatures = cache;
        self
    }

    pub fn with_device(mut self, device: NativeHandle) -> Self {
        self.device = device;
        self
    }

    // =====================================================================
    // Accessors
    // =====================================================================

    pub fn api(&self) -> GraphicsApi {
        self.provider.api()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    pub fn root_signatures(&self) -> Arc<RootSignatureCache> {
        Arc::clone(&self.root_signatures)
    }

    /// Kind of the live backend of `handle`, if it has one right now.
    pub fn backend_kind(&self, handle: FeatureHandle) -> Option<BackendKind> {
        self.registry
            .get(handle)
            .and_then(|record| record.feature.as_ref())
            .map(|feature| feature.kind())
    }

    /// 0 while idle, 1 or 2 in the middle of a switch.
    pub fn switch_counter(&self, handle: FeatureHandle) -> Option<u8> {
        self.registry.get(handle).map(ContextRecord::switch_counter)
    }

    // =====================================================================
    // Entry points
    // =====================================================================

    pub fn create_feature(
        &mut self,
        device: NativeHandle,
        command_list: NativeHandle,
        feature: FeatureId,
        params: &mut ParameterTable,
    ) -> Result<FeatureHandle, NgxResult> {
        if command_list.is_null() {
            error!("create_feature: command list is null");
            return Err(NgxResult::Fail);
        }
        if !device.is_null() {
            self.device = device;
        }

        if !feature.is_upscaling() {
            return self.create_passthrough(command_list, feature, params);
        }

        if self.device.is_null() {
            error!("create_feature: no device to create {:?} on", feature);
            return Err(NgxResult::Fail);
        }

        let Some(handle) = FeatureHandle::allocate() else {
            error!("create_feature: no core handles left");
            return Err(NgxResult::Fail);
        };
        let name = match feature {
            FeatureId::RayReconstruction => BackendKind::Dlssd.key().to_string(),
            _ => self.config.upscaler(self.api()),
        };
        info!("Creating {} feature for {}, handle {}", name, self.api(), handle);

        let (mut upscaler, loaded) =
            self.provider
                .get_feature(&name, handle, params, &mut self.config, &self.state);
        if !loaded {
            error!("no backend could be built for {}", name);
            return Err(NgxResult::Fail);
        }

        match upscaler.init(self.device, command_list, params) {
            Ok(()) => {
                self.state.current_feature = Some(handle);
                self.state.eval_counter = 0;
            }
            Err(err) => {
                let failed = upscaler.kind();
                let fallback = self.provider.fallback();
                let next = if failed == fallback {
                    self.policy.next_backend(self.api(), failed, &self.config)
                } else {
                    fallback
                };
                error!("{} init failed: {:#}, falling back to {}", failed, err, next);
                self.state.request_switch(handle, next.key());
            }
        }

        if self.config.restores_root_signatures() {
            self.restore_root_signatures(command_list);
        }

        self.registry.create(handle, upscaler).map_err(|err| {
            error!("{}", err);
            NgxResult::Fail
        })?;
        Ok(handle)
    }

    pub fn evaluate_feature(
        &mut self,
        command_list: NativeHandle,
        handle: FeatureHandle,
        params: &mut ParameterTable,
    ) -> NgxResult {
        if command_list.is_null() {
            error!("evaluate_feature: command list is null");
            return NgxResult::Fail;
        }
        debug!("evaluate {} on {:?}", handle, command_list);

        match handle.origin() {
            HandleOrigin::Native => match self.native_passthrough() {
                Some(native) => native.evaluate(command_list, handle, params),
                None => {
                    debug!("no native runtime to evaluate {}", handle);
                    NgxResult::FeatureNotFound
                }
            },
            HandleOrigin::FrameGen => match self.frame_gen.as_mut() {
                Some(frame_gen) => frame_gen.evaluate(command_list, handle, params),
                None => NgxResult::FeatureNotFound,
            },
            HandleOrigin::Core => self.evaluate_core(command_list, handle, params),
        }
    }

    pub fn release_feature(&mut self, handle: FeatureHandle) -> NgxResult {
        let shutting_down = is_shutting_down();
        if !shutting_down {
            info!("releasing feature with id {}", handle);
        }

        match handle.origin() {
            HandleOrigin::Native => match self.native_passthrough() {
                Some(native) => native.release(handle),
                None => NgxResult::FeatureNotFound,
            },
            HandleOrigin::FrameGen => match self.frame_gen.as_mut() {
                Some(frame_gen) => frame_gen.release(handle),
                None => NgxResult::FeatureNotFound,
            },
            HandleOrigin::Core => match self.registry.release(handle, &mut self.state) {
                Ok(true) => NgxResult::Success,
                Ok(false) => {
                    if !shutting_down {
                        error!("can't release feature with id {}", handle);
                    }
                    NgxResult::Success
                }
                Err(err) => {
                    error!("{}", err);
                    NgxResult::Fail
                }
            },
        }
    }

    /// Switch `handle` to the backend named `name` on its next evaluates.
    /// An empty name means the configured backend.
    pub fn request_backend(&mut self, handle: FeatureHandle, name: &str) -> Result<(), RegistryError> {
        if !self.registry.contains(handle) {
            return Err(RegistryError::NotFound(handle));
        }
        info!("backend change to '{}' requested for {}", name, handle);
        self.state.request_switch(handle, name);
        Ok(())
    }

    /// Mark the process as going down and drop every context. Backends
    /// skip their native cleanup from here on.
    pub fn shutdown(&mut self) {
        set_shutting_down(true);
        self.registry.clear();
        self.state.current_feature = None;
    }

    // =====================================================================
    // Internals
    // =====================================================================

    fn native_passthrough(&mut self) -> Option<&mut Box<dyn PassthroughOwner>> {
        if !self.config.dlss_enabled.value_or_default() {
            return None;
        }
        self.native.as_mut()
    }

    fn create_passthrough(
        &mut self,
        command_list: NativeHandle,
        feature: FeatureId,
        params: &mut ParameterTable,
    ) -> Result<FeatureHandle, NgxResult> {
        if feature == FeatureId::FrameGeneration {
            if let Some(frame_gen) = self.frame_gen.as_mut() {
                info!("passing {:?} creation to the frame-generation owner", feature);
                return frame_gen.create(command_list, feature, params);
            }
        }

        match self.native_passthrough() {
            Some(native) => {
                info!("passing {:?} creation to the native runtime", feature);
                native.create(command_list, feature, params)
            }
            None => {
                warn!("no passthrough available for {:?}", feature);
                Err(NgxResult::FeatureNotSupported)
            }
        }
    }

    fn evaluate_core(
        &mut self,
        command_list: NativeHandle,
        handle: FeatureHandle,
        params: &mut ParameterTable,
    ) -> NgxResult {
        let api = self.provider.api();
        let Some(record) = self.registry.get_mut(handle) else {
            warn!("No context found for handle {}", handle);
            return NgxResult::FeatureNotFound;
        };

        self.state.eval_counter += 1;
        self.state.frame_counter += 1;

        if let Some(skip) = self.config.skip_first_frames {
            if self.state.eval_counter < skip {
                return NgxResult::Success;
            }
        }

        if let Some(feature) = record.feature.as_mut() {
            if !feature.descriptor().resizes_without_recreate()
                && feature.update_output_resolution(params)
            {
                self.state.set_change_backend(handle, true);
            }
        }

        if self.state.change_backend(handle) {
            let mut ctx = SwitchContext {
                provider: &self.provider,
                policy: self.policy.as_ref(),
                cfg: &mut self.config,
                state: &mut self.state,
                device: self.device,
                command_list,
            };
            let outcome = switch::advance(record, handle, params, &mut ctx);
            self.state.eval_counter = 0;
            return match outcome {
                SwitchOutcome::Failed => NgxResult::Fail,
                SwitchOutcome::Handled | SwitchOutcome::NotPending => NgxResult::Success,
            };
        }

        let Some(feature) = record.feature.as_mut() else {
            error!("{} has no live backend", handle);
            return NgxResult::Fail;
        };

        if !feature.is_inited() {
            let fallback = self.provider.fallback();
            if self.config.upscaler(api) != fallback.key() {
                warn!(
                    "{} failed to initialize, falling back to {}",
                    feature.name(),
                    fallback
                );
                self.state.request_switch(handle, fallback.key());
                return NgxResult::Success;
            }
        }

        self.state.current_feature = Some(handle);

        let restore = feature.kind() != BackendKind::Dlssd && self.config.restores_root_signatures();
        let barriers = OverrideBarriers::collect(params, &self.config.resource_states);

        if let Some(recorder) = self.recorder.as_deref_mut() {
            barriers.enter(recorder, command_list);
        }

        let result = feature.evaluate(command_list, params, &self.config);

        if let Some(recorder) = self.recorder.as_deref_mut() {
            barriers.leave(&mut *recorder, command_list);
            if restore {
                self.root_signatures.restore(
                    recorder,
                    command_list,
                    self.config.restore_compute_signature.value_or_default(),
                    self.config.restore_graphic_signature.value_or_default(),
                );
            }
        }

        match result {
            Ok(()) => NgxResult::Success,
            Err(err) => {
                error!("Feature evaluation failed for '{}': {}", feature.name(), err);
                if err.needs_rebuild() {
                    info!("rebuilding {} for {}", feature.kind(), handle);
                    self.state.request_switch(handle, feature.kind().key());
                }
                match err {
                    FeatureError::NeedsRecreate => NgxResult::Success,
                    _ => NgxResult::Fail,
                }
            }
        }
    }

    fn restore_root_signatures(&mut self, command_list: NativeHandle) {
        let Some(recorder) = self.recorder.as_deref_mut() else {
            return;
        };
        self.root_signatures.restore(
            recorder,
            command_list,
            self.config.restore_compute_signature.value_or_default(),
            self.config.restore_graphic_signature.value_or_default(),
        );
    }
}
