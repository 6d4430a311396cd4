//! Three-phase backend switch.
//!
//! A switch spreads over three consecutive evaluate calls so the old backend
//! is never destroyed while the GPU may still be reading its resources, and
//! so no single frame pays for teardown, construction and initialisation:
//!
//! 1. teardown: snapshot the live backend's shape, wait, drop it
//! 2. construct: build the replacement from the snapshot
//! 3. init: initialise the replacement and make it live
//!
//! A failed init leaves the failed instance live (uninitialised) and re-arms
//! the switch towards a different backend chosen by a [`FallbackPolicy`].

use std::thread;
use std::time::Duration;

use tracing::{debug, error, info};

use upscale_backends::{UpscaleFeature, Upscaler};
use upscale_core::{
    BackendKind, Config, FeatureHandle, GraphicsApi, NativeHandle, ParameterTable, SessionState,
};

use crate::provider::{fallback_for, FeatureProvider};
use crate::registry::ContextRecord;

/// Creation parameters cached for the replacement, by origin.
#[derive(Debug)]
pub enum CreateParams {
    /// A table the core built from scratch; tagged with the scratch marker.
    Scratch(ParameterTable),
    /// Copy of the host's table from the teardown frame, taken after the
    /// snapshot was written into it. Passthrough backends need the vendor
    /// keys the host put there.
    Host(ParameterTable),
}

impl CreateParams {
    fn table_mut(&mut self) -> &mut ParameterTable {
        match self {
            CreateParams::Scratch(table) | CreateParams::Host(table) => table,
        }
    }
}

/// Switch progress for one context.
#[derive(Default)]
pub enum SwitchPhase {
    #[default]
    Idle,
    /// The old backend is gone; creation parameters are cached.
    TornDown { params: CreateParams },
    /// The replacement exists but is neither live nor initialised.
    Constructed {
        params: CreateParams,
        replacement: Upscaler,
    },
}

impl SwitchPhase {
    /// 0 while idle, 1 after teardown, 2 after construction.
    pub fn counter(&self) -> u8 {
        match self {
            SwitchPhase::Idle => 0,
            SwitchPhase::TornDown { .. } => 1,
            SwitchPhase::Constructed { .. } => 2,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SwitchPhase::Idle)
    }
}

/// Result of one [`advance`] step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// No switch was pending.
    NotPending,
    /// The step ran; the frame was consumed by the switch.
    Handled,
    /// The replacement could not be built; retried next frame.
    Failed,
}

/// Chooses what to switch to after a backend failed to initialise.
pub trait FallbackPolicy: Send {
    /// Must never return `failed`.
    fn next_backend(&self, api: GraphicsApi, failed: BackendKind, cfg: &Config) -> BackendKind;
}

/// A passthrough backend that failed falls back to XeSS, then the API's
/// fallback; anything else falls back to the API's fallback, then the other
/// FSR 2 generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFallbackPolicy;

impl FallbackPolicy for DefaultFallbackPolicy {
    fn next_backend(&self, api: GraphicsApi, failed: BackendKind, _cfg: &Config) -> BackendKind {
        let primary = fallback_for(api);
        let secondary = match primary {
            BackendKind::Fsr21 => BackendKind::Fsr22,
            _ => BackendKind::Fsr21,
        };

        let candidates = if failed.is_passthrough() {
            [BackendKind::Xess, primary]
        } else {
            [primary, secondary]
        };

        candidates
            .into_iter()
            .find(|kind| *kind != failed)
            .unwrap_or(secondary)
    }
}

/// Collaborators a switch step needs besides the record itself.
pub struct SwitchContext<'a> {
    pub provider: &'a FeatureProvider,
    pub policy: &'a dyn FallbackPolicy,
    pub cfg: &'a mut Config,
    pub state: &'a mut SessionState,
    pub device: NativeHandle,
    pub command_list: NativeHandle,
}

/// Run the next phase of a pending switch on `record`.
pub fn advance(
    record: &mut ContextRecord,
    handle: FeatureHandle,
    host_params: &mut ParameterTable,
    ctx: &mut SwitchContext<'_>,
) -> SwitchOutcome {
    if !ctx.state.change_backend(handle) {
        return SwitchOutcome::NotPending;
    }

    match std::mem::take(&mut record.phase) {
        SwitchPhase::Idle => {
            resolve_requested_backend(ctx);
            info!(
                "changeBackend is true for {}, counter: 1, target: {}",
                handle, ctx.state.new_backend
            );
            teardown(record, handle, host_params, ctx)
        }
        SwitchPhase::TornDown { params } => {
            info!("changeBackend is true for {}, counter: 2", handle);
            construct(record, handle, params, ctx)
        }
        SwitchPhase::Constructed {
            params,
            replacement,
        } => {
            info!("changeBackend is true for {}, counter: 3", handle);
            finish(record, handle, params, replacement, ctx)
        }
    }
}

/// An empty request, or DLSS while it is disabled, means "whatever is
/// configured for this API".
fn resolve_requested_backend(ctx: &mut SwitchContext<'_>) {
    let enabling_disabled_dlss =
        !ctx.cfg.dlss_enabled.value_or_default() && ctx.state.new_backend == BackendKind::Dlss.key();

    if ctx.state.new_backend.is_empty() || enabling_disabled_dlss {
        ctx.state.new_backend = ctx.cfg.upscaler(ctx.provider.api());
    }
}

/// Wait between snapshotting the old backend and dropping it.
pub fn settle_delay(cfg: &Config, state: &SessionState) -> Duration {
    let timing = &cfg.switch_timing;
    if state.fast_feature_reset() {
        timing.fast_settle.value_or_default()
    } else {
        timing.settle.value_or_default()
    }
}

/// Extra wait after initialising a replacement, D3D11 only.
pub fn post_init_delay(api: GraphicsApi, cfg: &Config) -> Option<Duration> {
    (api == GraphicsApi::Dx11 && cfg.dx11_delayed_init.value_or_default())
        .then(|| cfg.switch_timing.dx11_post_init.value_or_default())
}

fn teardown(
    record: &mut ContextRecord,
    handle: FeatureHandle,
    host_params: &mut ParameterTable,
    ctx: &mut SwitchContext<'_>,
) -> SwitchOutcome {
    let Some(live) = record.feature.take() else {
        error!("can't find a live backend for {}", handle);
        ctx.state.clear_switch(handle);
        record.phase = SwitchPhase::Idle;
        return SwitchOutcome::Handled;
    };

    info!("changing backend of {} to {}", handle, ctx.state.new_backend);

    let passthrough = ctx
        .state
        .new_backend
        .parse::<BackendKind>()
        .map(BackendKind::is_passthrough)
        .unwrap_or(false);

    let params = if passthrough {
        live.common().snapshot_into(host_params);
        CreateParams::Host(host_params.clone())
    } else {
        let mut table = ParameterTable::scratch();
        live.common().snapshot_into(&mut table);
        CreateParams::Scratch(table)
    };

    let delay = settle_delay(ctx.cfg, ctx.state);
    debug!("sleeping {:?} before releasing the current backend", delay);
    if !delay.is_zero() {
        thread::sleep(delay);
    }

    drop(live);
    if ctx.state.current_feature == Some(handle) {
        ctx.state.current_feature = None;
    }

    record.phase = SwitchPhase::TornDown { params };
    SwitchOutcome::Handled
}

fn construct(
    record: &mut ContextRecord,
    handle: FeatureHandle,
    mut params: CreateParams,
    ctx: &mut SwitchContext<'_>,
) -> SwitchOutcome {
    let name = ctx.state.new_backend.clone();
    let (replacement, loaded) =
        ctx.provider
            .change_feature(&name, handle, params.table_mut(), &mut *ctx.cfg, &*ctx.state);

    if !loaded {
        error!("{} upscaler can't be created for {}", name, handle);
        record.phase = SwitchPhase::TornDown { params };
        return SwitchOutcome::Failed;
    }

    record.phase = SwitchPhase::Constructed {
        params,
        replacement,
    };
    SwitchOutcome::Handled
}

fn finish(
    record: &mut ContextRecord,
    handle: FeatureHandle,
    mut params: CreateParams,
    mut replacement: Upscaler,
    ctx: &mut SwitchContext<'_>,
) -> SwitchOutcome {
    let init = replacement.init(ctx.device, ctx.command_list, params.table_mut());

    if let Some(delay) = post_init_delay(ctx.provider.api(), ctx.cfg) {
        debug!("sleeping {:?} after D3D11 init", delay);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    match init {
        Ok(()) => {
            info!(
                "init successful for {}, upscaler of {} changed",
                replacement.kind(),
                handle
            );
            ctx.state.clear_switch(handle);
        }
        Err(err) => {
            let failed = replacement.kind();
            let next = ctx
                .policy
                .next_backend(ctx.provider.api(), failed, &*ctx.cfg);
            error!("init failed with {}: {:#}, trying {}", failed, err, next);
            ctx.state.request_switch(handle, next.key());
        }
    }

    record.feature = Some(replacement);

    match params {
        CreateParams::Scratch(table) => {
            debug_assert!(table.is_scratch());
            debug!("releasing scratch create params of {}", handle);
        }
        CreateParams::Host(_) => debug!("releasing host create params of {}", handle),
    }

    ctx.state.current_feature = Some(handle);
    record.phase = SwitchPhase::Idle;
    SwitchOutcome::Handled
}
