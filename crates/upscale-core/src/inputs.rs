//! Per-frame inputs read from the host's parameter table.
//!
//! Every backend needs the same handful of values (jitter, motion-vector
//! scale, camera planes, ...) before translating them into its own dispatch
//! layout. [`FrameInputs::read`] resolves them once, applying the config
//! fallbacks.

use std::time::Instant;

use tracing::{debug, warn};

use crate::config::Config;
use crate::parameters::{keys, ParameterTable};

pub const DEFAULT_VERTICAL_FOV_DEG: f32 = 60.0;

pub fn deg_to_rad(deg: f32) -> f32 {
    deg.to_radians()
}

/// `vFov = 2 * atan(tan(hFov / 2) * (h / w))`
pub fn vertical_fov_from_horizontal(h_fov_rad: f32, width: f32, height: f32) -> f32 {
    if width <= 0.0 {
        return 0.0;
    }
    2.0 * ((h_fov_rad * 0.5).tan() * (height / width)).atan()
}

/// `hFov = 2 * atan(tan(vFov / 2) * (w / h))`
pub fn horizontal_fov_from_vertical(v_fov_rad: f32, width: f32, height: f32) -> f32 {
    if height <= 0.0 {
        return 0.0;
    }
    2.0 * ((v_fov_rad * 0.5).tan() * (width / height)).atan()
}

/// Measures wall-clock time between dispatches for hosts that do not
/// report a frame delta.
#[derive(Debug)]
pub struct FrameClock {
    last: Option<Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Milliseconds since the previous call; `0.0` on the first call.
    pub fn tick(&mut self) -> f64 {
        let now = Instant::now();
        let delta = self
            .last
            .map(|prev| now.duration_since(prev).as_secs_f64() * 1000.0)
            .unwrap_or(0.0);
        self.last = Some(now);
        delta
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Static facts about the running feature the reader needs.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    pub render_size: (u32, u32),
    pub target_size: (u32, u32),
    pub depth_inverted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameInputs {
    pub jitter: (f32, f32),
    pub reset: bool,
    pub render_size: (u32, u32),
    pub upscale_size: (u32, u32),
    pub motion_vector_scale: (f32, f32),
    pub sharpness: f32,
    pub sharpening_enabled: bool,
    pub pre_exposure: f32,
    pub frame_time_delta_ms: f32,
    pub camera_near: f32,
    pub camera_far: f32,
    pub camera_fov_vertical: f32,
    pub view_space_to_meters: f32,
}

impl FrameInputs {
    pub fn read(
        params: &ParameterTable,
        cfg: &Config,
        frame: FrameContext,
        clock: &mut FrameClock,
    ) -> Self {
        let jitter = (
            params.get_or(keys::JITTER_OFFSET_X, 0.0f32),
            params.get_or(keys::JITTER_OFFSET_Y, 0.0f32),
        );
        debug!("Jitter Offset: {}x{}", jitter.0, jitter.1);

        let reset = params.get_or(keys::RESET, 0u32) == 1;

        let render_size = render_resolution(params, frame.render_size);
        debug!("Input Resolution: {}x{}", render_size.0, render_size.1);

        let motion_vector_scale = match (
            params.get::<f32>(keys::MV_SCALE_X),
            params.get::<f32>(keys::MV_SCALE_Y),
        ) {
            (Some(x), Some(y)) => (x, y),
            _ => {
                warn!("Can't get motion vector scales!");
                (1.0, 1.0)
            }
        };

        let (sharpness, sharpening_enabled) = resolve_sharpness(params, cfg);

        let pre_exposure = params.get_or(keys::PRE_EXPOSURE, 1.0f32);

        let use_fsr = cfg.fsr.use_fsr_input_values.value_or_default();
        let fsr_value = |key: &str| -> Option<f32> {
            if use_fsr {
                params.get::<f32>(key)
            } else {
                None
            }
        };

        let frame_time_delta_ms = fsr_value(keys::FSR_FRAME_TIME_DELTA)
            .or_else(|| {
                params
                    .get::<f32>(keys::FRAME_TIME_DELTA_MS)
                    .filter(|delta| *delta >= 1.0)
            })
            .unwrap_or_else(|| clock.tick() as f32);

        let (cfg_near, cfg_far) = if frame.depth_inverted {
            (
                cfg.fsr.camera_far.value_or_default(),
                cfg.fsr.camera_near.value_or_default(),
            )
        } else {
            (
                cfg.fsr.camera_near.value_or_default(),
                cfg.fsr.camera_far.value_or_default(),
            )
        };
        let camera_near = fsr_value(keys::FSR_NEAR_PLANE).unwrap_or(cfg_near);
        let camera_far = fsr_value(keys::FSR_FAR_PLANE).unwrap_or(cfg_far);

        let camera_fov_vertical = fsr_value(keys::FSR_CAMERA_FOV_VERTICAL)
            .unwrap_or_else(|| configured_vertical_fov(cfg, frame.target_size));

        let view_space_to_meters = fsr_value(keys::FSR_VIEW_SPACE_TO_METERS).unwrap_or(0.0);

        Self {
            jitter,
            reset,
            render_size,
            upscale_size: frame.target_size,
            motion_vector_scale,
            sharpness,
            sharpening_enabled,
            pre_exposure,
            frame_time_delta_ms,
            camera_near,
            camera_far,
            camera_fov_vertical,
            view_space_to_meters,
        }
    }
}

/// Render size for this frame: the subrect when the host sets one, else the
/// plain width/height keys, else what the feature was created with.
pub fn render_resolution(params: &ParameterTable, fallback: (u32, u32)) -> (u32, u32) {
    let subrect = (
        params.get::<u32>(keys::RENDER_SUBRECT_WIDTH),
        params.get::<u32>(keys::RENDER_SUBRECT_HEIGHT),
    );
    if let (Some(w), Some(h)) = subrect {
        if w > 0 && h > 0 {
            return (w, h);
        }
    }

    match (
        params.get::<u32>(keys::WIDTH),
        params.get::<u32>(keys::HEIGHT),
    ) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => fallback,
    }
}

fn resolve_sharpness(params: &ParameterTable, cfg: &Config) -> (f32, bool) {
    if cfg.rcas_enabled.value_or_default() {
        return (0.0, false);
    }

    let requested = if cfg.override_sharpness.value_or_default() {
        cfg.sharpness.value_or_default()
    } else {
        params.get_or(keys::SHARPNESS, 0.0f32)
    };
    let sharpness = requested.min(1.0);

    (sharpness, sharpness > 0.0)
}

fn configured_vertical_fov(cfg: &Config, target: (u32, u32)) -> f32 {
    if let Some(v_fov) = cfg.fsr.vertical_fov {
        return deg_to_rad(v_fov);
    }

    let h_fov = cfg.fsr.horizontal_fov.value_or_default();
    if h_fov > 0.0 {
        return vertical_fov_from_horizontal(deg_to_rad(h_fov), target.0 as f32, target.1 as f32);
    }

    deg_to_rad(DEFAULT_VERTICAL_FOV_DEG)
}
