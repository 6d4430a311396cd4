//! Read-mostly user policy.
//!
//! Every setting resolves to a default when unset. Loading these from disk is
//! the host's job; the core only reads them, plus records the effective
//! backend name per graphics API after each construction.

use std::time::Duration;

use crate::backend::{BackendKind, GraphicsApi};

/// A setting with an optional user value and a fixed default.
#[derive(Debug, Clone, PartialEq)]
pub struct Setting<T> {
    value: Option<T>,
    default: T,
}

impl<T: Clone> Setting<T> {
    pub const fn new(default: T) -> Self {
        Self {
            value: None,
            default,
        }
    }

    pub fn value_or_default(&self) -> T {
        self.value.clone().unwrap_or_else(|| self.default.clone())
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<T> {
        self.value.clone()
    }

    pub fn set(&mut self, value: T) {
        self.value = Some(value);
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

/// A setting with no meaningful default; unset means "leave alone".
pub type Override<T> = Option<T>;

/// Per-input resource state overrides, applied as barriers around dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceStateOverrides {
    pub color: Override<u32>,
    pub motion_vectors: Override<u32>,
    pub depth: Override<u32>,
    pub exposure: Override<u32>,
    pub mask: Override<u32>,
    pub output: Override<u32>,
}

/// FSR-specific tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct FsrSettings {
    pub camera_near: Setting<f32>,
    pub camera_far: Setting<f32>,
    pub vertical_fov: Override<f32>,
    pub horizontal_fov: Setting<f32>,
    /// Prefer the host's `FSR.*` keys over config values when present.
    pub use_fsr_input_values: Setting<bool>,
    pub velocity: Setting<f32>,
}

impl Default for FsrSettings {
    fn default() -> Self {
        Self {
            camera_near: Setting::new(0.1),
            camera_far: Setting::new(100_000.0),
            vertical_fov: None,
            horizontal_fov: Setting::new(0.0),
            use_fsr_input_values: Setting::new(true),
            velocity: Setting::new(1.0),
        }
    }
}

/// Delays applied while a backend switch is in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchTiming {
    /// Wait before destroying the old backend.
    pub settle: Setting<Duration>,
    /// Same wait for titles flagged with the fast-feature-reset quirk.
    pub fast_settle: Setting<Duration>,
    /// Extra wait after a D3D11 init, when `dx11_delayed_init` is on.
    pub dx11_post_init: Setting<Duration>,
}

impl Default for SwitchTiming {
    fn default() -> Self {
        Self {
            settle: Setting::new(Duration::from_millis(1000)),
            fast_settle: Setting::new(Duration::from_millis(100)),
            dx11_post_init: Setting::new(Duration::from_millis(1000)),
        }
    }
}

impl SwitchTiming {
    /// No delays at all; for tests and headless hosts.
    pub fn immediate() -> Self {
        let mut timing = Self::default();
        timing.settle.set(Duration::ZERO);
        timing.fast_settle.set(Duration::ZERO);
        timing.dx11_post_init.set(Duration::ZERO);
        timing
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub dlss_enabled: Setting<bool>,
    pub dx11_upscaler: Setting<String>,
    pub dx12_upscaler: Setting<String>,
    pub vulkan_upscaler: Setting<String>,
    pub dx11_delayed_init: Setting<bool>,
    pub restore_compute_signature: Setting<bool>,
    pub restore_graphic_signature: Setting<bool>,
    pub skip_first_frames: Override<u32>,
    pub override_sharpness: Setting<bool>,
    pub sharpness: Setting<f32>,
    pub rcas_enabled: Setting<bool>,
    pub resource_states: ResourceStateOverrides,
    pub fsr: FsrSettings,
    pub switch_timing: SwitchTiming,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dlss_enabled: Setting::new(true),
            dx11_upscaler: Setting::new(BackendKind::Fsr22.key().to_string()),
            dx12_upscaler: Setting::new(BackendKind::Xess.key().to_string()),
            vulkan_upscaler: Setting::new(BackendKind::Fsr21.key().to_string()),
            dx11_delayed_init: Setting::new(false),
            restore_compute_signature: Setting::new(false),
            restore_graphic_signature: Setting::new(false),
            skip_first_frames: None,
            override_sharpness: Setting::new(false),
            sharpness: Setting::new(0.3),
            rcas_enabled: Setting::new(false),
            resource_states: ResourceStateOverrides::default(),
            fsr: FsrSettings::default(),
            switch_timing: SwitchTiming::default(),
        }
    }
}

impl Config {
    fn upscaler_setting(&self, api: GraphicsApi) -> &Setting<String> {
        match api {
            GraphicsApi::Dx11 => &self.dx11_upscaler,
            GraphicsApi::Dx12 => &self.dx12_upscaler,
            GraphicsApi::Vulkan => &self.vulkan_upscaler,
        }
    }

    /// Backend name configured (or last recorded) for `api`.
    pub fn upscaler(&self, api: GraphicsApi) -> String {
        self.upscaler_setting(api).value_or_default()
    }

    /// Record the backend that is actually running on `api`.
    pub fn set_upscaler(&mut self, api: GraphicsApi, name: &str) {
        let setting = match api {
            GraphicsApi::Dx11 => &mut self.dx11_upscaler,
            GraphicsApi::Dx12 => &mut self.dx12_upscaler,
            GraphicsApi::Vulkan => &mut self.vulkan_upscaler,
        };
        setting.set(name.to_string());
    }

    pub fn restores_root_signatures(&self) -> bool {
        self.restore_compute_signature.value_or_default()
            || self.restore_graphic_signature.value_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_fall_back_to_default_until_set() {
        let mut s = Setting::new(5u32);
        assert_eq!(s.value_or_default(), 5);
        assert!(!s.has_value());

        s.set(9);
        assert_eq!(s.value_or_default(), 9);

        s.reset();
        assert_eq!(s.value(), None);
    }

    #[test]
    fn upscaler_names_are_tracked_per_api() {
        let mut cfg = Config::default();
        cfg.set_upscaler(GraphicsApi::Vulkan, "xess");

        assert_eq!(cfg.upscaler(GraphicsApi::Vulkan), "xess");
        assert_eq!(cfg.upscaler(GraphicsApi::Dx12), "xess");
        assert_eq!(cfg.upscaler(GraphicsApi::Dx11), "fsr22");
    }

    #[test]
    fn immediate_timing_has_no_delays() {
        let timing = SwitchTiming::immediate();
        assert_eq!(timing.settle.value_or_default(), Duration::ZERO);
        assert_eq!(timing.fast_settle.value_or_default(), Duration::ZERO);
    }
}
