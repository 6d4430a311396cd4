//! Hardcoded host-protocol constants: result codes, feature ids, quality
//! presets and handle ranges.
//!
//! Values match the vendor SDK headers the host was built against, so they
//! can be returned across the C boundary unchanged.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

// =====================================================================
// Handle ranges
// =====================================================================

/// First handle id owned by this crate. Anything below belongs to the
/// native vendor runtime.
pub const CORE_HANDLE_OFFSET: u32 = 1_000_000;

/// First handle id owned by the frame-generation passthrough.
pub const FRAME_GEN_HANDLE_OFFSET: u32 = 2_000_000;

// =====================================================================
// Result codes
// =====================================================================

const FAIL: u32 = 0xBAD0_0000;

/// Result code returned to the host for every entry point.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum NgxResult {
    Success = 0x1,
    Fail = FAIL,
    FeatureNotSupported = FAIL | 1,
    PlatformError = FAIL | 2,
    FeatureAlreadyExists = FAIL | 3,
    FeatureNotFound = FAIL | 4,
    InvalidParameter = FAIL | 5,
    NotInitialized = FAIL | 7,
    UnableToInitializeFeature = FAIL | 11,
    UnsupportedParameter = FAIL | 16,
}

impl NgxResult {
    pub fn is_success(self) -> bool {
        self == NgxResult::Success
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    /// Decode a raw code. Unknown failure codes collapse to [`NgxResult::Fail`].
    pub fn from_code(code: u32) -> Self {
        NgxResult::from_u32(code).unwrap_or(NgxResult::Fail)
    }
}

// =====================================================================
// Feature ids
// =====================================================================

/// Feature kinds a host may ask to create.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum FeatureId {
    Reserved0 = 0,
    SuperSampling = 1,
    InPainting = 2,
    ImageSuperResolution = 3,
    SlowMotion = 4,
    VideoSuperResolution = 5,
    ImageSignalProcessing = 9,
    DeepResolve = 10,
    FrameGeneration = 11,
    DeepDvc = 12,
    RayReconstruction = 13,
}

impl FeatureId {
    pub fn from_code(code: u32) -> Option<Self> {
        FeatureId::from_u32(code)
    }

    /// Features handled by the upscaler core; everything else is passed
    /// through to the native runtime.
    pub fn is_upscaling(self) -> bool {
        matches!(self, FeatureId::SuperSampling | FeatureId::RayReconstruction)
    }
}

// =====================================================================
// Quality presets
// =====================================================================

/// Performance/quality preset, as carried by the `PerfQualityValue` key.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
pub enum PerfQuality {
    MaxPerf = 0,
    #[default]
    Balanced = 1,
    MaxQuality = 2,
    UltraPerformance = 3,
    UltraQuality = 4,
    Dlaa = 5,
}

impl PerfQuality {
    pub fn from_value(value: u32) -> Self {
        PerfQuality::from_u32(value).unwrap_or_default()
    }

    /// Render-to-output ratio for this preset.
    pub fn scale_factor(self) -> f32 {
        match self {
            PerfQuality::UltraPerformance => 3.0,
            PerfQuality::MaxPerf => 2.0,
            PerfQuality::Balanced => 1.7,
            PerfQuality::MaxQuality => 1.5,
            PerfQuality::UltraQuality => 1.3,
            PerfQuality::Dlaa => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codes_collapse_to_fail() {
        assert_eq!(NgxResult::from_code(0x1), NgxResult::Success);
        assert_eq!(NgxResult::from_code(FAIL | 4), NgxResult::FeatureNotFound);
        assert_eq!(NgxResult::from_code(FAIL | 0xFF), NgxResult::Fail);
    }

    #[test]
    fn only_super_sampling_and_ray_reconstruction_are_upscaling() {
        assert!(FeatureId::SuperSampling.is_upscaling());
        assert!(FeatureId::RayReconstruction.is_upscaling());
        assert!(!FeatureId::FrameGeneration.is_upscaling());
    }

    #[test]
    fn unknown_quality_value_is_balanced() {
        assert_eq!(PerfQuality::from_value(2), PerfQuality::MaxQuality);
        assert_eq!(PerfQuality::from_value(42), PerfQuality::Balanced);
    }
}
