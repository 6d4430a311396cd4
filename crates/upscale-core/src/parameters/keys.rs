//! Parameter key names.
//!
//! The host-facing keys match the vendor SDK's string ids; the `FSR.*` keys
//! are extensions some titles set for FSR-aware integrations.

// Creation
pub const FEATURE_CREATE_FLAGS: &str = "DLSS.Feature.Create.Flags";
pub const WIDTH: &str = "Width";
pub const HEIGHT: &str = "Height";
pub const OUT_WIDTH: &str = "OutWidth";
pub const OUT_HEIGHT: &str = "OutHeight";
pub const PERF_QUALITY_VALUE: &str = "PerfQualityValue";

// Per-frame
pub const RENDER_SUBRECT_WIDTH: &str = "DLSS.Render.Subrect.Dimensions.Width";
pub const RENDER_SUBRECT_HEIGHT: &str = "DLSS.Render.Subrect.Dimensions.Height";
pub const MV_SCALE_X: &str = "MV.Scale.X";
pub const MV_SCALE_Y: &str = "MV.Scale.Y";
pub const JITTER_OFFSET_X: &str = "Jitter.Offset.X";
pub const JITTER_OFFSET_Y: &str = "Jitter.Offset.Y";
pub const RESET: &str = "Reset";
pub const SHARPNESS: &str = "Sharpness";
pub const PRE_EXPOSURE: &str = "DLSS.Pre.Exposure";
pub const FRAME_TIME_DELTA_MS: &str = "FrameTimeDeltaInMsec";

// Resources
pub const COLOR: &str = "Color";
pub const MOTION_VECTORS: &str = "MotionVectors";
pub const DEPTH: &str = "Depth";
pub const OUTPUT: &str = "Output";
pub const EXPOSURE_TEXTURE: &str = "ExposureTexture";
pub const REACTIVE_MASK: &str = "DLSS.Input.Bias.Current.Color.Mask";
pub const FSR_REACTIVE: &str = "FSR.reactive";
pub const FSR_TRANSPARENCY_AND_COMP: &str = "FSR.transparencyAndComposition";

// FSR extensions
pub const FSR_NEAR_PLANE: &str = "FSR.cameraNear";
pub const FSR_FAR_PLANE: &str = "FSR.cameraFar";
pub const FSR_CAMERA_FOV_VERTICAL: &str = "FSR.cameraFovAngleVertical";
pub const FSR_FRAME_TIME_DELTA: &str = "FSR.frameTimeDelta";
pub const FSR_VIEW_SPACE_TO_METERS: &str = "FSR.viewSpaceToMetersFactor";
pub const FSR_UPSCALE_WIDTH: &str = "FSR.upscaleSize.width";
pub const FSR_UPSCALE_HEIGHT: &str = "FSR.upscaleSize.height";

/// Set to `1` on every table the core allocates for itself. A table carrying
/// it is dropped by the core once a switch completes; any other table
/// belongs to the host.
pub const SCRATCH_TABLE_MARKER: &str = "Upscale.ScratchTable";
