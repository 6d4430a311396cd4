//! Backend identity: which upscaler, on which graphics API, at which version.

use std::fmt;
use std::str::FromStr;

/// Graphics API a runtime (and every backend it builds) is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphicsApi {
    Dx11,
    Dx12,
    Vulkan,
}

impl fmt::Display for GraphicsApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsApi::Dx11 => write!(f, "DX11"),
            GraphicsApi::Dx12 => write!(f, "DX12"),
            GraphicsApi::Vulkan => write!(f, "Vulkan"),
        }
    }
}

/// Whether a backend talks to the host API directly or through a
/// D3D11-on-12 compatibility layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiFlavor {
    Native,
    Dx11On12,
}

/// Every upscaler variant a provider can construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Xess,
    Xess11On12,
    Fsr21,
    Fsr21On12,
    Fsr22,
    Fsr22On12,
    Fsr31,
    Fsr31On12,
    Dlss,
    Dlssd,
}

impl BackendKind {
    pub const ALL: [BackendKind; 10] = [
        BackendKind::Xess,
        BackendKind::Xess11On12,
        BackendKind::Fsr21,
        BackendKind::Fsr21On12,
        BackendKind::Fsr22,
        BackendKind::Fsr22On12,
        BackendKind::Fsr31,
        BackendKind::Fsr31On12,
        BackendKind::Dlss,
        BackendKind::Dlssd,
    ];

    /// Config key used to request this backend.
    pub fn key(self) -> &'static str {
        match self {
            BackendKind::Xess => "xess",
            BackendKind::Xess11On12 => "xess_12",
            BackendKind::Fsr21 => "fsr21",
            BackendKind::Fsr21On12 => "fsr21_12",
            BackendKind::Fsr22 => "fsr22",
            BackendKind::Fsr22On12 => "fsr22_12",
            BackendKind::Fsr31 => "fsr31",
            BackendKind::Fsr31On12 => "fsr31_12",
            BackendKind::Dlss => "dlss",
            BackendKind::Dlssd => "dlssd",
        }
    }

    pub fn flavor(self) -> ApiFlavor {
        match self {
            BackendKind::Xess11On12
            | BackendKind::Fsr21On12
            | BackendKind::Fsr22On12
            | BackendKind::Fsr31On12 => ApiFlavor::Dx11On12,
            _ => ApiFlavor::Native,
        }
    }

    /// Vendor backends that consume the host's parameter table as-is.
    pub fn is_passthrough(self) -> bool {
        matches!(self, BackendKind::Dlss | BackendKind::Dlssd)
    }

    /// Name shown to the user; the denoising variant reports under its
    /// base family.
    pub fn display_key(self) -> &'static str {
        match self {
            BackendKind::Dlssd => BackendKind::Dlss.key(),
            other => other.key(),
        }
    }

    /// Whether `api` can host this variant at all.
    pub fn available_on(self, api: GraphicsApi) -> bool {
        match self.flavor() {
            ApiFlavor::Dx11On12 => api == GraphicsApi::Dx11,
            ApiFlavor::Native => true,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Error for a backend key that names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown upscaler backend '{0}'")]
pub struct UnknownBackend(pub String);

impl FromStr for BackendKind {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| UnknownBackend(s.to_string()))
    }
}

/// Semantic version reported by a backend's native module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FeatureVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FeatureVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse the first `major.minor.patch` triple found in `text`, skipping
    /// any leading non-digit prefix (e.g. `"FSR 3.1.2 (build)"`).
    pub fn parse(text: &str) -> Option<Self> {
        let start = text.find(|c: char| c.is_ascii_digit())?;
        let mut parts = text[start..]
            .split(|c: char| !c.is_ascii_digit())
            .filter(|p| !p.is_empty())
            .map(|p| p.parse::<u32>());

        let major = parts.next()?.ok()?;
        let minor = parts.next()?.ok()?;
        let patch = parts.next()?.ok()?;
        Some(Self::new(major, minor, patch))
    }
}

impl fmt::Display for FeatureVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Identifies one concrete adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub kind: BackendKind,
    pub api: GraphicsApi,
    pub version: FeatureVersion,
}

impl BackendDescriptor {
    pub fn flavor(&self) -> ApiFlavor {
        self.kind.flavor()
    }

    pub fn is_fsr(&self) -> bool {
        matches!(
            self.kind,
            BackendKind::Fsr21
                | BackendKind::Fsr21On12
                | BackendKind::Fsr22
                | BackendKind::Fsr22On12
                | BackendKind::Fsr31
                | BackendKind::Fsr31On12
        )
    }

    /// FSR 3.1+ takes an explicit upscale size per dispatch, so a new output
    /// resolution does not force the feature to be recreated.
    pub fn resizes_without_recreate(&self) -> bool {
        self.is_fsr() && self.version >= FeatureVersion::new(3, 1, 0)
    }
}
