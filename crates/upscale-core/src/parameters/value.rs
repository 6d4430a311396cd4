use crate::handle::NativeHandle;

/// A single parameter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    UInt(u32),
    Int(i32),
    Float(f32),
    Double(f64),
    ULong(u64),
    Resource(NativeHandle),
}

/// Types that can be read back out of a [`ParamValue`].
///
/// Numeric reads convert between numeric kinds the way the vendor tables do
/// (a float stored as `UInt` reads as a float), so hosts that set `Width`
/// as `i32` are still understood.
pub trait FromParam: Sized {
    fn from_param(value: &ParamValue) -> Option<Self>;
}

macro_rules! numeric_from_param {
    ($($ty:ty),*) => {
        $(
            impl FromParam for $ty {
                fn from_param(value: &ParamValue) -> Option<Self> {
                    match *value {
                        ParamValue::UInt(v) => Some(v as $ty),
                        ParamValue::Int(v) => Some(v as $ty),
                        ParamValue::Float(v) => Some(v as $ty),
                        ParamValue::Double(v) => Some(v as $ty),
                        ParamValue::ULong(v) => Some(v as $ty),
                        ParamValue::Resource(_) => None,
                    }
                }
            }
        )*
    };
}

numeric_from_param!(u32, i32, f32, f64, u64);

impl FromParam for bool {
    fn from_param(value: &ParamValue) -> Option<Self> {
        u32::from_param(value).map(|v| v != 0)
    }
}

impl FromParam for NativeHandle {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match *value {
            ParamValue::Resource(handle) => Some(handle),
            ParamValue::ULong(addr) => Some(NativeHandle::from_addr(addr as usize)),
            _ => None,
        }
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::UInt(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Float(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Double(v)
    }
}

impl From<u64> for ParamValue {
    fn from(v: u64) -> Self {
        ParamValue::ULong(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::UInt(v as u32)
    }
}

impl From<NativeHandle> for ParamValue {
    fn from(v: NativeHandle) -> Self {
        ParamValue::Resource(v)
    }
}
