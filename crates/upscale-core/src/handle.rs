//! Opaque feature handles, the process-wide handle allocator, and the
//! native pointers the host hands through unexamined.

use std::ffi::c_void;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::ffi::{CORE_HANDLE_OFFSET, FRAME_GEN_HANDLE_OFFSET};

static NEXT_HANDLE_ID: AtomicU32 = AtomicU32::new(CORE_HANDLE_OFFSET);

/// Who owns a handle, derived from its numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOrigin {
    /// Issued by the native vendor runtime.
    Native,
    /// Issued by this crate.
    Core,
    /// Issued by the frame-generation passthrough.
    FrameGen,
}

/// Opaque identifier of one upscaling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureHandle(u32);

impl FeatureHandle {
    /// Allocate a fresh core-owned handle. Ids are never reused while the
    /// process runs; `None` once the core range is used up.
    pub fn allocate() -> Option<Self> {
        allocate_from(&NEXT_HANDLE_ID)
    }

    /// Wrap a raw id received from the host.
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u32 {
        self.0
    }

    pub fn origin(self) -> HandleOrigin {
        match self.0 {
            id if id < CORE_HANDLE_OFFSET => HandleOrigin::Native,
            id if id < FRAME_GEN_HANDLE_OFFSET => HandleOrigin::Core,
            _ => HandleOrigin::FrameGen,
        }
    }

    pub fn is_core(self) -> bool {
        self.origin() == HandleOrigin::Core
    }
}

fn allocate_from(counter: &AtomicU32) -> Option<FeatureHandle> {
    counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| {
            (id < FRAME_GEN_HANDLE_OFFSET).then_some(id + 1)
        })
        .ok()
        .map(FeatureHandle)
}

impl fmt::Display for FeatureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A device, command list or resource pointer owned by the host.
///
/// Stored as an address so records holding one stay `Send`; the core never
/// dereferences it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NativeHandle(usize);

impl NativeHandle {
    pub const NULL: NativeHandle = NativeHandle(0);

    pub fn from_ptr<T>(ptr: *mut T) -> Self {
        Self(ptr as usize)
    }

    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeHandle({:#x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocated_handles_are_core_owned_and_unique() {
        let a = FeatureHandle::allocate().unwrap();
        let b = FeatureHandle::allocate().unwrap();
        assert_ne!(a, b);
        assert!(a.is_core());
        assert!(b.id() > a.id());
    }

    #[test]
    fn origin_follows_numeric_range() {
        assert_eq!(FeatureHandle::from_raw(7).origin(), HandleOrigin::Native);
        assert_eq!(
            FeatureHandle::from_raw(CORE_HANDLE_OFFSET).origin(),
            HandleOrigin::Core
        );
        assert_eq!(
            FeatureHandle::from_raw(FRAME_GEN_HANDLE_OFFSET + 3).origin(),
            HandleOrigin::FrameGen
        );
    }

    #[test]
    fn allocation_stops_at_the_end_of_the_core_range() {
        let counter = AtomicU32::new(FRAME_GEN_HANDLE_OFFSET - 1);

        let last = allocate_from(&counter).unwrap();
        assert_eq!(last.id(), FRAME_GEN_HANDLE_OFFSET - 1);
        assert!(last.is_core());

        assert_eq!(allocate_from(&counter), None);
        assert_eq!(allocate_from(&counter), None);
        assert_eq!(counter.load(Ordering::Relaxed), FRAME_GEN_HANDLE_OFFSET);
    }
}
