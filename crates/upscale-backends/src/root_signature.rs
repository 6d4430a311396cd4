//! Root signatures bound by the host, per command list.
//!
//! A backend dispatch rebinds the compute root signature. Titles that keep
//! recording on the same list afterwards expect theirs to still be bound, so
//! the host's hooks record what it set here and the runtime restores it after
//! the dispatch.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::trace;

use upscale_core::NativeHandle;

/// Rebinds root signatures on a command list.
pub trait RootSignatureSink: Send {
    fn set_compute(&mut self, command_list: NativeHandle, signature: NativeHandle);
    fn set_graphics(&mut self, command_list: NativeHandle, signature: NativeHandle);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Bound {
    compute: Option<NativeHandle>,
    graphics: Option<NativeHandle>,
}

/// Read-mostly map, written from whichever render thread records a list.
#[derive(Debug, Default)]
pub struct RootSignatureCache {
    bound: RwLock<HashMap<NativeHandle, Bound>>,
}

impl RootSignatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_compute(&self, command_list: NativeHandle, signature: NativeHandle) {
        trace!("Compute root signature {:?} on {:?}", signature, command_list);
        self.bound.write().entry(command_list).or_default().compute = Some(signature);
    }

    pub fn record_graphics(&self, command_list: NativeHandle, signature: NativeHandle) {
        trace!("Graphics root signature {:?} on {:?}", signature, command_list);
        self.bound.write().entry(command_list).or_default().graphics = Some(signature);
    }

    pub fn compute(&self, command_list: NativeHandle) -> Option<NativeHandle> {
        self.bound.read().get(&command_list).and_then(|b| b.compute)
    }

    pub fn graphics(&self, command_list: NativeHandle) -> Option<NativeHandle> {
        self.bound.read().get(&command_list).and_then(|b| b.graphics)
    }

    /// The list was reset or released; its bindings no longer apply.
    pub fn forget(&self, command_list: NativeHandle) {
        self.bound.write().remove(&command_list);
    }

    /// Rebind what the host had on `command_list`, for the enabled kinds.
    /// Returns how many signatures were restored.
    pub fn restore<S: RootSignatureSink + ?Sized>(
        &self,
        sink: &mut S,
        command_list: NativeHandle,
        compute: bool,
        graphics: bool,
    ) -> usize {
        let Some(bound) = self.bound.read().get(&command_list).copied() else {
            return 0;
        };

        let mut restored = 0;
        if compute {
            if let Some(signature) = bound.compute {
                sink.set_compute(command_list, signature);
                restored += 1;
            }
        }
        if graphics {
            if let Some(signature) = bound.graphics {
                sink.set_graphics(command_list, signature);
                restored += 1;
            }
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Sink {
        compute: Vec<NativeHandle>,
        graphics: Vec<NativeHandle>,
    }

    impl RootSignatureSink for Sink {
        fn set_compute(&mut self, _: NativeHandle, signature: NativeHandle) {
            self.compute.push(signature);
        }

        fn set_graphics(&mut self, _: NativeHandle, signature: NativeHandle) {
            self.graphics.push(signature);
        }
    }

    #[test]
    fn restores_only_enabled_kinds_for_that_list() {
        let cache = RootSignatureCache::new();
        let list_a = NativeHandle::from_addr(0xA);
        let list_b = NativeHandle::from_addr(0xB);
        cache.record_compute(list_a, NativeHandle::from_addr(0x1));
        cache.record_graphics(list_a, NativeHandle::from_addr(0x2));
        cache.record_compute(list_b, NativeHandle::from_addr(0x3));

        let mut sink = Sink::default();
        assert_eq!(cache.restore(&mut sink, list_a, true, false), 1);
        assert_eq!(sink.compute, vec![NativeHandle::from_addr(0x1)]);
        assert!(sink.graphics.is_empty());

        cache.forget(list_a);
        assert_eq!(cache.restore(&mut sink, list_a, true, true), 0);
        assert_eq!(cache.compute(list_b), Some(NativeHandle::from_addr(0x3)));
    }
}
