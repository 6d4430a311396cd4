//! Session state shared by every entry point of one runtime.
//!
//! The host never threads this through its own calls; the runtime owns one
//! instance and passes it by reference into the provider, registry and switch
//! code.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use bitflags::bitflags;

use crate::handle::FeatureHandle;

static SHUTTING_DOWN: AtomicBool = AtomicBool::new(false);

/// Whether the process is tearing down. Backend destructors skip native
/// cleanup once this is set, since the vendor runtimes may already be gone.
pub fn is_shutting_down() -> bool {
    SHUTTING_DOWN.load(Ordering::Acquire)
}

pub fn set_shutting_down(value: bool) {
    SHUTTING_DOWN.store(value, Ordering::Release);
}

bitflags! {
    /// Per-title behaviour tweaks detected by the host.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GameQuirks: u32 {
        /// The title tolerates a short settle before the old backend is
        /// destroyed.
        const FAST_FEATURE_RESET = 1 << 0;
    }
}

#[derive(Debug, Default)]
pub struct SessionState {
    /// Handle whose backend dispatched most recently.
    pub current_feature: Option<FeatureHandle>,
    /// Backend requested by the pending switch; empty means "use config".
    pub new_backend: String,
    change_backend: HashMap<u32, bool>,
    pub quirks: GameQuirks,
    /// Location of the vendor DLSS module, if found.
    pub dlss_path: Option<PathBuf>,
    /// Location of the vendor DLSS-D (ray reconstruction) module, if found.
    pub dlssd_path: Option<PathBuf>,
    /// Evaluate calls since the last create or switch.
    pub eval_counter: u32,
    /// Evaluate calls since the runtime started.
    pub frame_counter: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn change_backend(&self, handle: FeatureHandle) -> bool {
        self.change_backend
            .get(&handle.id())
            .copied()
            .unwrap_or(false)
    }

    pub fn set_change_backend(&mut self, handle: FeatureHandle, pending: bool) {
        self.change_backend.insert(handle.id(), pending);
    }

    /// Ask for `handle` to switch to `backend` on its next evaluate.
    pub fn request_switch(&mut self, handle: FeatureHandle, backend: &str) {
        self.new_backend = backend.to_string();
        self.set_change_backend(handle, true);
    }

    /// Drop the pending flag and requested name.
    pub fn clear_switch(&mut self, handle: FeatureHandle) {
        self.new_backend.clear();
        self.set_change_backend(handle, false);
    }

    pub fn forget(&mut self, handle: FeatureHandle) {
        self.change_backend.remove(&handle.id());
        if self.current_feature == Some(handle) {
            self.current_feature = None;
        }
    }

    pub fn fast_feature_reset(&self) -> bool {
        self.quirks.contains(GameQuirks::FAST_FEATURE_RESET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_requests_are_per_handle() {
        let mut state = SessionState::new();
        let a = FeatureHandle::from_raw(1_000_010);
        let b = FeatureHandle::from_raw(1_000_011);

        state.request_switch(a, "fsr31");
        assert!(state.change_backend(a));
        assert!(!state.change_backend(b));
        assert_eq!(state.new_backend, "fsr31");

        state.clear_switch(a);
        assert!(!state.change_backend(a));
        assert!(state.new_backend.is_empty());
    }

    #[test]
    fn forget_clears_current_feature_only_for_that_handle() {
        let mut state = SessionState::new();
        let a = FeatureHandle::from_raw(1_000_020);
        let b = FeatureHandle::from_raw(1_000_021);

        state.current_feature = Some(a);
        state.forget(b);
        assert_eq!(state.current_feature, Some(a));

        state.forget(a);
        assert_eq!(state.current_feature, None);
    }
}
