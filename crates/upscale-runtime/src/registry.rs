//! Core-owned contexts, keyed by handle.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, warn};

use upscale_backends::Upscaler;
use upscale_core::{FeatureHandle, SessionState};

use crate::switch::SwitchPhase;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("handle {0} is not owned by the upscaler core")]
    NotOwned(FeatureHandle),
    #[error("handle {0} is already registered")]
    AlreadyRegistered(FeatureHandle),
    #[error("no context for handle {0}")]
    NotFound(FeatureHandle),
}

/// One upscaling session: the live backend plus any switch in flight.
///
/// `feature` is empty only between switch teardown and the end of the switch.
pub struct ContextRecord {
    pub feature: Option<Upscaler>,
    pub phase: SwitchPhase,
}

impl ContextRecord {
    pub fn new(feature: Upscaler) -> Self {
        Self {
            feature: Some(feature),
            phase: SwitchPhase::Idle,
        }
    }

    pub fn switch_counter(&self) -> u8 {
        self.phase.counter()
    }
}

#[derive(Default)]
pub struct ContextRegistry {
    records: HashMap<FeatureHandle, ContextRecord>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, handle: FeatureHandle, feature: Upscaler) -> Result<(), RegistryError> {
        if !handle.is_core() {
            return Err(RegistryError::NotOwned(handle));
        }
        if self.records.contains_key(&handle) {
            return Err(RegistryError::AlreadyRegistered(handle));
        }

        debug!("registering {} with {}", handle, feature.kind());
        self.records.insert(handle, ContextRecord::new(feature));
        Ok(())
    }

    pub fn get(&self, handle: FeatureHandle) -> Option<&ContextRecord> {
        self.records.get(&handle)
    }

    pub fn get_mut(&mut self, handle: FeatureHandle) -> Option<&mut ContextRecord> {
        self.records.get_mut(&handle)
    }

    /// Drop the record, its backend and any replacement still being built.
    /// Returns whether a record existed.
    pub fn release(
        &mut self,
        handle: FeatureHandle,
        state: &mut SessionState,
    ) -> Result<bool, RegistryError> {
        if !handle.is_core() {
            return Err(RegistryError::NotOwned(handle));
        }

        state.forget(handle);

        match self.records.remove(&handle) {
            Some(record) => {
                if !record.phase.is_idle() {
                    warn!(
                        "releasing {} in the middle of a switch (counter {})",
                        handle,
                        record.switch_counter()
                    );
                }
                drop(record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, handle: FeatureHandle) -> bool {
        self.records.contains_key(&handle)
    }

    pub fn handles(&self) -> impl Iterator<Item = FeatureHandle> + '_ {
        self.records.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upscale_backends::testing::{create_params, FakeLoader, Vendor};
    use upscale_core::{BackendKind, GraphicsApi};

    fn upscaler(loader: &FakeLoader, handle: FeatureHandle) -> Upscaler {
        Upscaler::build(
            BackendKind::Fsr22,
            GraphicsApi::Vulkan,
            handle,
            &create_params(),
            loader,
            None,
        )
    }

    #[test]
    fn rejects_handles_outside_the_core_range() {
        let loader = FakeLoader::all();
        let mut registry = ContextRegistry::new();
        let native = FeatureHandle::from_raw(42);

        assert_eq!(
            registry.create(native, upscaler(&loader, native)),
            Err(RegistryError::NotOwned(native))
        );
        assert_eq!(
            registry.release(FeatureHandle::from_raw(2_000_001), &mut SessionState::new()),
            Err(RegistryError::NotOwned(FeatureHandle::from_raw(2_000_001)))
        );
    }

    #[test]
    fn release_drops_the_backend_and_forgets_the_handle() {
        let loader = FakeLoader::all();
        let mut registry = ContextRegistry::new();
        let mut state = SessionState::new();
        let handle = FeatureHandle::allocate().unwrap();

        registry.create(handle, upscaler(&loader, handle)).unwrap();
        assert!(registry.contains(handle));
        assert_eq!(registry.get(handle).unwrap().switch_counter(), 0);

        state.current_feature = Some(handle);
        state.request_switch(handle, "xess");

        assert_eq!(registry.release(handle, &mut state), Ok(true));
        assert!(registry.is_empty());
        assert_eq!(state.current_feature, None);
        assert!(!state.change_backend(handle));

        assert_eq!(registry.release(handle, &mut state), Ok(false));
        assert_eq!(loader.log(Vendor::Ffx).loaded(), 1);
    }

    #[test]
    fn duplicate_registration_is_refused() {
        let loader = FakeLoader::all();
        let mut registry = ContextRegistry::new();
        let handle = FeatureHandle::allocate().unwrap();

        registry.create(handle, upscaler(&loader, handle)).unwrap();
        assert_eq!(
            registry.create(handle, upscaler(&loader, handle)),
            Err(RegistryError::AlreadyRegistered(handle))
        );
        assert_eq!(registry.len(), 1);
    }
}
