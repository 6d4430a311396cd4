//! Resource state transitions around a dispatch.
//!
//! Some titles leave their inputs in a state the upscaler cannot read. When
//! the user configures the state a resource is really in, the runtime moves it
//! into the dispatch state before the backend runs and back afterwards.

use bitflags::bitflags;
use tracing::trace;

use upscale_core::config::ResourceStateOverrides;
use upscale_core::{keys, NativeHandle, ParameterTable};

use crate::feature::resource;

bitflags! {
    /// Resource states, bit-compatible with `D3D12_RESOURCE_STATES`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceState: u32 {
        const COMMON = 0;
        const VERTEX_AND_CONSTANT_BUFFER = 0x1;
        const INDEX_BUFFER = 0x2;
        const RENDER_TARGET = 0x4;
        const UNORDERED_ACCESS = 0x8;
        const DEPTH_WRITE = 0x10;
        const DEPTH_READ = 0x20;
        const NON_PIXEL_SHADER_RESOURCE = 0x40;
        const PIXEL_SHADER_RESOURCE = 0x80;
        const COPY_DEST = 0x400;
        const COPY_SOURCE = 0x800;
    }
}

/// Records transition barriers on a command list.
pub trait BarrierRecorder: Send {
    fn transition(
        &mut self,
        command_list: NativeHandle,
        resource: NativeHandle,
        before: ResourceState,
        after: ResourceState,
    );
}

/// Record `before -> after` on `resource` if there is anything to do: the
/// resource is bound, `before` is known, and the states differ.
pub fn try_resource_barrier<R: BarrierRecorder + ?Sized>(
    recorder: &mut R,
    command_list: NativeHandle,
    resource: NativeHandle,
    before: Option<ResourceState>,
    after: ResourceState,
) -> bool {
    let Some(before) = before else {
        return false;
    };
    if resource.is_null() || before == after {
        return false;
    }

    trace!("Barrier {:?}: {:?} -> {:?}", resource, before, after);
    recorder.transition(command_list, resource, before, after);
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Transition {
    resource: NativeHandle,
    host_state: ResourceState,
    dispatch_state: ResourceState,
}

/// The transitions one dispatch needs, resolved from the frame's parameters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OverrideBarriers {
    transitions: Vec<Transition>,
}

impl OverrideBarriers {
    pub fn collect(params: &ParameterTable, overrides: &ResourceStateOverrides) -> Self {
        let read = ResourceState::NON_PIXEL_SHADER_RESOURCE;
        let inputs = [
            (keys::COLOR, overrides.color, read),
            (keys::MOTION_VECTORS, overrides.motion_vectors, read),
            (keys::DEPTH, overrides.depth, read),
            (keys::EXPOSURE_TEXTURE, overrides.exposure, read),
            (keys::REACTIVE_MASK, overrides.mask, read),
            (keys::OUTPUT, overrides.output, ResourceState::UNORDERED_ACCESS),
        ];

        let transitions = inputs
            .into_iter()
            .filter_map(|(key, state, dispatch_state)| {
                let host_state = ResourceState::from_bits_retain(state?);
                let resource = resource(params, key);
                (!resource.is_null() && host_state != dispatch_state).then_some(Transition {
                    resource,
                    host_state,
                    dispatch_state,
                })
            })
            .collect();

        Self { transitions }
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Move every overridden resource into its dispatch state.
    pub fn enter<R: BarrierRecorder + ?Sized>(&self, recorder: &mut R, command_list: NativeHandle) {
        for t in &self.transitions {
            try_resource_barrier(
                recorder,
                command_list,
                t.resource,
                Some(t.host_state),
                t.dispatch_state,
            );
        }
    }

    /// Hand every overridden resource back in the state the host left it.
    pub fn leave<R: BarrierRecorder + ?Sized>(&self, recorder: &mut R, command_list: NativeHandle) {
        for t in &self.transitions {
            try_resource_barrier(
                recorder,
                command_list,
                t.resource,
                Some(t.dispatch_state),
                t.host_state,
            );
        }
    }
}
