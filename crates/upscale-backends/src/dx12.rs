//! D3D12 command recording for barriers and root signature restore.

use std::mem::ManuallyDrop;

use tracing::warn;
use windows::core::Interface;
use windows::Win32::Graphics::Direct3D12::*;

use upscale_core::NativeHandle;

use crate::barrier::{BarrierRecorder, ResourceState};
use crate::root_signature::RootSignatureSink;

/// Records onto the `ID3D12GraphicsCommandList` behind each command-list
/// handle. Holds no COM references of its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct D3D12Commands;

fn command_list(handle: &NativeHandle) -> Option<ID3D12GraphicsCommandList> {
    let raw = handle.as_ptr();
    // SAFETY: the host hands us live command lists for the duration of the call.
    let list = unsafe { ID3D12GraphicsCommandList::from_raw_borrowed(&raw) }?;
    Some(list.clone())
}

impl BarrierRecorder for D3D12Commands {
    fn transition(
        &mut self,
        command_list_handle: NativeHandle,
        resource: NativeHandle,
        before: ResourceState,
        after: ResourceState,
    ) {
        let Some(list) = command_list(&command_list_handle) else {
            warn!("Barrier requested on a null command list");
            return;
        };
        let raw_resource = resource.as_ptr();
        // SAFETY: resource handles come from the host's parameter table and are
        // alive while the frame is being recorded.
        let Some(resource) = (unsafe { ID3D12Resource::from_raw_borrowed(&raw_resource) }) else {
            return;
        };

        let barrier = D3D12_RESOURCE_BARRIER {
            Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
            Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
            Anonymous: D3D12_RESOURCE_BARRIER_0 {
                Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                    // SAFETY: borrowed without AddRef; the barrier never drops it.
                    pResource: unsafe { std::mem::transmute_copy(resource) },
                    Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
                    StateBefore: D3D12_RESOURCE_STATES(before.bits() as i32),
                    StateAfter: D3D12_RESOURCE_STATES(after.bits() as i32),
                }),
            },
        };

        unsafe { list.ResourceBarrier(&[barrier]) };
    }
}

impl RootSignatureSink for D3D12Commands {
    fn set_compute(&mut self, command_list_handle: NativeHandle, signature: NativeHandle) {
        let Some(list) = command_list(&command_list_handle) else {
            return;
        };
        let raw = signature.as_ptr();
        // SAFETY: the signature was recorded from a live bind on this list.
        if let Some(signature) = unsafe { ID3D12RootSignature::from_raw_borrowed(&raw) } {
            unsafe { list.SetComputeRootSignature(signature) };
        }
    }

    fn set_graphics(&mut self, command_list_handle: NativeHandle, signature: NativeHandle) {
        let Some(list) = command_list(&command_list_handle) else {
            return;
        };
        let raw = signature.as_ptr();
        // SAFETY: as above.
        if let Some(signature) = unsafe { ID3D12RootSignature::from_raw_borrowed(&raw) } {
            unsafe { list.SetGraphicsRootSignature(signature) };
        }
    }
}
