//! C entry points.
//!
//! Each graphics API has its own [`Runtime`], installed once by the host's
//! loader shim and then reached through `upscale_<api>_*` functions. Every
//! call returns an [`NgxResult`] code; panics are caught here and reported
//! as [`NgxResult::Fail`].

use std::ffi::{c_char, c_void, CStr};
use std::panic::{self, AssertUnwindSafe};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{error, info};

use upscale_core::{
    logging, FeatureHandle, FeatureId, GraphicsApi, NativeHandle, NgxResult, ParameterError,
    ParameterTable,
};

use crate::runtime::Runtime;

static DX11: OnceCell<Mutex<Runtime>> = OnceCell::new();
static DX12: OnceCell<Mutex<Runtime>> = OnceCell::new();
static VULKAN: OnceCell<Mutex<Runtime>> = OnceCell::new();

fn slot(api: GraphicsApi) -> &'static OnceCell<Mutex<Runtime>> {
    match api {
        GraphicsApi::Dx11 => &DX11,
        GraphicsApi::Dx12 => &DX12,
        GraphicsApi::Vulkan => &VULKAN,
    }
}

/// Make `runtime` the one behind its API's entry points. Also installs the
/// default log subscriber if the host has none.
///
/// Fails, handing the runtime back, if one is already installed.
pub fn install(runtime: Runtime) -> Result<(), Runtime> {
    logging::init();
    let api = runtime.api();
    slot(api)
        .set(Mutex::new(runtime))
        .map_err(Mutex::into_inner)?;
    info!("{} runtime installed", api);
    Ok(())
}

/// Run `f` against the installed runtime for `api`.
pub fn with_runtime<R>(api: GraphicsApi, f: impl FnOnce(&mut Runtime) -> R) -> Option<R> {
    slot(api).get().map(|runtime| f(&mut *runtime.lock()))
}

fn guarded(entry: &'static str, f: impl FnOnce() -> NgxResult) -> u32 {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result.code(),
        Err(_) => {
            error!("{} panicked", entry);
            NgxResult::Fail.code()
        }
    }
}

fn create(
    api: GraphicsApi,
    device: NativeHandle,
    command_list: NativeHandle,
    feature_id: u32,
    params: Option<&mut ParameterTable>,
    out_handle: Option<&mut u32>,
) -> NgxResult {
    let Some(out_handle) = out_handle else {
        error!("create_feature: out handle is null");
        return NgxResult::Fail;
    };
    let Some(feature) = FeatureId::from_code(feature_id) else {
        error!("create_feature: unknown feature id {}", feature_id);
        return NgxResult::FeatureNotSupported;
    };

    let mut empty = ParameterTable::new();
    let params = params.unwrap_or(&mut empty);

    with_runtime(api, |runtime| {
        match runtime.create_feature(device, command_list, feature, params) {
            Ok(handle) => {
                *out_handle = handle.id();
                NgxResult::Success
            }
            Err(code) => code,
        }
    })
    .unwrap_or(NgxResult::NotInitialized)
}

fn evaluate(
    api: GraphicsApi,
    command_list: NativeHandle,
    handle: Option<u32>,
    params: Option<&mut ParameterTable>,
) -> NgxResult {
    let Some(handle) = handle else {
        return NgxResult::FeatureNotFound;
    };

    let mut empty = ParameterTable::new();
    let params = params.unwrap_or(&mut empty);

    with_runtime(api, |runtime| {
        runtime.evaluate_feature(command_list, FeatureHandle::from_raw(handle), params)
    })
    .unwrap_or(NgxResult::NotInitialized)
}

fn release(api: GraphicsApi, handle: Option<u32>) -> NgxResult {
    let Some(handle) = handle else {
        return NgxResult::Success;
    };

    with_runtime(api, |runtime| {
        runtime.release_feature(FeatureHandle::from_raw(handle))
    })
    .unwrap_or(NgxResult::NotInitialized)
}

macro_rules! api_entry_points {
    ($api:expr, $create:ident, $evaluate:ident, $release:ident) => {
        /// Create an upscaling feature and write its handle to `out_handle`.
        ///
        /// # Safety
        ///
        /// `params` must be null or a live table from
        /// [`upscale_param_table_create`]; `out_handle` must be null or
        /// writable. `device` and `command_list` are passed through untouched.
        #[no_mangle]
        pub unsafe extern "C" fn $create(
            device: *mut c_void,
            command_list: *mut c_void,
            feature_id: u32,
            params: *mut ParameterTable,
            out_handle: *mut u32,
        ) -> u32 {
            guarded(stringify!($create), || {
                // SAFETY: caller contract above.
                let (params, out_handle) = unsafe { (params.as_mut(), out_handle.as_mut()) };
                create(
                    $api,
                    NativeHandle::from_ptr(device),
                    NativeHandle::from_ptr(command_list),
                    feature_id,
                    params,
                    out_handle,
                )
            })
        }

        /// Dispatch one frame for `*handle`.
        ///
        /// # Safety
        ///
        /// `handle` must be null or readable; `params` must be null or a live
        /// table from [`upscale_param_table_create`].
        #[no_mangle]
        pub unsafe extern "C" fn $evaluate(
            command_list: *mut c_void,
            handle: *const u32,
            params: *mut ParameterTable,
        ) -> u32 {
            guarded(stringify!($evaluate), || {
                // SAFETY: caller contract above.
                let (handle, params) = unsafe { (handle.as_ref().copied(), params.as_mut()) };
                evaluate($api, NativeHandle::from_ptr(command_list), handle, params)
            })
        }

        /// Release `*handle`. A null handle is a no-op.
        ///
        /// # Safety
        ///
        /// `handle` must be null or readable.
        #[no_mangle]
        pub unsafe extern "C" fn $release(handle: *const u32) -> u32 {
            guarded(stringify!($release), || {
                // SAFETY: caller contract above.
                let handle = unsafe { handle.as_ref().copied() };
                release($api, handle)
            })
        }
    };
}

api_entry_points!(
    GraphicsApi::Dx11,
    upscale_dx11_create_feature,
    upscale_dx11_evaluate_feature,
    upscale_dx11_release_feature
);
api_entry_points!(
    GraphicsApi::Dx12,
    upscale_dx12_create_feature,
    upscale_dx12_evaluate_feature,
    upscale_dx12_release_feature
);
api_entry_points!(
    GraphicsApi::Vulkan,
    upscale_vulkan_create_feature,
    upscale_vulkan_evaluate_feature,
    upscale_vulkan_release_feature
);

/// Tear every installed runtime down. Backends skip native cleanup from here
/// on, since the host is unloading the vendor modules too.
#[no_mangle]
pub extern "C" fn upscale_shutdown() -> u32 {
    guarded("upscale_shutdown", || {
        for api in [GraphicsApi::Dx11, GraphicsApi::Dx12, GraphicsApi::Vulkan] {
            with_runtime(api, Runtime::shutdown);
        }
        NgxResult::Success
    })
}

// =====================================================================
// Parameter tables
// =====================================================================

/// # Safety
///
/// `key` must be null or a NUL-terminated string that outlives the call.
unsafe fn key_str<'a>(key: *const c_char) -> Option<&'a str> {
    if key.is_null() {
        return None;
    }
    // SAFETY: non-null and NUL-terminated per the caller.
    unsafe { CStr::from_ptr(key) }.to_str().ok()
}

fn read_result(result: Result<(), ParameterError>) -> NgxResult {
    match result {
        Ok(()) => NgxResult::Success,
        Err(ParameterError::Missing(_)) => NgxResult::UnsupportedParameter,
        Err(ParameterError::WrongKind(_)) => NgxResult::InvalidParameter,
    }
}

#[no_mangle]
pub extern "C" fn upscale_param_table_create() -> *mut ParameterTable {
    Box::into_raw(Box::new(ParameterTable::new()))
}

/// # Safety
///
/// `table` must be null or come from [`upscale_param_table_create`], and
/// must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn upscale_param_table_destroy(table: *mut ParameterTable) {
    if !table.is_null() {
        // SAFETY: allocated by `upscale_param_table_create`, per the caller.
        drop(unsafe { Box::from_raw(table) });
    }
}

macro_rules! param_accessors {
    ($set:ident, $get:ident, $ty:ty) => {
        /// # Safety
        ///
        /// `table` must be null or a live table; `key` must be null or a
        /// NUL-terminated string.
        #[no_mangle]
        pub unsafe extern "C" fn $set(table: *mut ParameterTable, key: *const c_char, value: $ty) -> u32 {
            guarded(stringify!($set), || {
                // SAFETY: caller contract above.
                let (table, key) = unsafe { (table.as_mut(), key_str(key)) };
                let (Some(table), Some(key)) = (table, key) else {
                    return NgxResult::InvalidParameter;
                };
                table.set(key, value);
                NgxResult::Success
            })
        }

        /// # Safety
        ///
        /// `table` must be null or a live table; `key` must be null or a
        /// NUL-terminated string; `out` must be null or writable.
        #[no_mangle]
        pub unsafe extern "C" fn $get(table: *const ParameterTable, key: *const c_char, out: *mut $ty) -> u32 {
            guarded(stringify!($get), || {
                // SAFETY: caller contract above.
                let (table, key, out) = unsafe { (table.as_ref(), key_str(key), out.as_mut()) };
                let (Some(table), Some(key), Some(out)) = (table, key, out) else {
                    return NgxResult::InvalidParameter;
                };
                read_result(table.try_get::<$ty>(key).map(|value| *out = value))
            })
        }
    };
}

param_accessors!(upscale_param_set_u32, upscale_param_get_u32, u32);
param_accessors!(upscale_param_set_i32, upscale_param_get_i32, i32);
param_accessors!(upscale_param_set_f32, upscale_param_get_f32, f32);
param_accessors!(upscale_param_set_f64, upscale_param_get_f64, f64);
param_accessors!(upscale_param_set_u64, upscale_param_get_u64, u64);

/// # Safety
///
/// Same as [`upscale_param_set_u32`]. `value` is stored, never dereferenced.
#[no_mangle]
pub unsafe extern "C" fn upscale_param_set_resource(
    table: *mut ParameterTable,
    key: *const c_char,
    value: *mut c_void,
) -> u32 {
    guarded("upscale_param_set_resource", || {
        // SAFETY: caller contract above.
        let (table, key) = unsafe { (table.as_mut(), key_str(key)) };
        let (Some(table), Some(key)) = (table, key) else {
            return NgxResult::InvalidParameter;
        };
        table.set(key, NativeHandle::from_ptr(value));
        NgxResult::Success
    })
}

/// # Safety
///
/// Same as [`upscale_param_get_u32`].
#[no_mangle]
pub unsafe extern "C" fn upscale_param_get_resource(
    table: *const ParameterTable,
    key: *const c_char,
    out: *mut *mut c_void,
) -> u32 {
    guarded("upscale_param_get_resource", || {
        // SAFETY: caller contract above.
        let (table, key, out) = unsafe { (table.as_ref(), key_str(key), out.as_mut()) };
        let (Some(table), Some(key), Some(out)) = (table, key, out) else {
            return NgxResult::InvalidParameter;
        };
        read_result(
            table
                .try_get::<NativeHandle>(key)
                .map(|value| *out = value.as_ptr()),
        )
    })
}
