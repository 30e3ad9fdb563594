//! CUDA runtime API interception shim.
//!
//! This cdylib stands in for the CUDA runtime: the host program links
//! against it (or has it injected), and every intercepted entry point is
//! forwarded over a framed RPC channel to a remote daemon that owns the
//! actual GPU. Fat binaries are additionally parsed locally so kernel
//! launches can marshal a `void**` argv whose layout only the embedded PTX
//! knows.
//!
//! The transport is an external collaborator: embedders install one with
//! [`install_transport`], or the `link-rpc` feature links the external
//! `rpc_*` symbols. Without a transport every forwarding entry point
//! reports the devices as unavailable.

pub mod api;
pub mod error;
pub mod registry;

#[cfg(feature = "link-rpc")]
mod ffi_transport;

use std::ffi::{c_char, c_int, c_void};
use std::sync::{Arc, OnceLock};

use tracing::{debug, error};

use rcuda_protocol::types::MEMCPY_DEVICE_TO_HOST;
use rcuda_protocol::{Dim3, Transport, Uint3};

use error::{
    CudaError, CUDA_ERROR_DEVICES_UNAVAILABLE, CUDA_ERROR_INVALID_VALUE,
};

static TRANSPORT: OnceLock<Arc<dyn Transport>> = OnceLock::new();

/// Install the transport the shim forwards intercepted calls through.
/// Returns false if one is already installed.
pub fn install_transport(transport: Arc<dyn Transport>) -> bool {
    TRANSPORT.set(transport).is_ok()
}

#[cfg(feature = "link-rpc")]
fn transport() -> Option<&'static dyn Transport> {
    Some(
        TRANSPORT
            .get_or_init(|| Arc::new(ffi_transport::LinkedTransport))
            .as_ref(),
    )
}

#[cfg(not(feature = "link-rpc"))]
fn transport() -> Option<&'static dyn Transport> {
    TRANSPORT.get().map(|t| t.as_ref())
}

fn init() {
    rcuda_common::logging::try_init_logging("warn");
}

// ── Memory Transfers ────────────────────────────────────────────────

#[no_mangle]
pub unsafe extern "C" fn cudaMemcpy(
    dst: *mut c_void,
    src: *const c_void,
    count: usize,
    kind: c_int,
) -> CudaError {
    let Some(transport) = transport() else {
        return CUDA_ERROR_DEVICES_UNAVAILABLE;
    };

    if count > 0 && host_side_is_null(dst, src, kind) {
        return CUDA_ERROR_INVALID_VALUE;
    }

    match api::memcpy(transport, dst, src, count, kind, None) {
        Ok(status) => status,
        Err(e) => {
            error!("cudaMemcpy transport failure: {e}");
            CUDA_ERROR_DEVICES_UNAVAILABLE
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn cudaMemcpyAsync(
    dst: *mut c_void,
    src: *const c_void,
    count: usize,
    kind: c_int,
    stream: *mut c_void,
) -> CudaError {
    let Some(transport) = transport() else {
        return CUDA_ERROR_DEVICES_UNAVAILABLE;
    };

    if count > 0 && host_side_is_null(dst, src, kind) {
        return CUDA_ERROR_INVALID_VALUE;
    }

    match api::memcpy(transport, dst, src, count, kind, Some(stream as u64)) {
        Ok(status) => status,
        Err(e) => {
            error!("cudaMemcpyAsync transport failure: {e}");
            CUDA_ERROR_DEVICES_UNAVAILABLE
        }
    }
}

/// The host-resident side of the copy must be a real buffer; device
/// pointers are opaque remote tokens the shim never dereferences.
fn host_side_is_null(dst: *mut c_void, src: *const c_void, kind: c_int) -> bool {
    if kind == MEMCPY_DEVICE_TO_HOST {
        dst.is_null()
    } else {
        src.is_null()
    }
}

// ── Kernel Launch ───────────────────────────────────────────────────

#[no_mangle]
pub unsafe extern "C" fn cudaLaunchKernel(
    func: *const c_void,
    grid_dim: Dim3,
    block_dim: Dim3,
    args: *mut *mut c_void,
    shared_mem: usize,
    stream: *mut c_void,
) -> CudaError {
    if func.is_null() {
        return CUDA_ERROR_INVALID_VALUE;
    }
    let Some(transport) = transport() else {
        return CUDA_ERROR_DEVICES_UNAVAILABLE;
    };

    match api::launch_kernel(
        transport,
        registry::global(),
        func,
        grid_dim,
        block_dim,
        args,
        shared_mem,
        stream,
    ) {
        Ok(status) => status,
        Err(e) => {
            error!("cudaLaunchKernel transport failure: {e}");
            CUDA_ERROR_DEVICES_UNAVAILABLE
        }
    }
}

// ── Module Registration ─────────────────────────────────────────────

#[no_mangle]
pub unsafe extern "C" fn __cudaRegisterFatBinary(fat_cubin: *mut c_void) -> *mut *mut c_void {
    init();

    let Some(transport) = transport() else {
        return std::ptr::null_mut();
    };

    match api::register_fat_binary(transport, registry::global(), fat_cubin) {
        Ok(handle) => handle as *mut *mut c_void,
        Err(e) => {
            error!("__cudaRegisterFatBinary transport failure: {e}");
            std::ptr::null_mut()
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn __cudaRegisterFatBinaryEnd(fat_cubin_handle: *mut *mut c_void) {
    let Some(transport) = transport() else {
        return;
    };

    if let Err(e) = api::register_fat_binary_end(transport, fat_cubin_handle as u64) {
        error!("__cudaRegisterFatBinaryEnd transport failure: {e}");
    }
}

#[no_mangle]
pub unsafe extern "C" fn __cudaInitModule(fat_cubin_handle: *mut *mut c_void) {
    debug!("__cudaInitModule({:p})", fat_cubin_handle);
}

#[no_mangle]
pub unsafe extern "C" fn __cudaUnregisterFatBinary(fat_cubin_handle: *mut *mut c_void) {
    // The remote owns GPU state; local records live until process teardown.
    debug!("__cudaUnregisterFatBinary({:p})", fat_cubin_handle);
}

#[no_mangle]
pub unsafe extern "C" fn __cudaRegisterFunction(
    fat_cubin_handle: *mut *mut c_void,
    host_fun: *const c_char,
    device_fun: *mut c_char,
    device_name: *const c_char,
    thread_limit: c_int,
    tid: *mut Uint3,
    bid: *mut Uint3,
    b_dim: *mut Dim3,
    g_dim: *mut Dim3,
    w_size: *mut c_int,
) {
    if device_fun.is_null() || device_name.is_null() {
        return;
    }
    let Some(transport) = transport() else {
        return;
    };

    if let Err(e) = api::register_function(
        transport,
        registry::global(),
        fat_cubin_handle as u64,
        host_fun,
        device_fun,
        device_name,
        thread_limit,
        tid,
        bid,
        b_dim,
        g_dim,
        w_size,
    ) {
        error!("__cudaRegisterFunction transport failure: {e}");
    }
}

#[no_mangle]
pub unsafe extern "C" fn __cudaRegisterVar(
    fat_cubin_handle: *mut *mut c_void,
    host_var: *mut c_char,
    device_address: *mut c_char,
    device_name: *const c_char,
    ext: c_int,
    size: usize,
    constant: c_int,
    global: c_int,
) {
    if host_var.is_null() || device_address.is_null() || device_name.is_null() {
        return;
    }
    let Some(transport) = transport() else {
        return;
    };

    if let Err(e) = api::register_var(
        transport,
        fat_cubin_handle as u64,
        host_var,
        device_address,
        device_name,
        ext,
        size,
        constant,
        global,
    ) {
        error!("__cudaRegisterVar transport failure: {e}");
    }
}

// ── Call Configuration ──────────────────────────────────────────────

#[no_mangle]
pub unsafe extern "C" fn __cudaPushCallConfiguration(
    grid_dim: Dim3,
    block_dim: Dim3,
    shared_mem: usize,
    stream: *mut c_void,
) -> CudaError {
    let Some(transport) = transport() else {
        return CUDA_ERROR_DEVICES_UNAVAILABLE;
    };

    match api::push_call_configuration(transport, grid_dim, block_dim, shared_mem, stream as u64) {
        Ok(status) => status,
        Err(e) => {
            error!("__cudaPushCallConfiguration transport failure: {e}");
            CUDA_ERROR_DEVICES_UNAVAILABLE
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn __cudaPopCallConfiguration(
    grid_dim: *mut Dim3,
    block_dim: *mut Dim3,
    shared_mem: *mut usize,
    stream: *mut *mut c_void,
) -> CudaError {
    if grid_dim.is_null() || block_dim.is_null() || shared_mem.is_null() || stream.is_null() {
        return CUDA_ERROR_INVALID_VALUE;
    }
    let Some(transport) = transport() else {
        return CUDA_ERROR_DEVICES_UNAVAILABLE;
    };

    match api::pop_call_configuration(transport, grid_dim, block_dim, shared_mem, stream) {
        Ok(status) => status,
        Err(e) => {
            error!("__cudaPopCallConfiguration transport failure: {e}");
            CUDA_ERROR_DEVICES_UNAVAILABLE
        }
    }
}
