//! Marshalling for the intercepted entry points.
//!
//! Each function here drives one request through the transport following
//! the wire schedule the remote daemon expects, writing positional
//! arguments in declared order and reading positional return values back.
//! The functions take the transport and registry explicitly so tests can
//! drive them against a scripted transport; the `extern "C"` layer in
//! `lib.rs` supplies the process-wide instances.
//!
//! # Safety
//!
//! These functions dereference raw pointers handed across the runtime ABI.
//! Callers must uphold the runtime's own contracts: buffers are valid for
//! the advertised byte counts, strings are NUL-terminated, and launch argv
//! slots point at storage of at least the scanned argument width.

use std::ffi::{c_char, c_int, c_void, CStr};

use tracing::{debug, warn};

use rcuda_fatbin::container::HEADER_LEN;
use rcuda_fatbin::{FatBinary, FATBIN_WRAPPER_MAGIC};
use rcuda_protocol::types::MEMCPY_DEVICE_TO_HOST;
use rcuda_protocol::{Dim3, MemcpyKind, Request, RpcOp, Transport, TransportError, Uint3, CHANNEL};

use crate::error::{CudaError, CUDA_ERROR_DEVICES_UNAVAILABLE, CUDA_ERROR_INVALID_VALUE};
use crate::registry::Registry;

/// The v2 wrapper record the host runtime hands to fat-binary
/// registration. `text` points at the embedded container header.
#[repr(C)]
pub struct FatBinaryWrapper {
    pub magic: u32,
    pub version: u32,
    pub text: *const u8,
    pub data: *const c_void,
    pub unknown: *const c_void,
    pub text2: *const c_void,
    pub zero: *const c_void,
}

/// Synchronous or (with a stream token) asynchronous memory transfer.
///
/// The direction goes first. Device-to-host swaps the schedule: the source
/// pointer and size go out, the payload comes back in the response. Every
/// other direction sends the destination pointer, the size and the host
/// payload.
pub unsafe fn memcpy(
    transport: &dyn Transport,
    dst: *mut c_void,
    src: *const c_void,
    count: usize,
    kind: MemcpyKind,
    stream: Option<u64>,
) -> Result<CudaError, TransportError> {
    let op = if stream.is_some() {
        RpcOp::MemcpyAsync
    } else {
        RpcOp::Memcpy
    };
    let mut req = Request::start(transport, CHANNEL, op)?;
    req.write_i32(kind)?;

    if kind == MEMCPY_DEVICE_TO_HOST {
        req.write_u64(src as u64)?;
        req.write_u64(count as u64)?;
        if let Some(stream) = stream {
            req.write_u64(stream)?;
        }
        let mut resp = req.wait()?;
        if count > 0 {
            resp.read_bytes(std::slice::from_raw_parts_mut(dst as *mut u8, count))?;
        }
        resp.finish()
    } else {
        req.write_u64(dst as u64)?;
        req.write_u64(count as u64)?;
        if count > 0 {
            req.write_bytes(std::slice::from_raw_parts(src as *const u8, count))?;
        }
        if let Some(stream) = stream {
            req.write_u64(stream)?;
        }
        let resp = req.wait()?;
        resp.finish()
    }
}

/// Launch a kernel previously bound through function registration.
///
/// The argument layout comes from the registry; without a record the launch
/// is unrecoverable and nothing is sent at all.
pub unsafe fn launch_kernel(
    transport: &dyn Transport,
    registry: &Registry,
    func: *const c_void,
    grid_dim: Dim3,
    block_dim: Dim3,
    args: *mut *mut c_void,
    shared_mem: usize,
    stream: *mut c_void,
) -> Result<CudaError, TransportError> {
    let Some(record) = registry.lookup_by_host(func as u64) else {
        warn!("launch of unregistered kernel {:p}", func);
        return Ok(CUDA_ERROR_DEVICES_UNAVAILABLE);
    };

    let widths = record.arg_widths();
    if !widths.is_empty() {
        if args.is_null() {
            return Ok(CUDA_ERROR_INVALID_VALUE);
        }
        for (i, &width) in widths.iter().enumerate() {
            if width > 0 && (*args.add(i)).is_null() {
                return Ok(CUDA_ERROR_INVALID_VALUE);
            }
        }
    }

    debug!(
        "launching kernel '{}' with {} argument slots",
        record.device_name(),
        widths.len()
    );

    let mut req = Request::start(transport, CHANNEL, RpcOp::LaunchKernel)?;
    req.write_u64(func as u64)?;
    req.write_dim3(grid_dim)?;
    req.write_dim3(block_dim)?;
    req.write_u64(shared_mem as u64)?;
    req.write_u64(stream as u64)?;

    req.write_u32(widths.len() as u32)?;
    for (i, &width) in widths.iter().enumerate() {
        req.write_u32(width)?;
        if width > 0 {
            let slot = *args.add(i) as *const u8;
            req.write_bytes(std::slice::from_raw_parts(slot, width as usize))?;
        }
    }

    let resp = req.wait()?;
    resp.finish()
}

/// Forward a fat-binary registration and parse it locally.
///
/// The raw container (wrapper record, total length, then header plus
/// declared region) goes to the remote so it can load the module itself; in
/// parallel the walker and scanner populate the registry so later launches
/// can marshal their arguments. A wrapper with an unrecognized magic is
/// forwarded unparsed. Returns the opaque container handle the remote
/// assigned.
pub unsafe fn register_fat_binary(
    transport: &dyn Transport,
    registry: &Registry,
    fat_cubin: *const c_void,
) -> Result<u64, TransportError> {
    let mut req = Request::start(transport, CHANNEL, RpcOp::RegisterFatBinary)?;

    let wrapper = fat_cubin as *const FatBinaryWrapper;
    let parseable = !fat_cubin.is_null()
        && (*wrapper).magic == FATBIN_WRAPPER_MAGIC
        && !(*wrapper).text.is_null();

    if parseable {
        let wrapper_bytes =
            std::slice::from_raw_parts(fat_cubin as *const u8, std::mem::size_of::<FatBinaryWrapper>());
        req.write_bytes(wrapper_bytes)?;

        let header = (*wrapper).text;
        let declared = (header.add(8) as *const u64).read_unaligned();
        let total = HEADER_LEN as u64 + declared;
        let image = std::slice::from_raw_parts(header, total as usize);
        req.write_u64(total)?;
        req.write_bytes(image)?;

        scan_image(registry, fat_cubin as u64, image);
    } else {
        debug!("fat binary with unrecognized layout, forwarding unparsed");
    }

    let mut resp = req.wait()?;
    let handle = resp.read_u64()?;
    resp.finish()?;
    Ok(handle)
}

fn scan_image(registry: &Registry, container_token: u64, image: &[u8]) {
    let fatbin = match FatBinary::parse(image) {
        Ok(f) => f,
        Err(e) => {
            warn!("fat binary not parsed locally: {e}");
            return;
        }
    };
    for section in fatbin.ptx_sections() {
        for kernel in rcuda_fatbin::scan(&section) {
            debug!(
                "discovered kernel '{}' with {} parameters",
                kernel.name,
                kernel.arg_widths.len()
            );
            registry.append(kernel.name, container_token, kernel.arg_widths);
        }
    }
}

pub fn register_fat_binary_end(
    transport: &dyn Transport,
    handle: u64,
) -> Result<CudaError, TransportError> {
    let mut req = Request::start(transport, CHANNEL, RpcOp::RegisterFatBinaryEnd)?;
    req.write_u64(handle)?;
    let resp = req.wait()?;
    resp.finish()
}

/// Forward a function registration and bind the host stub locally.
///
/// The five optional structure pointers are declared by a presence mask and
/// then sent in fixed order.
#[allow(clippy::too_many_arguments)]
pub unsafe fn register_function(
    transport: &dyn Transport,
    registry: &Registry,
    handle: u64,
    host_fn: *const c_char,
    device_fn: *const c_char,
    device_name: *const c_char,
    thread_limit: c_int,
    tid: *const Uint3,
    bid: *const Uint3,
    b_dim: *const Dim3,
    g_dim: *const Dim3,
    w_size: *const c_int,
) -> Result<CudaError, TransportError> {
    let device_fn = CStr::from_ptr(device_fn);
    let device_name = CStr::from_ptr(device_name);

    let mut mask: u8 = 0;
    if !tid.is_null() {
        mask |= 1 << 0;
    }
    if !bid.is_null() {
        mask |= 1 << 1;
    }
    if !b_dim.is_null() {
        mask |= 1 << 2;
    }
    if !g_dim.is_null() {
        mask |= 1 << 3;
    }
    if !w_size.is_null() {
        mask |= 1 << 4;
    }

    let mut req = Request::start(transport, CHANNEL, RpcOp::RegisterFunction)?;
    req.write_u64(handle)?;
    req.write_u64(host_fn as u64)?;
    req.write_sized_bytes(device_fn.to_bytes_with_nul())?;
    req.write_sized_bytes(device_name.to_bytes_with_nul())?;
    req.write_i32(thread_limit)?;
    req.write_u8(mask)?;
    if !tid.is_null() {
        req.write_uint3(*tid)?;
    }
    if !bid.is_null() {
        req.write_uint3(*bid)?;
    }
    if !b_dim.is_null() {
        req.write_dim3(*b_dim)?;
    }
    if !g_dim.is_null() {
        req.write_dim3(*g_dim)?;
    }
    if !w_size.is_null() {
        req.write_i32(*w_size)?;
    }
    let resp = req.wait()?;
    let status = resp.finish()?;

    // Remember the host stub so launches can find the argument layout.
    registry.bind_host(&device_name.to_string_lossy(), host_fn as u64);
    Ok(status)
}

#[allow(clippy::too_many_arguments)]
pub unsafe fn register_var(
    transport: &dyn Transport,
    handle: u64,
    host_var: *const c_char,
    device_address: *const c_char,
    device_name: *const c_char,
    ext: c_int,
    size: usize,
    constant: c_int,
    global: c_int,
) -> Result<CudaError, TransportError> {
    let mut req = Request::start(transport, CHANNEL, RpcOp::RegisterVar)?;
    req.write_u64(handle)?;
    req.write_sized_bytes(CStr::from_ptr(host_var).to_bytes_with_nul())?;
    req.write_sized_bytes(CStr::from_ptr(device_address).to_bytes_with_nul())?;
    req.write_sized_bytes(CStr::from_ptr(device_name).to_bytes_with_nul())?;
    req.write_i32(ext)?;
    req.write_u64(size as u64)?;
    req.write_i32(constant)?;
    req.write_i32(global)?;
    let resp = req.wait()?;
    resp.finish()
}

pub fn push_call_configuration(
    transport: &dyn Transport,
    grid_dim: Dim3,
    block_dim: Dim3,
    shared_mem: usize,
    stream: u64,
) -> Result<CudaError, TransportError> {
    let mut req = Request::start(transport, CHANNEL, RpcOp::PushCallConfiguration)?;
    req.write_dim3(grid_dim)?;
    req.write_dim3(block_dim)?;
    req.write_u64(shared_mem as u64)?;
    req.write_u64(stream)?;
    let resp = req.wait()?;
    resp.finish()
}

/// Read the launch configuration back off the remote's stack.
pub unsafe fn pop_call_configuration(
    transport: &dyn Transport,
    grid_dim: *mut Dim3,
    block_dim: *mut Dim3,
    shared_mem: *mut usize,
    stream: *mut *mut c_void,
) -> Result<CudaError, TransportError> {
    let req = Request::start(transport, CHANNEL, RpcOp::PopCallConfiguration)?;
    let mut resp = req.wait()?;
    *grid_dim = resp.read_dim3()?;
    *block_dim = resp.read_dim3()?;
    *shared_mem = resp.read_u64()? as usize;
    *stream = resp.read_u64()? as *mut c_void;
    resp.finish()
}
