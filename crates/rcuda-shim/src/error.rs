//! Runtime error codes and the error-string entry point (client-side only,
//! no RPC needed).

use std::ffi::{c_char, c_int, CStr};

pub type CudaError = c_int;

pub const CUDA_SUCCESS: CudaError = 0;
pub const CUDA_ERROR_INVALID_VALUE: CudaError = 1;
pub const CUDA_ERROR_MEMORY_ALLOCATION: CudaError = 2;
/// Returned for every transport-level failure: the remote GPU might as
/// well not exist.
pub const CUDA_ERROR_DEVICES_UNAVAILABLE: CudaError = 46;

macro_rules! cstr {
    ($s:literal) => {
        unsafe { CStr::from_bytes_with_nul_unchecked(concat!($s, "\0").as_bytes()).as_ptr() }
    };
}

/// Return a null-terminated C string pointer describing the error.
fn error_string_ptr(error: CudaError) -> *const c_char {
    match error {
        0 => cstr!("cudaSuccess: No errors"),
        1 => cstr!("cudaErrorInvalidValue: Invalid value"),
        2 => cstr!("cudaErrorMemoryAllocation: Out of memory"),
        3 => cstr!("cudaErrorInitializationError: Initialization error"),
        9 => cstr!("cudaErrorInvalidConfiguration: Invalid configuration"),
        12 => cstr!("cudaErrorInvalidPitchValue: Invalid pitch value"),
        13 => cstr!("cudaErrorInvalidSymbol: Invalid symbol"),
        21 => cstr!("cudaErrorInvalidMemcpyDirection: Invalid memory copy direction"),
        35 => cstr!("cudaErrorInsufficientDriver: CUDA driver is insufficient for the runtime version"),
        43 => cstr!("cudaErrorDuplicateVariableName: Duplicate global variable name"),
        44 => cstr!("cudaErrorDuplicateTextureName: Duplicate texture name"),
        45 => cstr!("cudaErrorDuplicateSurfaceName: Duplicate surface name"),
        46 => cstr!("cudaErrorDevicesUnavailable: All devices are busy or unavailable"),
        52 => cstr!("cudaErrorMissingConfiguration: Missing configuration"),
        53 => cstr!("cudaErrorPriorLaunchFailure: Launch failure of a previous kernel"),
        98 => cstr!("cudaErrorInvalidDeviceFunction: Invalid device function"),
        100 => cstr!("cudaErrorNoDevice: No CUDA-capable device is detected"),
        101 => cstr!("cudaErrorInvalidDevice: Invalid device"),
        200 => cstr!("cudaErrorInvalidKernelImage: The kernel image is invalid"),
        207 => cstr!("cudaErrorArrayIsMapped: Array is already mapped"),
        208 => cstr!("cudaErrorAlreadyMapped: Resource is already mapped"),
        209 => cstr!("cudaErrorNoKernelImageForDevice: No kernel image is available for the device"),
        214 => cstr!("cudaErrorECCUncorrectable: Uncorrectable ECC error detected"),
        215 => cstr!("cudaErrorUnsupportedLimit: Unsupported limit"),
        218 => cstr!("cudaErrorInvalidPtx: The PTX is invalid"),
        219 => cstr!("cudaErrorInvalidGraphicsContext: Invalid OpenGL or DirectX context"),
        300 => cstr!("cudaErrorInvalidSource: The device kernel source is invalid"),
        301 => cstr!("cudaErrorFileNotFound: File not found"),
        302 => cstr!("cudaErrorSharedObjectSymbolNotFound: Shared object symbol not found"),
        303 => cstr!("cudaErrorSharedObjectInitFailed: Shared object initialization failed"),
        400 => cstr!("cudaErrorInvalidResourceHandle: Invalid resource handle"),
        600 => cstr!("cudaErrorNotReady: CUDA operations are not ready"),
        700 => cstr!("cudaErrorIllegalAddress: An illegal memory access occurred"),
        701 => cstr!("cudaErrorLaunchOutOfResources: Launch exceeded resources"),
        702 => cstr!("cudaErrorLaunchTimeout: Launch timed out"),
        719 => cstr!("cudaErrorLaunchFailure: Launch failure"),
        999 => cstr!("cudaErrorUnknown: Unknown error"),
        _ => cstr!("Unknown CUDA error"),
    }
}

#[no_mangle]
pub extern "C" fn cudaGetErrorString(error: CudaError) -> *const c_char {
    error_string_ptr(error)
}
