//! Adapter over the externally linked `rpc_*` transport library.
//!
//! The transport library owns connection setup, framing and request
//! atomicity; this module only translates its C status-code convention
//! (negative on failure) into the [`Transport`] contract.

use std::ffi::{c_int, c_uint, c_void};

use rcuda_protocol::{RequestId, RpcOp, Transport, TransportError};

extern "C" {
    fn rpc_start_request(index: c_int, request: c_uint) -> c_int;
    fn rpc_write(index: c_int, data: *const c_void, size: usize) -> c_int;
    fn rpc_wait_for_response(index: c_int) -> c_int;
    fn rpc_read(index: c_int, data: *mut c_void, size: usize) -> c_int;
    fn rpc_end_request(index: c_int, return_value: *mut c_void) -> c_int;
    fn rpc_close() -> c_int;
}

fn check(rc: c_int) -> Result<(), TransportError> {
    if rc < 0 {
        Err(TransportError::Rejected(rc))
    } else {
        Ok(())
    }
}

pub(crate) struct LinkedTransport;

impl Transport for LinkedTransport {
    fn start_request(&self, channel: u32, op: RpcOp) -> Result<RequestId, TransportError> {
        let id = unsafe { rpc_start_request(channel as c_int, op.code()) };
        if id < 0 {
            return Err(TransportError::Rejected(id));
        }
        Ok(RequestId(id as u32))
    }

    fn write(&self, channel: u32, data: &[u8]) -> Result<(), TransportError> {
        check(unsafe { rpc_write(channel as c_int, data.as_ptr() as *const c_void, data.len()) })
    }

    fn wait_for_response(&self, channel: u32) -> Result<(), TransportError> {
        check(unsafe { rpc_wait_for_response(channel as c_int) })
    }

    fn read(&self, channel: u32, out: &mut [u8]) -> Result<(), TransportError> {
        check(unsafe { rpc_read(channel as c_int, out.as_mut_ptr() as *mut c_void, out.len()) })
    }

    fn end_request(&self, channel: u32) -> Result<i32, TransportError> {
        let mut status: i32 = 0;
        check(unsafe {
            rpc_end_request(channel as c_int, &mut status as *mut i32 as *mut c_void)
        })?;
        Ok(status)
    }

    fn close(&self) {
        unsafe {
            rpc_close();
        }
    }
}
