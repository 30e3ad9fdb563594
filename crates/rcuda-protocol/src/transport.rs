//! The framed request/response transport contract and the per-request
//! state machine the shim drives against it.
//!
//! The transport itself (connection setup, framing, multiplexing) lives
//! outside this workspace; the shim only consumes this interface. A request
//! is a contiguous sequence of operations between `start_request` and
//! `end_request`; the transport serializes interleaved requesters so each
//! request occupies the wire atomically.

use crate::ops::RpcOp;
use crate::types::{Dim3, Uint3};

/// The channel the shim uses for every request.
pub const CHANNEL: u32 = 0;

/// Identifier handed out by `start_request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u32);

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport rejected the operation (code {0})")]
    Rejected(i32),

    #[error("no transport is connected")]
    NotConnected,

    #[error("short or missing response")]
    ShortResponse,
}

/// Framed request/response channel to the remote executor.
///
/// All methods may block on I/O. Scalar arguments are encoded by the caller
/// (see [`Request`]); the transport moves opaque bytes.
pub trait Transport: Send + Sync {
    fn start_request(&self, channel: u32, op: RpcOp) -> Result<RequestId, TransportError>;
    fn write(&self, channel: u32, data: &[u8]) -> Result<(), TransportError>;
    fn wait_for_response(&self, channel: u32) -> Result<(), TransportError>;
    fn read(&self, channel: u32, out: &mut [u8]) -> Result<(), TransportError>;
    /// Finish the request and return the remote status code.
    fn end_request(&self, channel: u32) -> Result<i32, TransportError>;
    fn close(&self);
}

/// An in-flight request in its argument-writing phase.
///
/// Together with [`Response`] this encodes the request lifecycle in types:
/// a request is started, written to in declared argument order, then
/// `wait`ed into a [`Response`] whose return values are read in declared
/// order before `finish` yields the remote status. Dropping either half
/// mid-flight is legal; the transport resynchronizes frames.
///
/// All multi-byte scalars travel little-endian.
pub struct Request<'t> {
    transport: &'t dyn Transport,
    channel: u32,
    id: RequestId,
}

impl<'t> Request<'t> {
    pub fn start(
        transport: &'t dyn Transport,
        channel: u32,
        op: RpcOp,
    ) -> Result<Self, TransportError> {
        let id = transport.start_request(channel, op)?;
        Ok(Self {
            transport,
            channel,
            id,
        })
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.transport.write(self.channel, data)
    }

    pub fn write_u8(&mut self, v: u8) -> Result<(), TransportError> {
        self.write_bytes(&[v])
    }

    pub fn write_i32(&mut self, v: i32) -> Result<(), TransportError> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<(), TransportError> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_u64(&mut self, v: u64) -> Result<(), TransportError> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_dim3(&mut self, v: Dim3) -> Result<(), TransportError> {
        self.write_u32(v.x)?;
        self.write_u32(v.y)?;
        self.write_u32(v.z)
    }

    pub fn write_uint3(&mut self, v: Uint3) -> Result<(), TransportError> {
        self.write_u32(v.x)?;
        self.write_u32(v.y)?;
        self.write_u32(v.z)
    }

    /// Write a u64 byte length followed by the bytes themselves. String
    /// arguments use this framing and keep their NUL terminator.
    pub fn write_sized_bytes(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.write_u64(data.len() as u64)?;
        self.write_bytes(data)
    }

    /// Transition to the response-reading phase.
    pub fn wait(self) -> Result<Response<'t>, TransportError> {
        self.transport.wait_for_response(self.channel)?;
        Ok(Response {
            transport: self.transport,
            channel: self.channel,
        })
    }
}

/// The response-reading phase of a request.
pub struct Response<'t> {
    transport: &'t dyn Transport,
    channel: u32,
}

impl<'t> Response<'t> {
    pub fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), TransportError> {
        self.transport.read(self.channel, out)
    }

    pub fn read_u32(&mut self) -> Result<u32, TransportError> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_u64(&mut self) -> Result<u64, TransportError> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_dim3(&mut self) -> Result<Dim3, TransportError> {
        Ok(Dim3 {
            x: self.read_u32()?,
            y: self.read_u32()?,
            z: self.read_u32()?,
        })
    }

    /// Finish the request and return the remote status code.
    pub fn finish(self) -> Result<i32, TransportError> {
        self.transport.end_request(self.channel)
    }
}
