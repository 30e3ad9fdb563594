pub mod ops;
pub mod transport;
pub mod types;

pub use ops::RpcOp;
pub use transport::{Request, RequestId, Response, Transport, TransportError, CHANNEL};
pub use types::{Dim3, MemcpyKind, Uint3};
