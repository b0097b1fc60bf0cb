//! Wire framing.
//!
//! Request: 4-byte big-endian job identifier followed by the raw payload.
//! Response: raw payload bytes, unframed; one datagram per reply.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{RpcError, RpcResult};

/// Length of the job identifier prefix.
pub const JOB_ID_LEN: usize = 4;

/// Payload sent when the caller has nothing to pass to the node.
pub const PLACEHOLDER_PAYLOAD: &[u8] = b"                ";

/// Frame a job invocation.
pub fn encode_request(job_id: u32, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(JOB_ID_LEN + payload.len());
    buf.put_u32(job_id);
    buf.put_slice(payload);
    buf.freeze()
}

/// Split a request frame into job identifier and payload.
pub fn decode_request(mut frame: Bytes) -> RpcResult<(u32, Bytes)> {
    if frame.len() < JOB_ID_LEN {
        return Err(RpcError::Frame(format!(
            "request of {} bytes is shorter than the job id",
            frame.len()
        )));
    }
    let job_id = frame.get_u32();
    Ok((job_id, frame))
}
