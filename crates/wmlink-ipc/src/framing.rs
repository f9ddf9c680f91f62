//! Socket framing for transactions.
//!
//! Every frame is a 4-byte big-endian length followed by the body:
//!
//! ```text
//! kind:u8 seq:u64 target:u64 code:u32 flags:u32
//! data_len:u32 data[data_len]
//! object_count:u32 (owner:u8 handle:u64)*
//! ```
//!
//! For replies `code` carries a `ReplyStatus`.

use std::io::Read;

use crate::error::TransportError;
use crate::transport::CallMode;

/// Largest body accepted from a peer.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

const HEADER_LEN: usize = 1 + 8 + 8 + 4 + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Request,
    Reply,
}

/// Remote object reference as it crosses the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectRef {
    /// Handle in the sender's export table.
    Sender(u64),
    /// Handle the receiver exported earlier, passed back to it.
    Receiver(u64),
}

/// Outcome of a request, as seen by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Ok,
    Rejected,
    UnknownHandle,
    DeadObject,
    Unsupported,
    Malformed,
}

impl ReplyStatus {
    pub const fn code(self) -> u32 {
        match self {
            ReplyStatus::Ok => 0,
            ReplyStatus::Rejected => 1,
            ReplyStatus::UnknownHandle => 2,
            ReplyStatus::DeadObject => 3,
            ReplyStatus::Unsupported => 4,
            ReplyStatus::Malformed => 5,
        }
    }

    pub const fn from_code(code: u32) -> Self {
        match code {
            0 => ReplyStatus::Ok,
            1 => ReplyStatus::Rejected,
            2 => ReplyStatus::UnknownHandle,
            3 => ReplyStatus::DeadObject,
            4 => ReplyStatus::Unsupported,
            _ => ReplyStatus::Malformed,
        }
    }

    pub fn from_result(result: &Result<(), TransportError>) -> Self {
        match result {
            Ok(()) => ReplyStatus::Ok,
            Err(TransportError::Rejected) => ReplyStatus::Rejected,
            Err(TransportError::UnknownHandle(_)) => ReplyStatus::UnknownHandle,
            Err(TransportError::DeadObject) => ReplyStatus::DeadObject,
            Err(TransportError::Unsupported) => ReplyStatus::Unsupported,
            Err(_) => ReplyStatus::Malformed,
        }
    }

    pub fn into_result(self, target: u64) -> Result<(), TransportError> {
        match self {
            ReplyStatus::Ok => Ok(()),
            ReplyStatus::Rejected => Err(TransportError::Rejected),
            ReplyStatus::UnknownHandle => Err(TransportError::UnknownHandle(target)),
            ReplyStatus::DeadObject => Err(TransportError::DeadObject),
            ReplyStatus::Unsupported => Err(TransportError::Unsupported),
            ReplyStatus::Malformed => Err(TransportError::Malformed("peer could not process request".into())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub seq: u64,
    pub target: u64,
    pub code: u32,
    pub flags: u32,
    pub data: Vec<u8>,
    pub objects: Vec<ObjectRef>,
}

impl Frame {
    pub fn request(
        seq: u64,
        target: u64,
        code: u32,
        mode: CallMode,
        data: Vec<u8>,
        objects: Vec<ObjectRef>,
    ) -> Self {
        Self {
            kind: FrameKind::Request,
            seq,
            target,
            code,
            flags: mode.flags(),
            data,
            objects,
        }
    }

    pub fn reply(seq: u64, status: ReplyStatus, data: Vec<u8>, objects: Vec<ObjectRef>) -> Self {
        Self {
            kind: FrameKind::Reply,
            seq,
            target: 0,
            code: status.code(),
            flags: 0,
            data,
            objects,
        }
    }

    pub fn mode(&self) -> CallMode {
        CallMode::from_flags(self.flags)
    }

    /// Encode with length prefix (4 bytes, big-endian).
    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        let body_len = HEADER_LEN + 4 + self.data.len() + 4 + self.objects.len() * 9;
        if body_len > MAX_FRAME_LEN {
            return Err(TransportError::Malformed(format!(
                "frame of {} bytes exceeds limit",
                body_len
            )));
        }

        let mut buf = Vec::with_capacity(4 + body_len);
        buf.extend_from_slice(&(body_len as u32).to_be_bytes());
        buf.push(match self.kind {
            FrameKind::Request => 1,
            FrameKind::Reply => 2,
        });
        buf.extend_from_slice(&self.seq.to_be_bytes());
        buf.extend_from_slice(&self.target.to_be_bytes());
        buf.extend_from_slice(&self.code.to_be_bytes());
        buf.extend_from_slice(&self.flags.to_be_bytes());
        buf.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.data);
        buf.extend_from_slice(&(self.objects.len() as u32).to_be_bytes());
        for object in &self.objects {
            let (owner, handle) = match object {
                ObjectRef::Sender(handle) => (0u8, handle),
                ObjectRef::Receiver(handle) => (1u8, handle),
            };
            buf.push(owner);
            buf.extend_from_slice(&handle.to_be_bytes());
        }
        Ok(buf)
    }

    /// Decode a frame body (without the length prefix).
    pub fn decode(body: &[u8]) -> Result<Self, TransportError> {
        let mut cursor = Cursor { buf: body, pos: 0 };
        let kind = match cursor.u8()? {
            1 => FrameKind::Request,
            2 => FrameKind::Reply,
            other => return Err(TransportError::Malformed(format!("frame kind {}", other))),
        };
        let seq = cursor.u64()?;
        let target = cursor.u64()?;
        let code = cursor.u32()?;
        let flags = cursor.u32()?;
        let data_len = cursor.u32()? as usize;
        let data = cursor.bytes(data_len)?.to_vec();
        let object_count = cursor.u32()? as usize;
        if object_count > MAX_FRAME_LEN / 9 {
            return Err(TransportError::Malformed(format!("{} objects", object_count)));
        }
        let mut objects = Vec::with_capacity(object_count);
        for _ in 0..object_count {
            let owner = cursor.u8()?;
            let handle = cursor.u64()?;
            objects.push(match owner {
                0 => ObjectRef::Sender(handle),
                1 => ObjectRef::Receiver(handle),
                other => {
                    return Err(TransportError::Malformed(format!("object owner {}", other)));
                }
            });
        }
        if cursor.pos != body.len() {
            return Err(TransportError::Malformed("trailing bytes after frame".into()));
        }
        Ok(Frame {
            kind,
            seq,
            target,
            code,
            flags,
            data,
            objects,
        })
    }

    /// Validate a length prefix read off the wire.
    pub fn check_len(len_buf: [u8; 4]) -> Result<usize, TransportError> {
        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_FRAME_LEN {
            return Err(TransportError::Malformed(format!(
                "message too large: {} bytes",
                len
            )));
        }
        Ok(len)
    }
}

/// Read one frame from a blocking stream. `Ok(None)` on clean EOF.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Frame>, TransportError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = Frame::check_len(len_buf)?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Frame::decode(&body).map(Some)
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn bytes(&mut self, n: usize) -> Result<&'a [u8], TransportError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| TransportError::Malformed("truncated frame".into()))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, TransportError> {
        Ok(self.bytes(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, TransportError> {
        let mut out = [0u8; 4];
        out.copy_from_slice(self.bytes(4)?);
        Ok(u32::from_be_bytes(out))
    }

    fn u64(&mut self) -> Result<u64, TransportError> {
        let mut out = [0u8; 8];
        out.copy_from_slice(self.bytes(8)?);
        Ok(u64::from_be_bytes(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_frame_through_reader() {
        let frame = Frame::request(
            9,
            0,
            16,
            CallMode::OneWay,
            vec![1, 2, 3],
            vec![ObjectRef::Sender(4), ObjectRef::Receiver(2)],
        );
        let encoded = frame.encode().unwrap();
        let mut reader = std::io::Cursor::new(encoded);
        let decoded = read_frame(&mut reader).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.mode(), CallMode::OneWay);
        assert!(read_frame(&mut reader).unwrap().is_none());
    }

    #[test]
    fn test_oversized_length_rejected() {
        let len = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes();
        assert!(Frame::check_len(len).is_err());

        let frame = Frame::request(1, 0, 1, CallMode::Sync, vec![0; MAX_FRAME_LEN], Vec::new());
        assert!(frame.encode().is_err());
    }

    #[test]
    fn test_truncated_body_rejected() {
        let encoded = Frame::reply(3, ReplyStatus::Ok, vec![7; 10], Vec::new())
            .encode()
            .unwrap();
        let body = &encoded[4..encoded.len() - 2];
        assert!(Frame::decode(body).is_err());
    }

    #[test]
    fn test_reply_status_mapping() {
        let status = ReplyStatus::from_result(&Err(TransportError::DeadObject));
        assert_eq!(status, ReplyStatus::DeadObject);
        assert_eq!(
            ReplyStatus::from_code(status.code()).into_result(5),
            Err(TransportError::DeadObject)
        );
        assert_eq!(
            ReplyStatus::UnknownHandle.into_result(5),
            Err(TransportError::UnknownHandle(5))
        );
    }
}
