//! IPC protocol for client-daemon communication over sockets

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
   Result,
   error::{Error, IpcError},
   types::{Location, QueryKind, QueryResult},
};

pub const PROTOCOL_VERSIONS: &[u32] = &[1];
pub const BINARY_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn negotiate_protocol(client_versions: &[u32]) -> Option<u32> {
   client_versions
      .iter()
      .copied()
      .filter(|version| PROTOCOL_VERSIONS.contains(version))
      .max()
}

pub fn client_hello() -> Request {
   Request::Hello {
      protocol_versions: PROTOCOL_VERSIONS.to_vec(),
      client_version:    BINARY_VERSION.to_string(),
   }
}

/// Client request messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
   Hello {
      protocol_versions: Vec<u32>,
      client_version:    String,
   },
   Ping,
   Query {
      kind:     QueryKind,
      location: Location,
   },
   Shutdown,
}

/// Server response messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
   Hello {
      protocol_version: u32,
      binary_version:   String,
   },
   Ack,
   Answer(QueryResult),
   Shutdown {
      success: bool,
   },
   Error {
      code:    String,
      message: String,
   },
}

impl Response {
   pub fn from_error(err: &Error) -> Self {
      Self::Error { code: err.code().to_string(), message: err.to_string() }
   }
}

/// Stack-allocated buffer for socket I/O operations
pub struct SocketBuffer {
   buf: SmallVec<[u8; 2048]>,
}

const DEFAULT_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

impl Extend<u8> for &mut SocketBuffer {
   fn extend<I: IntoIterator<Item = u8>>(&mut self, iter: I) {
      self.buf.extend(iter);
   }
}

impl Default for SocketBuffer {
   fn default() -> Self {
      Self::new()
   }
}

impl SocketBuffer {
   pub fn new() -> Self {
      Self { buf: SmallVec::new() }
   }

   #[allow(
      clippy::future_not_send,
      reason = "Generic async function with references - Send bound would be too restrictive for \
                trait"
   )]
   /// Serializes and sends a message with length prefix
   pub async fn send<W, T>(&mut self, writer: &mut W, msg: &T) -> Result<()>
   where
      W: AsyncWrite + Unpin,
      T: Serialize,
   {
      self.buf.clear();
      self.buf.extend_from_slice(&[0u8; 4]);
      _ = postcard::to_extend(msg, &mut *self).map_err(IpcError::Serialize)?;
      let payload_len = u32::try_from(self.buf.len() - 4)
         .map_err(|_| IpcError::MessageTooLarge(self.buf.len() - 4))?;
      self.buf[..4].copy_from_slice(&payload_len.to_le_bytes());
      writer.write_all(&self.buf).await.map_err(IpcError::Write)?;
      writer.flush().await.map_err(IpcError::Write)?;
      Ok(())
   }

   /// Receives and deserializes a message with length prefix
   pub async fn recv<'de, R, T>(&'de mut self, reader: &mut R) -> Result<T>
   where
      R: AsyncRead + Unpin,
      T: Deserialize<'de>,
   {
      self
         .recv_with_limit(reader, DEFAULT_MAX_MESSAGE_BYTES)
         .await
   }

   pub async fn recv_with_limit<'de, R, T>(
      &'de mut self,
      reader: &mut R,
      max_len: usize,
   ) -> Result<T>
   where
      R: AsyncRead + Unpin,
      T: Deserialize<'de>,
   {
      let mut len_buf = [0u8; 4];
      reader
         .read_exact(&mut len_buf)
         .await
         .map_err(IpcError::Read)?;
      let len = u32::from_le_bytes(len_buf) as usize;

      if len > max_len {
         return Err(IpcError::MessageTooLarge(len).into());
      }

      self.buf.resize(len, 0u8);
      reader
         .read_exact(self.buf.as_mut_slice())
         .await
         .map_err(IpcError::Read)?;
      postcard::from_bytes(&self.buf).map_err(|e| IpcError::Deserialize(e).into())
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::types::Definition;

   #[tokio::test]
   async fn query_request_survives_framing() {
      let (mut client, mut server) = tokio::io::duplex(4096);
      let mut tx = SocketBuffer::new();
      let request = Request::Query {
         kind:     QueryKind::Callers,
         location: Location::new("main.go:#120").with_scope("a,b"),
      };
      tx.send(&mut client, &request).await.unwrap();

      let mut rx = SocketBuffer::new();
      let got: Request = rx.recv(&mut server).await.unwrap();
      match got {
         Request::Query { kind, location } => {
            assert_eq!(kind, QueryKind::Callers);
            assert_eq!(location.scope(), Some("a,b"));
         },
         other => panic!("unexpected request: {other:?}"),
      }
   }

   #[tokio::test]
   async fn answer_larger_than_inline_buffer() {
      let (mut client, mut server) = tokio::io::duplex(64 * 1024);
      let desc = "x".repeat(10_000);
      let response = Response::Answer(QueryResult::Definition(Definition {
         obj_pos: "a.go:1:1".to_string(),
         desc:    desc.clone(),
      }));
      SocketBuffer::new().send(&mut client, &response).await.unwrap();

      let got: Response = SocketBuffer::new().recv(&mut server).await.unwrap();
      let Response::Answer(QueryResult::Definition(def)) = got else {
         panic!("unexpected response");
      };
      assert_eq!(def.desc, desc);
   }
}
