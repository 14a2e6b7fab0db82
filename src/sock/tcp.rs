//! TCP listener and stream bound to the well-known daemon address

use std::{
   io,
   net::SocketAddr,
   pin::Pin,
   task::{self, Poll},
};

use tokio::{
   io::ReadBuf,
   net::{TcpListener as TokioTcpListener, TcpStream as TokioTcpStream},
};

use super::SocketError;
use crate::Result;

/// TCP listener for the daemon endpoint
pub struct Listener {
   inner: TokioTcpListener,
   addr:  SocketAddr,
}

impl Listener {
   /// Binds `addr`, refusing to take over an endpoint a live daemon answers on
   pub async fn bind(addr: &str) -> Result<Self> {
      let inner = match TokioTcpListener::bind(addr).await {
         Ok(inner) => inner,
         Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
            if Stream::connect(addr).await.is_ok() {
               return Err(SocketError::AlreadyRunning(addr.to_string()).into());
            }
            return Err(SocketError::Bind { addr: addr.to_string(), source: e }.into());
         },
         Err(e) => return Err(SocketError::Bind { addr: addr.to_string(), source: e }.into()),
      };

      let addr = inner
         .local_addr()
         .map_err(|e| SocketError::Bind { addr: addr.to_string(), source: e })?;
      Ok(Self { inner, addr })
   }

   /// Accepts an incoming connection
   pub async fn accept(&self) -> Result<(Stream, SocketAddr)> {
      let (stream, peer) = self.inner.accept().await.map_err(SocketError::Accept)?;
      let _ = stream.set_nodelay(true);
      Ok((Stream { inner: stream }, peer))
   }

   /// Returns the bound address (resolves port 0 to the real port)
   pub const fn local_addr(&self) -> SocketAddr {
      self.addr
   }
}

/// TCP stream wrapper implementing async I/O
#[repr(transparent)]
pub struct Stream {
   inner: TokioTcpStream,
}

impl Stream {
   /// Connects to the daemon at `addr`
   pub async fn connect(addr: &str) -> Result<Self> {
      let inner = TokioTcpStream::connect(addr)
         .await
         .map_err(|e| SocketError::Connect { addr: addr.to_string(), source: e })?;
      let _ = inner.set_nodelay(true);
      Ok(Self { inner })
   }
}

impl tokio::io::AsyncRead for Stream {
   fn poll_read(
      mut self: Pin<&mut Self>,
      cx: &mut task::Context<'_>,
      buf: &mut ReadBuf<'_>,
   ) -> Poll<io::Result<()>> {
      Pin::new(&mut self.inner).poll_read(cx, buf)
   }
}

impl tokio::io::AsyncWrite for Stream {
   fn poll_write(
      mut self: Pin<&mut Self>,
      cx: &mut task::Context<'_>,
      buf: &[u8],
   ) -> Poll<io::Result<usize>> {
      Pin::new(&mut self.inner).poll_write(cx, buf)
   }

   fn poll_flush(mut self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<io::Result<()>> {
      Pin::new(&mut self.inner).poll_flush(cx)
   }

   fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<io::Result<()>> {
      Pin::new(&mut self.inner).poll_shutdown(cx)
   }
}
