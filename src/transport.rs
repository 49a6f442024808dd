//! # Gateway Transport
//!
//! The stream seam between the engine and the gateway socket.
//!
//! - [`Connector`] opens a byte stream; [`TcpConnector`] is the production one
//! - [`Link`] owns one open stream as a reader task and a writer task, and
//!   reports everything back to the engine as [`LinkEvent`]s tagged with the
//!   connection epoch
//!
//! Inbound bytes are re-framed on the MBAP length field, so the engine always
//! sees whole frames regardless of how the socket chunks them.

use std::future::Future;
use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::constants::{MBAP_PREFIX_LEN, MODBUS_RESPONSE_BUFFER_SIZE};

/// Opens the byte stream to the gateway.
///
/// Implement this to run the client over something other than plain TCP
/// (TLS, an in-memory pipe in tests).
pub trait Connector: Send + Sync + 'static {
    /// Stream type produced by a successful connect.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a new stream to `host:port`.
    fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Plain TCP with Nagle disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self, host: &str, port: u16) -> impl Future<Output = io::Result<TcpStream>> + Send {
        let address = format!("{}:{}", host, port);
        async move {
            let stream = TcpStream::connect(address).await?;
            stream.set_nodelay(true)?;
            Ok(stream)
        }
    }
}

/// Something the link tells the engine.
#[derive(Debug)]
pub(crate) enum LinkEvent {
    /// One complete MBAP frame.
    Frame(Bytes),
    /// Writing a request failed. The connection stays up.
    WriteFailed { transaction_id: u16, message: String },
    /// The gateway closed the stream or the read side failed.
    Closed,
}

/// A stamped request on its way to the writer task.
#[derive(Debug)]
pub(crate) struct OutboundFrame {
    pub transaction_id: u16,
    pub bytes: Bytes,
}

pub(crate) type EventSender = mpsc::UnboundedSender<(u64, LinkEvent)>;

/// An open connection: reader and writer tasks sharing one stream.
///
/// Dropping the link aborts both tasks, which closes the stream.
#[derive(Debug)]
pub(crate) struct Link {
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Link {
    pub fn spawn<S>(stream: S, epoch: u64, events: EventSender) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_loop(read_half, epoch, events.clone()));
        let writer = tokio::spawn(write_loop(write_half, epoch, outbound_rx, events));

        Self {
            outbound,
            reader,
            writer,
        }
    }

    /// Queue a frame for the writer task. Fails only if the task is gone.
    pub fn send(&self, frame: OutboundFrame) -> Result<(), OutboundFrame> {
        self.outbound.send(frame).map_err(|e| e.0)
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Cut one complete frame off the front of `buf`.
///
/// A frame announcing more than [`MODBUS_RESPONSE_BUFFER_SIZE`] bytes cannot
/// be a valid response; the buffer is dropped so the reader can resync.
pub(crate) fn split_frame(buf: &mut BytesMut) -> Option<Bytes> {
    if buf.len() < MBAP_PREFIX_LEN {
        return None;
    }

    let following = usize::from(u16::from_be_bytes([buf[4], buf[5]]));
    let total = MBAP_PREFIX_LEN + following;
    if total > MODBUS_RESPONSE_BUFFER_SIZE {
        warn!(
            announced = total,
            buffered = buf.len(),
            "Oversized frame, discarding receive buffer"
        );
        buf.clear();
        return None;
    }

    if buf.len() < total {
        return None;
    }

    Some(buf.split_to(total).freeze())
}

async fn read_loop<R>(mut reader: R, epoch: u64, events: EventSender)
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(MODBUS_RESPONSE_BUFFER_SIZE);

    loop {
        match reader.read_buf(&mut buf).await {
            Ok(0) => {
                debug!(epoch, "Gateway closed the connection");
                break;
            }
            Ok(_) => {
                while let Some(frame) = split_frame(&mut buf) {
                    if events.send((epoch, LinkEvent::Frame(frame))).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(epoch, error = %e, "Connection error");
                break;
            }
        }
    }

    let _ = events.send((epoch, LinkEvent::Closed));
}

async fn write_loop<W>(
    mut writer: W,
    epoch: u64,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    events: EventSender,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = outbound.recv().await {
        let result = match writer.write_all(&frame.bytes).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            warn!(
                epoch,
                transaction_id = frame.transaction_id,
                error = %e,
                "Failed to write request"
            );
            let event = LinkEvent::WriteFailed {
                transaction_id: frame.transaction_id,
                message: e.to_string(),
            };
            if events.send((epoch, event)).is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(transaction_id: u16, pdu: &[u8]) -> Vec<u8> {
        let mut out = transaction_id.to_be_bytes().to_vec();
        out.extend_from_slice(&[0x00, 0x00]);
        out.extend_from_slice(&(pdu.len() as u16).to_be_bytes());
        out.extend_from_slice(pdu);
        out
    }

    #[test]
    fn test_split_frame_waits_for_full_frame() {
        let full = frame(7, &[0x01, 0x03, 0x02, 0x00, 0x2A]);
        let mut buf = BytesMut::from(&full[..4]);
        assert!(split_frame(&mut buf).is_none());

        buf.extend_from_slice(&full[4..9]);
        assert!(split_frame(&mut buf).is_none());

        buf.extend_from_slice(&full[9..]);
        assert_eq!(split_frame(&mut buf).unwrap().as_ref(), &full[..]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_split_frame_back_to_back() {
        let first = frame(1, &[0x01, 0x83, 0x0A]);
        let second = frame(2, &[0x02, 0x03, 0x02, 0x12, 0x34]);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&first);
        buf.extend_from_slice(&second);

        assert_eq!(split_frame(&mut buf).unwrap().as_ref(), &first[..]);
        assert_eq!(split_frame(&mut buf).unwrap().as_ref(), &second[..]);
        assert!(split_frame(&mut buf).is_none());
    }

    #[test]
    fn test_split_frame_discards_oversized() {
        let mut buf = BytesMut::from(&[0x00, 0x01, 0x00, 0x00, 0x10, 0x00, 0x01][..]);
        assert!(split_frame(&mut buf).is_none());
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_link_reframes_and_reports_close() {
        let (client, mut gateway) = tokio::io::duplex(1024);
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let link = Link::spawn(client, 3, events_tx);

        let first = frame(1, &[0x01, 0x03, 0x02, 0x00, 0x01]);
        let second = frame(2, &[0x01, 0x03, 0x02, 0x00, 0x02]);
        let mut joined = first.clone();
        joined.extend_from_slice(&second[..5]);
        gateway.write_all(&joined).await.unwrap();
        gateway.write_all(&second[5..]).await.unwrap();

        for expected in [&first, &second] {
            match events.recv().await {
                Some((3, LinkEvent::Frame(bytes))) => assert_eq!(bytes.as_ref(), &expected[..]),
                other => panic!("unexpected event: {:?}", other),
            }
        }

        link.send(OutboundFrame {
            transaction_id: 9,
            bytes: Bytes::from_static(&[0xAB, 0xCD]),
        })
        .unwrap();
        let mut written = [0u8; 2];
        gateway.read_exact(&mut written).await.unwrap();
        assert_eq!(written, [0xAB, 0xCD]);

        drop(gateway);
        assert!(matches!(events.recv().await, Some((3, LinkEvent::Closed))));
    }
}
