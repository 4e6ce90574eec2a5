// ABOUTME: Frame-based I/O over any async byte stream for SMPP v3.4 sessions
// ABOUTME: Read and write halves are separate so one task can read while others submit

use crate::codec::{CodecError, Frame, PduHeader};
use bytes::{Buf, BytesMut};
use std::io::Cursor;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

/// Reads whole PDUs from the inbound half of an SMPP link.
///
/// ## SMPP v3.4 Session States (Section 2.1)
///
/// ```text
/// CLOSED → OPEN → BOUND_TRX → UNBOUND → CLOSED
/// ```
///
/// - **OPEN**: TCP connected, bind_transceiver not yet answered
/// - **BOUND_TRX**: submit_sm out, deliver_sm in, enquire_link either way
/// - **UNBOUND**: unbind sent or received, link about to close
///
/// The reader and writer only move frames; the state machine lives in
/// [`Session`](crate::client::Session).
#[derive(Debug)]
pub struct FrameReader<R> {
    stream: R,

    // Holds bytes received but not yet parsed into a frame.
    buffer: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(stream: R) -> Self {
        FrameReader {
            stream,
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Read a single `Frame` from the stream.
    ///
    /// Returns `Ok(None)` when the peer closes the stream on a PDU boundary.
    /// A PDU that is well framed but fails to decode is consumed and its
    /// error returned; the reader stays usable. Errors for which
    /// [`CodecError::is_fatal`] holds mean the link must be dropped.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, CodecError> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }

            // `0` indicates end of stream.
            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(CodecError::ConnectionReset);
            }
        }
    }

    fn parse_frame(&mut self) -> Result<Option<Frame>, CodecError> {
        let mut buf = Cursor::new(&self.buffer[..]);

        // Checking the length first avoids building a frame out of a
        // partially received PDU.
        let len = match Frame::check(&mut buf) {
            Ok(len) => len,
            Err(CodecError::Incomplete) => return Ok(None),
            Err(e) => return Err(e),
        };

        let pdu = &self.buffer[..len];
        let parsed = Frame::parse(pdu).map_err(|e| with_header(pdu, e));

        // The PDU is consumed whether or not it decoded, so a bad body does
        // not wedge the stream.
        self.buffer.advance(len);

        parsed.map(Some)
    }
}

/// Tags a body decoding error with the PDU's command_id and sequence_number
/// so the session can answer it. Header errors are returned as they are.
fn with_header(pdu: &[u8], error: CodecError) -> CodecError {
    if matches!(error, CodecError::InvalidCommandId { .. }) || error.is_fatal() {
        return error;
    }
    match PduHeader::decode(&mut Cursor::new(pdu)) {
        Ok(header) => CodecError::UndecodablePdu {
            command_id: header.command_id,
            sequence_number: header.sequence_number,
            source: Box::new(error),
        },
        Err(_) => error,
    }
}

/// Writes frames to the outbound half of an SMPP link.
#[derive(Debug)]
pub struct FrameWriter<W: AsyncWrite> {
    // Buffered so each PDU leaves in a single write after `flush`.
    stream: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(stream: W) -> Self {
        FrameWriter {
            stream: BufWriter::new(stream),
        }
    }

    /// Encode and send one frame, flushing it to the socket.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<(), CodecError> {
        let bytes = frame.to_bytes()?;
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), CodecError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
