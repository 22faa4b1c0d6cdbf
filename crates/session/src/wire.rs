//! Async read/write helpers that frame a [`ControlOperation`] header plus
//! its payload over any `AsyncRead`/`AsyncWrite` byte stream (a
//! `tokio::net::UnixStream` in the local controller, an in-memory duplex
//! pipe in tests). One frame, one header, grounded on the original's
//! synchronous `recv(socket, &header, sizeof(ControlOperation))` followed by
//! `recv(socket, payload, header.m_size)` pattern.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::control_operation::{ControlOperation, HEADER_LEN};

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("connection closed mid-frame")]
    Closed,
    #[error("malformed header")]
    MalformedHeader,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    header: ControlOperation,
    payload: &[u8],
) -> Result<(), WireError> {
    writer.write_all(&header.encode()).await?;
    if !payload.is_empty() {
        writer.write_all(payload).await?;
    }
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<(ControlOperation, Bytes), WireError> {
    let mut header_bytes = BytesMut::zeroed(HEADER_LEN);
    reader
        .read_exact(&mut header_bytes)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => WireError::Closed,
            _ => WireError::Io(e),
        })?;
    let header = ControlOperation::decode(header_bytes.freeze()).ok_or(WireError::MalformedHeader)?;

    let size = header.size.max(0) as usize;
    let mut payload = BytesMut::zeroed(size);
    if size > 0 {
        reader.read_exact(&mut payload).await?;
    }
    Ok((header, payload.freeze()))
}
