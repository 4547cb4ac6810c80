use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;

/// Byte width of the length prefix on every framed message.
pub const HEADER_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("connection closed mid-frame after {received} of {expected} bytes")]
    IncompleteFrame { expected: usize, received: usize },
    #[error("payload of {len} bytes does not fit a u32 length prefix")]
    PayloadTooLarge { len: usize },
    #[error("frame transport failed: {error}")]
    Io {
        #[source]
        error: std::io::Error,
    },
}

impl FramingError {
    fn io(error: std::io::Error) -> Self {
        Self::Io { error }
    }
}

/// Write one length-prefixed frame: big-endian u32 byte count, then payload.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len())
        .map_err(|_| FramingError::PayloadTooLarge { len: payload.len() })?;
    writer
        .write_all(&len.to_be_bytes())
        .await
        .map_err(FramingError::io)?;
    writer.write_all(payload).await.map_err(FramingError::io)?;
    writer.flush().await.map_err(FramingError::io)?;
    Ok(())
}

/// Read one frame. `Ok(None)` means the peer closed cleanly between frames;
/// closing mid-header or mid-payload is an [`FramingError::IncompleteFrame`].
/// Never decodes a partial frame: blocks until all payload bytes arrived.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FramingError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let mut received = 0;
    while received < HEADER_LEN {
        let n = reader
            .read(&mut header[received..])
            .await
            .map_err(FramingError::io)?;
        if n == 0 {
            if received == 0 {
                return Ok(None);
            }
            return Err(FramingError::IncompleteFrame {
                expected: HEADER_LEN,
                received,
            });
        }
        received += n;
    }

    let expected = u32::from_be_bytes(header) as usize;
    let mut payload = vec![0u8; expected];
    let mut received = 0;
    while received < expected {
        let n = reader
            .read(&mut payload[received..])
            .await
            .map_err(FramingError::io)?;
        if n == 0 {
            return Err(FramingError::IncompleteFrame { expected, received });
        }
        received += n;
    }
    Ok(Some(payload))
}
