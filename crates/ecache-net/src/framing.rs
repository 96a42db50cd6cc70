//! Length-prefixed message framing over any async byte stream.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::MAX_MESSAGE_SIZE;
use crate::error::NetError;
use crate::message::CacheMessage;

/// Write one frame and flush it.
pub async fn write_message<W>(writer: &mut W, message: &CacheMessage) -> Result<(), NetError>
where
    W: AsyncWrite + Unpin,
{
    let payload = postcard::to_allocvec(message)?;
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(NetError::MessageTooLarge {
            len: payload.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame.
///
/// Returns [`NetError::ConnectionClosed`] if the stream ends cleanly before
/// the length prefix.
pub async fn read_message<R>(reader: &mut R) -> Result<CacheMessage, NetError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(NetError::ConnectionClosed);
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(NetError::MessageTooLarge {
            len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(postcard::from_bytes(&payload)?)
}
