//! DNS-over-TCP framing: a 2-byte big-endian length prefix before each
//! message (RFC 1035 §4.2.2). Shared by the TCP listener (client side of
//! the proxy) and the TCP forwarder (upstream side).

use auditdns_domain::ProxyError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAX_FRAME_LEN: usize = 65535;

pub async fn write_frame<S>(stream: &mut S, payload: &[u8]) -> Result<(), ProxyError>
where
    S: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProxyError::OversizedFrame(payload.len()));
    }

    let prefix = (payload.len() as u16).to_be_bytes();
    stream
        .write_all(&prefix)
        .await
        .map_err(|e| ProxyError::StreamIo(format!("failed to write length prefix: {}", e)))?;
    stream
        .write_all(payload)
        .await
        .map_err(|e| ProxyError::StreamIo(format!("failed to write message: {}", e)))?;
    stream
        .flush()
        .await
        .map_err(|e| ProxyError::StreamIo(format!("failed to flush stream: {}", e)))?;

    Ok(())
}

pub async fn read_frame<S>(stream: &mut S) -> Result<Vec<u8>, ProxyError>
where
    S: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 2];
    stream
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| ProxyError::TruncatedFrame(format!("length prefix: {}", e)))?;

    let len = u16::from_be_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    stream
        .read_exact(&mut payload)
        .await
        .map_err(|e| ProxyError::TruncatedFrame(format!("message body: {}", e)))?;

    Ok(payload)
}
