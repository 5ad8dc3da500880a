/// Newline framing over a duplex stream.
///
/// Every message is one byte payload terminated by `\n`; payloads are JSON
/// text, which never contains a raw newline, so the delimiter is
/// unambiguous. Requests additionally lead with a fixed-width decimal
/// request-type tag.
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;

use crate::error::{ProtocolError, SyncError};

pub const FRAME_DELIMITER: u8 = b'\n';

/// Width of the decimal request-type tag leading every request.
pub const REQUEST_TYPE_LEN: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Handshake,
    SyncTxns,
}

impl RequestType {
    pub fn tag(self) -> u8 {
        match self {
            RequestType::Handshake => b'0',
            RequestType::SyncTxns => b'1',
        }
    }

    pub fn from_tag(tag: u8) -> Option<RequestType> {
        match tag {
            b'0' => Some(RequestType::Handshake),
            b'1' => Some(RequestType::SyncTxns),
            _ => None,
        }
    }
}

/// Read one frame, stripping the delimiter.
///
/// Returns `None` on a clean end of stream. A timeout bounds the wait when
/// one is given; a response that never arrives must not suspend the caller
/// forever.
pub async fn read_frame<R>(
    reader: &mut BufReader<R>,
    read_timeout: Option<Duration>,
) -> Result<Option<Vec<u8>>, SyncError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let read = reader.read_until(FRAME_DELIMITER, &mut buf);
    let n = match read_timeout {
        Some(limit) => timeout(limit, read).await.map_err(|_| {
            SyncError::Transport(io::Error::new(io::ErrorKind::TimedOut, "peer read timed out"))
        })??,
        None => read.await?,
    };
    if n == 0 {
        return Ok(None);
    }
    match buf.pop() {
        Some(FRAME_DELIMITER) => Ok(Some(buf)),
        _ => Err(ProtocolError::MalformedFrame("stream ended mid-frame").into()),
    }
}

/// Write one frame, appending the delimiter.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), SyncError>
where
    W: AsyncWrite + Unpin,
{
    if payload.contains(&FRAME_DELIMITER) {
        return Err(ProtocolError::MalformedFrame("payload contains a raw delimiter").into());
    }
    writer.write_all(payload).await?;
    writer.write_all(&[FRAME_DELIMITER]).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frame_round_trip() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = client;
        write_frame(&mut writer, br#"{"k":1}"#).await.unwrap();
        drop(writer);

        let mut reader = BufReader::new(server);
        let frame = read_frame(&mut reader, None).await.unwrap();
        assert_eq!(frame.as_deref(), Some(br#"{"k":1}"#.as_slice()));
        assert!(read_frame(&mut reader, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_frame_is_malformed() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = client;
        tokio::io::AsyncWriteExt::write_all(&mut writer, b"no delimiter")
            .await
            .unwrap();
        drop(writer);

        let mut reader = BufReader::new(server);
        let err = read_frame(&mut reader, None).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Protocol(ProtocolError::MalformedFrame(_))
        ));
    }

    #[tokio::test]
    async fn payload_with_delimiter_is_rejected() {
        let (client, _server) = tokio::io::duplex(64);
        let mut writer = client;
        let err = write_frame(&mut writer, b"line one\nline two")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Protocol(ProtocolError::MalformedFrame(_))
        ));
    }

    #[tokio::test]
    async fn stalled_read_times_out() {
        let (_client, server) = tokio::io::duplex(64);
        let mut reader = BufReader::new(server);
        let err = read_frame(&mut reader, Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        match err {
            SyncError::Transport(io) => assert_eq!(io.kind(), io::ErrorKind::TimedOut),
            other => panic!("expected transport timeout, got {other:?}"),
        }
    }

    #[test]
    fn request_tags_round_trip() {
        for kind in [RequestType::Handshake, RequestType::SyncTxns] {
            assert_eq!(RequestType::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(RequestType::from_tag(b'9'), None);
    }
}
