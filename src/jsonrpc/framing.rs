//! Content-Length-delimited framing over an async byte stream, tolerant of
//! bare-LF line endings and stray zero-length frames the way a language
//! server's stdout occasionally produces around process startup/teardown.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::message::Message;

/// Reads one `Content-Length`-delimited JSON-RPC message, looping past
/// header lines until a blank line ends the header block. Returns `Ok(None)`
/// at EOF. A zero or missing `Content-Length` is treated as noise and the
/// read loop continues rather than erroring, since a language server's pipe
/// occasionally emits one around startup.
pub async fn read_message<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> std::io::Result<Option<Message>> {
    loop {
        let mut content_length: Option<usize> = None;
        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                return Ok(None);
            }
            while line.ends_with('\n') || line.ends_with('\r') {
                line.pop();
            }
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.trim().eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse::<usize>().ok();
                }
            }
        }

        let Some(len) = content_length else {
            continue;
        };
        if len == 0 {
            continue;
        }

        let mut body = vec![0u8; len];
        tokio::io::AsyncReadExt::read_exact(reader, &mut body).await?;
        let text = String::from_utf8(body)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let msg: Message = serde_json::from_str(&text)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        return Ok(Some(msg));
    }
}

/// Writes one message as `Content-Length: N\r\n\r\n<json>`, flushing so the
/// child process sees it immediately even if it's buffering on stdin.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> std::io::Result<()> {
    let body = serde_json::to_vec(message)?;
    writer.write_all(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonrpc::message::{JsonRpcVersion, Notification, RequestId, Response};
    use std::io::Cursor;

    #[tokio::test]
    async fn reads_a_single_framed_message() {
        let body = r#"{"jsonrpc":"2.0","method":"initialized","params":{}}"#;
        let framed = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);
        let mut reader = Cursor::new(framed.into_bytes());
        let msg = read_message(&mut reader).await.unwrap().unwrap();
        match msg {
            Message::Notification(n) => assert_eq!(n.method, "initialized"),
            other => panic!("expected notification, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tolerates_bare_lf_headers() {
        let body = r#"{"jsonrpc":"2.0","method":"ping","params":null}"#;
        let framed = format!("Content-Length: {}\n\n{}", body.len(), body);
        let mut reader = Cursor::new(framed.into_bytes());
        let msg = read_message(&mut reader).await.unwrap().unwrap();
        assert!(matches!(msg, Message::Notification(_)));
    }

    #[tokio::test]
    async fn skips_zero_length_frame_and_reads_the_next_message() {
        let body = r#"{"jsonrpc":"2.0","method":"ping","params":null}"#;
        let framed = format!("Content-Length: 0\r\n\r\nContent-Length: {}\r\n\r\n{}", body.len(), body);
        let mut reader = Cursor::new(framed.into_bytes());
        let msg = read_message(&mut reader).await.unwrap().unwrap();
        assert!(matches!(msg, Message::Notification(_)));
    }

    #[tokio::test]
    async fn eof_before_any_header_yields_none() {
        let mut reader = Cursor::new(Vec::new());
        let msg = read_message(&mut reader).await.unwrap();
        assert!(msg.is_none());
    }

    #[tokio::test]
    async fn round_trips_a_written_response() {
        let mut buf = Vec::new();
        let msg = Message::Response(Response::new(RequestId::Number(1), serde_json::json!({"ok": true})));
        write_message(&mut buf, &msg).await.unwrap();

        let mut reader = Cursor::new(buf);
        let read_back = read_message(&mut reader).await.unwrap().unwrap();
        match read_back {
            Message::Response(r) => assert_eq!(r.id, RequestId::Number(1)),
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[allow(dead_code)]
    fn assert_notification_shape(_: Notification, _: JsonRpcVersion) {}
}
