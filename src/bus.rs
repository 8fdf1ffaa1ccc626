//! Line-delimited JSON transport between the adapter and the bot framework.
//!
//! Inbound messages are written one JSON object per line. Each input line is
//! a bus message with an optional `mode` of `"send"` or `"reply"`, which
//! overrides its `is_reply` flag.

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::platform::BusMessage;

/// Decode one input line into the JSON form the relay accepts
pub fn parse_command(line: &str) -> Result<Value> {
    let mut value: Value = serde_json::from_str(line).context("Invalid JSON on bus input")?;
    let object = value
        .as_object_mut()
        .context("Bus input must be a JSON object")?;

    if let Some(mode) = object.remove("mode") {
        let is_reply = match mode.as_str() {
            Some("reply") => true,
            Some("send") => false,
            _ => anyhow::bail!("Unknown bus mode: {}", mode),
        };
        object.insert("is_reply".to_string(), Value::Bool(is_reply));
    }

    Ok(value)
}

/// Write every inbound message as a JSON line until the channel closes.
pub async fn write_inbound<W>(mut rx: mpsc::Receiver<BusMessage>, mut out: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = rx.recv().await {
        let mut line = serde_json::to_vec(&msg).context("Failed to encode bus message")?;
        line.push(b'\n');
        out.write_all(&line)
            .await
            .context("Failed to write bus message")?;
        out.flush().await.context("Failed to flush bus output")?;
        debug!("Forwarded status {} to bus", msg.message.id);
    }
    Ok(())
}

/// Read outbound commands until end of input, handing each to `dispatch`.
///
/// Lines that fail to parse are logged and skipped.
pub async fn read_outbound<R, F>(input: R, mut dispatch: F) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(Value),
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("Failed to read bus input")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_command(line) {
            Ok(value) => dispatch(value),
            Err(e) => warn!("Skipping bus input line: {:#}", e),
        }
    }
    info!("Bus input closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Content, Room, User};
    use serde_json::json;
    use tokio::io::BufReader;

    #[test]
    fn test_mode_overrides_is_reply() {
        let value = parse_command(r#"{"mode": "reply", "is_reply": false, "message": {}}"#).unwrap();
        assert_eq!(value["is_reply"], json!(true));
        assert!(value.get("mode").is_none());

        let value = parse_command(r#"{"mode": "send", "is_reply": true}"#).unwrap();
        assert_eq!(value["is_reply"], json!(false));
    }

    #[test]
    fn test_missing_mode_keeps_flag() {
        let value = parse_command(r#"{"is_reply": true}"#).unwrap();
        assert_eq!(value["is_reply"], json!(true));
    }

    #[test]
    fn test_bad_input_is_rejected() {
        assert!(parse_command("not json").is_err());
        assert!(parse_command("[1, 2]").is_err());
        assert!(parse_command(r#"{"mode": "shout"}"#).is_err());
    }

    #[tokio::test]
    async fn test_read_outbound_skips_bad_lines() {
        let input = b"{\"mode\":\"reply\",\"a\":1}\n\nnope\n{\"b\":2}\n";
        let mut seen = Vec::new();
        read_outbound(BufReader::new(&input[..]), |v| seen.push(v))
            .await
            .unwrap();
        assert_eq!(seen, vec![json!({"a": 1, "is_reply": true}), json!({"b": 2})]);
    }

    #[tokio::test]
    async fn test_write_inbound_emits_json_lines() {
        let (tx, rx) = mpsc::channel(4);
        let msg = BusMessage {
            user: User {
                id: "alice".to_string(),
                name: "Alice".to_string(),
            },
            room: Room {
                id: "mastodon".to_string(),
                name: "mastodon".to_string(),
                description: "mastodon".to_string(),
            },
            message: Content {
                id: "1".to_string(),
                text: "hi".to_string(),
                attachments: Vec::new(),
            },
            is_reply: false,
            raw: None,
        };
        tx.send(msg.clone()).await.unwrap();
        tx.send(msg.clone()).await.unwrap();
        drop(tx);

        let mut out = Vec::new();
        write_inbound(rx, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let decoded: BusMessage = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(decoded, msg);
    }
}
