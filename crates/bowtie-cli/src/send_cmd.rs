//! `bowtie send` command: connect to a harness and exchange raw JSON.

use anyhow::{Context, Result};
use serde_json::Value;

use bowtie_core::Connectable;
use bowtie_core::implementation::Passthrough;

/// Parse each message argument as a JSON document.
pub fn parse_messages(raw: &[String]) -> Result<Vec<Value>> {
    raw.iter()
        .enumerate()
        .map(|(i, message)| {
            serde_json::from_str(message)
                .with_context(|| format!("message {} is not valid JSON: {message}", i + 1))
        })
        .collect()
}

/// Connect to `connectable`, send `messages` in order and return the replies.
pub async fn exchange(connectable: &Connectable, messages: Vec<Value>) -> Result<Vec<Value>> {
    let replies = connectable
        .connect(&Passthrough, move |session| {
            Box::pin(async move {
                let mut replies = Vec::with_capacity(messages.len());
                for message in &messages {
                    replies.push(session.request(message).await?);
                }
                Ok::<_, anyhow::Error>(replies)
            })
        })
        .await?;
    Ok(replies)
}

/// Run the send command, printing one reply per line.
pub async fn run_send(connectable: &Connectable, raw_messages: &[String]) -> Result<()> {
    let messages = parse_messages(raw_messages)?;

    tracing::info!(
        implementation = %connectable,
        messages = messages.len(),
        "sending messages"
    );

    for reply in exchange(connectable, messages).await? {
        println!("{reply}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_messages_accepts_json() {
        let messages = parse_messages(&[
            r#"{"cmd": "start", "version": 1}"#.to_string(),
            "null".to_string(),
        ])
        .unwrap();
        assert_eq!(messages[0]["cmd"], "start");
        assert!(messages[1].is_null());
    }

    #[test]
    fn parse_messages_names_bad_message() {
        let err = parse_messages(&["{}".to_string(), "{nope".to_string()]).unwrap_err();
        assert!(
            err.to_string().contains("message 2 is not valid JSON"),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn exchange_reports_unsupported_connector() {
        let connectable: Connectable = "inmemory:python-jsonschema".parse().unwrap();
        let err = exchange(&connectable, vec![]).await.unwrap_err();
        let chain = format!("{err:#}");
        assert!(
            chain.contains("failed to connect to inmemory:python-jsonschema"),
            "unexpected error: {chain}"
        );
        assert!(chain.contains("not supported"), "unexpected error: {chain}");
    }
}
