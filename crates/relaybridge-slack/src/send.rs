//! Message sending helpers for the Slack adapter.
//!
//! Slack's hard API limit is 40000 characters per message, but long messages
//! render poorly in the client, so we chunk well below that — mirrors the
//! Telegram adapter's splitter, with a larger budget since Slack has no
//! MarkdownV2-style escaping overhead.

use std::time::Duration;

use slack_morphism::prelude::*;
use tracing::warn;

use crate::error::SlackError;

/// Maximum characters per Slack message chunk.
const CHUNK_MAX: usize = 3900;

/// Code-fence-aware message splitter for Slack, identical in shape to the
/// Telegram splitter: fenced code blocks are closed before a chunk boundary
/// and reopened at the start of the next chunk.
pub fn split_chunks_smart(text: &str) -> Vec<String> {
    if text.len() <= CHUNK_MAX {
        return vec![text.to_string()];
    }

    let lines: Vec<&str> = text.split('\n').collect();
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut fence_lang: Option<String> = None;

    for line in &lines {
        let cost = if current.is_empty() { line.len() } else { 1 + line.len() };

        if !current.is_empty() && current.len() + cost > CHUNK_MAX {
            if fence_lang.is_some() {
                current.push_str("\n```");
            }
            chunks.push(current);
            current = String::new();
            if let Some(ref lang) = fence_lang {
                if lang.is_empty() {
                    current.push_str("```\n");
                } else {
                    current.push_str("```");
                    current.push_str(lang);
                    current.push('\n');
                }
            }
        }

        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);

        let trimmed = line.trim_start();
        if let Some(after_fence) = trimmed.strip_prefix("```") {
            if fence_lang.is_some() {
                fence_lang = None;
            } else {
                fence_lang = Some(after_fence.trim().to_string());
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    let mut result = Vec::new();
    for chunk in chunks {
        if chunk.len() <= CHUNK_MAX {
            result.push(chunk);
        } else {
            let mut remaining = chunk.as_str();
            while remaining.len() > CHUNK_MAX {
                let split_at = remaining[..CHUNK_MAX]
                    .rfind('\n')
                    .or_else(|| remaining[..CHUNK_MAX].rfind(' '))
                    .unwrap_or(CHUNK_MAX);
                result.push(remaining[..split_at].to_string());
                remaining = remaining[split_at..].trim_start();
            }
            if !remaining.is_empty() {
                result.push(remaining.to_string());
            }
        }
    }

    result
}

/// Escape the three characters Slack's `mrkdwn` dialect treats as special.
pub fn escape_mrkdwn(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Send `text` to `channel` in smart-chunked messages, returning the `ts`
/// (timestamp id) of the last chunk sent — the one a prompt-routing caller
/// needs to track for a later `chat.update`.
///
/// A 100ms delay is inserted between consecutive chunks to avoid hitting
/// Slack's per-channel rate limit.
pub async fn send_response(
    session: &SlackClientSession<'_, SlackClientHyperConnector>,
    channel: &SlackChannelId,
    thread_ts: Option<&SlackTs>,
    text: &str,
) -> Result<SlackTs, SlackError> {
    let chunks = split_chunks_smart(text);
    let mut last_ts = None;

    for (i, chunk) in chunks.iter().enumerate() {
        let mut request = SlackApiChatPostMessageRequest::new(
            channel.clone(),
            SlackMessageContent::new().with_text(escape_mrkdwn(chunk)),
        );
        if let Some(ts) = thread_ts {
            request = request.with_thread_ts(ts.clone());
        }

        let response = session.chat_post_message(&request).await.map_err(|e| {
            warn!(error = %e, chunk_index = i, "slack: chat.postMessage failed");
            SlackError::Api(e.to_string())
        })?;
        last_ts = Some(response.ts);

        if i + 1 < chunks.len() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    last_ts.ok_or(SlackError::NoToken)
}

/// Edit a previously sent message in place (e.g. to show the resolved reply
/// or mark a prompt expired).
pub async fn edit_message(
    session: &SlackClientSession<'_, SlackClientHyperConnector>,
    channel: &SlackChannelId,
    ts: &SlackTs,
    text: &str,
) -> Result<(), SlackError> {
    let request = SlackApiChatUpdateRequest::new(
        channel.clone(),
        SlackMessageContent::new().with_text(escape_mrkdwn(text)),
        ts.clone(),
    );
    session.chat_update(&request).await.map_err(|e| SlackError::Api(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_single_chunk() {
        let chunks = split_chunks_smart("Hello, world!");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "Hello, world!");
    }

    #[test]
    fn over_limit_splits_on_newline() {
        let line = "a".repeat(2000);
        let text = format!("{line}\n{line}\n{line}");
        let chunks = split_chunks_smart(&text);
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(c.len() <= CHUNK_MAX, "chunk too large: {}", c.len());
        }
    }

    #[test]
    fn very_long_single_line_force_splits() {
        let text = "x".repeat(9000);
        let chunks = split_chunks_smart(&text);
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(c.len() <= CHUNK_MAX);
        }
    }

    #[test]
    fn code_fence_preserved_across_chunks() {
        let mut text = String::from("Intro.\n```rust\n");
        for i in 0..300 {
            text.push_str(&format!("let variable_name_{i:04} = {i:05}; // comment\n"));
        }
        text.push_str("```\nAfter fence.");

        let chunks = split_chunks_smart(&text);
        assert!(chunks.len() >= 2, "expected multiple chunks, got {}", chunks.len());
        for c in &chunks {
            assert!(c.len() <= CHUNK_MAX, "chunk too large: {}", c.len());
        }
    }

    #[test]
    fn escape_mrkdwn_escapes_specials() {
        let input = "a < b & c > d";
        let escaped = escape_mrkdwn(input);
        assert_eq!(escaped, "a &lt; b &amp; c &gt; d");
    }

    #[test]
    fn escape_mrkdwn_leaves_normal_chars() {
        let input = "Hello world 123 abc";
        assert_eq!(escape_mrkdwn(input), input);
    }
}
