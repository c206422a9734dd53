//! Splits replies into chat-sized chunks and posts them in order
//!
//! Chat platforms cap message length, so long replies are cut at sentence
//! boundaries and greedily packed back together up to the chunk limit. A
//! sentence that alone exceeds the limit is cut at the last whitespace that
//! fits, or hard at the limit when it has none. Lengths are counted in
//! characters, not bytes.

use crate::error::{ChatError, DispatchError};
use crate::event::ChatChannel;
use std::time::Duration;
use tracing::{debug, info, warn};

const TERMINATORS: [char; 3] = ['.', '!', '?'];

/// Split `reply` into chunks of at most `limit` characters.
pub fn chunk_reply(reply: &str, limit: usize) -> Vec<String> {
    let reply = reply.trim();
    if reply.is_empty() || limit == 0 {
        return Vec::new();
    }
    if char_len(reply) <= limit {
        return vec![reply.to_string()];
    }

    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_len = 0;

    for fragment in split_fragments(reply) {
        for piece in force_split(fragment, limit) {
            let piece_len = char_len(piece);
            if buffer.is_empty() {
                buffer.push_str(piece);
                buffer_len = piece_len;
            } else if buffer_len + 1 + piece_len <= limit {
                buffer.push(' ');
                buffer.push_str(piece);
                buffer_len += 1 + piece_len;
            } else {
                chunks.push(std::mem::take(&mut buffer));
                buffer.push_str(piece);
                buffer_len = piece_len;
            }
        }
    }
    if !buffer.is_empty() {
        chunks.push(buffer);
    }

    chunks
}

/// Sentence fragments of `text`, each keeping its terminator run ("?!", "...").
pub fn split_fragments(text: &str) -> Vec<&str> {
    let mut fragments = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !TERMINATORS.contains(&c) {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if !TERMINATORS.contains(&next) {
                break;
            }
            end = j + next.len_utf8();
            chars.next();
        }
        fragments.push(&text[start..end]);
        start = end;
    }
    fragments.push(&text[start..]);

    fragments
        .into_iter()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect()
}

/// Cut an over-long fragment into pieces of at most `limit` characters.
fn force_split(fragment: &str, limit: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = fragment.trim();

    while char_len(rest) > limit {
        // Byte offset just past the first `limit` characters
        let window_end = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());

        let cut = if rest[window_end..].starts_with(char::is_whitespace) {
            window_end
        } else {
            rest[..window_end]
                .rfind(char::is_whitespace)
                .filter(|&i| i > 0)
                .unwrap_or(window_end)
        };

        let (head, tail) = rest.split_at(cut);
        pieces.push(head.trim_end());
        rest = tail.trim_start();
    }
    if !rest.is_empty() {
        pieces.push(rest);
    }

    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Posts chunked replies to a chat channel with pacing between chunks.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    max_chunk_len: usize,
    pacing: Duration,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(max_chunk_len: usize, pacing: Duration, send_timeout: Duration) -> Self {
        Self {
            max_chunk_len,
            pacing,
            send_timeout,
        }
    }

    /// Send `reply` in order, returning how many chunks went out.
    ///
    /// Stops at the first failed send; the error carries the partial count.
    pub async fn dispatch(&self, channel: &dyn ChatChannel, reply: &str) -> Result<usize, DispatchError> {
        let chunks = chunk_reply(reply, self.max_chunk_len);
        let total = chunks.len();
        if total > 1 {
            debug!("Reply split into {} chunks for {}", total, channel.name());
        }

        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.pacing).await;
            }

            let sent = match tokio::time::timeout(self.send_timeout, channel.send(chunk)).await {
                Ok(result) => result,
                Err(_) => Err(ChatError::Timeout(format!(
                    "chat send exceeded {:?}",
                    self.send_timeout
                ))),
            };

            if let Err(source) = sent {
                warn!(
                    "Chat send to {} failed on chunk {}/{}: {}",
                    channel.name(),
                    index + 1,
                    total,
                    source
                );
                return Err(DispatchError {
                    sent: index,
                    total,
                    source,
                });
            }
            info!("[CHAT] Sent ({}/{}): {}", index + 1, total, chunk);
        }

        Ok(total)
    }
}
