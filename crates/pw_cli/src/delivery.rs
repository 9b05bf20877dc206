use async_trait::async_trait;
use tracing::{error, info};

use pw_core::{MarkupMode, Result, Transport};
use pw_message::chunk_message;

/// Transport that writes messages to stdout. Stands in for a real
/// messaging channel and carries the same configurable length ceiling.
pub struct ConsoleTransport {
    max_length: usize,
}

impl ConsoleTransport {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    fn max_message_length(&self) -> usize {
        self.max_length
    }

    async fn send_text(&self, recipient: &str, text: &str, _mode: MarkupMode) -> Result<()> {
        println!("--- to {} ---\n{}", recipient, text);
        Ok(())
    }
}

/// Chunk `text` to the transport's ceiling and send every chunk to every
/// recipient. One recipient failing never affects the others.
pub async fn deliver(
    transport: &dyn Transport,
    recipients: &[String],
    text: &str,
    mode: MarkupMode,
) -> usize {
    let chunks = chunk_message(text, transport.max_message_length());
    let mut delivered = 0usize;
    for recipient in recipients {
        let mut failed = false;
        for chunk in &chunks {
            if let Err(e) = transport.send_text(recipient, chunk, mode).await {
                error!("✉️ Delivery to {} failed: {}", recipient, e);
                failed = true;
                break;
            }
        }
        if !failed {
            delivered += 1;
        }
    }
    info!(
        "✉️ Delivered {} chunk(s) to {}/{} recipient(s)",
        chunks.len(),
        delivered,
        recipients.len()
    );
    delivered
}
