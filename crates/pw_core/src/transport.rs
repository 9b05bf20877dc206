use async_trait::async_trait;

use crate::Result;

/// Parse mode the transport should apply to an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupMode {
    Html,
    Plain,
}

/// Outbound messaging channel. The core only depends on the length
/// ceiling and a send operation; authentication and wire format belong
/// to the implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Hard per-message length ceiling. Drives the chunking engine; the
    /// core must stay correct for any value.
    fn max_message_length(&self) -> usize;

    async fn send_text(&self, recipient: &str, text: &str, mode: MarkupMode) -> Result<()>;
}
