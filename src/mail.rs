//! Outgoing email.
//!
//! Handlers only see [`EmailBackend`]. The server logs messages through
//! [`ConsoleBackend`]; tests read them back from a [`MemoryBackend`].

use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

/// A plain text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("message has no recipients")]
    NoRecipients,
    #[error("outbox is unavailable")]
    OutboxPoisoned,
}

#[async_trait]
pub trait EmailBackend: Send + Sync + Debug {
    /// Deliver `messages`, returning how many were sent.
    async fn send_messages(&self, messages: &[EmailMessage]) -> Result<usize, MailError>;
}

fn check_recipients(messages: &[EmailMessage]) -> Result<(), MailError> {
    if messages.iter().any(|m| m.to.is_empty()) {
        return Err(MailError::NoRecipients);
    }
    Ok(())
}

/// Writes every message to the log instead of delivering it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleBackend;

#[async_trait]
impl EmailBackend for ConsoleBackend {
    async fn send_messages(&self, messages: &[EmailMessage]) -> Result<usize, MailError> {
        check_recipients(messages)?;
        for message in messages {
            info!(
                from = %message.from,
                to = %message.to.join(", "),
                subject = %message.subject,
                "Email:\n{}",
                message.body
            );
        }
        Ok(messages.len())
    }
}

/// Keeps sent messages in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    outbox: Arc<Mutex<Vec<EmailMessage>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far.
    pub fn outbox(&self) -> Vec<EmailMessage> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EmailBackend for MemoryBackend {
    async fn send_messages(&self, messages: &[EmailMessage]) -> Result<usize, MailError> {
        check_recipients(messages)?;
        let mut outbox = self.outbox.lock().map_err(|_| MailError::OutboxPoisoned)?;
        outbox.extend_from_slice(messages);
        debug!("Stored {} message(s), outbox now holds {}", messages.len(), outbox.len());
        Ok(messages.len())
    }
}
