//! Outbound notifications
//!
//! Delivery is fire-and-forget. A failed delivery is logged by the caller and
//! never affects a committed transaction.

use lendmarket_core::Notification;
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::info;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification channel closed")]
    ChannelClosed,

    #[error("delivery failed: {0}")]
    Delivery(String),
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Default for the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: &Notification) -> Result<(), NotifyError> {
        info!(
            user_id = %n.user_id,
            kind = %n.kind,
            reference_id = %n.reference_id,
            "{}: {}",
            n.title,
            n.message
        );
        Ok(())
    }
}

/// Forwards notifications into a tokio channel for another task to deliver.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, UnboundedReceiver<Notification>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, n: &Notification) -> Result<(), NotifyError> {
        self.sender
            .send(n.clone())
            .map_err(|_| NotifyError::ChannelClosed)
    }
}
