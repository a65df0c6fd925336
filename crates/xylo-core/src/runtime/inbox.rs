use tokio::sync::mpsc;

use crate::events::AppEvent;

/// Sender for the runtime's event inbox.
pub type EventSender = mpsc::UnboundedSender<AppEvent>;

/// Receiver for the runtime's event inbox.
pub type EventReceiver = mpsc::UnboundedReceiver<AppEvent>;
