use crate::events::OutputEvent;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum Message {
    Subscribe {
        subscriber: mpsc::UnboundedSender<OutputEvent>,
    },
}
