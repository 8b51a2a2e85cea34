mod actor;
mod messages;

use actor::Actor;
use messages::Message;

use crate::events::OutputEvent;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// A per-job `Publisher` which buffers output, replays it to late joiners,
/// and broadcasts new lines to every subscriber.
///
/// This struct is actually an actor handle. The real work is done in the
/// actor spawned by `PublisherHandle::spawn`. Dropping the handle (job
/// purged, registry gone) shuts the actor down and closes every subscriber
/// stream without an error.
#[derive(Clone)]
pub struct PublisherHandle {
    sender: mpsc::UnboundedSender<Message>,
}

impl PublisherHandle {
    pub fn spawn(output_rx: UnboundedReceiver<OutputEvent>) -> Self {
        let (sender, inbox) = mpsc::unbounded_channel();
        Actor::spawn(inbox, output_rx);
        Self { sender }
    }

    /// Attach a subscriber with its own independent cursor: full replay from
    /// the start of the job, then the live tail, then the terminal marker.
    pub fn subscribe(&self, subscriber: UnboundedSender<OutputEvent>) {
        let _ = self.sender.send(Message::Subscribe { subscriber });
    }
}
