use super::messages::Message;
use crate::events::{JobStatus, OutputEvent};

use tokio::select;
use tokio::sync::mpsc;

pub struct Actor {
    inbox: mpsc::UnboundedReceiver<Message>,
    output_rx: mpsc::UnboundedReceiver<OutputEvent>,
    // every line seen so far, replayed to late joiners
    backlog: Vec<String>,
    terminal: Option<JobStatus>,
    subscribers: Vec<mpsc::UnboundedSender<OutputEvent>>,
    output_open: bool,
}

impl Actor {
    pub fn spawn(
        inbox: mpsc::UnboundedReceiver<Message>,
        output_rx: mpsc::UnboundedReceiver<OutputEvent>,
    ) {
        let actor = Actor {
            inbox,
            output_rx,
            backlog: Vec::new(),
            terminal: None,
            subscribers: Vec::new(),
            output_open: true,
        };
        tokio::spawn(async move { actor.run().await });
    }

    async fn run(mut self) {
        loop {
            select! {
                maybe_msg = self.inbox.recv() => {
                    match maybe_msg {
                        Some(Message::Subscribe { subscriber }) => self.subscribe(subscriber),
                        // handle dropped: job purged or registry gone
                        None => return,
                    }
                }
                maybe_event = self.output_rx.recv(), if self.output_open => {
                    match maybe_event {
                        Some(OutputEvent::Line(line)) => {
                            self.backlog.push(line.clone());
                            self.subscribers.retain(|sub| {
                                // only retain subscribers who have not dropped
                                sub.send(OutputEvent::Line(line.clone())).is_ok()
                            });
                        }
                        Some(OutputEvent::Done(status)) => {
                            self.terminal = Some(status);
                            for sub in self.subscribers.drain(..) {
                                let _ = sub.send(OutputEvent::Done(status));
                            }
                        }
                        None => {
                            // runner gone; without a terminal marker there is
                            // nothing more to tell live subscribers
                            self.output_open = false;
                            self.subscribers.clear();
                        }
                    }
                }
            }
        }
    }

    fn subscribe(&mut self, subscriber: mpsc::UnboundedSender<OutputEvent>) {
        for line in &self.backlog {
            if subscriber.send(OutputEvent::Line(line.clone())).is_err() {
                return;
            }
        }
        if let Some(status) = self.terminal {
            // finished job: replay then close immediately
            let _ = subscriber.send(OutputEvent::Done(status));
        } else if self.output_open {
            self.subscribers.push(subscriber);
        }
    }
}
