use log::*;
use std::sync::mpsc::Sender;
use strum_macros::Display;

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Status {
    #[strum(to_string = "Ready")]
    Ready,
    #[strum(to_string = "Counting down...")]
    CountingDown,
    #[strum(to_string = "Playing...")]
    Playing,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionOutcome {
    Finished,
    Cancelled,
    StoppedOnError,
}

/// Everything a session tells its observer. `Finished` is always last.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    Log(String),
    Status(Status),
    IndexSelected(usize),
    Finished(SessionOutcome),
}

/// Sending half of the notification channel. A dropped receiver is ignored.
#[derive(Clone)]
pub struct Notifier {
    sender: Sender<Notification>,
}

impl Notifier {
    pub fn new(sender: Sender<Notification>) -> Self {
        Self { sender }
    }

    pub fn log<S: Into<String>>(&self, line: S) {
        let line = line.into();
        info!("{}", line);
        self.send(Notification::Log(line));
    }

    pub fn status(&self, status: Status) {
        debug!("Status: {}", status);
        self.send(Notification::Status(status));
    }

    pub fn index_selected(&self, index: usize) {
        self.send(Notification::IndexSelected(index));
    }

    pub fn finished(&self, outcome: SessionOutcome) {
        debug!("Session finished: {:?}", outcome);
        self.send(Notification::Finished(outcome));
    }

    fn send(&self, notification: Notification) {
        let _ = self.sender.send(notification);
    }
}
