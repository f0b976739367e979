/// ControllerCore — single owner of the classifier, the session and, through
/// it, the catalog files and the audio engine.
///
/// The loop is synchronous and cooperative.  Each iteration:
///
/// 1. drains intents and snapshot requests queued by the HTTP surface,
/// 2. samples every button once, applying fired intents immediately,
/// 3. pumps the open stream.
///
/// A handler that blocks (opening a slow stream, say) holds up the whole
/// iteration, including audio ticking, until it returns.
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use radio_core::input::InputClassifier;
use radio_core::protocol::{Intent, SessionSnapshot};
use radio_core::session::PlaybackSession;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Inputs queued from outside the poll loop.
#[derive(Debug)]
pub enum ControllerEvent {
    /// An intent from the configuration surface.
    Command(Intent),
    /// Read-only view requested by the configuration surface.
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

pub struct ControllerCore {
    classifier: InputClassifier,
    session: PlaybackSession,
    events: mpsc::Receiver<ControllerEvent>,
    poll_interval: Duration,
}

impl ControllerCore {
    pub fn new(
        classifier: InputClassifier,
        session: PlaybackSession,
        events: mpsc::Receiver<ControllerEvent>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            classifier,
            session,
            events,
            poll_interval,
        }
    }

    pub fn start(&mut self) {
        self.session.start();
    }

    pub fn run_once(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
        }

        let session = &mut self.session;
        self.classifier.poll(&mut |intent| session.apply(intent));

        self.session.tick();
    }

    /// Iterate until `shutdown` is set, then stop playback.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        info!(
            "controller running, {} buttons, poll every {:?}",
            self.classifier.len(),
            self.poll_interval
        );
        while !shutdown.load(Ordering::Relaxed) {
            self.run_once();
            std::thread::sleep(self.poll_interval);
        }
        info!("controller shutting down");
        self.session.stop();
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    fn handle_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Command(intent) => {
                info!("config surface: {:?}", intent);
                self.session.apply(intent);
            }
            ControllerEvent::Snapshot(reply) => {
                if reply.send(self.session.snapshot()).is_err() {
                    debug!("snapshot requester went away");
                }
            }
        }
    }
}
