// event.rs
use std::{
    sync::mpsc::{self, Receiver, RecvError},
    thread,
    time::{Duration, Instant},
};

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use tracing::error;

pub enum Event {
    Tick,
    Input(KeyEvent),
    Resize,
}

/// Reads terminal input on a background thread and hands it to the UI
/// loop, with a `Tick` every `tick_rate` so the screen redraws.
pub struct EventHandler {
    receiver: Receiver<Event>,
    #[allow(dead_code)]
    event_thread: thread::JoinHandle<()>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> EventHandler {
        let (sender, receiver) = mpsc::channel();
        let event_thread = thread::spawn(move || {
            let mut last_tick = Instant::now();
            loop {
                let timeout = tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(Duration::ZERO);

                let ready = match event::poll(timeout) {
                    Ok(ready) => ready,
                    Err(e) => {
                        error!(error = %e, "terminal poll failed, stopping input");
                        return;
                    }
                };
                if ready {
                    let forwarded = match event::read() {
                        Ok(CrosstermEvent::Key(key)) => Some(Event::Input(key)),
                        Ok(CrosstermEvent::Resize(_, _)) => Some(Event::Resize),
                        Ok(_) => None,
                        Err(e) => {
                            error!(error = %e, "terminal read failed, stopping input");
                            return;
                        }
                    };
                    // The UI hung up: nothing left to feed.
                    if let Some(event) = forwarded {
                        if sender.send(event).is_err() {
                            return;
                        }
                    }
                }

                if last_tick.elapsed() >= tick_rate {
                    if sender.send(Event::Tick).is_err() {
                        return;
                    }
                    last_tick = Instant::now();
                }
            }
        });
        EventHandler {
            receiver,
            event_thread,
        }
    }

    /// Blocks until the next event.
    pub fn next(&self) -> Result<Event, RecvError> {
        self.receiver.recv()
    }
}
