// Keyloom Output Stage
// Rendezvous hand-off to the emitter worker and the outbound hook layer

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::event::KeyEvent;
use crate::io::KeySink;
use crate::stream::hooks::{run_entries, Hook, HookId, HookVerdict, Hooks};

type SharedHooks = Arc<Mutex<Hooks<SinkCtx>>>;
type ErrorSlot = Arc<Mutex<Option<io::Error>>>;

/// Context handed to output hook actions on the emitter worker.
///
/// A rewriting hook writes its replacement through `emit` and returns
/// `Catch` for the original.
pub struct SinkCtx {
    sink: Box<dyn KeySink>,
    hooks: SharedHooks,
}

impl SinkCtx {
    /// Write straight to the sink, past the hook layer
    pub fn emit(&mut self, event: KeyEvent) -> io::Result<()> {
        self.sink.emit(event)
    }

    /// Register a further output hook; it observes the next outbound event
    pub fn register(&mut self, hook: Hook<SinkCtx>) -> HookId {
        self.hooks.lock().register(hook)
    }
}

/// The loop-side handle on the output half: a single-slot rendezvous
/// channel into a dedicated worker that runs the output hooks and forwards
/// surviving events to the sink.
///
/// `send` blocks until the worker takes the event; a stalled sink therefore
/// stalls the loop instead of dropping output. Dropping the stage closes
/// the channel and joins the worker, releasing the sink before the engine
/// itself unwinds.
pub struct OutputStage {
    tx: Option<Sender<KeyEvent>>,
    hooks: SharedHooks,
    error: ErrorSlot,
    worker: Option<JoinHandle<()>>,
}

impl OutputStage {
    pub fn spawn(sink: Box<dyn KeySink>) -> io::Result<Self> {
        let (tx, rx) = bounded(0);
        let hooks: SharedHooks = Arc::new(Mutex::new(Hooks::new()));
        let error: ErrorSlot = Arc::new(Mutex::new(None));

        let worker = thread::Builder::new().name("keyloom-emitter".into()).spawn({
            let hooks = hooks.clone();
            let error = error.clone();
            move || emitter_loop(rx, sink, hooks, error)
        })?;

        Ok(Self {
            tx: Some(tx),
            hooks,
            error,
            worker: Some(worker),
        })
    }

    /// Hand one event to the worker, blocking until it is taken
    pub fn send(&self, event: KeyEvent) -> io::Result<()> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        };
        if tx.send(event).is_err() {
            // The worker is gone; surface whatever killed it
            return Err(self
                .error
                .lock()
                .take()
                .unwrap_or_else(|| io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        Ok(())
    }

    /// Register an outbound hook from the loop side
    pub fn register_hook(&self, hook: Hook<SinkCtx>) -> HookId {
        self.hooks.lock().register(hook)
    }
}

impl Drop for OutputStage {
    fn drop(&mut self) {
        // Closing the channel is what stops the worker
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("emitter worker panicked during shutdown");
            }
        }
    }
}

fn emitter_loop(rx: Receiver<KeyEvent>, sink: Box<dyn KeySink>, hooks: SharedHooks, error: ErrorSlot) {
    let mut ctx = SinkCtx {
        sink,
        hooks: hooks.clone(),
    };

    loop {
        // Timeout firing is serialized with event hand-off, same as on the
        // input side
        loop {
            let expired = hooks.lock().pop_expired(Instant::now());
            match expired {
                Some(action) => action(&mut ctx),
                None => break,
            }
        }

        let deadline = hooks.lock().next_deadline();
        let event = match deadline {
            Some(deadline) => match rx.recv_deadline(deadline) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(event) => event,
                Err(_) => break,
            },
        };

        let entries = hooks.lock().begin_offer();
        let (survivors, verdict) = run_entries(entries, &mut ctx, &event);
        hooks.lock().finish_offer(survivors);

        if verdict == HookVerdict::NoCatch {
            if let Err(e) = ctx.sink.emit(event) {
                log::error!("key sink failed, stopping emitter: {e}");
                *error.lock() = Some(e);
                break;
            }
        }
    }

    log::debug!("emitter worker stopped");
}
