//! Background receiver thread draining the read path while the port is open.

use super::handlers::DataReceivedHandler;
use super::io::{deadline_after, PortIo};
use crate::port::PortError;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tracing::{debug, warn};

/// Scratch buffer size for each poll.
pub const RECEIVE_BUFFER_SIZE: usize = 64;

/// Read timeout of each poll; bounds how long close waits for the loop to notice.
pub const RECEIVE_POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Running flag of a transport's receiver, outliving individual threads.
#[derive(Default)]
pub(crate) struct ReceiverSignal {
    state: Mutex<WorkerState>,
    stopped: Condvar,
}

#[derive(Default)]
struct WorkerState {
    running: bool,
    thread: Option<ThreadId>,
}

impl ReceiverSignal {
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// True when called from inside the receiver thread, i.e. from a handler.
    pub fn is_worker_thread(&self) -> bool {
        self.state.lock().thread == Some(thread::current().id())
    }

    fn mark_stopped(&self) {
        let mut state = self.state.lock();
        state.running = false;
        state.thread = None;
        self.stopped.notify_all();
    }
}

/// Clears the running flag when the worker exits, including by panic.
struct StopGuard(Arc<ReceiverSignal>);

impl Drop for StopGuard {
    fn drop(&mut self) {
        self.0.mark_stopped();
    }
}

/// Handle to a spawned receiver thread.
pub(crate) struct Receiver {
    handle: JoinHandle<()>,
    signal: Arc<ReceiverSignal>,
}

impl Receiver {
    /// Start the receiver. Fails if a previous receiver on `signal` is still alive.
    pub fn spawn(
        io: Arc<PortIo>,
        signal: Arc<ReceiverSignal>,
        on_data_received: Option<DataReceivedHandler>,
        port_name: &str,
    ) -> Result<Self, PortError> {
        {
            let mut state = signal.state.lock();
            if state.running {
                return Err(PortError::ReceiverAlreadyRunning);
            }
            state.running = true;
        }

        let worker_signal = Arc::clone(&signal);
        let spawned = thread::Builder::new()
            .name(format!("serial-rx-{}", port_name))
            .spawn(move || {
                worker_signal.state.lock().thread = Some(thread::current().id());
                let _guard = StopGuard(worker_signal);
                run(&io, on_data_received);
            });

        match spawned {
            Ok(handle) => {
                debug!(port = port_name, "receiver started");
                Ok(Self { handle, signal })
            }
            Err(e) => {
                signal.mark_stopped();
                Err(PortError::Io(e))
            }
        }
    }

    /// Wait up to `timeout` for the thread to exit, then join it.
    ///
    /// The port must already be released, otherwise the loop never ends.
    pub fn stop(self, timeout: Duration) -> Result<(), PortError> {
        if self.handle.thread().id() == thread::current().id() {
            // Stopping from a handler; the loop ends once the handler returns.
            return Ok(());
        }

        // A window too large for an Instant means waiting without a bound
        let deadline = deadline_after(timeout);
        {
            let mut state = self.signal.state.lock();
            while state.running {
                let Some(deadline) = deadline else {
                    self.signal.stopped.wait(&mut state);
                    continue;
                };
                let timed_out = self.signal.stopped.wait_until(&mut state, deadline).timed_out();
                if timed_out && state.running {
                    warn!(?timeout, "receiver did not stop; detaching it");
                    return Err(PortError::ShutdownTimeout(timeout));
                }
            }
        }

        if self.handle.join().is_err() {
            warn!("receiver thread panicked");
        }
        debug!("receiver stopped");
        Ok(())
    }
}

fn run(io: &PortIo, mut on_data_received: Option<DataReceivedHandler>) {
    let mut buffer = [0u8; RECEIVE_BUFFER_SIZE];
    while io.is_open() {
        let n = io.read(&mut buffer, Some(RECEIVE_POLL_TIMEOUT));
        if n == 0 {
            continue;
        }
        if let Some(handler) = on_data_received.as_mut() {
            handler(&buffer[..n]);
        }
    }
}
