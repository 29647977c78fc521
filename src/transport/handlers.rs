//! Notification hooks for an asynchronously opened transport.

use std::sync::Arc;

/// Called on the receiver thread with each chunk of incoming bytes.
pub type DataReceivedHandler = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// Called on the writing thread after each completed write.
pub type DataSentHandler = Arc<dyn Fn() + Send + Sync + 'static>;

/// The handlers passed to [`super::SerialTransport::open_async`].
///
/// The data-received handler is moved into the receiver thread and is the
/// only code that ever runs there, so it may own mutable state such as a
/// [`crate::framing::FrameDecoder`]. The data-sent handler is shared by every
/// writer and must therefore be `Sync`.
///
/// ```
/// use serial_frames::framing::FrameDecoder;
/// use serial_frames::transport::Handlers;
///
/// let decoder = FrameDecoder::new().on_command(|cmd| println!("{cmd:?}"));
/// let handlers = Handlers::new()
///     .on_data_received(decoder.into_data_handler())
///     .on_data_sent(|| println!("sent"));
/// assert!(!handlers.is_empty());
/// ```
#[derive(Default)]
pub struct Handlers {
    pub(crate) on_data_received: Option<DataReceivedHandler>,
    pub(crate) on_data_sent: Option<DataSentHandler>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the handler invoked with every received chunk.
    pub fn on_data_received<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        self.on_data_received = Some(Box::new(handler));
        self
    }

    /// Set the handler invoked once per `write`/`write_line` call.
    pub fn on_data_sent<F>(mut self, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_data_sent = Some(Arc::new(handler));
        self
    }

    /// True when neither handler is set, in which case no receiver is started.
    pub fn is_empty(&self) -> bool {
        self.on_data_received.is_none() && self.on_data_sent.is_none()
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handlers")
            .field("on_data_received", &self.on_data_received.is_some())
            .field("on_data_sent", &self.on_data_sent.is_some())
            .finish()
    }
}
