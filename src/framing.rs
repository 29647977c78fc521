//! Fixed-format command framing.
//!
//! A frame is four bytes: `[magic][command][param1][param2]`. There is no
//! length field, checksum or escaping. Bytes are discarded until the magic
//! byte is seen; after that the next three bytes are taken unconditionally,
//! so a corrupted payload yields one wrong command rather than an error.

use tracing::trace;

/// Frame start marker used unless another is configured.
pub const DEFAULT_MAGIC_BYTE: u8 = 0x38;

/// Size of one frame on the wire, magic byte included.
pub const FRAME_LEN: usize = 4;

/// A decoded command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
    pub command: u8,
    pub param1: u8,
    pub param2: u8,
}

impl Command {
    pub fn new(command: u8, param1: u8, param2: u8) -> Self {
        Self {
            command,
            param1,
            param2,
        }
    }

    /// The wire encoding of this command behind `magic`.
    pub fn to_frame(&self, magic: u8) -> [u8; FRAME_LEN] {
        [magic, self.command, self.param1, self.param2]
    }
}

/// Position of the decoder within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    #[default]
    AwaitMagicByte,
    AwaitCommand,
    AwaitParam1,
    AwaitParam2,
}

/// Handler invoked with each completed command.
pub type CommandHandler = Box<dyn FnMut(Command) + Send + 'static>;

/// Byte-at-a-time frame decoder.
///
/// ```
/// use serial_frames::framing::{Command, FrameDecoder};
///
/// let mut decoder = FrameDecoder::new();
/// let events: Vec<Command> = [0x00, 0x38, 0x05, 0x00, 0x10]
///     .into_iter()
///     .filter_map(|b| decoder.step(b))
///     .collect();
/// assert_eq!(events, vec![Command::new(5, 0, 16)]);
/// ```
pub struct FrameDecoder {
    magic: u8,
    state: FrameState,
    command: u8,
    param1: u8,
    handler: Option<CommandHandler>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_magic(DEFAULT_MAGIC_BYTE)
    }

    /// A decoder that synchronizes on `magic` instead of [`DEFAULT_MAGIC_BYTE`].
    pub fn with_magic(magic: u8) -> Self {
        Self {
            magic,
            state: FrameState::AwaitMagicByte,
            command: 0,
            param1: 0,
            handler: None,
        }
    }

    /// Register the handler called from [`FrameDecoder::on_byte_received`].
    pub fn on_command<F>(mut self, handler: F) -> Self
    where
        F: FnMut(Command) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn magic(&self) -> u8 {
        self.magic
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Advance by one byte, returning the command this byte completed, if any.
    pub fn step(&mut self, byte: u8) -> Option<Command> {
        match self.state {
            FrameState::AwaitMagicByte => {
                if byte == self.magic {
                    self.state = FrameState::AwaitCommand;
                }
                None
            }
            FrameState::AwaitCommand => {
                self.command = byte;
                self.state = FrameState::AwaitParam1;
                None
            }
            FrameState::AwaitParam1 => {
                self.param1 = byte;
                self.state = FrameState::AwaitParam2;
                None
            }
            FrameState::AwaitParam2 => {
                self.state = FrameState::AwaitMagicByte;
                Some(Command::new(self.command, self.param1, byte))
            }
        }
    }

    /// Advance by one byte and hand a completed command to the handler.
    pub fn on_byte_received(&mut self, byte: u8) {
        if let Some(command) = self.step(byte) {
            trace!(?command, "frame decoded");
            if let Some(handler) = self.handler.as_mut() {
                handler(command);
            }
        }
    }

    /// Feed a received chunk in order.
    pub fn feed(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.on_byte_received(byte);
        }
    }

    /// Turn the decoder into a data-received handler for
    /// [`crate::transport::Handlers::on_data_received`].
    pub fn into_data_handler(mut self) -> impl FnMut(&[u8]) + Send + 'static {
        move |bytes: &[u8]| self.feed(bytes)
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDecoder")
            .field("magic", &format_args!("{:#04x}", self.magic))
            .field("state", &self.state)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    fn decode_all(decoder: &mut FrameDecoder, bytes: &[u8]) -> Vec<Command> {
        bytes.iter().filter_map(|&b| decoder.step(b)).collect()
    }

    /// Scan for a magic byte, take the next three bytes as a frame, repeat.
    fn greedy_frames(bytes: &[u8], magic: u8) -> Vec<Command> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == magic && i + 3 < bytes.len() {
                out.push(Command::new(bytes[i + 1], bytes[i + 2], bytes[i + 3]));
                i += FRAME_LEN;
            } else {
                i += 1;
            }
        }
        out
    }

    #[test]
    fn test_single_frame() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(
            decode_all(&mut decoder, &[0x38, 0x05, 0x00, 0x10]),
            vec![Command::new(5, 0, 16)]
        );
        assert_eq!(decoder.state(), FrameState::AwaitMagicByte);
    }

    #[test]
    fn test_leading_noise_and_back_to_back_frames() {
        let mut decoder = FrameDecoder::new();
        let bytes = [0x00, 0x38, 0x05, 0x00, 0x10, 0x38, 0x01, 0x02, 0x03];
        assert_eq!(
            decode_all(&mut decoder, &bytes),
            vec![Command::new(5, 0, 16), Command::new(1, 2, 3)]
        );
    }

    #[test]
    fn test_noise_does_not_advance_state() {
        let mut decoder = FrameDecoder::new();
        for b in [0x00, 0xFF, 0x37, 0x39] {
            assert_eq!(decoder.step(b), None);
            assert_eq!(decoder.state(), FrameState::AwaitMagicByte);
        }
    }

    #[test]
    fn test_magic_inside_payload_is_data() {
        let mut decoder = FrameDecoder::new();
        let bytes = [0x38, 0x38, 0x38, 0x38, 0x01, 0x02, 0x03];
        assert_eq!(decode_all(&mut decoder, &bytes), vec![Command::new(0x38, 0x38, 0x38)]);
        assert_eq!(decoder.state(), FrameState::AwaitMagicByte);
    }

    #[test]
    fn test_partial_frame_waits_across_chunks() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let mut decoder = FrameDecoder::new().on_command(move |c| sink.lock().unwrap().push(c));

        decoder.feed(&[0x38, 0x07]);
        assert_eq!(decoder.state(), FrameState::AwaitParam1);
        assert!(events.lock().unwrap().is_empty());

        decoder.feed(&[0x08, 0x09]);
        assert_eq!(*events.lock().unwrap(), vec![Command::new(7, 8, 9)]);
    }

    #[test]
    fn test_custom_magic() {
        let mut decoder = FrameDecoder::with_magic(0xAA);
        assert_eq!(decoder.magic(), 0xAA);
        let bytes = [0x38, 1, 2, 3, 0xAA, 4, 5, 6];
        assert_eq!(decode_all(&mut decoder, &bytes), vec![Command::new(4, 5, 6)]);
    }

    #[test]
    fn test_data_handler_adapter() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let mut handler = FrameDecoder::new()
            .on_command(move |c| sink.lock().unwrap().push(c))
            .into_data_handler();

        handler(&[0x38, 1]);
        handler(&[2, 3, 0x38, 4, 5]);
        handler(&[6]);
        assert_eq!(
            *events.lock().unwrap(),
            vec![Command::new(1, 2, 3), Command::new(4, 5, 6)]
        );
    }

    #[test]
    fn test_to_frame() {
        assert_eq!(Command::new(5, 0, 16).to_frame(DEFAULT_MAGIC_BYTE), [0x38, 5, 0, 16]);
    }

    proptest! {
        #[test]
        fn prop_matches_greedy_framing(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut decoder = FrameDecoder::new();
            prop_assert_eq!(
                decode_all(&mut decoder, &bytes),
                greedy_frames(&bytes, DEFAULT_MAGIC_BYTE)
            );
        }

        #[test]
        fn prop_encoded_commands_survive_noise(
            commands in proptest::collection::vec(any::<(u8, u8, u8)>(), 0..32),
            noise in proptest::collection::vec(
                any::<u8>().prop_filter("not magic", |b| *b != DEFAULT_MAGIC_BYTE),
                0..8,
            ),
        ) {
            let mut wire = noise;
            let expected: Vec<Command> = commands
                .iter()
                .map(|&(c, p1, p2)| Command::new(c, p1, p2))
                .collect();
            for command in &expected {
                wire.extend_from_slice(&command.to_frame(DEFAULT_MAGIC_BYTE));
            }
            let mut decoder = FrameDecoder::new();
            prop_assert_eq!(decode_all(&mut decoder, &wire), expected);
        }
    }
}
