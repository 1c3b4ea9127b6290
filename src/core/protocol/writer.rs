//! Command framing and transmission

use super::TERMINATOR;
use crate::core::transport::{SerialChannel, TransportError};

/// Frame a command with exactly one trailing terminator
pub fn frame_command(command: &str) -> Vec<u8> {
    let body = command.trim_end_matches(char::from(TERMINATOR));
    let mut frame = Vec::with_capacity(body.len() + 1);
    frame.extend_from_slice(body.as_bytes());
    frame.push(TERMINATOR);
    frame
}

/// Write one framed command. A single attempt; failures are returned, never retried.
pub fn write_command<C>(channel: &mut C, command: &str) -> Result<usize, TransportError>
where
    C: SerialChannel + ?Sized,
{
    let frame = frame_command(command);
    let written = channel.write(&frame)?;
    tracing::debug!(command, bytes = written, "Command sent");
    Ok(written)
}
