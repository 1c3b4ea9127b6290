//! In-memory device for exercising the line protocol without hardware
//!
//! The device input is a queue of arrivals. Each data arrival models what
//! sits in the driver's receive buffer at one moment; an idle arrival makes
//! one poll come back empty. `discard_input` drops the unread rest of the
//! arrival currently being consumed, never later ones.

use super::{SerialChannel, TransportError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug)]
enum Arrival {
    Data(Vec<u8>),
    Idle,
    Failure(std::io::ErrorKind),
}

#[derive(Debug, Default)]
struct DeviceState {
    arrivals: VecDeque<Arrival>,
    buffered: VecDeque<u8>,
    written: Vec<Vec<u8>>,
    fail_writes: bool,
    discards: usize,
}

/// Scripted serial channel
#[derive(Debug, Clone, Default)]
pub struct ScriptedChannel {
    state: Arc<Mutex<DeviceState>>,
}

/// Handle for scripting input and inspecting output of a [`ScriptedChannel`]
#[derive(Debug, Clone)]
pub struct ScriptedHandle {
    state: Arc<Mutex<DeviceState>>,
}

impl ScriptedChannel {
    /// Create a channel and its control handle
    pub fn new() -> (Self, ScriptedHandle) {
        let channel = Self::default();
        let handle = ScriptedHandle {
            state: channel.state.clone(),
        };
        (channel, handle)
    }
}

impl ScriptedHandle {
    /// Queue raw bytes arriving as one chunk
    pub fn push_bytes(&self, data: &[u8]) {
        self.state.lock().arrivals.push_back(Arrival::Data(data.to_vec()));
    }

    /// Queue a device line (terminator appended) arriving as its own chunk
    pub fn push_line(&self, line: &str) {
        let mut data = line.as_bytes().to_vec();
        data.push(b'\r');
        self.push_bytes(&data);
    }

    /// Queue one empty poll
    pub fn push_idle(&self) {
        self.state.lock().arrivals.push_back(Arrival::Idle);
    }

    /// Queue a read failure
    pub fn push_read_failure(&self, kind: std::io::ErrorKind) {
        self.state.lock().arrivals.push_back(Arrival::Failure(kind));
    }

    /// Make every following write fail
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Frames written to the device so far
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.lock().written.clone()
    }

    /// Frames written to the device, decoded as text
    pub fn written_text(&self) -> Vec<String> {
        self.state
            .lock()
            .written
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    /// Number of times buffered input was discarded
    pub fn discards(&self) -> usize {
        self.state.lock().discards
    }
}

impl SerialChannel for ScriptedChannel {
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        let mut state = self.state.lock();
        if let Some(byte) = state.buffered.pop_front() {
            return Ok(Some(byte));
        }

        match state.arrivals.pop_front() {
            Some(Arrival::Data(data)) => {
                state.buffered.extend(data);
                Ok(state.buffered.pop_front())
            }
            Some(Arrival::Failure(kind)) => Err(TransportError::IoError(std::io::Error::new(
                kind,
                "scripted read failure",
            ))),
            Some(Arrival::Idle) | None => Ok(None),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(TransportError::IoError(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted write failure",
            )));
        }
        state.written.push(data.to_vec());
        Ok(data.len())
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.buffered.clear();
        state.discards += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}
