//! Storage doubles for writer error paths.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BlockpostError, Result};
use crate::storage::StorageOutput;

/// What a [`ScriptedOutput`] saw, shared with the test that built it.
#[derive(Debug, Default)]
pub(crate) struct OutputLog {
    pub bytes: Vec<u8>,
    pub write_calls: usize,
    pub close_calls: usize,
}

/// Output that accepts a fixed number of bytes and can fail on close.
#[derive(Debug)]
pub(crate) struct ScriptedOutput {
    log: Arc<Mutex<OutputLog>>,
    byte_limit: usize,
    fail_close: bool,
    closed: bool,
}

impl ScriptedOutput {
    pub(crate) fn new(byte_limit: usize, fail_close: bool) -> (Box<dyn StorageOutput>, Arc<Mutex<OutputLog>>) {
        let log = Arc::new(Mutex::new(OutputLog::default()));
        let output = ScriptedOutput {
            log: Arc::clone(&log),
            byte_limit,
            fail_close,
            closed: false,
        };
        (Box::new(output), log)
    }
}

impl Write for ScriptedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut log = self.log.lock();
        log.write_calls += 1;
        if self.closed || log.bytes.len() + buf.len() > self.byte_limit {
            return Err(io::Error::other("output refused write"));
        }
        log.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl StorageOutput for ScriptedOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn position(&self) -> Result<u64> {
        Ok(self.log.lock().bytes.len() as u64)
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.log.lock().close_calls += 1;
        if self.fail_close {
            return Err(BlockpostError::storage("output failed to close"));
        }
        Ok(())
    }
}
