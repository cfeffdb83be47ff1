use super::RotatingLog;
use std::io;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Cloneable handle that lets `tracing-subscriber` write into a [`RotatingLog`].
#[derive(Clone)]
pub struct LogWriter {
    log: Arc<RotatingLog>,
}

impl LogWriter {
    pub fn new(log: Arc<RotatingLog>) -> Self {
        Self { log }
    }
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.log.write_bytes(buf).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
