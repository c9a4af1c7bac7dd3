//! Outbound write buffer with a flush-on-overflow policy.

use std::io::Write;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Queue capacity before an automatic flush kicks in.
pub const DEFAULT_CAPACITY: usize = 8192;

/// Batches outbound bytes between readiness cycles.
///
/// With an output delay configured the buffer is bypassed entirely and
/// bytes are paced one at a time onto the device, synchronized after
/// each write.
#[derive(Debug)]
pub struct WriteBuffer {
    queue: Vec<u8>,
    capacity: usize,
    output_delay: Option<Duration>,
}

impl WriteBuffer {
    pub fn new(output_delay: Option<Duration>) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, output_delay)
    }

    pub fn with_capacity(capacity: usize, output_delay: Option<Duration>) -> Self {
        Self {
            queue: Vec::with_capacity(capacity),
            capacity,
            output_delay,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queue bytes for delivery, flushing first if they would not fit.
    /// Returns the number of bytes accepted.
    pub fn write(&mut self, sink: &mut dyn Write, data: &[u8]) -> usize {
        if let Some(delay) = self.output_delay {
            let mut written = 0;
            for byte in data {
                match sink.write(std::slice::from_ref(byte)) {
                    Ok(count) => written += count,
                    Err(err) => {
                        debug!("Write error ({err})");
                        break;
                    }
                }
                let _ = sink.flush();
                thread::sleep(delay);
            }
            return written;
        }

        if self.queue.len() + data.len() > self.capacity {
            self.flush(sink);
        }
        self.queue.extend_from_slice(data);
        data.len()
    }

    /// Drain the queue with repeated short writes. The queue is empty
    /// afterwards even if the device rejected part of it.
    pub fn flush(&mut self, sink: &mut dyn Write) {
        let mut offset = 0;
        while offset < self.queue.len() {
            match sink.write(&self.queue[offset..]) {
                Ok(0) => {
                    debug!(
                        "Device accepted no bytes, dropping {} queued",
                        self.queue.len() - offset
                    );
                    break;
                }
                Ok(count) => offset += count,
                Err(err) => {
                    debug!("Write error while flushing device buffer ({err})");
                    break;
                }
            }
        }
        self.queue.clear();
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    /// Sink that accepts at most one byte per call.
    struct TrickleSink(Vec<u8>);

    impl Write for TrickleSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf.is_empty() {
                return Ok(0);
            }
            self.0.push(buf[0]);
            Ok(1)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Sink that fails every write.
    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_small_writes_stay_queued() {
        let mut buffer = WriteBuffer::with_capacity(16, None);
        let mut sink = Vec::new();
        assert_eq!(buffer.write(&mut sink, b"hello"), 5);
        assert_eq!(buffer.len(), 5);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_overflow_triggers_flush_first() {
        let mut buffer = WriteBuffer::with_capacity(8, None);
        let mut sink = Vec::new();
        buffer.write(&mut sink, b"abcdef");
        buffer.write(&mut sink, b"ghi");
        assert_eq!(sink, b"abcdef");
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_flush_empties_queue() {
        let mut buffer = WriteBuffer::with_capacity(16, None);
        let mut sink = Vec::new();
        buffer.write(&mut sink, b"data");
        buffer.flush(&mut sink);
        assert!(buffer.is_empty());
        assert_eq!(sink, b"data");
    }

    #[test]
    fn test_flush_retries_short_writes() {
        let mut buffer = WriteBuffer::with_capacity(16, None);
        let mut sink = TrickleSink(Vec::new());
        buffer.write(&mut sink, b"abc");
        buffer.flush(&mut sink);
        assert!(buffer.is_empty());
        assert_eq!(sink.0, b"abc");
    }

    #[test]
    fn test_flush_discards_on_error() {
        let mut buffer = WriteBuffer::with_capacity(16, None);
        let mut sink = BrokenSink;
        buffer.write(&mut sink, b"doomed");
        buffer.flush(&mut sink);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_output_delay_bypasses_queue() {
        let mut buffer = WriteBuffer::with_capacity(16, Some(Duration::from_millis(0)));
        let mut sink = Vec::new();
        assert_eq!(buffer.write(&mut sink, b"xy"), 2);
        assert!(buffer.is_empty());
        assert_eq!(sink, b"xy");
    }

    #[test]
    fn test_output_delay_stops_on_error() {
        let mut buffer = WriteBuffer::with_capacity(16, Some(Duration::from_millis(0)));
        let mut sink = BrokenSink;
        assert_eq!(buffer.write(&mut sink, b"xy"), 0);
    }
}
