use async_trait::async_trait;
use std::error::Error;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

/// Synchronous destination for encoded log lines.
///
/// The logger calls `write_line` with a complete line (terminator
/// included) from within event dispatch; implementations must not
/// block on anything slower than local I/O. Anything network-shaped
/// belongs behind [`ChannelStream`], which decouples the caller from
/// transport latency the same way the batching layer does.
pub trait LogStream: Send + Sync {
    /// Write one complete line.
    ///
    /// **Returns**
    /// - `Ok(())` if the line was accepted by the destination.
    /// - `Err(..)` on an I/O failure; the caller treats this as a
    ///   translation fault, never as a reason to propagate upward.
    fn write_line(&self, line: &str) -> io::Result<()>;

    /// Flush any locally buffered lines. Default is a no-op.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Fast-path writer for the process stdout stream: takes the lock once
/// per line and writes directly, no intermediate buffering.
pub struct StdoutStream;

impl LogStream for StdoutStream {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(line.as_bytes())
    }

    fn flush(&self) -> io::Result<()> {
        io::stdout().lock().flush()
    }
}

/// Fast-path writer for the process stderr stream.
pub struct StderrStream;

impl LogStream for StderrStream {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut out = io::stderr().lock();
        out.write_all(line.as_bytes())
    }

    fn flush(&self) -> io::Result<()> {
        io::stderr().lock().flush()
    }
}

/// Generic path for arbitrary writers, used when the destination is a
/// caller-supplied stream rather than one of the standard handles.
pub struct WriterStream {
    inner: Mutex<Box<dyn Write + Send>>,
}

impl WriterStream {
    pub fn new(writer: Box<dyn Write + Send>) -> WriterStream {
        WriterStream {
            inner: Mutex::new(writer),
        }
    }
}

impl LogStream for WriterStream {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "writer poisoned"))?;
        guard.write_all(line.as_bytes())
    }

    fn flush(&self) -> io::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "writer poisoned"))?;
        guard.flush()
    }
}

/// A stream that simply drops all lines.
///
/// Useful for measuring the overhead of translation itself, and for
/// tests that don't care about output.
#[derive(Clone, Default)]
pub struct NoopStream;

impl LogStream for NoopStream {
    fn write_line(&self, _line: &str) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory stream that collects lines for inspection in tests.
#[derive(Clone, Default)]
pub struct BufferStream {
    lines: Arc<Mutex<Vec<String>>>,
}

impl BufferStream {
    pub fn new() -> BufferStream {
        BufferStream::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("buffer poisoned").clone()
    }

    /// Lines parsed back into JSON values, terminators stripped.
    pub fn records(&self) -> Vec<serde_json::Value> {
        self.lines()
            .iter()
            .map(|line| serde_json::from_str(line.trim_end()).expect("line is valid JSON"))
            .collect()
    }
}

impl LogStream for BufferStream {
    fn write_line(&self, line: &str) -> io::Result<()> {
        self.lines
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "buffer poisoned"))?
            .push(line.to_string());
        Ok(())
    }
}

/// Asynchronous transport behind a [`ChannelStream`].
///
/// Implementations move batches of encoded lines to wherever they need
/// to go (a socket, an HTTP collector, a file appender task). Called
/// from a Tokio task that owns the batching loop; a returned error is
/// treated as transient and the batch is retried with backoff.
#[async_trait]
pub trait LineTransport: Send + Sync {
    async fn send(&self, lines: &[String]) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Stream that hands lines to a background task via a bounded channel.
///
/// `write_line` is fire-and-forget: it enqueues and returns. When the
/// channel is full the line is dropped and counted rather than ever
/// blocking event dispatch.
pub struct ChannelStream {
    sender: mpsc::Sender<String>,
    /// Lines offered to the stream.
    pub total_lines: Arc<AtomicU64>,
    /// Successfully enqueued into the channel.
    pub enqueued_lines: Arc<AtomicU64>,
    /// Dropped because the channel was full.
    pub dropped_lines: Arc<AtomicU64>,
}

impl ChannelStream {
    /// Create the stream and spawn the background task that pulls lines
    /// off the channel and sends them to `transport` in batches.
    ///
    /// Minimal thresholds are enforced for `buffer`, `batch_size` and
    /// `flush_interval` to avoid degenerate configurations.
    pub fn new(
        transport: Arc<dyn LineTransport>,
        buffer: usize,
        batch_size: usize,
        flush_interval: Duration,
    ) -> (ChannelStream, JoinHandle<()>) {
        let buffer = buffer.max(16);
        let batch_size = batch_size.max(1);
        let flush_interval = if flush_interval < Duration::from_millis(10) {
            Duration::from_millis(10)
        } else {
            flush_interval
        };

        let (tx, mut rx) = mpsc::channel::<String>(buffer);

        let total_lines = Arc::new(AtomicU64::new(0));
        let enqueued_lines = Arc::new(AtomicU64::new(0));
        let dropped_lines = Arc::new(AtomicU64::new(0));

        let enqueued_bg = Arc::clone(&enqueued_lines);

        let handle = tokio::spawn(async move {
            let mut batch: Vec<String> = Vec::with_capacity(batch_size);
            let backoff = Duration::from_millis(100);
            let max_backoff = Duration::from_secs(10);

            loop {
                tokio::select! {
                    received = rx.recv() => {
                        match received {
                            Some(line) => {
                                batch.push(line);
                                enqueued_bg.fetch_add(1, Ordering::Relaxed);
                                if batch.len() >= batch_size {
                                    send_batch(&*transport, &mut batch, backoff, max_backoff).await;
                                }
                            }
                            None => {
                                if !batch.is_empty() {
                                    send_batch(&*transport, &mut batch, backoff, max_backoff).await;
                                }
                                break;
                            }
                        }
                    }
                    _ = sleep(flush_interval) => {
                        if !batch.is_empty() {
                            send_batch(&*transport, &mut batch, backoff, max_backoff).await;
                        }
                    }
                }
            }
        });

        (
            ChannelStream {
                sender: tx,
                total_lines,
                enqueued_lines,
                dropped_lines,
            },
            handle,
        )
    }
}

async fn send_batch(
    transport: &dyn LineTransport,
    batch: &mut Vec<String>,
    mut backoff: Duration,
    max_backoff: Duration,
) {
    loop {
        match transport.send(batch).await {
            Ok(()) => {
                batch.clear();
                return;
            }
            Err(e) => {
                eprintln!("log transport send failed, retrying in {:?}: {}", backoff, e);
                sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, max_backoff);
            }
        }
    }
}

impl LogStream for ChannelStream {
    fn write_line(&self, line: &str) -> io::Result<()> {
        self.total_lines.fetch_add(1, Ordering::Relaxed);
        if self.sender.try_send(line.to_string()).is_err() {
            self.dropped_lines.fetch_add(1, Ordering::Relaxed);
            eprintln!("log channel full, dropping log line");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_stream_collects_lines() {
        let stream = BufferStream::new();
        stream.write_line("{\"a\":1}\n").unwrap();
        stream.write_line("{\"b\":2}\n").unwrap();
        assert_eq!(stream.lines().len(), 2);
        assert_eq!(stream.records()[1]["b"], serde_json::json!(2));
    }

    struct CollectTransport {
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl LineTransport for CollectTransport {
        async fn send(&self, lines: &[String]) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.sent
                .lock()
                .expect("collector poisoned")
                .extend(lines.iter().cloned());
            Ok(())
        }
    }

    #[tokio::test]
    async fn channel_stream_delivers_to_transport() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = Arc::new(CollectTransport {
            sent: Arc::clone(&sent),
        });
        let (stream, _handle) =
            ChannelStream::new(transport, 64, 1, Duration::from_millis(20));

        stream.write_line("{\"x\":1}\n").unwrap();
        stream.write_line("{\"x\":2}\n").unwrap();

        for _ in 0..100 {
            if sent.lock().unwrap().len() == 2 {
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(sent.lock().unwrap().len(), 2);
        assert_eq!(stream.total_lines.load(Ordering::Relaxed), 2);
        assert_eq!(stream.dropped_lines.load(Ordering::Relaxed), 0);
    }
}
