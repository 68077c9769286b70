use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Destination for forwarded child output lines
///
/// The supervisor pipes the child's stdout and stderr and copies them
/// line-by-line into a pair of these sinks, so the child's output ends up
/// on the supervisor's own streams by default and can be redirected in
/// tests.
pub struct OutputSink(Arc<Mutex<Box<dyn AsyncWrite + Unpin + Sync + Send>>>);

impl Clone for OutputSink {
    fn clone(&self) -> Self {
        OutputSink(self.0.clone())
    }
}

impl OutputSink {
    pub fn new(writer: Box<dyn AsyncWrite + Unpin + Sync + Send>) -> Self {
        OutputSink(Arc::new(Mutex::new(writer)))
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(tokio::io::stdout()))
    }

    pub fn stderr() -> Self {
        Self::new(Box::new(tokio::io::stderr()))
    }

    /// Sink that discards everything written to it
    pub fn null() -> Self {
        Self::new(Box::new(tokio::io::sink()))
    }

    pub async fn write_line(&self, line: &str) {
        let mut lock = self.0.lock().await;
        let _ = lock.write_all(line.as_bytes()).await;
        let _ = lock.write_all(b"\n").await;
    }
}
