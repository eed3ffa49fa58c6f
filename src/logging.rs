use tokio::sync::broadcast;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::MakeWriter;

const LOG_CHANNEL_CAPACITY: usize = 500;

/// Tees every formatted log line to stdout and to a broadcast channel that
/// `/api/logs` streams as server-sent events.
#[derive(Clone)]
pub(crate) struct SseMakeWriter {
    pub sender: broadcast::Sender<String>,
    pub suppress_stdout: bool,
}

impl<'a> MakeWriter<'a> for SseMakeWriter {
    type Writer = SseWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SseWriter {
            sender: self.sender.clone(),
            suppress_stdout: self.suppress_stdout,
        }
    }
}

pub(crate) struct SseWriter {
    sender: broadcast::Sender<String>,
    suppress_stdout: bool,
}

impl std::io::Write for SseWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let msg = String::from_utf8_lossy(buf).to_string();
        let _ = self.sender.send(msg); // no subscribers is fine
        if !self.suppress_stdout {
            std::io::stdout().write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if !self.suppress_stdout {
            std::io::stdout().flush()?;
        }
        Ok(())
    }
}

pub(crate) fn log_channel() -> broadcast::Sender<String> {
    broadcast::channel::<String>(LOG_CHANNEL_CAPACITY).0
}

/// Installs the global subscriber. A second call is a no-op.
pub(crate) fn init(verbose: bool, suppress_stdout: bool) -> broadcast::Sender<String> {
    let log_tx = log_channel();
    let make_writer = SseMakeWriter {
        sender: log_tx.clone(),
        suppress_stdout,
    };
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(make_writer)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
    log_tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn writer_broadcasts_each_line() {
        let tx = log_channel();
        let mut rx = tx.subscribe();
        let make = SseMakeWriter {
            sender: tx,
            suppress_stdout: true,
        };
        let mut writer = make.make_writer();
        assert_eq!(writer.write(b"INFO ready\n").unwrap(), 11);
        writer.flush().unwrap();
        assert_eq!(rx.try_recv().unwrap(), "INFO ready\n");
    }

    #[test]
    fn writer_tolerates_missing_subscribers() {
        let make = SseMakeWriter {
            sender: log_channel(),
            suppress_stdout: true,
        };
        assert!(make.make_writer().write(b"dropped").is_ok());
    }
}
