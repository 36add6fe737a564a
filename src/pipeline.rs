//! Bounded per-file pipeline connecting a scanner to its matcher.
//!
//! Each log file gets its own capacity-1024 channel so one slow matcher
//! can't stall scanning of other files, plus a `CancellationToken` threaded
//! through every send/recv so a cancelled scan unwinds promptly.

use crate::model::LogRecord;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_CAPACITY: usize = 1024;

/// One unit of work flowing from scanner to matcher: a parsed record, or a
/// terminal signal so the matcher knows the file is exhausted.
#[derive(Debug)]
pub enum Payload {
    Record(LogRecord),
    Eof,
}

pub struct Pipeline {
    pub tx: mpsc::Sender<Payload>,
    pub rx: mpsc::Receiver<Payload>,
    pub cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Sends one payload, returning without error if the pipeline was
    /// cancelled before the send completed (the matcher side stopped
    /// draining and the send would otherwise hang or error spuriously).
    pub async fn send(&self, payload: Payload) -> Result<(), crate::error::CoverageError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(crate::error::CoverageError::Cancelled),
            res = self.tx.send(payload) => res.map_err(|_| {
                crate::error::CoverageError::Inconsistency("matcher dropped the pipeline".into())
            }),
        }
    }

    /// Receives the next payload, or `None` once the sender is dropped or
    /// the pipeline is cancelled.
    pub async fn recv(&mut self) -> Option<Payload> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            payload = self.rx.recv() => payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogRecord;

    fn sample_record() -> LogRecord {
        LogRecord {
            source_file_path: "app.log".into(),
            time: "t".into(),
            level: "info".into(),
            short_position: "main.go:1".into(),
            message: "started".into(),
        }
    }

    #[tokio::test]
    async fn sends_and_receives_in_order() {
        let mut pipeline = Pipeline::with_default_capacity();
        pipeline.send(Payload::Record(sample_record())).await.unwrap();
        pipeline.send(Payload::Eof).await.unwrap();

        match pipeline.recv().await.unwrap() {
            Payload::Record(r) => assert_eq!(r.message, "started"),
            Payload::Eof => panic!("expected record first"),
        }
        assert!(matches!(pipeline.recv().await.unwrap(), Payload::Eof));
    }

    #[tokio::test]
    async fn cancellation_stops_recv() {
        let mut pipeline = Pipeline::with_default_capacity();
        pipeline.cancel.cancel();
        assert!(pipeline.recv().await.is_none());
    }

    #[tokio::test]
    async fn cancellation_stops_send() {
        let pipeline = Pipeline::with_default_capacity();
        pipeline.cancel.cancel();
        let err = pipeline.send(Payload::Eof).await.unwrap_err();
        assert!(matches!(err, crate::error::CoverageError::Cancelled));
    }
}
