use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::util::is_same_or_descendant;

/// Independent debounce streams; each holds at most one pending write.
/// 彼此獨立的延遲寫入串流，每個串流最多只有一個待執行的寫入。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SyncStream {
    /// The list of workspace roots.
    WorkspaceList,
    /// Editor content of one file, keyed by path.
    Content(String),
}

impl SyncStream {
    pub fn is_content(&self) -> bool {
        matches!(self, SyncStream::Content(_))
    }
}

enum Signal {
    Cancel,
    Flush,
}

struct Pending {
    signal: oneshot::Sender<Signal>,
    handle: JoinHandle<()>,
}

/// Coalesces bursts of writes into one action per stream after a quiet interval.
/// 將短時間內的多次寫入合併，於靜止期過後只執行最後一次。
///
/// Must be used from within a tokio runtime. Cancelling a stream only stops
/// an action whose timer has not fired yet; a write already in flight runs to
/// completion. Dropping the scheduler cancels everything still pending.
#[derive(Default)]
pub struct SyncScheduler {
    pending: HashMap<SyncStream, Pending>,
}

impl SyncScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `action` to run after `delay`, replacing any pending action on `stream`.
    /// 在 `delay` 之後執行 `action`，並取消同一串流上尚未執行的動作。
    pub fn schedule<F>(&mut self, stream: SyncStream, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.cancel(&stream) {
            trace!(?stream, "debounced write superseded");
        }
        self.pending.retain(|_, pending| !pending.handle.is_finished());
        let (signal, received) = oneshot::channel();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                received = received => {
                    if let Ok(Signal::Flush) = received {
                        action.await;
                    }
                }
                _ = tokio::time::sleep(delay) => action.await,
            }
        });
        self.pending.insert(stream, Pending { signal, handle });
    }

    /// Cancels the pending action on `stream`; returns whether one was still waiting.
    pub fn cancel(&mut self, stream: &SyncStream) -> bool {
        match self.pending.remove(stream) {
            Some(pending) => {
                !pending.handle.is_finished() && pending.signal.send(Signal::Cancel).is_ok()
            }
            None => false,
        }
    }

    /// Cancels every pending content write; returns how many were dropped.
    /// 取消所有尚未執行的內容寫入，回傳被捨棄的數量。
    pub fn cancel_content(&mut self) -> usize {
        let streams: Vec<SyncStream> = self
            .pending
            .keys()
            .filter(|stream| stream.is_content())
            .cloned()
            .collect();
        self.cancel_each(streams)
    }

    /// Cancels content writes for `prefix` and every path underneath it.
    /// 取消 `prefix`（含其下所有路徑）尚未執行的內容寫入。
    pub fn cancel_under(&mut self, prefix: &str) -> usize {
        let streams = self.content_under(prefix);
        self.cancel_each(streams)
    }

    /// Fires content writes for `prefix` and its descendants now and waits for them.
    /// 立即執行 `prefix`（含其下所有路徑）的內容寫入並等待完成。
    pub async fn flush_under(&mut self, prefix: &str) -> usize {
        let mut flushed = 0;
        for stream in self.content_under(prefix) {
            let Some(Pending { signal, handle }) = self.pending.remove(&stream) else {
                continue;
            };
            // An action already past its timer is awaited all the same.
            if signal.send(Signal::Flush).is_ok() {
                flushed += 1;
            }
            if let Err(err) = handle.await {
                debug!(?stream, error = %err, "debounced write did not complete");
            }
        }
        flushed
    }

    pub fn cancel_all(&mut self) -> usize {
        let streams: Vec<SyncStream> = self.pending.keys().cloned().collect();
        self.cancel_each(streams)
    }

    fn content_under(&self, prefix: &str) -> Vec<SyncStream> {
        self.pending
            .keys()
            .filter(|stream| match stream {
                SyncStream::Content(path) => is_same_or_descendant(path, prefix),
                SyncStream::WorkspaceList => false,
            })
            .cloned()
            .collect()
    }

    fn cancel_each(&mut self, streams: Vec<SyncStream>) -> usize {
        let mut dropped = 0;
        for stream in streams {
            if self.cancel(&stream) {
                dropped += 1;
            }
        }
        dropped
    }

    /// Number of streams whose action has not finished yet.
    pub fn pending(&self) -> usize {
        self.pending
            .values()
            .filter(|pending| !pending.handle.is_finished())
            .count()
    }

    pub fn is_pending(&self, stream: &SyncStream) -> bool {
        self.pending
            .get(stream)
            .is_some_and(|pending| !pending.handle.is_finished())
    }

    /// Waits for every armed action to fire and finish.
    /// 等待所有已排程的動作執行完畢。
    pub async fn settle(&mut self) {
        let drained: Vec<(SyncStream, Pending)> = self.pending.drain().collect();
        for (stream, pending) in drained {
            // Keep the sender alive so the action is not cancelled while waiting.
            let Pending { signal, handle } = pending;
            if let Err(err) = handle.await {
                debug!(?stream, error = %err, "debounced write did not complete");
            }
            drop(signal);
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        let dropped = self.cancel_all();
        if dropped > 0 {
            debug!(dropped, "discarding pending writes on teardown");
        }
    }
}
