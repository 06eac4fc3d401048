//! Progress events for the fetch and match phases.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::entities::RegionId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Progress {
    /// About to request this order book page.
    FetchingPage { region_id: RegionId, page: u32 },
    /// Order book served from the local snapshot.
    LoadedFromCache { region_id: RegionId, orders: usize },
    /// One more item type finished matching.
    Matching { processed: usize, total: usize },
}

impl Progress {
    pub fn label(&self) -> String {
        match self {
            Self::FetchingPage { page, .. } => format!("Fetching {page}.."),
            Self::LoadedFromCache { orders, .. } => format!("Loaded {orders} cached orders"),
            Self::Matching { processed, total } => {
                let percent = if *total == 0 {
                    100
                } else {
                    processed * 100 / total
                };
                format!("Matching ({percent}%)..")
            }
        }
    }
}

/// Sending half of a progress channel.
///
/// Emitting never blocks and never fails: a sink without a receiver, or one
/// whose receiver was dropped, silently discards events.
#[derive(Clone, Debug, Default)]
pub struct ProgressSink {
    tx: Option<UnboundedSender<Progress>>,
}

impl ProgressSink {
    pub fn channel() -> (Self, UnboundedReceiver<Progress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: Progress) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_order() {
        let (sink, mut rx) = ProgressSink::channel();
        sink.emit(Progress::FetchingPage { region_id: 1, page: 1 });
        sink.emit(Progress::Matching { processed: 1, total: 4 });

        assert_eq!(rx.try_recv().unwrap().label(), "Fetching 1..");
        assert_eq!(rx.try_recv().unwrap().label(), "Matching (25%)..");
    }

    #[test]
    fn dropped_receiver_is_ignored() {
        let (sink, rx) = ProgressSink::channel();
        drop(rx);
        sink.emit(Progress::Matching { processed: 0, total: 0 });
        ProgressSink::disabled().emit(Progress::Matching { processed: 0, total: 0 });
    }
}
