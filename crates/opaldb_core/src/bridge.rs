//! Adapts engine completion handles into futures.
//!
//! The engine signals every asynchronous outcome through a
//! [`Completion`]; this module is the terminal leaf that turns those
//! callback signals into awaitable futures. Nothing above it touches a raw
//! completion.

use futures::channel::oneshot;
use opaldb_engine::{Completion, EngineError, EngineResult};
use parking_lot::Mutex;
use std::sync::Arc;

/// Resolves once the completion settles.
///
/// The future yields the engine's result unmodified; a completion whose
/// signal was dropped without settling yields [`EngineError::Disconnected`].
pub async fn settle<T: Send + 'static>(completion: Completion<T>) -> EngineResult<T> {
    let (tx, rx) = oneshot::channel();
    completion.on_settle(move |result| {
        let _ = tx.send(result);
    });
    rx.await.unwrap_or(Err(EngineError::Disconnected))
}

struct BatchState<T> {
    /// One slot per input position; results land at their submission index.
    slots: Vec<Option<T>>,
    remaining: usize,
    tx: Option<oneshot::Sender<EngineResult<Vec<T>>>>,
}

/// Resolves with all results once every completion has settled successfully.
///
/// Results are returned in submission order regardless of the order the
/// engine settles them in: each completion writes into the slot of its input
/// position. The first failure rejects the whole batch; signals arriving on
/// sibling handles afterwards are dropped unreported. An empty input resolves
/// immediately with an empty vector.
pub async fn settle_all<T: Send + 'static>(
    completions: Vec<Completion<T>>,
) -> EngineResult<Vec<T>> {
    if completions.is_empty() {
        return Ok(Vec::new());
    }

    let count = completions.len();
    let (tx, rx) = oneshot::channel();
    let state = Arc::new(Mutex::new(BatchState {
        slots: (0..count).map(|_| None).collect(),
        remaining: count,
        tx: Some(tx),
    }));

    for (position, completion) in completions.into_iter().enumerate() {
        let state = Arc::clone(&state);
        completion.on_settle(move |result| {
            let mut batch = state.lock();
            if batch.tx.is_none() {
                // The batch already rejected; drop this signal unreported.
                return;
            }
            match result {
                Ok(value) => {
                    batch.slots[position] = Some(value);
                    batch.remaining -= 1;
                    if batch.remaining == 0 {
                        let results = batch.slots.drain(..).flatten().collect();
                        if let Some(tx) = batch.tx.take() {
                            drop(batch);
                            let _ = tx.send(Ok(results));
                        }
                    }
                }
                Err(error) => {
                    if let Some(tx) = batch.tx.take() {
                        drop(batch);
                        let _ = tx.send(Err(error));
                    }
                }
            }
        });
    }

    rx.await.unwrap_or(Err(EngineError::Disconnected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use opaldb_engine::Signal;

    #[test]
    fn settle_resolves_with_the_result() {
        let completion = Completion::settled(Ok(5u32));
        assert_eq!(block_on(settle(completion)).unwrap(), 5);
    }

    #[test]
    fn settle_rejects_with_the_error() {
        let completion: Completion<u32> = Completion::failed(EngineError::Disconnected);
        assert!(block_on(settle(completion)).is_err());
    }

    #[test]
    fn settle_resolves_after_late_signal() {
        let (completion, signal) = Completion::channel();
        let future = settle(completion);
        signal.success(9u8);
        assert_eq!(block_on(future).unwrap(), 9);
    }

    #[test]
    fn dropped_signal_rejects_as_disconnected() {
        let (completion, signal) = Completion::<()>::channel();
        drop(signal);
        assert!(matches!(
            block_on(settle(completion)),
            Err(EngineError::Disconnected)
        ));
    }

    #[test]
    fn empty_batch_resolves_immediately() {
        let results = block_on(settle_all::<u32>(Vec::new())).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn batch_preserves_submission_order() {
        let pairs: Vec<(Completion<u32>, Signal<u32>)> =
            (0..4).map(|_| Completion::channel()).collect();
        let (completions, signals): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();

        let future = settle_all(completions);
        // Settle in reverse submission order.
        for (value, signal) in signals.into_iter().enumerate().rev() {
            signal.success(value as u32);
        }
        assert_eq!(block_on(future).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn first_failure_rejects_the_whole_batch() {
        let (a, sa) = Completion::<u32>::channel();
        let (b, sb) = Completion::<u32>::channel();
        let (c, sc) = Completion::<u32>::channel();

        let future = settle_all(vec![a, b, c]);
        sa.success(1);
        sb.failure(EngineError::invalid_key("bad"));
        // A sibling success after the rejection must be ignored.
        sc.success(3);

        assert!(matches!(
            block_on(future),
            Err(EngineError::InvalidKey { .. })
        ));
    }
}
