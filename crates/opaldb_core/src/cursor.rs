//! Forward cursor driver with cooperative stop control.

use crate::bridge;
use crate::error::{CoreError, CoreResult};
use opaldb_engine::{Cursor, CursorEntry};

/// Cooperative halt flag handed to every cursor visitor.
///
/// Setting it stops the traversal after the current visit returns; records
/// past that point are never fetched. This is the only cancellation surface
/// an iteration exposes.
#[derive(Debug, Default)]
pub struct Stop {
    stopped: bool,
}

impl Stop {
    /// Halts the traversal after the current visit.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Whether the traversal has been halted.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

/// Drives a cursor to exhaustion or until the visitor halts it.
///
/// Visits happen strictly in cursor order, one at a time: the next step is
/// only issued after the current visit returns. A step failure rejects the
/// whole traversal; visitor panics are not caught and unwind through the
/// surrounding composition.
pub(crate) async fn drive<F>(mut cursor: Box<dyn Cursor>, mut visit: F) -> CoreResult<()>
where
    F: FnMut(CursorEntry, &mut Stop),
{
    let mut stop = Stop::default();
    loop {
        match bridge::settle(cursor.step()).await.map_err(CoreError::Request)? {
            Some(entry) => {
                visit(entry, &mut stop);
                if stop.is_stopped() {
                    break;
                }
            }
            None => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use opaldb_engine::{Completion, EngineError, Key};
    use serde_json::json;
    use std::collections::VecDeque;

    struct ScriptedCursor {
        entries: VecDeque<CursorEntry>,
        fail_at: Option<usize>,
        steps: usize,
    }

    impl ScriptedCursor {
        fn over(keys: &[i64]) -> Box<Self> {
            Box::new(Self {
                entries: keys
                    .iter()
                    .map(|&k| CursorEntry {
                        primary_key: Key::Int(k),
                        index_key: None,
                        value: json!({ "id": k }),
                    })
                    .collect(),
                fail_at: None,
                steps: 0,
            })
        }
    }

    impl Cursor for ScriptedCursor {
        fn step(&mut self) -> Completion<Option<CursorEntry>> {
            if self.fail_at == Some(self.steps) {
                return Completion::failed(EngineError::Disconnected);
            }
            self.steps += 1;
            Completion::settled(Ok(self.entries.pop_front()))
        }
    }

    #[test]
    fn visits_every_entry_in_order() {
        let mut seen = Vec::new();
        block_on(drive(ScriptedCursor::over(&[1, 2, 3]), |entry, _| {
            seen.push(entry.primary_key);
        }))
        .unwrap();
        assert_eq!(seen, vec![Key::Int(1), Key::Int(2), Key::Int(3)]);
    }

    #[test]
    fn stop_halts_after_current_visit() {
        let mut seen = 0;
        block_on(drive(ScriptedCursor::over(&[1, 2, 3, 4]), |_, stop| {
            seen += 1;
            if seen == 2 {
                stop.stop();
            }
        }))
        .unwrap();
        assert_eq!(seen, 2);
    }

    #[test]
    fn empty_cursor_resolves_without_visits() {
        let mut seen = 0;
        block_on(drive(ScriptedCursor::over(&[]), |_, _| seen += 1)).unwrap();
        assert_eq!(seen, 0);
    }

    #[test]
    fn step_failure_rejects_the_traversal() {
        let mut cursor = ScriptedCursor::over(&[1, 2, 3]);
        cursor.fail_at = Some(1);
        let mut seen = 0;
        let result = block_on(drive(cursor, |_, _| seen += 1));
        assert!(matches!(result, Err(CoreError::Request(_))));
        assert_eq!(seen, 1);
    }
}
