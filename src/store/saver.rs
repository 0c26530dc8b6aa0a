use std::time::{Duration, Instant};

use indexmap::IndexMap;

use crate::model::{Completable, CompletableType};

/// One debounced flush: the final value of every entity edited during the
/// burst, in first-edit order.
pub type SaveBatch = Vec<(CompletableType, Completable)>;

/// Invoked when the quiet period elapses with edits pending.
pub type FlushFn = Box<dyn FnMut(SaveBatch)>;

/// Debounce timer that coalesces rapid local edits into one deferred flush.
///
/// Owned by whoever owns the store instance and driven from the event loop:
/// call [`SaveTimer::poll`] each tick. Every [`SaveTimer::mark_dirty`] call
/// restarts the quiet period, so a burst of edits produces a single flush
/// carrying the latest clone of each edited entity.
pub struct SaveTimer {
    quiet_period: Duration,
    deadline: Option<Instant>,
    dirty: IndexMap<(CompletableType, String), Completable>,
    on_flush: FlushFn,
}

impl SaveTimer {
    pub fn new(quiet_period: Duration, on_flush: FlushFn) -> Self {
        SaveTimer {
            quiet_period,
            deadline: None,
            dirty: IndexMap::new(),
            on_flush,
        }
    }

    /// Record the latest value of an edited entity and restart the quiet
    /// period. A later edit of the same entity replaces the pending value.
    pub fn mark_dirty(&mut self, kind: CompletableType, completable: &Completable) {
        self.dirty
            .insert((kind, completable.id.clone()), completable.clone());
        self.deadline = Some(Instant::now() + self.quiet_period);
    }

    /// Drop a pending entity, e.g. after it was deleted. Leaves the deadline
    /// alone; an empty flush is simply skipped.
    pub fn forget(&mut self, kind: CompletableType, id: &str) {
        self.dirty.shift_remove(&(kind, id.to_string()));
    }

    /// Stop the pending timer without discarding dirty entities. The next
    /// `mark_dirty` re-arms it; an explicit `flush_now` still works.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// True if a flush is scheduled.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Fire the flush callback if the quiet period has elapsed. Returns true
    /// if a flush ran. Call this from the event loop tick.
    pub fn poll(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => self.flush(),
            _ => false,
        }
    }

    /// Flush immediately, regardless of the deadline. Returns true if there
    /// was anything to flush.
    pub fn flush_now(&mut self) -> bool {
        self.flush()
    }

    fn flush(&mut self) -> bool {
        self.deadline = None;
        if self.dirty.is_empty() {
            return false;
        }
        let batch: SaveBatch = self
            .dirty
            .drain(..)
            .map(|((kind, _id), completable)| (kind, completable))
            .collect();
        log::debug!("flushing {} dirty completable(s)", batch.len());
        (self.on_flush)(batch);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const QUIET: Duration = Duration::from_millis(25);

    fn recording() -> (Rc<RefCell<Vec<SaveBatch>>>, SaveTimer) {
        let flushes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&flushes);
        let timer = SaveTimer::new(QUIET, Box::new(move |batch| sink.borrow_mut().push(batch)));
        (flushes, timer)
    }

    #[test]
    fn burst_of_edits_coalesces_into_one_flush() {
        let (flushes, mut timer) = recording();
        let mut task = Completable::new("t1", "Milk");
        timer.mark_dirty(CompletableType::Task, &task);
        task.title = "Oat milk".into();
        timer.mark_dirty(CompletableType::Task, &task);
        timer.mark_dirty(CompletableType::Project, &Completable::new("p1", "Groceries"));

        assert!(!timer.poll(), "quiet period has not elapsed yet");
        std::thread::sleep(QUIET + Duration::from_millis(10));
        assert!(timer.poll());
        assert!(!timer.poll(), "nothing left to flush");

        let flushes = flushes.borrow();
        assert_eq!(flushes.len(), 1);
        let batch = &flushes[0];
        assert_eq!(batch.len(), 2);
        // final value of the edited field survives coalescing
        assert_eq!(batch[0].1.title, "Oat milk");
        assert_eq!(batch[1].1.title, "Groceries");
    }

    #[test]
    fn spaced_edits_flush_separately() {
        let (flushes, mut timer) = recording();
        timer.mark_dirty(CompletableType::Task, &Completable::new("t1", "Milk"));
        std::thread::sleep(QUIET + Duration::from_millis(10));
        assert!(timer.poll());
        timer.mark_dirty(CompletableType::Task, &Completable::new("t2", "Eggs"));
        std::thread::sleep(QUIET + Duration::from_millis(10));
        assert!(timer.poll());
        assert_eq!(flushes.borrow().len(), 2);
    }

    #[test]
    fn cancel_stops_the_timer_but_keeps_dirty_state() {
        let (flushes, mut timer) = recording();
        timer.mark_dirty(CompletableType::Task, &Completable::new("t1", "Milk"));
        timer.cancel();
        assert!(!timer.is_pending());
        std::thread::sleep(QUIET + Duration::from_millis(10));
        assert!(!timer.poll());
        // a flush after cancellation is tolerated, not lost
        assert!(timer.flush_now());
        assert_eq!(flushes.borrow().len(), 1);
    }

    #[test]
    fn forget_drops_a_deleted_entity_from_the_batch() {
        let (flushes, mut timer) = recording();
        timer.mark_dirty(CompletableType::Task, &Completable::new("t1", "Milk"));
        timer.mark_dirty(CompletableType::Task, &Completable::new("t2", "Eggs"));
        timer.forget(CompletableType::Task, "t1");
        assert!(timer.flush_now());
        let flushes = flushes.borrow();
        assert_eq!(flushes[0].len(), 1);
        assert_eq!(flushes[0][0].1.id, "t2");
    }

    #[test]
    fn empty_flush_is_skipped() {
        let (flushes, mut timer) = recording();
        assert!(!timer.flush_now());
        timer.mark_dirty(CompletableType::Task, &Completable::new("t1", "Milk"));
        timer.forget(CompletableType::Task, "t1");
        std::thread::sleep(QUIET + Duration::from_millis(10));
        assert!(!timer.poll());
        assert!(flushes.borrow().is_empty());
    }
}
