//! Multi-asset join barrier
//!
//! A barrier is created with every entry `Requested` before any load is
//! dispatched. Each completion settles one entry; the completion that settles
//! the last one receives the entries and the barrier is spent, so the
//! assembly step runs at most once regardless of completion order.

use crate::name::Name;

/// Progress of one sub-asset
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinState {
    Requested,
    Loaded,
    Unavailable,
}

/// One sub-asset tracked by a barrier
#[derive(Debug)]
pub struct JoinEntry<T> {
    name: Name,
    state: JoinState,
    payload: Option<T>,
}

impl<T> JoinEntry<T> {
    /// Asset name this entry waits for
    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn state(&self) -> JoinState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == JoinState::Loaded
    }

    pub fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    pub fn take_payload(&mut self) -> Option<T> {
        self.payload.take()
    }

    /// Mark a loaded entry unusable, dropping its payload
    pub fn demote(&mut self) {
        self.state = JoinState::Unavailable;
        self.payload = None;
    }
}

/// Outcome of settling one entry
#[derive(Debug)]
pub enum JoinProgress<T> {
    /// Other entries are still outstanding
    Pending,
    /// This completion closed the barrier
    Ready(Vec<JoinEntry<T>>),
    /// No outstanding entry has that name
    Unmatched,
    /// The barrier already fired
    Spent,
}

/// Fires once when every entry has settled
#[derive(Debug)]
pub struct JoinBarrier<T> {
    entries: Vec<JoinEntry<T>>,
    fired: bool,
}

impl<T> Default for JoinBarrier<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            fired: false,
        }
    }
}

impl<T> JoinBarrier<T> {
    /// Create an empty barrier
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry that will be completed later
    pub fn push_requested(&mut self, name: Name) {
        self.entries.push(JoinEntry {
            name,
            state: JoinState::Requested,
            payload: None,
        });
    }

    /// Add an entry that is known to be missing up front
    pub fn push_unavailable(&mut self, name: Name) {
        self.entries.push(JoinEntry {
            name,
            state: JoinState::Unavailable,
            payload: None,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries still waiting for a completion
    pub fn outstanding(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state == JoinState::Requested)
            .count()
    }

    pub fn is_fired(&self) -> bool {
        self.fired
    }

    /// Settle the first outstanding entry named `name`
    ///
    /// `Some(payload)` marks it `Loaded`, `None` marks it `Unavailable`.
    pub fn complete(&mut self, name: &Name, payload: Option<T>) -> JoinProgress<T> {
        if self.fired {
            return JoinProgress::Spent;
        }
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.state == JoinState::Requested && &e.name == name)
        else {
            return JoinProgress::Unmatched;
        };

        match payload {
            Some(payload) => {
                entry.state = JoinState::Loaded;
                entry.payload = Some(payload);
            }
            None => entry.state = JoinState::Unavailable,
        }
        self.poll()
    }

    /// Fire if nothing is outstanding
    ///
    /// Used after a dispatch loop in which every entry settled without a
    /// completion, e.g. all synchronous.
    pub fn poll(&mut self) -> JoinProgress<T> {
        if self.fired {
            return JoinProgress::Spent;
        }
        if self.entries.iter().any(|e| e.state == JoinState::Requested) {
            return JoinProgress::Pending;
        }
        self.fired = true;
        JoinProgress::Ready(std::mem::take(&mut self.entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn barrier() -> JoinBarrier<u8> {
        let mut barrier = JoinBarrier::new();
        barrier.push_requested(Name::new("metal"));
        barrier.push_requested(Name::new("rough"));
        barrier.push_requested(Name::new("ao"));
        barrier
    }

    #[test]
    fn test_fires_once_in_every_order() {
        let names = ["metal", "rough", "ao"];
        let orders = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];

        for order in orders {
            let mut barrier = barrier();
            let mut fired = 0;
            for (step, &i) in order.iter().enumerate() {
                // One failure in the middle of every ordering
                let payload = if step == 1 { None } else { Some(i as u8) };
                match barrier.complete(&Name::new(names[i]), payload) {
                    JoinProgress::Ready(entries) => {
                        fired += 1;
                        assert_eq!(step, 2);
                        assert_eq!(entries.len(), 3);
                        assert_eq!(entries.iter().filter(|e| e.is_loaded()).count(), 2);
                        // Entries keep their declared order
                        assert_eq!(entries[0].name(), &Name::new("metal"));
                    }
                    JoinProgress::Pending => assert!(step < 2),
                    other => panic!("unexpected progress {:?}", other),
                }
            }
            assert_eq!(fired, 1, "order {:?}", order);
            assert!(matches!(barrier.poll(), JoinProgress::Spent));
        }
    }

    #[test]
    fn test_unmatched_and_spent() {
        let mut barrier = JoinBarrier::new();
        barrier.push_requested(Name::new("a"));

        assert!(matches!(barrier.complete(&Name::new("b"), Some(1u8)), JoinProgress::Unmatched));
        assert!(matches!(barrier.complete(&Name::new("a"), Some(1)), JoinProgress::Ready(_)));
        assert!(matches!(barrier.complete(&Name::new("a"), Some(1)), JoinProgress::Spent));
    }

    #[test]
    fn test_all_unavailable_fires_on_poll() {
        let mut barrier: JoinBarrier<u8> = JoinBarrier::new();
        barrier.push_unavailable(Name::new("a"));
        barrier.push_unavailable(Name::new("b"));

        match barrier.poll() {
            JoinProgress::Ready(entries) => assert!(entries.iter().all(|e| !e.is_loaded())),
            other => panic!("unexpected progress {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_names_settle_in_turn() {
        let mut barrier = JoinBarrier::new();
        barrier.push_requested(Name::new("shared"));
        barrier.push_requested(Name::new("shared"));

        assert!(matches!(barrier.complete(&Name::new("shared"), Some(1u8)), JoinProgress::Pending));
        assert_eq!(barrier.outstanding(), 1);
        assert!(matches!(barrier.complete(&Name::new("shared"), Some(2)), JoinProgress::Ready(_)));
    }
}
