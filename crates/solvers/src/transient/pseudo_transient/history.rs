use std::collections::VecDeque;
use std::sync::Arc;

use ptc_core::MultiVector;

/// A snapshot of the integrated state at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct SolutionState {
    /// Time at which the state was reached.
    pub time: f64,

    /// Number of accepted steps taken to reach this state (0 for initial).
    pub index: usize,

    /// Size of the step that produced this state (0 for initial).
    pub dt: f64,

    pub x: MultiVector,
    pub x_dot: MultiVector,

    /// Second time derivative, when known.
    pub x_dot_dot: Option<MultiVector>,
}

/// An ordered, time-indexed record of solution states.
///
/// States are shared through [`Arc`], so a consumer can hold on to a state
/// (for example a frozen steady state) after the history moves on. With a
/// storage limit, only the newest states are kept; the current state is
/// always retained.
#[derive(Debug, Clone, Default)]
pub struct SolutionHistory {
    states: VecDeque<Arc<SolutionState>>,
    storage_limit: Option<usize>,
}

impl SolutionHistory {
    /// Creates an empty history that keeps at most `storage_limit` states.
    #[must_use]
    pub fn new(storage_limit: Option<usize>) -> Self {
        Self {
            states: VecDeque::new(),
            storage_limit,
        }
    }

    /// Returns the newest state.
    #[must_use]
    pub fn current(&self) -> Option<&Arc<SolutionState>> {
        self.states.back()
    }

    /// Returns the oldest retained state.
    #[must_use]
    pub fn oldest(&self) -> Option<&Arc<SolutionState>> {
        self.states.front()
    }

    /// Returns the retained state at position `i`, oldest first.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&Arc<SolutionState>> {
        self.states.get(i)
    }

    /// Returns the number of retained states.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` if no state has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Returns the storage limit, if any.
    #[must_use]
    pub fn storage_limit(&self) -> Option<usize> {
        self.storage_limit
    }

    /// Iterates over retained states, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<SolutionState>> {
        self.states.iter()
    }

    pub(crate) fn push(&mut self, state: Arc<SolutionState>) {
        self.states.push_back(state);
        if let Some(limit) = self.storage_limit {
            while self.states.len() > limit.max(1) {
                self.states.pop_front();
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.states.clear();
    }
}

impl<'a> IntoIterator for &'a SolutionHistory {
    type Item = &'a Arc<SolutionState>;
    type IntoIter = std::collections::vec_deque::Iter<'a, Arc<SolutionState>>;

    fn into_iter(self) -> Self::IntoIter {
        self.states.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(index: usize) -> Arc<SolutionState> {
        Arc::new(SolutionState {
            time: index as f64,
            index,
            dt: 1.0,
            x: MultiVector::zeros(1, 1),
            x_dot: MultiVector::zeros(1, 1),
            x_dot_dot: None,
        })
    }

    #[test]
    fn unlimited_history_keeps_everything() {
        let mut history = SolutionHistory::new(None);
        for i in 0..5 {
            history.push(state(i));
        }

        assert_eq!(history.len(), 5);
        assert_eq!(history.oldest().unwrap().index, 0);
        assert_eq!(history.current().unwrap().index, 4);
    }

    #[test]
    fn storage_limit_drops_oldest_states() {
        let mut history = SolutionHistory::new(Some(2));
        for i in 0..5 {
            history.push(state(i));
        }

        let indices: Vec<_> = history.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![3, 4]);
    }

    #[test]
    fn shared_state_outlives_clear() {
        let mut history = SolutionHistory::default();
        history.push(state(7));
        let held = Arc::clone(history.current().unwrap());

        history.clear();

        assert!(history.is_empty());
        assert_eq!(held.index, 7);
    }
}
