pub mod app;
pub mod learner;
pub mod session;

use std::collections::VecDeque;

pub use app::AppState;
pub use learner::{EmotionHistoryEntry, LearnerState, Observation};
pub use session::{HistorySnapshot, LearnerSession, StateSnapshot};

/// Append, dropping from the front until `buf.len() <= capacity`
pub(crate) fn push_bounded<T>(buf: &mut VecDeque<T>, item: T, capacity: usize) {
    buf.push_back(item);
    while buf.len() > capacity {
        buf.pop_front();
    }
}
