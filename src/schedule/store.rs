use std::num::NonZeroUsize;
use lru::LruCache;
use crate::schedule::model::Schedule;

/// Bounded memory of schedules issued to one learner, so feedback can be
/// matched back to the schedule it is about. Least recently used is evicted.
pub struct IssuedSchedules {
    cache: LruCache<String, Schedule>,
}

impl IssuedSchedules {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        IssuedSchedules {
            cache: LruCache::new(capacity),
        }
    }

    pub fn remember(&mut self, schedule: Schedule) {
        let id = schedule.id.clone();
        if let Some((evicted, _)) = self.cache.push(id.clone(), schedule) {
            if evicted != id {
                tracing::debug!(schedule_id = %evicted, "Issued schedule evicted");
            }
        }
    }

    pub fn get(&mut self, schedule_id: &str) -> Option<Schedule> {
        self.cache.get(schedule_id).cloned()
    }

    pub fn contains(&self, schedule_id: &str) -> bool {
        self.cache.contains(schedule_id)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
