use chrono::{DateTime, Utc};
use glean_core::{Priority, Task, TaskId};
use std::cmp::Ordering;

/// A queued reference to a `Pending` task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Task id.
    pub task_id: TaskId,
    /// Base priority.
    pub priority: Priority,
    /// Task intake time. Drives aging and tie-breaking.
    pub created_at: DateTime<Utc>,
    /// Backoff gate; the entry is not eligible before this instant.
    pub not_before: Option<DateTime<Utc>>,
}

impl QueueEntry {
    /// Entry for `task`, eligible immediately.
    pub fn for_task(task: &Task) -> Self {
        Self {
            task_id: task.id,
            priority: task.priority,
            created_at: task.created_at,
            not_before: None,
        }
    }

    /// Sets the backoff gate.
    pub fn not_before(mut self, at: DateTime<Utc>) -> Self {
        self.not_before = Some(at);
        self
    }

    /// Whether the backoff gate has passed at `now`.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.not_before.map_or(true, |nb| nb <= now)
    }
}

/// Priority plus one point per full `aging_interval_secs` waited.
pub fn effective_priority(entry: &QueueEntry, now: DateTime<Utc>, aging_interval_secs: u64) -> i64 {
    let base = i64::from(entry.priority.0);
    // An interval beyond i64 can never elapse.
    let Ok(interval) = i64::try_from(aging_interval_secs) else {
        return base;
    };
    if interval == 0 {
        return base;
    }
    let waited = (now - entry.created_at).num_seconds().max(0);
    base + waited / interval
}

/// Queue of pending tasks for one capability.
///
/// Serves the eligible entry with the highest effective priority, older
/// entries first on ties.
#[derive(Debug)]
pub struct TaskQueue {
    entries: Vec<QueueEntry>,
    aging_interval_secs: u64,
}

impl TaskQueue {
    /// Empty queue. `aging_interval_secs == 0` disables aging.
    pub fn new(aging_interval_secs: u64) -> Self {
        Self {
            entries: Vec::new(),
            aging_interval_secs,
        }
    }

    /// Adds an entry.
    pub fn push(&mut self, entry: QueueEntry) {
        self.entries.push(entry);
    }

    /// Removes the entry for `task_id`. Returns whether it was queued.
    pub fn remove(&mut self, task_id: TaskId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.task_id != task_id);
        self.entries.len() != before
    }

    /// Whether `task_id` is queued.
    pub fn contains(&self, task_id: TaskId) -> bool {
        self.entries.iter().any(|e| e.task_id == task_id)
    }

    /// Removes and returns the best eligible entry.
    pub fn pop_ready(&mut self, now: DateTime<Utc>) -> Option<QueueEntry> {
        self.best_index(now).map(|i| self.entries.swap_remove(i))
    }

    /// Number of queued entries, eligible or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn best_index(&self, now: DateTime<Utc>) -> Option<usize> {
        let aging = self.aging_interval_secs;
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_eligible(now))
            .max_by(|(_, a), (_, b)| {
                effective_priority(a, now, aging)
                    .cmp(&effective_priority(b, now, aging))
                    // max_by: the older entry must compare greater
                    .then_with(|| b.created_at.cmp(&a.created_at))
                    .then_with(|| b.task_id.cmp(&a.task_id))
            })
            .map(|(i, _)| i)
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(30)
    }
}

/// Orders two entries the way the queue serves them; `Less` is served first.
pub fn serve_order(a: &QueueEntry, b: &QueueEntry, now: DateTime<Utc>, aging_interval_secs: u64) -> Ordering {
    effective_priority(b, now, aging_interval_secs)
        .cmp(&effective_priority(a, now, aging_interval_secs))
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.task_id.cmp(&b.task_id))
}
