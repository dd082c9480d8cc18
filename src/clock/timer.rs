//! Scheduled tasks evaluated against the audio clock each tick.
//!
//! Replaces wait-then-act suspension: a metronome, for example, is a
//! repeating task at the beat interval, polled with the clock position.

/// Handle for a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

#[derive(Debug, Clone)]
struct Task {
    id: TaskId,
    at_secs: f64,
    repeat_secs: Option<f64>,
}

/// Holds pending tasks keyed by clock position.
#[derive(Debug, Default)]
pub struct ClockTimer {
    tasks: Vec<Task>,
    next_id: u64,
}

impl ClockTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a one-shot task at the given clock position.
    pub fn schedule_at(&mut self, at_secs: f64) -> TaskId {
        self.insert(at_secs, None)
    }

    /// Schedule a repeating task: first fires at `at_secs`, then every
    /// `interval_secs` after. A non-positive interval degenerates to a
    /// one-shot.
    pub fn schedule_repeating(&mut self, at_secs: f64, interval_secs: f64) -> TaskId {
        let repeat = (interval_secs > 0.0).then_some(interval_secs);
        self.insert(at_secs, repeat)
    }

    /// Cancel a pending task. Returns whether it was still pending.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    /// Fire every task whose time has come at clock position `now_secs`.
    /// One-shot tasks are removed; repeating tasks fire once per elapsed
    /// interval and are rescheduled past `now_secs`.
    pub fn poll(&mut self, now_secs: f64) -> Vec<TaskId> {
        let mut fired = Vec::new();
        self.tasks.retain_mut(|task| {
            if task.at_secs > now_secs {
                return true;
            }
            match task.repeat_secs {
                None => {
                    fired.push(task.id);
                    false
                }
                Some(interval) => {
                    while task.at_secs <= now_secs {
                        fired.push(task.id);
                        task.at_secs += interval;
                    }
                    true
                }
            }
        });
        fired
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    fn insert(&mut self, at_secs: f64, repeat_secs: Option<f64>) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.push(Task {
            id,
            at_secs,
            repeat_secs,
        });
        id
    }
}
