//! crates/eldercare_core/src/registry.rs
//!
//! The ordered, in-memory set of scheduled activities.

use crate::domain::{ActivityTask, ActivityType, NewTask, PhotoEvidence, TaskChanges, TimeOfDay};
use chrono::NaiveDateTime;
use std::sync::Arc;
use uuid::Uuid;

/// Owns every `ActivityTask`. Tasks are stored behind `Arc` and each mutation
/// swaps in a whole new value, so a clone handed out earlier never changes
/// under its holder.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Vec<Arc<ActivityTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default daily plan used on first start.
    pub fn seeded() -> Self {
        let plan = [
            (ActivityType::Pills, "Morning medication", 8, 0),
            (ActivityType::Water, "Drink water", 10, 30),
            (ActivityType::Food, "Healthy lunch", 13, 0),
            (ActivityType::Pills, "Afternoon medication", 16, 0),
            (ActivityType::Water, "Drink water", 19, 0),
        ];
        let mut registry = Self::new();
        for (activity, label, hour, minute) in plan {
            if let Ok(time) = TimeOfDay::new(hour, minute) {
                registry.add(ActivityTask::new(activity, label, time));
            }
        }
        registry
    }

    pub fn list(&self) -> Vec<ActivityTask> {
        self.tasks.iter().map(|t| (**t).clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivityTask> {
        self.tasks.iter().map(|t| &**t)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn find_by_id(&self, id: Uuid) -> Option<&ActivityTask> {
        self.tasks.iter().find(|t| t.id == id).map(|t| &**t)
    }

    pub fn add(&mut self, task: ActivityTask) -> ActivityTask {
        self.tasks.push(Arc::new(task.clone()));
        task
    }

    pub fn create(&mut self, new_task: NewTask) -> ActivityTask {
        self.add(ActivityTask::new(
            new_task.activity,
            new_task.label,
            new_task.scheduled_time,
        ))
    }

    /// Removes a task. Returns `false` if the id was unknown.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    pub fn update(&mut self, id: Uuid, changes: &TaskChanges) -> Option<ActivityTask> {
        self.replace(id, |task| changes.apply_to(task))
    }

    /// Marks a task done with its proof. Unknown ids are ignored.
    pub fn mark_completed(
        &mut self,
        id: Uuid,
        evidence: PhotoEvidence,
        verified_at: NaiveDateTime,
    ) -> Option<ActivityTask> {
        self.replace(id, |task| task.completed_with(evidence, verified_at))
    }

    /// Clears completion on every task. Returns how many were reset.
    pub fn reset_completions(&mut self) -> usize {
        let mut count = 0;
        for slot in self.tasks.iter_mut().filter(|t| t.completed) {
            *slot = Arc::new(slot.reset());
            count += 1;
        }
        count
    }

    /// `(completed, total)`.
    pub fn progress(&self) -> (usize, usize) {
        let done = self.tasks.iter().filter(|t| t.completed).count();
        (done, self.tasks.len())
    }

    /// Completed tasks, most recently verified first.
    pub fn history(&self) -> Vec<ActivityTask> {
        let mut done: Vec<ActivityTask> = self
            .tasks
            .iter()
            .filter(|t| t.completed)
            .map(|t| (**t).clone())
            .collect();
        done.sort_by(|a, b| b.verified_at.cmp(&a.verified_at));
        done
    }

    fn replace<F>(&mut self, id: Uuid, f: F) -> Option<ActivityTask>
    where
        F: FnOnce(&ActivityTask) -> ActivityTask,
    {
        let slot = self.tasks.iter_mut().find(|t| t.id == id)?;
        let updated = f(&**slot);
        *slot = Arc::new(updated.clone());
        Some(updated)
    }
}
