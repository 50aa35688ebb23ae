use serde::Serialize;

use crate::matrix::tier;
use crate::progress::{percent, step_is_complete};
use crate::store::GoalStore;
use crate::types::{Action, Priority, Target, Task};

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub total: usize,
    pub completed: usize,
}

impl Tally {
    fn add(&mut self, completed: bool) {
        self.total += 1;
        if completed {
            self.completed += 1;
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityBuckets {
    pub high: Vec<String>,
    pub medium: Vec<String>,
    pub low: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTask {
    pub target_id: String,
    pub action_id: String,
    pub step_id: String,
    pub task: Task,
    pub priority: Priority,
}

/// Dashboard figures over every target a user owns.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatistics {
    pub targets: Tally,
    pub average_progress: u8,
    pub actions: Tally,
    pub steps: Tally,
    pub tasks: Tally,
    pub obstacles: Tally,
    pub actions_by_priority: PriorityBuckets,
    /// Incomplete tasks, highest action tier first; ties keep tree order.
    pub pending_tasks: Vec<PendingTask>,
}

impl UserStatistics {
    pub fn for_user(store: &GoalStore, user_id: &str) -> Self {
        let targets: Vec<&Target> = store.targets_of(user_id).collect();
        let mut stats = UserStatistics::default();

        let progress_sum: usize = targets.iter().map(|t| t.progress as usize).sum();
        stats.average_progress = percent(progress_sum, 100 * targets.len());

        for target in &targets {
            stats.targets.add(target.progress == 100);
            for action in &target.actions {
                stats.record_action(target, action);
            }
        }

        stats
            .pending_tasks
            .sort_by(|a, b| b.priority.cmp(&a.priority));
        stats
    }

    fn record_action(&mut self, target: &Target, action: &Action) {
        self.actions.add(action.progress == 100);
        let priority = tier(action);
        let bucket = match priority {
            Priority::High => &mut self.actions_by_priority.high,
            Priority::Medium => &mut self.actions_by_priority.medium,
            Priority::Low => &mut self.actions_by_priority.low,
        };
        bucket.push(action.id.clone());

        for step in &action.steps {
            self.steps.add(step_is_complete(step));
            for task in &step.tasks {
                self.tasks.add(task.completed);
                if !task.completed {
                    self.pending_tasks.push(PendingTask {
                        target_id: target.id.clone(),
                        action_id: action.id.clone(),
                        step_id: step.id.clone(),
                        task: task.clone(),
                        priority,
                    });
                }
            }
        }
        for obstacle in &action.obstacles {
            self.obstacles.add(obstacle.resolved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreOptions;
    use crate::types::{Obstacle, Step, TargetPatch};

    fn seeded() -> (GoalStore, String) {
        let mut store = GoalStore::new(StoreOptions::default());
        let user = "user-1".to_string();

        let first = Target::new(&user, "Get fit", "", "health", "fitness");
        let first_id = first.id.clone();
        store.add_target(first).unwrap();
        let second = Target::new(&user, "Learn Rust", "", "education", "programming");
        let second_id = second.id.clone();
        store.add_target(second).unwrap();
        store
            .add_target(Target::new("someone-else", "Not mine", "", "x", "y"))
            .unwrap();
        store
            .update_target(
                &second_id,
                TargetPatch {
                    progress: Some(100),
                    ..Default::default()
                },
            )
            .unwrap();

        let low = Action::new("Stretch", Priority::Low, Priority::Low);
        let low_id = low.id.clone();
        store.add_action(&first_id, low).unwrap();
        store
            .add_step(
                &first_id,
                &low_id,
                Step::new("Morning routine").with_tasks(vec![Task::new("neck"), Task::new("back")]),
            )
            .unwrap();

        let high = Action::new("Run", Priority::Medium, Priority::High);
        let high_id = high.id.clone();
        store.add_action(&second_id, high).unwrap();
        let mut done = Task::new("5k");
        done.completed = true;
        store
            .add_step(
                &second_id,
                &high_id,
                Step::new("Couch to 5k").with_tasks(vec![done, Task::new("10k")]),
            )
            .unwrap();
        store
            .add_obstacle(&second_id, &high_id, Obstacle::new("Rain"))
            .unwrap();

        (store, user)
    }

    #[test]
    fn counts_only_the_users_targets() {
        let (store, user) = seeded();
        let stats = UserStatistics::for_user(&store, &user);
        assert_eq!(stats.targets, Tally { total: 2, completed: 1 });
        assert_eq!(stats.average_progress, 50);
        assert_eq!(stats.actions.total, 2);
        assert_eq!(stats.actions.completed, 0);
        assert_eq!(stats.steps, Tally { total: 2, completed: 0 });
        assert_eq!(stats.tasks, Tally { total: 4, completed: 1 });
        assert_eq!(stats.obstacles, Tally { total: 1, completed: 0 });
        assert_eq!(stats.actions_by_priority.high.len(), 1);
        assert_eq!(stats.actions_by_priority.low.len(), 1);
        assert!(stats.actions_by_priority.medium.is_empty());
    }

    #[test]
    fn pending_tasks_sorted_by_tier() {
        let (store, user) = seeded();
        let stats = UserStatistics::for_user(&store, &user);
        let order: Vec<&str> = stats
            .pending_tasks
            .iter()
            .map(|p| p.task.description.as_str())
            .collect();
        assert_eq!(order, vec!["10k", "neck", "back"]);
        assert_eq!(stats.pending_tasks[0].priority, Priority::High);
    }

    #[test]
    fn empty_user_has_zero_figures() {
        let (store, _) = seeded();
        let stats = UserStatistics::for_user(&store, "nobody");
        assert_eq!(stats, UserStatistics::default());
    }
}
