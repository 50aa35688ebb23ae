//! Bottom-up progress aggregation for steps, actions and (opt-in) targets.
//!
//! All values are integer percentages in `[0, 100]`, rounded half-up.

use crate::types::{Action, Obstacle, Step, Target};

/// `round(100 * done / total)` with half-up rounding; `0` when `total` is zero.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = done.min(total);
    // (200d + t) / 2t == floor(100d/t + 1/2)
    ((200 * done + total) / (2 * total)) as u8
}

/// Step progress: task ratio when tasks exist, otherwise the step's own flag.
pub fn step_progress(step: &Step) -> u8 {
    if step.tasks.is_empty() {
        return if step.completed { 100 } else { 0 };
    }
    let done = step.tasks.iter().filter(|t| t.completed).count();
    percent(done, step.tasks.len())
}

/// Whether a step counts as complete towards its action.
///
/// Partial task completion never counts; only every task done, or the explicit flag.
pub fn step_is_complete(step: &Step) -> bool {
    (!step.tasks.is_empty() && step.tasks.iter().all(|t| t.completed)) || step.completed
}

pub fn obstacle_is_resolved(obstacle: &Obstacle) -> bool {
    obstacle.resolved
}

pub fn action_progress(action: &Action) -> u8 {
    let total = action.steps.len() + action.obstacles.len();
    let done = action.steps.iter().filter(|s| step_is_complete(s)).count()
        + action
            .obstacles
            .iter()
            .filter(|o| obstacle_is_resolved(o))
            .count();
    percent(done, total)
}

/// Rounded mean of action progress; `0` for a target with no actions.
pub fn target_rollup(target: &Target) -> u8 {
    if target.actions.is_empty() {
        return 0;
    }
    let sum: usize = target.actions.iter().map(|a| a.progress as usize).sum();
    percent(sum, 100 * target.actions.len())
}

/// Recompute every step in the action, then the action itself.
pub fn refresh_action(action: &mut Action) {
    for step in &mut action.steps {
        step.progress = step_progress(step);
    }
    action.progress = action_progress(action);
}

pub fn refresh_target(target: &mut Target) {
    target.progress = target_rollup(target);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Priority, Task};

    fn task(done: bool) -> Task {
        let mut t = Task::new("t");
        t.completed = done;
        t
    }

    fn step_with(tasks: Vec<bool>) -> Step {
        Step::new("s").with_tasks(tasks.into_iter().map(task).collect())
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 2), 50);
        assert_eq!(percent(1, 8), 13); // 12.5
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(5, 5), 100);
    }

    #[test]
    fn percent_stays_in_bounds() {
        for total in 0..40 {
            for done in 0..=total + 2 {
                assert!(percent(done, total) <= 100);
            }
        }
    }

    #[test]
    fn taskless_step_follows_its_flag() {
        let mut step = Step::new("call the bank");
        assert_eq!(step_progress(&step), 0);
        assert!(!step_is_complete(&step));

        step.completed = true;
        assert_eq!(step_progress(&step), 100);
        assert!(step_is_complete(&step));
    }

    #[test]
    fn step_ratio_ignores_flag_when_tasks_exist() {
        let mut step = step_with(vec![true, false, false]);
        step.completed = true;
        assert_eq!(step_progress(&step), 33);
        assert!(step_is_complete(&step));

        let step = step_with(vec![true, true, false]);
        assert_eq!(step_progress(&step), 67);
        assert!(!step_is_complete(&step));
    }

    #[test]
    fn action_mixes_steps_and_obstacles() {
        let mut action = Action::new("ship", Priority::High, Priority::Medium);
        action.steps.push(step_with(vec![true, true]));
        action.steps.push(step_with(vec![true, false]));
        let mut taskless = Step::new("c");
        taskless.completed = true;
        action.steps.push(taskless);

        let mut resolved = Obstacle::new("budget");
        resolved.resolved = true;
        action.obstacles.push(resolved);
        action.obstacles.push(Obstacle::new("time"));

        refresh_action(&mut action);
        assert_eq!(action.progress, 60);
        assert_eq!(action.steps[0].progress, 100);
        assert_eq!(action.steps[1].progress, 50);
        assert_eq!(action.steps[2].progress, 100);
    }

    #[test]
    fn empty_action_is_zero() {
        let action = Action::new("empty", Priority::Low, Priority::Low);
        assert_eq!(action_progress(&action), 0);
    }

    #[test]
    fn target_rollup_averages_actions() {
        let mut target = Target::new("u", "t", "d", "c", "s");
        assert_eq!(target_rollup(&target), 0);
        for p in [100, 50, 0] {
            let mut action = Action::new("a", Priority::Low, Priority::Low);
            action.progress = p;
            target.actions.push(action);
        }
        assert_eq!(target_rollup(&target), 50);
        target.actions[2].progress = 1;
        // 151 / 3 = 50.33
        assert_eq!(target_rollup(&target), 50);
    }
}
