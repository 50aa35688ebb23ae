use chrono::NaiveDate;

use crate::error::{EntityKind, StoreError, StoreResult};
use crate::progress;
use crate::types::{
    Action, ActionPatch, Obstacle, ObstaclePatch, Step, StepPatch, StoreSnapshot, Target,
    TargetPatch, Task, TaskPatch, User,
};

/// Favorites bucket used when nobody is signed in.
pub const ANONYMOUS_VIEWER: &str = "anonymous";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Report unresolved paths as `StoreError::NotFound` instead of skipping.
    pub strict: bool,
    /// Recompute `Target.progress` as the mean of its actions after every change.
    pub target_rollup: bool,
}

/// Entities addressable by id inside an ordered sequence.
pub(crate) trait Node {
    const KIND: EntityKind;
    fn node_id(&self) -> &str;
}

macro_rules! impl_node {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Node for $ty {
                const KIND: EntityKind = EntityKind::$kind;
                fn node_id(&self) -> &str {
                    &self.id
                }
            }
        )*
    };
}

impl_node!(
    User => User,
    Target => Target,
    Action => Action,
    Step => Step,
    Task => Task,
    Obstacle => Obstacle,
);

pub(crate) fn find<'a, T: Node>(items: &'a [T], id: &str) -> Option<&'a T> {
    items.iter().find(|n| n.node_id() == id)
}

pub(crate) fn find_mut<'a, T: Node>(items: &'a mut [T], id: &str) -> StoreResult<&'a mut T> {
    items
        .iter_mut()
        .find(|n| n.node_id() == id)
        .ok_or_else(|| StoreError::not_found(T::KIND, id))
}

fn remove<T: Node>(items: &mut Vec<T>, id: &str) -> StoreResult<()> {
    let before = items.len();
    items.retain(|n| n.node_id() != id);
    if items.len() == before {
        return Err(StoreError::not_found(T::KIND, id));
    }
    Ok(())
}

fn adopt_step(step: &mut Step, action_id: &str) {
    step.action_id = action_id.to_string();
    for task in &mut step.tasks {
        task.step_id = step.id.clone();
    }
}

fn adopt_action(action: &mut Action, target_id: &str) {
    action.target_id = target_id.to_string();
    for step in &mut action.steps {
        adopt_step(step, &action.id);
    }
    for obstacle in &mut action.obstacles {
        obstacle.action_id = action.id.clone();
    }
}

/// In-memory goal tree with cascading progress recomputation.
///
/// Every mutation resolves its full path before writing, so it either applies
/// completely or leaves the tree untouched. Mutations return `Ok(true)` when
/// applied and `Ok(false)` when the path did not resolve; with
/// [`StoreOptions::strict`] the latter becomes `Err(StoreError::NotFound)`.
#[derive(Clone, Debug, Default)]
pub struct GoalStore {
    pub(crate) state: StoreSnapshot,
    options: StoreOptions,
}

impl GoalStore {
    pub fn new(options: StoreOptions) -> Self {
        Self {
            state: StoreSnapshot::default(),
            options,
        }
    }

    pub fn from_snapshot(state: StoreSnapshot, options: StoreOptions) -> Self {
        Self { state, options }
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    pub fn snapshot(&self) -> &StoreSnapshot {
        &self.state
    }

    pub fn users(&self) -> &[User] {
        &self.state.users
    }

    pub fn targets(&self) -> &[Target] {
        &self.state.targets
    }

    pub fn user(&self, user_id: &str) -> Option<&User> {
        find(&self.state.users, user_id)
    }

    pub fn current_user_id(&self) -> Option<&str> {
        self.state.current_user_id.as_deref()
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user_id().and_then(|id| self.user(id))
    }

    pub fn target(&self, target_id: &str) -> Option<&Target> {
        find(&self.state.targets, target_id)
    }

    pub fn action(&self, target_id: &str, action_id: &str) -> Option<&Action> {
        find(&self.target(target_id)?.actions, action_id)
    }

    pub fn step(&self, target_id: &str, action_id: &str, step_id: &str) -> Option<&Step> {
        find(&self.action(target_id, action_id)?.steps, step_id)
    }

    pub fn task(
        &self,
        target_id: &str,
        action_id: &str,
        step_id: &str,
        task_id: &str,
    ) -> Option<&Task> {
        find(&self.step(target_id, action_id, step_id)?.tasks, task_id)
    }

    pub fn obstacle(&self, target_id: &str, action_id: &str, obstacle_id: &str) -> Option<&Obstacle> {
        find(&self.action(target_id, action_id)?.obstacles, obstacle_id)
    }

    pub fn targets_of<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a Target> + 'a {
        self.state.targets.iter().filter(move |t| t.user_id == user_id)
    }

    // Ownership

    pub fn is_owner(&self, user_id: &str, target_id: &str) -> bool {
        self.target(target_id)
            .is_some_and(|target| target.user_id == user_id)
    }

    /// Gate for service callers mutating a target subtree.
    ///
    /// A missing target passes: the mutation that follows is then a no-op (or a
    /// `NotFound` in strict mode).
    pub fn authorize(&self, actor: Option<&str>, target_id: &str) -> StoreResult<()> {
        let Some(target) = self.target(target_id) else {
            return Ok(());
        };
        match actor {
            Some(user_id) if user_id == target.user_id => Ok(()),
            Some(user_id) => Err(StoreError::Unauthorized(format!(
                "user {user_id} does not own target {target_id}"
            ))),
            None => Err(StoreError::Unauthorized(
                "sign in to modify targets".to_string(),
            )),
        }
    }

    // Favorites

    /// Key of the favorites set currently being read and toggled.
    pub fn viewer(&self) -> &str {
        self.current_user_id().unwrap_or(ANONYMOUS_VIEWER)
    }

    pub fn favorites(&self) -> &[String] {
        self.favorites_of(self.viewer())
    }

    pub fn favorites_of(&self, viewer: &str) -> &[String] {
        self.state
            .favorites
            .get(viewer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_favorite(&self, target_id: &str) -> bool {
        self.favorites().iter().any(|id| id == target_id)
    }

    /// Flip membership of `target_id` in the viewer's favorites; returns the new state.
    pub fn toggle_favorite(&mut self, target_id: &str) -> bool {
        let viewer = self.viewer().to_string();
        self.toggle_favorite_for(&viewer, target_id)
    }

    pub fn toggle_favorite_for(&mut self, viewer: &str, target_id: &str) -> bool {
        let ids = self.state.favorites.entry(viewer.to_string()).or_default();
        let now_favorite = match ids.iter().position(|id| id == target_id) {
            Some(pos) => {
                ids.remove(pos);
                false
            }
            None => {
                ids.push(target_id.to_string());
                true
            }
        };
        if ids.is_empty() {
            self.state.favorites.remove(viewer);
        }
        tracing::debug!(viewer, target_id, now_favorite, "favorite toggled");
        now_favorite
    }

    // Targets

    pub fn add_target(&mut self, mut target: Target) -> StoreResult<bool> {
        for action in &mut target.actions {
            adopt_action(action, &target.id);
            progress::refresh_action(action);
        }
        if self.options.target_rollup {
            progress::refresh_target(&mut target);
        }
        tracing::debug!(target_id = %target.id, "target added");
        self.state.targets.push(target);
        Ok(true)
    }

    pub fn update_target(&mut self, target_id: &str, patch: TargetPatch) -> StoreResult<bool> {
        let outcome = self.edit_target(target_id, |target| {
            if let Some(title) = patch.title {
                target.title = title;
            }
            if let Some(description) = patch.description {
                target.description = description;
            }
            if let Some(category_id) = patch.category_id {
                target.category_id = category_id;
            }
            if let Some(subcategory_id) = patch.subcategory_id {
                target.subcategory_id = subcategory_id;
            }
            if let Some(value) = patch.progress {
                target.progress = value.min(100);
            }
            Ok(())
        });
        self.settle("update_target", outcome)
    }

    /// Removes the target with its whole subtree and drops it from every favorites set.
    pub fn delete_target(&mut self, target_id: &str) -> StoreResult<bool> {
        let outcome = remove(&mut self.state.targets, target_id);
        if outcome.is_ok() {
            for ids in self.state.favorites.values_mut() {
                ids.retain(|id| id != target_id);
            }
            self.state.favorites.retain(|_, ids| !ids.is_empty());
        }
        self.settle("delete_target", outcome)
    }

    // Actions

    pub fn add_action(&mut self, target_id: &str, mut action: Action) -> StoreResult<bool> {
        let outcome = self.edit_target(target_id, |target| {
            adopt_action(&mut action, &target.id);
            progress::refresh_action(&mut action);
            target.actions.push(action);
            Ok(())
        });
        self.settle("add_action", outcome)
    }

    /// Merges the patch and recomputes the action's progress; progress itself is never patched.
    pub fn update_action(
        &mut self,
        target_id: &str,
        action_id: &str,
        patch: ActionPatch,
    ) -> StoreResult<bool> {
        let outcome = self.edit_action(target_id, action_id, |action| {
            if let Some(title) = patch.title {
                action.title = title;
            }
            if let Some(urgency) = patch.urgency {
                action.urgency = urgency;
            }
            if let Some(impact) = patch.impact {
                action.impact = impact;
            }
            Ok(())
        });
        self.settle("update_action", outcome)
    }

    pub fn delete_action(&mut self, target_id: &str, action_id: &str) -> StoreResult<bool> {
        let outcome = self.edit_target(target_id, |target| remove(&mut target.actions, action_id));
        self.settle("delete_action", outcome)
    }

    // Steps

    pub fn add_step(&mut self, target_id: &str, action_id: &str, mut step: Step) -> StoreResult<bool> {
        let outcome = self.edit_action(target_id, action_id, |action| {
            adopt_step(&mut step, &action.id);
            action.steps.push(step);
            Ok(())
        });
        self.settle("add_step", outcome)
    }

    pub fn update_step(
        &mut self,
        target_id: &str,
        action_id: &str,
        step_id: &str,
        patch: StepPatch,
    ) -> StoreResult<bool> {
        let outcome = self.edit_action(target_id, action_id, |action| {
            let step = find_mut(&mut action.steps, step_id)?;
            if let Some(description) = patch.description {
                step.description = description;
            }
            if let Some(completed) = patch.completed {
                step.completed = completed;
            }
            Ok(())
        });
        self.settle("update_step", outcome)
    }

    pub fn delete_step(&mut self, target_id: &str, action_id: &str, step_id: &str) -> StoreResult<bool> {
        let outcome = self.edit_action(target_id, action_id, |action| {
            remove(&mut action.steps, step_id)
        });
        self.settle("delete_step", outcome)
    }

    // Tasks

    pub fn add_task(
        &mut self,
        target_id: &str,
        action_id: &str,
        step_id: &str,
        mut task: Task,
    ) -> StoreResult<bool> {
        let outcome = self.edit_action(target_id, action_id, |action| {
            let step = find_mut(&mut action.steps, step_id)?;
            task.step_id = step.id.clone();
            step.tasks.push(task);
            Ok(())
        });
        self.settle("add_task", outcome)
    }

    pub fn update_task(
        &mut self,
        target_id: &str,
        action_id: &str,
        step_id: &str,
        task_id: &str,
        patch: TaskPatch,
    ) -> StoreResult<bool> {
        let outcome = self.edit_task(target_id, action_id, step_id, task_id, |task| {
            if let Some(description) = patch.description {
                task.description = description;
            }
            if let Some(completed) = patch.completed {
                task.completed = completed;
            }
            if let Some(deadline) = patch.deadline {
                task.deadline = Some(deadline);
            }
        });
        self.settle("update_task", outcome)
    }

    /// Sets or, with `None`, clears the task deadline.
    pub fn update_task_deadline(
        &mut self,
        target_id: &str,
        action_id: &str,
        step_id: &str,
        task_id: &str,
        deadline: Option<NaiveDate>,
    ) -> StoreResult<bool> {
        let outcome = self.edit_task(target_id, action_id, step_id, task_id, |task| {
            task.deadline = deadline;
        });
        self.settle("update_task_deadline", outcome)
    }

    pub fn toggle_task(
        &mut self,
        target_id: &str,
        action_id: &str,
        step_id: &str,
        task_id: &str,
    ) -> StoreResult<bool> {
        let outcome = self.edit_task(target_id, action_id, step_id, task_id, |task| {
            task.completed = !task.completed;
        });
        self.settle("toggle_task", outcome)
    }

    pub fn delete_task(
        &mut self,
        target_id: &str,
        action_id: &str,
        step_id: &str,
        task_id: &str,
    ) -> StoreResult<bool> {
        let outcome = self.edit_action(target_id, action_id, |action| {
            let step = find_mut(&mut action.steps, step_id)?;
            remove(&mut step.tasks, task_id)
        });
        self.settle("delete_task", outcome)
    }

    // Obstacles

    pub fn add_obstacle(
        &mut self,
        target_id: &str,
        action_id: &str,
        mut obstacle: Obstacle,
    ) -> StoreResult<bool> {
        let outcome = self.edit_action(target_id, action_id, |action| {
            obstacle.action_id = action.id.clone();
            action.obstacles.push(obstacle);
            Ok(())
        });
        self.settle("add_obstacle", outcome)
    }

    pub fn update_obstacle(
        &mut self,
        target_id: &str,
        action_id: &str,
        obstacle_id: &str,
        patch: ObstaclePatch,
    ) -> StoreResult<bool> {
        let outcome = self.edit_obstacle(target_id, action_id, obstacle_id, |obstacle| {
            if let Some(description) = patch.description {
                obstacle.description = description;
            }
            if let Some(suggestions) = patch.suggested_resolutions {
                obstacle.suggested_resolutions = Some(suggestions);
            }
        });
        self.settle("update_obstacle", outcome)
    }

    pub fn delete_obstacle(
        &mut self,
        target_id: &str,
        action_id: &str,
        obstacle_id: &str,
    ) -> StoreResult<bool> {
        let outcome = self.edit_action(target_id, action_id, |action| {
            remove(&mut action.obstacles, obstacle_id)
        });
        self.settle("delete_obstacle", outcome)
    }

    pub fn resolve_obstacle(
        &mut self,
        target_id: &str,
        action_id: &str,
        obstacle_id: &str,
        resolution: impl Into<String>,
        resolution_date: NaiveDate,
    ) -> StoreResult<bool> {
        let resolution = resolution.into();
        let outcome = self.edit_obstacle(target_id, action_id, obstacle_id, |obstacle| {
            obstacle.resolved = true;
            obstacle.resolution = Some(resolution);
            obstacle.resolution_date = Some(resolution_date);
        });
        self.settle("resolve_obstacle", outcome)
    }

    pub fn unresolve_obstacle(
        &mut self,
        target_id: &str,
        action_id: &str,
        obstacle_id: &str,
    ) -> StoreResult<bool> {
        let outcome = self.edit_obstacle(target_id, action_id, obstacle_id, |obstacle| {
            obstacle.resolved = false;
            obstacle.resolution = None;
            obstacle.resolution_date = None;
        });
        self.settle("unresolve_obstacle", outcome)
    }

    // Path helpers. Each resolves the whole path before handing out the node,
    // then recomputes progress on the way back up.

    fn edit_target<F>(&mut self, target_id: &str, edit: F) -> StoreResult<()>
    where
        F: FnOnce(&mut Target) -> StoreResult<()>,
    {
        let rollup = self.options.target_rollup;
        let target = find_mut(&mut self.state.targets, target_id)?;
        edit(target)?;
        if rollup {
            progress::refresh_target(target);
        }
        Ok(())
    }

    fn edit_action<F>(&mut self, target_id: &str, action_id: &str, edit: F) -> StoreResult<()>
    where
        F: FnOnce(&mut Action) -> StoreResult<()>,
    {
        self.edit_target(target_id, |target| {
            let action = find_mut(&mut target.actions, action_id)?;
            edit(action)?;
            progress::refresh_action(action);
            Ok(())
        })
    }

    fn edit_task<F>(
        &mut self,
        target_id: &str,
        action_id: &str,
        step_id: &str,
        task_id: &str,
        edit: F,
    ) -> StoreResult<()>
    where
        F: FnOnce(&mut Task),
    {
        self.edit_action(target_id, action_id, |action| {
            let step = find_mut(&mut action.steps, step_id)?;
            let task = find_mut(&mut step.tasks, task_id)?;
            edit(task);
            Ok(())
        })
    }

    fn edit_obstacle<F>(
        &mut self,
        target_id: &str,
        action_id: &str,
        obstacle_id: &str,
        edit: F,
    ) -> StoreResult<()>
    where
        F: FnOnce(&mut Obstacle),
    {
        self.edit_action(target_id, action_id, |action| {
            let obstacle = find_mut(&mut action.obstacles, obstacle_id)?;
            edit(obstacle);
            Ok(())
        })
    }

    pub(crate) fn settle(&self, op: &'static str, outcome: StoreResult<()>) -> StoreResult<bool> {
        match outcome {
            Ok(()) => Ok(true),
            Err(StoreError::NotFound { kind, id }) if !self.options.strict => {
                tracing::debug!(op, %kind, id = %id, "path did not resolve; skipped");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;

    struct Tree {
        store: GoalStore,
        target: String,
        action: String,
        step_a: String,
        step_b: String,
        step_c: String,
        obstacle_open: String,
    }

    fn done_task(description: &str, completed: bool) -> Task {
        let mut task = Task::new(description);
        task.completed = completed;
        task
    }

    /// Action with steps A (2/2), B (1/2), C (task-less, completed) and two
    /// obstacles, one resolved.
    fn tree(options: StoreOptions) -> Tree {
        let mut store = GoalStore::new(options);
        let target = Target::new("user-1", "Run a marathon", "42km", "health", "running");
        let target_id = target.id.clone();
        store.add_target(target).unwrap();

        let action = Action::new("Training plan", Priority::High, Priority::High);
        let action_id = action.id.clone();
        store.add_action(&target_id, action).unwrap();

        let step_a = Step::new("Base miles")
            .with_tasks(vec![done_task("week 1", true), done_task("week 2", true)]);
        let step_b = Step::new("Speed work")
            .with_tasks(vec![done_task("intervals", true), done_task("tempo", false)]);
        let mut step_c = Step::new("Buy shoes");
        step_c.completed = true;
        let (a, b, c) = (step_a.id.clone(), step_b.id.clone(), step_c.id.clone());
        for step in [step_a, step_b, step_c] {
            store.add_step(&target_id, &action_id, step).unwrap();
        }

        let open = Obstacle::new("Knee pain");
        let fixed = Obstacle::new("No time in the morning");
        let (open_id, fixed_id) = (open.id.clone(), fixed.id.clone());
        store.add_obstacle(&target_id, &action_id, open).unwrap();
        store.add_obstacle(&target_id, &action_id, fixed).unwrap();
        store
            .resolve_obstacle(
                &target_id,
                &action_id,
                &fixed_id,
                "Run at lunch",
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            )
            .unwrap();

        Tree {
            store,
            target: target_id,
            action: action_id,
            step_a: a,
            step_b: b,
            step_c: c,
            obstacle_open: open_id,
        }
    }

    #[test]
    fn action_progress_matches_worked_example() {
        let t = tree(StoreOptions::default());
        let action = t.store.action(&t.target, &t.action).unwrap();
        assert_eq!(action.progress, 60);
        assert_eq!(t.store.step(&t.target, &t.action, &t.step_b).unwrap().progress, 50);
        assert_eq!(t.store.step(&t.target, &t.action, &t.step_c).unwrap().progress, 100);
    }

    #[test]
    fn back_references_are_rewritten_on_insert() {
        let t = tree(StoreOptions::default());
        let action = t.store.action(&t.target, &t.action).unwrap();
        assert_eq!(action.target_id, t.target);
        for step in &action.steps {
            assert_eq!(step.action_id, t.action);
            for task in &step.tasks {
                assert_eq!(task.step_id, step.id);
            }
        }
        for obstacle in &action.obstacles {
            assert_eq!(obstacle.action_id, t.action);
        }
    }

    #[test]
    fn toggle_task_twice_restores_state() {
        let mut t = tree(StoreOptions::default());
        let before = t.store.snapshot().clone();
        let task_id = t.store.step(&t.target, &t.action, &t.step_b).unwrap().tasks[1]
            .id
            .clone();

        assert!(t
            .store
            .toggle_task(&t.target, &t.action, &t.step_b, &task_id)
            .unwrap());
        let step = t.store.step(&t.target, &t.action, &t.step_b).unwrap();
        assert_eq!(step.progress, 100);
        // B now complete: (3 + 1) / 5
        assert_eq!(t.store.action(&t.target, &t.action).unwrap().progress, 80);

        t.store
            .toggle_task(&t.target, &t.action, &t.step_b, &task_id)
            .unwrap();
        assert_eq!(t.store.snapshot(), &before);
    }

    #[test]
    fn taskless_step_flag_drives_action_rollup() {
        let mut t = tree(StoreOptions::default());
        t.store
            .update_step(
                &t.target,
                &t.action,
                &t.step_c,
                StepPatch {
                    completed: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        let step = t.store.step(&t.target, &t.action, &t.step_c).unwrap();
        assert_eq!(step.progress, 0);
        assert!(step.tasks.is_empty());
        // A + resolved obstacle: 2 / 5
        assert_eq!(t.store.action(&t.target, &t.action).unwrap().progress, 40);
    }

    #[test]
    fn obstacle_resolution_cycle_updates_action() {
        let mut t = tree(StoreOptions::default());
        let date = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
        t.store
            .resolve_obstacle(&t.target, &t.action, &t.obstacle_open, "Physio", date)
            .unwrap();
        let obstacle = t.store.obstacle(&t.target, &t.action, &t.obstacle_open).unwrap();
        assert!(obstacle.resolved);
        assert_eq!(obstacle.resolution.as_deref(), Some("Physio"));
        assert_eq!(obstacle.resolution_date, Some(date));
        assert_eq!(t.store.action(&t.target, &t.action).unwrap().progress, 80);

        t.store
            .unresolve_obstacle(&t.target, &t.action, &t.obstacle_open)
            .unwrap();
        let obstacle = t.store.obstacle(&t.target, &t.action, &t.obstacle_open).unwrap();
        assert!(!obstacle.resolved);
        assert_eq!(obstacle.resolution, None);
        assert_eq!(obstacle.resolution_date, None);
        assert_eq!(t.store.action(&t.target, &t.action).unwrap().progress, 60);
    }

    #[test]
    fn missing_step_update_is_a_noop() {
        let mut t = tree(StoreOptions::default());
        let before = t.store.snapshot().clone();
        let applied = t
            .store
            .update_step(
                &t.target,
                &t.action,
                "no-such-step",
                StepPatch {
                    description: Some("changed".into()),
                    completed: Some(true),
                },
            )
            .unwrap();
        assert!(!applied);
        assert_eq!(t.store.snapshot(), &before);
    }

    #[test]
    fn missing_deletes_are_silent() {
        let mut t = tree(StoreOptions::default());
        let before = t.store.snapshot().clone();
        assert!(!t.store.delete_target("nope").unwrap());
        assert!(!t.store.delete_action(&t.target, "nope").unwrap());
        assert!(!t.store.delete_step(&t.target, &t.action, "nope").unwrap());
        assert!(!t
            .store
            .delete_task(&t.target, &t.action, &t.step_a, "nope")
            .unwrap());
        assert!(!t.store.delete_obstacle("nope", &t.action, &t.obstacle_open).unwrap());
        assert_eq!(t.store.snapshot(), &before);
    }

    #[test]
    fn strict_mode_reports_not_found() {
        let mut t = tree(StoreOptions {
            strict: true,
            ..Default::default()
        });
        let err = t
            .store
            .toggle_task(&t.target, &t.action, &t.step_a, "ghost")
            .unwrap_err();
        assert_eq!(err, StoreError::not_found(EntityKind::Task, "ghost"));

        let err = t.store.add_step("ghost-target", &t.action, Step::new("x")).unwrap_err();
        assert_eq!(err, StoreError::not_found(EntityKind::Target, "ghost-target"));
    }

    #[test]
    fn delete_step_cascades_and_recomputes() {
        let mut t = tree(StoreOptions::default());
        assert!(t.store.delete_step(&t.target, &t.action, &t.step_b).unwrap());
        let action = t.store.action(&t.target, &t.action).unwrap();
        assert_eq!(action.steps.len(), 2);
        // A, C and one resolved obstacle out of 4
        assert_eq!(action.progress, 75);
    }

    #[test]
    fn delete_target_cascades_to_favorites() {
        let mut t = tree(StoreOptions::default());
        let other = Target::new("user-2", "Learn piano", "", "music", "keys");
        let other_id = other.id.clone();
        t.store.add_target(other).unwrap();

        t.store.toggle_favorite(&t.target);
        t.store.toggle_favorite(&other_id);
        t.store.state.current_user_id = Some("user-2".into());
        t.store.toggle_favorite(&t.target);
        assert!(t.store.is_favorite(&t.target));

        assert!(t.store.delete_target(&t.target).unwrap());
        assert!(t.store.target(&t.target).is_none());
        assert!(t.store.action(&t.target, &t.action).is_none());
        for ids in t.store.snapshot().favorites.values() {
            assert!(!ids.contains(&t.target));
        }
        assert!(!t.store.snapshot().favorites.contains_key("user-2"));
        t.store.state.current_user_id = None;
        assert_eq!(t.store.favorites(), &[other_id]);
    }

    #[test]
    fn favorite_toggle_round_trip() {
        let mut store = GoalStore::default();
        let before = store.snapshot().clone();
        assert!(!store.is_favorite("t-1"));
        assert!(store.toggle_favorite("t-1"));
        assert!(store.is_favorite("t-1"));
        assert!(!store.toggle_favorite("t-1"));
        assert!(!store.is_favorite("t-1"));
        assert_eq!(store.snapshot(), &before);
    }

    #[test]
    fn favorites_are_kept_per_viewer() {
        let mut store = GoalStore::default();
        assert!(store.toggle_favorite_for("ada", "t-1"));
        assert!(store.toggle_favorite_for("bob", "t-2"));
        assert_eq!(store.favorites_of("ada"), &["t-1".to_string()]);
        assert_eq!(store.favorites_of("bob"), &["t-2".to_string()]);
        assert!(store.favorites().is_empty());
        assert!(store.snapshot().current_user_id.is_none());
    }

    #[test]
    fn target_progress_is_not_rolled_up_by_default() {
        let mut t = tree(StoreOptions::default());
        assert_eq!(t.store.target(&t.target).unwrap().progress, 0);
        let task_id = t.store.step(&t.target, &t.action, &t.step_b).unwrap().tasks[1]
            .id
            .clone();
        t.store
            .toggle_task(&t.target, &t.action, &t.step_b, &task_id)
            .unwrap();
        assert_eq!(t.store.target(&t.target).unwrap().progress, 0);

        t.store
            .update_target(
                &t.target,
                TargetPatch {
                    progress: Some(250),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(t.store.target(&t.target).unwrap().progress, 100);
    }

    #[test]
    fn target_rollup_follows_actions_when_enabled() {
        let mut t = tree(StoreOptions {
            target_rollup: true,
            ..Default::default()
        });
        assert_eq!(t.store.target(&t.target).unwrap().progress, 60);
        t.store
            .add_action(&t.target, Action::new("Race day kit", Priority::Low, Priority::Low))
            .unwrap();
        assert_eq!(t.store.target(&t.target).unwrap().progress, 30);
    }

    #[test]
    fn update_never_touches_ids() {
        let mut t = tree(StoreOptions::default());
        t.store
            .update_action(
                &t.target,
                &t.action,
                ActionPatch {
                    title: Some("Renamed".into()),
                    urgency: Some(Priority::Low),
                    impact: None,
                },
            )
            .unwrap();
        let action = t.store.action(&t.target, &t.action).unwrap();
        assert_eq!(action.title, "Renamed");
        assert_eq!(action.urgency, Priority::Low);
        assert_eq!(action.impact, Priority::High);
        assert_eq!(action.id, t.action);
        assert_eq!(action.target_id, t.target);
        assert_eq!(action.progress, 60);
    }

    #[test]
    fn task_deadline_set_and_clear() {
        let mut t = tree(StoreOptions::default());
        let task_id = t.store.step(&t.target, &t.action, &t.step_a).unwrap().tasks[0]
            .id
            .clone();
        let due = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        t.store
            .update_task_deadline(&t.target, &t.action, &t.step_a, &task_id, Some(due))
            .unwrap();
        let task = t.store.task(&t.target, &t.action, &t.step_a, &task_id).unwrap();
        assert_eq!(task.deadline, Some(due));

        t.store
            .update_task_deadline(&t.target, &t.action, &t.step_a, &task_id, None)
            .unwrap();
        let task = t.store.task(&t.target, &t.action, &t.step_a, &task_id).unwrap();
        assert_eq!(task.deadline, None);
    }

    #[test]
    fn authorize_checks_owner() {
        let t = tree(StoreOptions::default());
        assert!(t.store.authorize(Some("user-1"), &t.target).is_ok());
        assert!(matches!(
            t.store.authorize(Some("user-2"), &t.target),
            Err(StoreError::Unauthorized(_))
        ));
        assert!(matches!(
            t.store.authorize(None, &t.target),
            Err(StoreError::Unauthorized(_))
        ));
        assert!(t.store.authorize(None, "missing").is_ok());
        assert!(t.store.is_owner("user-1", &t.target));
    }
}
