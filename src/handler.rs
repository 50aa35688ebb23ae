use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rmcp::RoleServer;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;

use crate::auth::Registration;
use crate::error::{EntityKind, StoreError, StoreResult};
use crate::matrix::PriorityMatrix;
use crate::stats::UserStatistics;
use crate::storage::{Storage, StorageError};
use crate::store::{ANONYMOUS_VIEWER, GoalStore};
use crate::suggestions::Suggestions;
use crate::types::{
    Action, ActionPatch, Obstacle, ObstaclePatch, Priority, Profile, PublicUser, Step, StepPatch,
    Target, TargetPatch, Task, TaskPatch,
};

const TARGETS_URI: &str = "target-achiever://targets";
const SESSION_URI: &str = "target-achiever://session";

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignInArgs {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListTargetsArgs {
    /// Only targets owned by this user; all targets when omitted.
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetPath {
    pub target_id: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetArgs {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category_id: String,
    #[serde(default)]
    pub subcategory_id: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTargetArgs {
    pub target_id: String,
    #[serde(flatten)]
    pub patch: TargetPatch,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionPath {
    pub target_id: String,
    pub action_id: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddActionArgs {
    pub target_id: String,
    pub title: String,
    #[serde(default)]
    pub urgency: Priority,
    #[serde(default)]
    pub impact: Priority,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActionArgs {
    pub target_id: String,
    pub action_id: String,
    #[serde(flatten)]
    pub patch: ActionPatch,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepPath {
    pub target_id: String,
    pub action_id: String,
    pub step_id: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddStepArgs {
    pub target_id: String,
    pub action_id: String,
    pub description: String,
    /// Task descriptions created together with the step.
    #[serde(default)]
    pub tasks: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStepArgs {
    pub target_id: String,
    pub action_id: String,
    pub step_id: String,
    #[serde(flatten)]
    pub patch: StepPatch,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskPath {
    pub target_id: String,
    pub action_id: String,
    pub step_id: String,
    pub task_id: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddTaskArgs {
    pub target_id: String,
    pub action_id: String,
    pub step_id: String,
    pub description: String,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskArgs {
    pub target_id: String,
    pub action_id: String,
    pub step_id: String,
    pub task_id: String,
    #[serde(flatten)]
    pub patch: TaskPatch,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskDeadlineArgs {
    pub target_id: String,
    pub action_id: String,
    pub step_id: String,
    pub task_id: String,
    /// `YYYY-MM-DD`; omit to clear the deadline.
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObstaclePath {
    pub target_id: String,
    pub action_id: String,
    pub obstacle_id: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddObstacleArgs {
    pub target_id: String,
    pub action_id: String,
    pub description: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateObstacleArgs {
    pub target_id: String,
    pub action_id: String,
    pub obstacle_id: String,
    #[serde(flatten)]
    pub patch: ObstaclePatch,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveObstacleArgs {
    pub target_id: String,
    pub action_id: String,
    pub obstacle_id: String,
    pub resolution: String,
    /// Defaults to today (UTC).
    #[serde(default)]
    pub resolution_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuggestResolutionsArgs {
    pub target_id: String,
    pub action_id: String,
    pub obstacle_id: String,
    /// Also store the list on the obstacle.
    #[serde(default)]
    pub save: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsArgs {
    /// Defaults to the signed-in user.
    #[serde(default)]
    pub user_id: Option<String>,
}

fn store_error(err: StoreError) -> ErrorData {
    let message = err.to_string();
    match err {
        StoreError::NotFound { .. } => ErrorData::resource_not_found(message, None),
        StoreError::Validation(_) | StoreError::AuthConflict(_) => {
            ErrorData::invalid_params(message, None)
        }
        StoreError::Unauthorized(_) => ErrorData::invalid_request(message, None),
        StoreError::Credentials(_) => ErrorData::internal_error(message, None),
    }
}

fn storage_error(err: StorageError) -> ErrorData {
    tracing::warn!("failed to persist goal store: {err}");
    ErrorData::internal_error(format!("failed to persist goal store: {err}"), None)
}

fn require(field: &str, value: &str) -> Result<(), ErrorData> {
    if value.trim().is_empty() {
        return Err(store_error(StoreError::Validation(format!(
            "{field} must not be empty"
        ))));
    }
    Ok(())
}

fn json_result<T: Serialize>(value: T) -> Result<CallToolResult, ErrorData> {
    Ok(CallToolResult::success(vec![Content::json(value)?]))
}

fn applied(applied: bool) -> Result<CallToolResult, ErrorData> {
    json_result(json!({ "applied": applied }))
}

fn created(applied: bool, id: &str) -> Result<CallToolResult, ErrorData> {
    json_result(json!({ "applied": applied, "id": id }))
}

/// MCP tool surface over the shared goal store.
///
/// Every handler instance (one per stdio client or HTTP session) shares the
/// same store but keeps its own signed-in user; the store's persisted
/// `currentUserId` is never consulted here. Mutations serialize on the store
/// mutex, which stays held until the snapshot is on disk.
#[derive(Clone)]
pub struct GoalHandler {
    storage: Arc<Mutex<Storage>>,
    suggestions: Arc<Suggestions>,
    session: Arc<Mutex<Option<String>>>,
    tool_router: ToolRouter<GoalHandler>,
}

impl GoalHandler {
    /// A handler with a fresh, signed-out session.
    pub fn new(storage: Arc<Mutex<Storage>>, suggestions: Arc<Suggestions>) -> Self {
        Self {
            storage,
            suggestions,
            session: Arc::new(Mutex::new(None)),
            tool_router: Self::tool_router(),
        }
    }

    pub fn instructions() -> String {
        format!(
            "{} - track targets, prioritized actions, steps, tasks and obstacles. \
             Register or sign in first; only a target's owner may change it.",
            crate::metadata::PKG_DESCRIPTION
        )
    }

    async fn actor(&self) -> Option<String> {
        self.session.lock().await.clone()
    }

    async fn set_actor(&self, user_id: Option<String>) {
        *self.session.lock().await = user_id;
    }

    async fn require_actor(&self, action: &str) -> Result<String, ErrorData> {
        self.actor()
            .await
            .ok_or_else(|| store_error(StoreError::Unauthorized(format!("sign in to {action}"))))
    }

    /// Favorites bucket of this session.
    async fn viewer(&self) -> String {
        self.actor()
            .await
            .unwrap_or_else(|| ANONYMOUS_VIEWER.to_string())
    }

    /// Run `op` and persist the result, all under the store lock.
    ///
    /// With `guard` set, this session's user must own that target.
    async fn mutate<T, F>(&self, guard: Option<&str>, op: F) -> Result<T, ErrorData>
    where
        F: FnOnce(&mut GoalStore) -> StoreResult<T>,
    {
        let actor = self.actor().await;
        let mut storage = self.storage.lock().await;
        let store = storage.store_mut();
        if let Some(target_id) = guard {
            store
                .authorize(actor.as_deref(), target_id)
                .map_err(store_error)?;
        }
        let value = op(store).map_err(store_error)?;
        storage.save_async().await.map_err(storage_error)?;
        Ok(value)
    }

    async fn read<T, F>(&self, op: F) -> T
    where
        F: FnOnce(&GoalStore) -> T,
    {
        let storage = self.storage.lock().await;
        op(storage.store())
    }
}

#[tool_router]
impl GoalHandler {
    // Users

    #[tool(description = "Register a new user and sign them in")]
    async fn register_user(
        &self,
        Parameters(args): Parameters<Registration>,
    ) -> Result<CallToolResult, ErrorData> {
        require("name", &args.name)?;
        require("email", &args.email)?;
        require("password", &args.password)?;
        let user = self
            .mutate(None, |store| {
                store.ensure_email_available(&args.email)?;
                store.create_user(args)
            })
            .await?;
        self.set_actor(Some(user.id.clone())).await;
        json_result(PublicUser::from(&user))
    }

    #[tool(description = "Sign in with email and password")]
    async fn sign_in(
        &self,
        Parameters(args): Parameters<SignInArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let user = self
            .read(|store| store.authenticate(&args.email, &args.password))
            .await
            .map_err(store_error)?;
        self.set_actor(user.as_ref().map(|u| u.id.clone())).await;
        match user {
            Some(user) => json_result(PublicUser::from(&user)),
            None => Err(ErrorData::invalid_params(
                "invalid email or password",
                None,
            )),
        }
    }

    #[tool(description = "Sign the current user out")]
    async fn sign_out(&self) -> Result<CallToolResult, ErrorData> {
        self.set_actor(None).await;
        applied(true)
    }

    #[tool(description = "Show the signed-in user")]
    async fn whoami(&self) -> Result<CallToolResult, ErrorData> {
        let actor = self.actor().await;
        let user = self
            .read(|store| actor.and_then(|id| store.user(&id).map(PublicUser::from)))
            .await;
        json_result(json!({ "user": user }))
    }

    #[tool(description = "Merge profile fields into the signed-in user's profile")]
    async fn update_profile(
        &self,
        Parameters(profile): Parameters<Profile>,
    ) -> Result<CallToolResult, ErrorData> {
        let user_id = self.require_actor("edit a profile").await?;
        let done = self
            .mutate(None, |store| store.update_profile(&user_id, profile))
            .await?;
        applied(done)
    }

    // Targets

    #[tool(description = "List targets, optionally only those owned by one user")]
    async fn list_targets(
        &self,
        Parameters(args): Parameters<ListTargetsArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let targets: Vec<Target> = self
            .read(|store| match &args.user_id {
                Some(user_id) => store.targets_of(user_id).cloned().collect(),
                None => store.targets().to_vec(),
            })
            .await;
        json_result(targets)
    }

    #[tool(description = "Get one target with its full action tree")]
    async fn get_target(
        &self,
        Parameters(args): Parameters<TargetPath>,
    ) -> Result<CallToolResult, ErrorData> {
        let target = self.read(|store| store.target(&args.target_id).cloned()).await;
        match target {
            Some(target) => json_result(target),
            None => Err(ErrorData::resource_not_found(
                format!("target not found: {}", args.target_id),
                None,
            )),
        }
    }

    #[tool(description = "Create a target owned by the signed-in user")]
    async fn create_target(
        &self,
        Parameters(args): Parameters<CreateTargetArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        require("title", &args.title)?;
        require("categoryId", &args.category_id)?;
        let owner = self.require_actor("create targets").await?;
        let target_id = self
            .mutate(None, |store| {
                let target = Target::new(
                    owner,
                    args.title,
                    args.description,
                    args.category_id,
                    args.subcategory_id,
                );
                let target_id = target.id.clone();
                store.add_target(target)?;
                Ok(target_id)
            })
            .await?;
        created(true, &target_id)
    }

    #[tool(description = "Patch a target's title, description, category or progress")]
    async fn update_target(
        &self,
        Parameters(args): Parameters<UpdateTargetArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        if let Some(title) = &args.patch.title {
            require("title", title)?;
        }
        let done = self
            .mutate(Some(&args.target_id), |store| {
                store.update_target(&args.target_id, args.patch)
            })
            .await?;
        applied(done)
    }

    #[tool(description = "Delete a target and everything under it")]
    async fn delete_target(
        &self,
        Parameters(args): Parameters<TargetPath>,
    ) -> Result<CallToolResult, ErrorData> {
        let done = self
            .mutate(Some(&args.target_id), |store| {
                store.delete_target(&args.target_id)
            })
            .await?;
        applied(done)
    }

    // Actions

    #[tool(description = "Add a prioritized action to a target")]
    async fn add_action(
        &self,
        Parameters(args): Parameters<AddActionArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        require("title", &args.title)?;
        let action = Action::new(args.title, args.urgency, args.impact);
        let action_id = action.id.clone();
        let done = self
            .mutate(Some(&args.target_id), |store| {
                store.add_action(&args.target_id, action)
            })
            .await?;
        created(done, &action_id)
    }

    #[tool(description = "Patch an action's title, urgency or impact")]
    async fn update_action(
        &self,
        Parameters(args): Parameters<UpdateActionArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        if let Some(title) = &args.patch.title {
            require("title", title)?;
        }
        let done = self
            .mutate(Some(&args.target_id), |store| {
                store.update_action(&args.target_id, &args.action_id, args.patch)
            })
            .await?;
        applied(done)
    }

    #[tool(description = "Delete an action with its steps and obstacles")]
    async fn delete_action(
        &self,
        Parameters(args): Parameters<ActionPath>,
    ) -> Result<CallToolResult, ErrorData> {
        let done = self
            .mutate(Some(&args.target_id), |store| {
                store.delete_action(&args.target_id, &args.action_id)
            })
            .await?;
        applied(done)
    }

    // Steps

    #[tool(description = "Add a step, optionally with initial tasks, to an action")]
    async fn add_step(
        &self,
        Parameters(args): Parameters<AddStepArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        require("description", &args.description)?;
        for task in &args.tasks {
            require("task description", task)?;
        }
        let step = Step::new(args.description)
            .with_tasks(args.tasks.into_iter().map(Task::new).collect());
        let step_id = step.id.clone();
        let done = self
            .mutate(Some(&args.target_id), |store| {
                store.add_step(&args.target_id, &args.action_id, step)
            })
            .await?;
        created(done, &step_id)
    }

    #[tool(description = "Patch a step's description or completion flag")]
    async fn update_step(
        &self,
        Parameters(args): Parameters<UpdateStepArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        if let Some(description) = &args.patch.description {
            require("description", description)?;
        }
        let done = self
            .mutate(Some(&args.target_id), |store| {
                store.update_step(&args.target_id, &args.action_id, &args.step_id, args.patch)
            })
            .await?;
        applied(done)
    }

    #[tool(description = "Delete a step and its tasks")]
    async fn delete_step(
        &self,
        Parameters(args): Parameters<StepPath>,
    ) -> Result<CallToolResult, ErrorData> {
        let done = self
            .mutate(Some(&args.target_id), |store| {
                store.delete_step(&args.target_id, &args.action_id, &args.step_id)
            })
            .await?;
        applied(done)
    }

    // Tasks

    #[tool(description = "Add a task to a step")]
    async fn add_task(
        &self,
        Parameters(args): Parameters<AddTaskArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        require("description", &args.description)?;
        let mut task = Task::new(args.description);
        task.deadline = args.deadline;
        let task_id = task.id.clone();
        let done = self
            .mutate(Some(&args.target_id), |store| {
                store.add_task(&args.target_id, &args.action_id, &args.step_id, task)
            })
            .await?;
        created(done, &task_id)
    }

    #[tool(description = "Patch a task's description, completion or deadline")]
    async fn update_task(
        &self,
        Parameters(args): Parameters<UpdateTaskArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        if let Some(description) = &args.patch.description {
            require("description", description)?;
        }
        let done = self
            .mutate(Some(&args.target_id), |store| {
                store.update_task(
                    &args.target_id,
                    &args.action_id,
                    &args.step_id,
                    &args.task_id,
                    args.patch,
                )
            })
            .await?;
        applied(done)
    }

    #[tool(description = "Set or clear a task deadline")]
    async fn update_task_deadline(
        &self,
        Parameters(args): Parameters<TaskDeadlineArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let done = self
            .mutate(Some(&args.target_id), |store| {
                store.update_task_deadline(
                    &args.target_id,
                    &args.action_id,
                    &args.step_id,
                    &args.task_id,
                    args.deadline,
                )
            })
            .await?;
        applied(done)
    }

    #[tool(description = "Flip a task between done and not done")]
    async fn toggle_task(
        &self,
        Parameters(args): Parameters<TaskPath>,
    ) -> Result<CallToolResult, ErrorData> {
        let done = self
            .mutate(Some(&args.target_id), |store| {
                store.toggle_task(&args.target_id, &args.action_id, &args.step_id, &args.task_id)
            })
            .await?;
        applied(done)
    }

    #[tool(description = "Delete a task")]
    async fn delete_task(
        &self,
        Parameters(args): Parameters<TaskPath>,
    ) -> Result<CallToolResult, ErrorData> {
        let done = self
            .mutate(Some(&args.target_id), |store| {
                store.delete_task(&args.target_id, &args.action_id, &args.step_id, &args.task_id)
            })
            .await?;
        applied(done)
    }

    // Obstacles

    #[tool(description = "Record an obstacle on an action")]
    async fn add_obstacle(
        &self,
        Parameters(args): Parameters<AddObstacleArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        require("description", &args.description)?;
        let obstacle = Obstacle::new(args.description);
        let obstacle_id = obstacle.id.clone();
        let done = self
            .mutate(Some(&args.target_id), |store| {
                store.add_obstacle(&args.target_id, &args.action_id, obstacle)
            })
            .await?;
        created(done, &obstacle_id)
    }

    #[tool(description = "Patch an obstacle's description or suggested resolutions")]
    async fn update_obstacle(
        &self,
        Parameters(args): Parameters<UpdateObstacleArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        if let Some(description) = &args.patch.description {
            require("description", description)?;
        }
        let done = self
            .mutate(Some(&args.target_id), |store| {
                store.update_obstacle(
                    &args.target_id,
                    &args.action_id,
                    &args.obstacle_id,
                    args.patch,
                )
            })
            .await?;
        applied(done)
    }

    #[tool(description = "Delete an obstacle")]
    async fn delete_obstacle(
        &self,
        Parameters(args): Parameters<ObstaclePath>,
    ) -> Result<CallToolResult, ErrorData> {
        let done = self
            .mutate(Some(&args.target_id), |store| {
                store.delete_obstacle(&args.target_id, &args.action_id, &args.obstacle_id)
            })
            .await?;
        applied(done)
    }

    #[tool(description = "Mark an obstacle resolved with a resolution note")]
    async fn resolve_obstacle(
        &self,
        Parameters(args): Parameters<ResolveObstacleArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        require("resolution", &args.resolution)?;
        let date = args
            .resolution_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let done = self
            .mutate(Some(&args.target_id), |store| {
                store.resolve_obstacle(
                    &args.target_id,
                    &args.action_id,
                    &args.obstacle_id,
                    args.resolution,
                    date,
                )
            })
            .await?;
        applied(done)
    }

    #[tool(description = "Reopen a resolved obstacle")]
    async fn unresolve_obstacle(
        &self,
        Parameters(args): Parameters<ObstaclePath>,
    ) -> Result<CallToolResult, ErrorData> {
        let done = self
            .mutate(Some(&args.target_id), |store| {
                store.unresolve_obstacle(&args.target_id, &args.action_id, &args.obstacle_id)
            })
            .await?;
        applied(done)
    }

    // Favorites

    #[tool(description = "Add or remove a target from the current viewer's favorites")]
    async fn toggle_favorite(
        &self,
        Parameters(args): Parameters<TargetPath>,
    ) -> Result<CallToolResult, ErrorData> {
        let viewer = self.viewer().await;
        let favorite = self
            .mutate(None, |store| {
                Ok(store.toggle_favorite_for(&viewer, &args.target_id))
            })
            .await?;
        json_result(json!({ "targetId": args.target_id, "favorite": favorite }))
    }

    #[tool(description = "List the current viewer's favorite target ids")]
    async fn list_favorites(&self) -> Result<CallToolResult, ErrorData> {
        let viewer = self.viewer().await;
        let favorites = self.read(|store| store.favorites_of(&viewer).to_vec()).await;
        json_result(favorites)
    }

    // Views

    #[tool(description = "Urgency x impact matrix of a target's actions")]
    async fn priority_matrix(
        &self,
        Parameters(args): Parameters<TargetPath>,
    ) -> Result<CallToolResult, ErrorData> {
        let matrix = self
            .read(|store| {
                store
                    .target(&args.target_id)
                    .map(|target| PriorityMatrix::build(&target.actions))
            })
            .await;
        match matrix {
            Some(matrix) => json_result(matrix),
            None => Err(ErrorData::resource_not_found(
                format!("target not found: {}", args.target_id),
                None,
            )),
        }
    }

    #[tool(description = "Progress statistics over a user's targets")]
    async fn statistics(
        &self,
        Parameters(args): Parameters<StatisticsArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let actor = self.actor().await;
        let stats = self
            .read(|store| {
                let user_id = args
                    .user_id
                    .as_deref()
                    .or(actor.as_deref())
                    .ok_or_else(|| {
                        StoreError::Unauthorized("sign in or pass a userId".to_string())
                    })?;
                Ok(UserStatistics::for_user(store, user_id))
            })
            .await
            .map_err(store_error)?;
        json_result(stats)
    }

    // Suggestions

    #[tool(description = "Suggest prioritized actions for a target")]
    async fn suggest_actions(
        &self,
        Parameters(args): Parameters<TargetPath>,
    ) -> Result<CallToolResult, ErrorData> {
        let target = self.read(|store| store.target(&args.target_id).cloned()).await;
        let target = target.ok_or_else(|| {
            store_error(StoreError::not_found(
                EntityKind::Target,
                &args.target_id,
            ))
        })?;
        json_result(self.suggestions.for_target(&target))
    }

    #[tool(description = "Suggest steps for an action")]
    async fn suggest_steps(
        &self,
        Parameters(args): Parameters<ActionPath>,
    ) -> Result<CallToolResult, ErrorData> {
        let found = self
            .read(|store| {
                let target = store.target(&args.target_id)?;
                let action = store.action(&args.target_id, &args.action_id)?;
                Some(self.suggestions.for_action(target, action))
            })
            .await;
        match found {
            Some(steps) => json_result(steps),
            None => Err(ErrorData::resource_not_found(
                format!("action not found: {}", args.action_id),
                None,
            )),
        }
    }

    #[tool(description = "Recommend tasks for a step")]
    async fn recommend_tasks(
        &self,
        Parameters(args): Parameters<StepPath>,
    ) -> Result<CallToolResult, ErrorData> {
        let found = self
            .read(|store| {
                store
                    .step(&args.target_id, &args.action_id, &args.step_id)
                    .map(|step| self.suggestions.for_step(step))
            })
            .await;
        match found {
            Some(tasks) => json_result(tasks),
            None => Err(ErrorData::resource_not_found(
                format!("step not found: {}", args.step_id),
                None,
            )),
        }
    }

    #[tool(description = "Suggest ways to resolve an obstacle, optionally saving them on it")]
    async fn suggest_resolutions(
        &self,
        Parameters(args): Parameters<SuggestResolutionsArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let found = self
            .read(|store| {
                store
                    .obstacle(&args.target_id, &args.action_id, &args.obstacle_id)
                    .map(|obstacle| self.suggestions.for_obstacle(obstacle))
            })
            .await;
        let Some(resolutions) = found else {
            return Err(ErrorData::resource_not_found(
                format!("obstacle not found: {}", args.obstacle_id),
                None,
            ));
        };
        if args.save {
            let patch = ObstaclePatch {
                suggested_resolutions: Some(resolutions.clone()),
                ..Default::default()
            };
            self.mutate(Some(&args.target_id), |store| {
                store.update_obstacle(&args.target_id, &args.action_id, &args.obstacle_id, patch)
            })
            .await?;
        }
        json_result(resolutions)
    }
}

#[tool_handler]
impl rmcp::ServerHandler for GoalHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(Self::instructions()),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _ctx: rmcp::service::RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        Ok(ListResourcesResult {
            resources: vec![
                RawResource::new(TARGETS_URI, "Targets").no_annotation(),
                RawResource::new(SESSION_URI, "Session").no_annotation(),
            ],
            next_cursor: None,
            meta: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri, .. }: ReadResourceRequestParam,
        _ctx: rmcp::service::RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        let body = match uri.as_str() {
            TARGETS_URI => {
                self.read(|store| serde_json::to_string_pretty(store.targets()))
                    .await
            }
            SESSION_URI => {
                let actor = self.actor().await;
                let viewer = self.viewer().await;
                self.read(|store| {
                    serde_json::to_string_pretty(&json!({
                        "user": actor.and_then(|id| store.user(&id).map(PublicUser::from)),
                        "favorites": store.favorites_of(&viewer),
                    }))
                })
                .await
            }
            _ => {
                return Err(ErrorData::resource_not_found(
                    "Unknown resource URI",
                    Some(json!({ "uri": uri })),
                ));
            }
        };
        let body = body.map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(body, uri)],
        })
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _ctx: rmcp::service::RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, ErrorData> {
        Ok(ListResourceTemplatesResult {
            next_cursor: None,
            resource_templates: Vec::new(),
            meta: None,
        })
    }
}
