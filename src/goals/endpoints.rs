use chrono::Utc;
use rocket::serde::json::Json;
use rocket::{get, post, State};
use tracing::{debug, info};

use crate::data::DBConnection;
use crate::internal_error::{InternalError, InternalResult};
use crate::session::UserId;

use super::data::*;
use super::helpers::*;
use super::tree::TreeViews;

fn parse_filter<T>(value: Option<&str>) -> InternalResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|value| value.parse::<T>())
        .transpose()
        .map_err(|e| InternalError::validation(e.to_string()))
}

#[get("/get_goals?<dimension>&<period>")]
pub fn get_goals(
    dimension: Option<&str>,
    period: Option<&str>,
    user: UserId,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<Vec<Goal>>> {
    let dimension = parse_filter::<GoalDimension>(dimension)?;
    let period = parse_filter::<GoalPeriod>(period)?;

    let db_connection = db_connection.lock()?;
    let goals = get_goals_from_db(user.0, dimension, period, &db_connection)?;

    debug!(user_id = %user.0, count = goals.len(), "Loaded goals");
    Ok(Json(goals))
}

#[post("/add_goal", format = "json", data = "<add_goal_request>")]
pub fn add_goal(
    add_goal_request: Json<AddGoalRequest>,
    user: UserId,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<Goal>> {
    let db_connection = db_connection.lock()?;
    let goal = add_goal_to_db(add_goal_request.into_inner(), user.0, Utc::now(), &db_connection)?;

    info!(user_id = %user.0, goal_id = %goal.id, "Added goal");
    Ok(Json(goal))
}

#[post("/set_goal", format = "json", data = "<set_goal_request>")]
pub fn set_goal(
    set_goal_request: Json<SetGoalRequest>,
    user: UserId,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<Goal>> {
    let db_connection = db_connection.lock()?;
    let goal = update_goal_in_db(set_goal_request.into_inner(), user.0, Utc::now(), &db_connection)?;

    info!(user_id = %user.0, goal_id = %goal.id, status = goal.status.as_str(), "Updated goal");
    Ok(Json(goal))
}

#[get("/get_goal_tree/<goal_id>")]
pub fn get_goal_tree(
    goal_id: uuid::Uuid,
    user: UserId,
    db_connection: &State<DBConnection>,
    views: &State<TreeViews>,
) -> InternalResult<Json<GoalTreeResponse>> {
    let db_connection = db_connection.lock()?;
    let nodes = load_tree(goal_id, user.0, &db_connection)?;

    debug!(user_id = %user.0, goal_id = %goal_id, nodes = nodes.len(), "Loaded goal tree");
    let tree = views.open(user.0, goal_id, nodes)?;
    Ok(Json(tree.response(goal_id)))
}

#[post("/create_root_node", format = "json", data = "<create_root_request>")]
pub fn create_root_node(
    create_root_request: Json<CreateRootRequest>,
    user: UserId,
    db_connection: &State<DBConnection>,
    views: &State<TreeViews>,
) -> InternalResult<Json<GoalTreeResponse>> {
    let goal_id = create_root_request.goal_id;
    let db_connection = db_connection.lock()?;

    let root = create_goal_root_node(goal_id, user.0, Utc::now(), &db_connection)?;
    info!(user_id = %user.0, goal_id = %goal_id, node_id = %root.id, "Created root goal node");

    let tree = views.open(user.0, goal_id, load_tree(goal_id, user.0, &db_connection)?)?;
    Ok(Json(tree.response(goal_id)))
}

#[post("/add_subgoal", format = "json", data = "<add_subgoal_request>")]
pub fn add_subgoal(
    add_subgoal_request: Json<AddSubgoalRequest>,
    user: UserId,
    db_connection: &State<DBConnection>,
    views: &State<TreeViews>,
) -> InternalResult<Json<GoalTreeResponse>> {
    let request = add_subgoal_request.into_inner();
    let db_connection = db_connection.lock()?;

    let mut tree = views.open(user.0, request.goal_id, load_tree(request.goal_id, user.0, &db_connection)?)?;
    if tree.get(request.parent_id).is_none() {
        return Err(InternalError::not_found("Goal node"));
    }

    let child = add_child_to_db(request.parent_id, request.content, user.0, Utc::now(), &db_connection)?;
    info!(
        user_id = %user.0,
        goal_id = %request.goal_id,
        node_id = %child.id,
        parent_id = %request.parent_id,
        "Added subgoal"
    );

    tree.insert_child(child);
    views.save(user.0, request.goal_id, &tree)?;
    Ok(Json(tree.response(request.goal_id)))
}

#[post("/toggle_goal_node", format = "json", data = "<toggle_node_request>")]
pub fn toggle_goal_node(
    toggle_node_request: Json<ToggleNodeRequest>,
    user: UserId,
    db_connection: &State<DBConnection>,
    views: &State<TreeViews>,
) -> InternalResult<Json<GoalTreeResponse>> {
    let goal_id = toggle_node_request.goal_id;
    let node_id = toggle_node_request.node_id;
    let db_connection = db_connection.lock()?;

    let mut tree = views.open(user.0, goal_id, load_tree(goal_id, user.0, &db_connection)?)?;
    let expanded = tree.toggle_expand(node_id);
    views.save(user.0, goal_id, &tree)?;

    debug!(user_id = %user.0, goal_id = %goal_id, node_id = %node_id, expanded, "Toggled goal node");
    Ok(Json(tree.response(goal_id)))
}

#[post("/set_goal_node", format = "json", data = "<set_goal_node_request>")]
pub fn set_goal_node(
    set_goal_node_request: Json<SetGoalNodeRequest>,
    user: UserId,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<GoalNode>> {
    let db_connection = db_connection.lock()?;
    let node = update_goal_node_in_db(set_goal_node_request.into_inner(), user.0, Utc::now(), &db_connection)?;

    info!(user_id = %user.0, node_id = %node.id, "Updated goal node");
    Ok(Json(node))
}

#[post(
    "/set_goal_node_progress",
    format = "json",
    data = "<set_goal_node_progress_request>"
)]
pub fn set_goal_node_progress(
    set_goal_node_progress_request: Json<SetGoalNodeProgressRequest>,
    user: UserId,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<GoalNode>> {
    let request = set_goal_node_progress_request.into_inner();
    let db_connection = db_connection.lock()?;
    let node = set_goal_node_progress_in_db(request.node_id, request.progress, user.0, Utc::now(), &db_connection)?;

    info!(user_id = %user.0, node_id = %node.id, progress = node.progress, "Marked goal node progress");
    Ok(Json(node))
}
