use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::data::UserID;
use crate::internal_error::{InternalError, InternalResult};
use crate::tasks::status::validate_progress;

use super::data::*;

const GOAL_COLUMNS: &str = "id, user_id, title, description, dimension, period, target_date, \
     progress, status, created_at, updated_at";

const NODE_COLUMNS: &str = "id, user_id, parent_id, goal_id, content, implementation, \
     improvements, summary, goal_type, planned_start_date, planned_end_date, actual_start_date, \
     completed_at, progress, is_root, created_at, updated_at";

pub fn get_goal_from_row(row: &Row) -> rusqlite::Result<Goal> {
    Ok(Goal {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        dimension: row.get("dimension")?,
        period: row.get("period")?,
        target_date: row.get("target_date")?,
        progress: row.get("progress")?,
        status: row.get("status")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn get_goal_node_from_row(row: &Row) -> rusqlite::Result<GoalNode> {
    Ok(GoalNode {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        parent_id: row.get("parent_id")?,
        goal_id: row.get("goal_id")?,
        content: row.get("content")?,
        implementation: row.get("implementation")?,
        improvements: row.get("improvements")?,
        summary: row.get("summary")?,
        goal_type: row.get("goal_type")?,
        planned_start_date: row.get("planned_start_date")?,
        planned_end_date: row.get("planned_end_date")?,
        actual_start_date: row.get("actual_start_date")?,
        completed_at: row.get("completed_at")?,
        progress: row.get("progress")?,
        is_root: row.get("is_root")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Newest first, optionally narrowed to one dimension and/or period.
pub fn get_goals_from_db(
    user_id: UserID,
    dimension: Option<GoalDimension>,
    period: Option<GoalPeriod>,
    db_connection: &Connection,
) -> InternalResult<Vec<Goal>> {
    let mut statement = db_connection.prepare(&format!(
        "SELECT {} FROM goals
         WHERE user_id = (?1)
           AND ((?2) IS NULL OR dimension = (?2))
           AND ((?3) IS NULL OR period = (?3))
         ORDER BY created_at DESC, rowid DESC",
        GOAL_COLUMNS
    ))?;

    let goals = statement
        .query_map(params![user_id, dimension, period], |row| {
            get_goal_from_row(row)
        })?
        .collect::<rusqlite::Result<Vec<Goal>>>()?;

    Ok(goals)
}

pub fn get_goal_from_db(
    goal_id: GoalID,
    user_id: UserID,
    db_connection: &Connection,
) -> InternalResult<Goal> {
    db_connection
        .query_row(
            &format!(
                "SELECT {} FROM goals WHERE id = (?1) AND user_id = (?2)",
                GOAL_COLUMNS
            ),
            params![goal_id, user_id],
            |row| get_goal_from_row(row),
        )
        .optional()?
        .ok_or_else(|| InternalError::not_found("Goal"))
}

fn validate_title(title: &str) -> InternalResult<()> {
    if title.trim().is_empty() {
        return Err(InternalError::validation("Title is required"));
    }
    Ok(())
}

pub fn add_goal_to_db(
    request: AddGoalRequest,
    user_id: UserID,
    now: DateTime<Utc>,
    db_connection: &Connection,
) -> InternalResult<Goal> {
    validate_title(&request.title)?;

    let goal = Goal {
        id: uuid::Uuid::new_v4(),
        user_id,
        title: request.title,
        description: request.description,
        dimension: request.dimension,
        period: request.period,
        target_date: request.target_date,
        progress: 0,
        status: GoalStatus::NotStarted,
        created_at: now,
        updated_at: now,
    };

    db_connection.execute(
        &format!(
            "INSERT INTO goals ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            GOAL_COLUMNS
        ),
        params![
            goal.id,
            goal.user_id,
            goal.title,
            goal.description,
            goal.dimension,
            goal.period,
            goal.target_date,
            goal.progress,
            goal.status,
            goal.created_at,
            goal.updated_at,
        ],
    )?;

    Ok(goal)
}

pub fn update_goal_in_db(
    request: SetGoalRequest,
    user_id: UserID,
    now: DateTime<Utc>,
    db_connection: &Connection,
) -> InternalResult<Goal> {
    validate_title(&request.title)?;
    if request.progress > 100 {
        return Err(InternalError::validation("Goal progress must be between 0 and 100"));
    }

    let updated = db_connection.execute(
        "UPDATE goals SET title = (?1), description = (?2), progress = (?3), status = (?4),
            target_date = (?5), updated_at = (?6)
         WHERE id = (?7) AND user_id = (?8)",
        params![
            request.title,
            request.description,
            request.progress,
            request.status,
            request.target_date,
            now,
            request.goal_id,
            user_id,
        ],
    )?;

    if updated == 0 {
        return Err(InternalError::not_found("Goal"));
    }
    get_goal_from_db(request.goal_id, user_id, db_connection)
}

/// The nodes under a goal's root, root first and then in insertion order.
/// Empty when the goal has no root node yet.
pub fn get_goal_tree_by_goal(
    goal_id: GoalID,
    user_id: UserID,
    db_connection: &Connection,
) -> InternalResult<Vec<GoalNode>> {
    let mut statement = db_connection.prepare(&format!(
        "WITH RECURSIVE tree (node_id, seq) AS (
            SELECT id, rowid FROM goal_nodes
             WHERE goal_id = (?1) AND user_id = (?2) AND is_root = 1 AND parent_id IS NULL
            UNION
            SELECT child.id, child.rowid FROM goal_nodes child
              JOIN tree ON child.parent_id = tree.node_id
             WHERE child.user_id = (?2)
         )
         SELECT {} FROM goal_nodes JOIN tree ON goal_nodes.id = tree.node_id
         ORDER BY tree.seq",
        NODE_COLUMNS
    ))?;

    let nodes = statement
        .query_map(params![goal_id, user_id], |row| get_goal_node_from_row(row))?
        .collect::<rusqlite::Result<Vec<GoalNode>>>()?;

    Ok(nodes)
}

/// Loads a goal's tree, failing when the goal does not belong to the user.
pub fn load_tree(
    goal_id: GoalID,
    user_id: UserID,
    db_connection: &Connection,
) -> InternalResult<Vec<GoalNode>> {
    get_goal_from_db(goal_id, user_id, db_connection)?;
    get_goal_tree_by_goal(goal_id, user_id, db_connection)
}

pub fn get_goal_node_from_db(
    node_id: GoalNodeID,
    user_id: UserID,
    db_connection: &Connection,
) -> InternalResult<GoalNode> {
    db_connection
        .query_row(
            &format!(
                "SELECT {} FROM goal_nodes WHERE id = (?1) AND user_id = (?2)",
                NODE_COLUMNS
            ),
            params![node_id, user_id],
            |row| get_goal_node_from_row(row),
        )
        .optional()?
        .ok_or_else(|| InternalError::not_found("Goal node"))
}

fn insert_goal_node(node: &GoalNode, db_connection: &Connection) -> InternalResult<()> {
    db_connection.execute(
        &format!(
            "INSERT INTO goal_nodes ({}) VALUES
                (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            NODE_COLUMNS
        ),
        params![
            node.id,
            node.user_id,
            node.parent_id,
            node.goal_id,
            node.content,
            node.implementation,
            node.improvements,
            node.summary,
            node.goal_type,
            node.planned_start_date,
            node.planned_end_date,
            node.actual_start_date,
            node.completed_at,
            node.progress,
            node.is_root,
            node.created_at,
            node.updated_at,
        ],
    )?;
    Ok(())
}

/// Creates the root node of a goal from the goal itself.
pub fn create_goal_root_node(
    goal_id: GoalID,
    user_id: UserID,
    now: DateTime<Utc>,
    db_connection: &Connection,
) -> InternalResult<GoalNode> {
    let goal = get_goal_from_db(goal_id, user_id, db_connection)?;

    let root = GoalNode {
        id: uuid::Uuid::new_v4(),
        user_id,
        parent_id: None,
        goal_id: Some(goal.id),
        content: goal.title,
        implementation: None,
        improvements: None,
        summary: None,
        goal_type: goal.period.root_goal_type(),
        planned_start_date: None,
        planned_end_date: goal.target_date,
        actual_start_date: None,
        completed_at: None,
        progress: 0,
        is_root: true,
        created_at: now,
        updated_at: now,
    };

    insert_goal_node(&root, db_connection)?;
    Ok(root)
}

/// Stores a new child under `parent_id`; the parent must belong to the user.
pub fn add_child_to_db(
    parent_id: GoalNodeID,
    content: Option<String>,
    user_id: UserID,
    now: DateTime<Utc>,
    db_connection: &Connection,
) -> InternalResult<GoalNode> {
    let parent = get_goal_node_from_db(parent_id, user_id, db_connection)?;

    let content = match content {
        Some(content) if content.trim().is_empty() => {
            return Err(InternalError::validation("Content is required"))
        }
        Some(content) => content,
        None => NEW_SUBGOAL_CONTENT.to_string(),
    };

    let child = GoalNode {
        id: uuid::Uuid::new_v4(),
        user_id,
        parent_id: Some(parent.id),
        goal_id: parent.goal_id,
        content,
        implementation: None,
        improvements: None,
        summary: None,
        goal_type: GoalType::ShortTerm,
        planned_start_date: None,
        planned_end_date: None,
        actual_start_date: None,
        completed_at: None,
        progress: 0,
        is_root: false,
        created_at: now,
        updated_at: now,
    };

    insert_goal_node(&child, db_connection)?;
    Ok(child)
}

pub fn update_goal_node_in_db(
    request: SetGoalNodeRequest,
    user_id: UserID,
    now: DateTime<Utc>,
    db_connection: &Connection,
) -> InternalResult<GoalNode> {
    if request.content.trim().is_empty() {
        return Err(InternalError::validation("Content is required"));
    }
    validate_progress(request.progress)?;

    let updated = db_connection.execute(
        "UPDATE goal_nodes SET content = (?1), implementation = (?2), improvements = (?3),
            summary = (?4), goal_type = (?5), planned_start_date = (?6), planned_end_date = (?7),
            actual_start_date = (?8), completed_at = (?9), progress = (?10), updated_at = (?11)
         WHERE id = (?12) AND user_id = (?13)",
        params![
            request.content,
            request.implementation,
            request.improvements,
            request.summary,
            request.goal_type,
            request.planned_start_date,
            request.planned_end_date,
            request.actual_start_date,
            request.completed_at,
            request.progress,
            now,
            request.node_id,
            user_id,
        ],
    )?;

    if updated == 0 {
        return Err(InternalError::not_found("Goal node"));
    }
    get_goal_node_from_db(request.node_id, user_id, db_connection)
}

pub fn set_goal_node_progress_in_db(
    node_id: GoalNodeID,
    progress: u8,
    user_id: UserID,
    now: DateTime<Utc>,
    db_connection: &Connection,
) -> InternalResult<GoalNode> {
    validate_progress(progress)?;

    let updated = db_connection.execute(
        "UPDATE goal_nodes SET progress = (?1), updated_at = (?2) WHERE id = (?3) AND user_id = (?4)",
        params![progress, now, node_id, user_id],
    )?;

    if updated == 0 {
        return Err(InternalError::not_found("Goal node"));
    }
    get_goal_node_from_db(node_id, user_id, db_connection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_connection;
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn add_goal(
        title: &str,
        dimension: GoalDimension,
        period: GoalPeriod,
        user: UserID,
        connection: &Connection,
    ) -> Goal {
        let request = AddGoalRequest {
            title: title.to_string(),
            description: String::new(),
            dimension,
            period,
            target_date: NaiveDate::from_ymd_opt(2024, 12, 31),
        };
        add_goal_to_db(request, user, now(), connection).unwrap()
    }

    #[test]
    fn goals_are_filtered_and_newest_first() {
        let connection = test_connection();
        let user = uuid::Uuid::new_v4();

        let older = add_goal("Save", GoalDimension::Financial, GoalPeriod::Yearly, user, &connection);
        let newer = add_goal("Run", GoalDimension::Personal, GoalPeriod::Monthly, user, &connection);
        add_goal("Other", GoalDimension::Personal, GoalPeriod::Monthly, uuid::Uuid::new_v4(), &connection);

        let all = get_goals_from_db(user, None, None, &connection).unwrap();
        assert_eq!(all.iter().map(|g| g.id).collect::<Vec<_>>(), vec![newer.id, older.id]);

        let financial =
            get_goals_from_db(user, Some(GoalDimension::Financial), None, &connection).unwrap();
        assert_eq!(financial, vec![older.clone()]);

        let monthly = get_goals_from_db(user, None, Some(GoalPeriod::Monthly), &connection).unwrap();
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].status, GoalStatus::NotStarted);
    }

    #[test]
    fn goal_updates_are_validated() {
        let connection = test_connection();
        let user = uuid::Uuid::new_v4();
        let goal = add_goal("Save", GoalDimension::Financial, GoalPeriod::Yearly, user, &connection);

        let request = |progress| SetGoalRequest {
            goal_id: goal.id,
            title: "Save more".to_string(),
            description: String::new(),
            progress,
            status: GoalStatus::InProgress,
            target_date: None,
        };

        let err = update_goal_in_db(request(150), user, now(), &connection).unwrap_err();
        assert!(matches!(err, InternalError::Validation(_)));
        assert_eq!(err.to_string(), "Goal progress must be between 0 and 100");

        let updated = update_goal_in_db(request(40), user, now(), &connection).unwrap();
        assert_eq!(updated.progress, 40);
        assert_eq!(updated.title, "Save more");
        assert_eq!(updated.target_date, None);

        assert!(matches!(
            update_goal_in_db(request(40), uuid::Uuid::new_v4(), now(), &connection),
            Err(InternalError::NotFound { .. })
        ));
    }

    #[test]
    fn goal_without_root_loads_as_empty() {
        let connection = test_connection();
        let user = uuid::Uuid::new_v4();
        let goal = add_goal("Save", GoalDimension::Financial, GoalPeriod::Yearly, user, &connection);

        assert!(load_tree(goal.id, user, &connection).unwrap().is_empty());
        assert!(matches!(
            load_tree(uuid::Uuid::new_v4(), user, &connection),
            Err(InternalError::NotFound { .. })
        ));
        assert!(matches!(
            load_tree(goal.id, uuid::Uuid::new_v4(), &connection),
            Err(InternalError::NotFound { .. })
        ));
    }

    #[test]
    fn root_node_is_derived_from_the_goal() {
        let connection = test_connection();
        let user = uuid::Uuid::new_v4();
        let goal = add_goal("Learn piano", GoalDimension::Lifestyle, GoalPeriod::Quarterly, user, &connection);

        let root = create_goal_root_node(goal.id, user, now(), &connection).unwrap();
        assert_eq!(root.content, "Learn piano");
        assert_eq!(root.goal_type, GoalType::MediumTerm);
        assert_eq!(root.planned_end_date, goal.target_date);
        assert!(root.is_root);

        let err = create_goal_root_node(goal.id, user, now(), &connection).unwrap_err();
        assert_eq!(err.to_string(), "This goal already has a root node");
    }

    #[test]
    fn tree_query_follows_parent_links_in_insertion_order() {
        let connection = test_connection();
        let user = uuid::Uuid::new_v4();
        let goal = add_goal("Health", GoalDimension::Personal, GoalPeriod::Yearly, user, &connection);
        let root = create_goal_root_node(goal.id, user, now(), &connection).unwrap();

        let b = add_child_to_db(root.id, Some("B".to_string()), user, now(), &connection).unwrap();
        let c = add_child_to_db(root.id, None, user, now(), &connection).unwrap();
        let d = add_child_to_db(b.id, Some("D".to_string()), user, now(), &connection).unwrap();

        assert_eq!(c.content, NEW_SUBGOAL_CONTENT);
        assert_eq!(c.goal_type, GoalType::ShortTerm);
        assert_eq!(d.goal_id, Some(goal.id));

        let nodes = load_tree(goal.id, user, &connection).unwrap();
        let ids: Vec<_> = nodes.iter().map(|node| node.id).collect();
        assert_eq!(ids, vec![root.id, b.id, c.id, d.id]);
    }

    #[test]
    fn children_need_a_parent_owned_by_the_user() {
        let connection = test_connection();
        let user = uuid::Uuid::new_v4();
        let goal = add_goal("Health", GoalDimension::Personal, GoalPeriod::Yearly, user, &connection);
        let root = create_goal_root_node(goal.id, user, now(), &connection).unwrap();

        assert!(matches!(
            add_child_to_db(root.id, None, uuid::Uuid::new_v4(), now(), &connection),
            Err(InternalError::NotFound { .. })
        ));
        assert!(matches!(
            add_child_to_db(root.id, Some("  ".to_string()), user, now(), &connection),
            Err(InternalError::Validation(_))
        ));
        assert_eq!(load_tree(goal.id, user, &connection).unwrap().len(), 1);
    }

    #[test]
    fn node_edits_and_progress() {
        let connection = test_connection();
        let user = uuid::Uuid::new_v4();
        let goal = add_goal("Health", GoalDimension::Personal, GoalPeriod::Yearly, user, &connection);
        let root = create_goal_root_node(goal.id, user, now(), &connection).unwrap();

        let edited = update_goal_node_in_db(
            SetGoalNodeRequest {
                node_id: root.id,
                content: "Get fit".to_string(),
                implementation: Some("Gym three times a week".to_string()),
                improvements: None,
                summary: None,
                goal_type: GoalType::LongTerm,
                planned_start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
                planned_end_date: NaiveDate::from_ymd_opt(2024, 12, 31),
                actual_start_date: None,
                completed_at: None,
                progress: 10,
            },
            user,
            now(),
            &connection,
        )
        .unwrap();
        assert_eq!(edited.content, "Get fit");
        assert_eq!(edited.implementation.as_deref(), Some("Gym three times a week"));
        assert!(edited.is_root);

        let marked = set_goal_node_progress_in_db(root.id, 75, user, now(), &connection).unwrap();
        assert_eq!(marked.progress, 75);

        let err = set_goal_node_progress_in_db(root.id, 101, user, now(), &connection).unwrap_err();
        assert!(matches!(err, InternalError::Validation(_)));
        assert_eq!(err.to_string(), "Progress must be between 0 and 100");
        assert_eq!(err.status(), rocket::http::Status::BadRequest);

        let overfull = SetGoalNodeRequest {
            node_id: root.id,
            content: "Get fit".to_string(),
            implementation: None,
            improvements: None,
            summary: None,
            goal_type: GoalType::LongTerm,
            planned_start_date: None,
            planned_end_date: None,
            actual_start_date: None,
            completed_at: None,
            progress: 130,
        };
        assert!(matches!(
            update_goal_node_in_db(overfull, user, now(), &connection),
            Err(InternalError::Validation(_))
        ));
        assert_eq!(get_goal_node_from_db(root.id, user, &connection).unwrap().progress, 75);
    }
}
