use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use std::str::FromStr;

use crate::data::{sql_text_enum, ParseEnumError, UserID};

pub type GoalID = uuid::Uuid;
pub type GoalNodeID = uuid::Uuid;

pub const NEW_SUBGOAL_CONTENT: &str = "New Subgoal";

/// Horizon of a goal node, stored as 1/2/3.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "u8", into = "u8")]
pub enum GoalType {
    ShortTerm,
    MediumTerm,
    LongTerm,
}

impl Default for GoalType {
    fn default() -> Self {
        GoalType::ShortTerm
    }
}

impl From<GoalType> for u8 {
    fn from(goal_type: GoalType) -> u8 {
        match goal_type {
            GoalType::ShortTerm => 1,
            GoalType::MediumTerm => 2,
            GoalType::LongTerm => 3,
        }
    }
}

impl TryFrom<u8> for GoalType {
    type Error = ParseEnumError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(GoalType::ShortTerm),
            2 => Ok(GoalType::MediumTerm),
            3 => Ok(GoalType::LongTerm),
            _ => Err(ParseEnumError::new("goal type", &value.to_string())),
        }
    }
}

impl ToSql for GoalType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(u8::from(*self) as i64))
    }
}

impl FromSql for GoalType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_i64()?;
        u8::try_from(raw)
            .map_err(|_| FromSqlError::OutOfRange(raw))
            .and_then(|v| GoalType::try_from(v).map_err(|e| FromSqlError::Other(Box::new(e))))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GoalNode {
    pub id: GoalNodeID,
    pub user_id: UserID,
    pub parent_id: Option<GoalNodeID>,
    pub goal_id: Option<GoalID>,
    pub content: String,
    pub implementation: Option<String>,
    pub improvements: Option<String>,
    pub summary: Option<String>,
    pub goal_type: GoalType,
    pub planned_start_date: Option<NaiveDate>,
    pub planned_end_date: Option<NaiveDate>,
    pub actual_start_date: Option<NaiveDate>,
    pub completed_at: Option<NaiveDate>,
    pub progress: u8,
    pub is_root: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GoalDimension {
    Personal,
    Financial,
    Social,
    Lifestyle,
    Family,
}

impl GoalDimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalDimension::Personal => "personal",
            GoalDimension::Financial => "financial",
            GoalDimension::Social => "social",
            GoalDimension::Lifestyle => "lifestyle",
            GoalDimension::Family => "family",
        }
    }
}

impl FromStr for GoalDimension {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal" => Ok(GoalDimension::Personal),
            "financial" => Ok(GoalDimension::Financial),
            "social" => Ok(GoalDimension::Social),
            "lifestyle" => Ok(GoalDimension::Lifestyle),
            "family" => Ok(GoalDimension::Family),
            _ => Err(ParseEnumError::new("goal dimension", s)),
        }
    }
}

sql_text_enum!(GoalDimension);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GoalPeriod {
    Yearly,
    Quarterly,
    Monthly,
}

impl GoalPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalPeriod::Yearly => "yearly",
            GoalPeriod::Quarterly => "quarterly",
            GoalPeriod::Monthly => "monthly",
        }
    }

    /// Type given to the root node of a goal with this period.
    pub fn root_goal_type(&self) -> GoalType {
        match self {
            GoalPeriod::Monthly => GoalType::ShortTerm,
            GoalPeriod::Quarterly => GoalType::MediumTerm,
            GoalPeriod::Yearly => GoalType::LongTerm,
        }
    }
}

impl FromStr for GoalPeriod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yearly" => Ok(GoalPeriod::Yearly),
            "quarterly" => Ok(GoalPeriod::Quarterly),
            "monthly" => Ok(GoalPeriod::Monthly),
            _ => Err(ParseEnumError::new("goal period", s)),
        }
    }
}

sql_text_enum!(GoalPeriod);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    NotStarted,
    InProgress,
    Completed,
    Cancelled,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::NotStarted => "not_started",
            GoalStatus::InProgress => "in_progress",
            GoalStatus::Completed => "completed",
            GoalStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for GoalStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(GoalStatus::NotStarted),
            "in_progress" => Ok(GoalStatus::InProgress),
            "completed" => Ok(GoalStatus::Completed),
            "cancelled" => Ok(GoalStatus::Cancelled),
            _ => Err(ParseEnumError::new("goal status", s)),
        }
    }
}

sql_text_enum!(GoalStatus);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Goal {
    pub id: GoalID,
    pub user_id: UserID,
    pub title: String,
    pub description: String,
    pub dimension: GoalDimension,
    pub period: GoalPeriod,
    pub target_date: Option<NaiveDate>,
    pub progress: u8,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
pub struct AddGoalRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub dimension: GoalDimension,
    pub period: GoalPeriod,
    pub target_date: Option<NaiveDate>,
}

#[derive(Deserialize, Debug)]
pub struct SetGoalRequest {
    pub goal_id: GoalID,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub progress: u8,
    pub status: GoalStatus,
    pub target_date: Option<NaiveDate>,
}

#[derive(Deserialize, Debug)]
pub struct CreateRootRequest {
    pub goal_id: GoalID,
}

#[derive(Deserialize, Debug)]
pub struct AddSubgoalRequest {
    pub goal_id: GoalID,
    pub parent_id: GoalNodeID,
    pub content: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ToggleNodeRequest {
    pub goal_id: GoalID,
    pub node_id: GoalNodeID,
}

/// Everything the node edit form can change.
#[derive(Deserialize, Debug)]
pub struct SetGoalNodeRequest {
    pub node_id: GoalNodeID,
    pub content: String,
    pub implementation: Option<String>,
    pub improvements: Option<String>,
    pub summary: Option<String>,
    pub goal_type: GoalType,
    pub planned_start_date: Option<NaiveDate>,
    pub planned_end_date: Option<NaiveDate>,
    pub actual_start_date: Option<NaiveDate>,
    pub completed_at: Option<NaiveDate>,
    pub progress: u8,
}

#[derive(Deserialize, Debug)]
pub struct SetGoalNodeProgressRequest {
    pub node_id: GoalNodeID,
    pub progress: u8,
}

/// One visible row of the goal outline.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RenderedNode {
    pub node: GoalNode,
    pub depth: usize,
    pub child_count: usize,
    pub expanded: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GoalTreeResponse {
    /// The goal exists but has no root node yet.
    Empty { goal_id: GoalID },
    Loaded {
        root_id: GoalNodeID,
        nodes: Vec<RenderedNode>,
    },
}

#[cfg(test)]
pub fn sample_node(id: GoalNodeID, parent_id: Option<GoalNodeID>) -> GoalNode {
    let epoch = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
    GoalNode {
        id,
        user_id: uuid::Uuid::nil(),
        parent_id,
        goal_id: None,
        content: id.to_string(),
        implementation: None,
        improvements: None,
        summary: None,
        goal_type: GoalType::ShortTerm,
        planned_start_date: None,
        planned_end_date: None,
        actual_start_date: None,
        completed_at: None,
        progress: 0,
        is_root: parent_id.is_none(),
        created_at: epoch,
        updated_at: epoch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_types_travel_as_numbers() {
        assert_eq!(serde_json::to_string(&GoalType::MediumTerm).unwrap(), "2");
        assert_eq!(serde_json::from_str::<GoalType>("3").unwrap(), GoalType::LongTerm);
        assert!(serde_json::from_str::<GoalType>("4").is_err());
    }

    #[test]
    fn root_type_follows_the_goal_period() {
        assert_eq!(GoalPeriod::Monthly.root_goal_type(), GoalType::ShortTerm);
        assert_eq!(GoalPeriod::Quarterly.root_goal_type(), GoalType::MediumTerm);
        assert_eq!(GoalPeriod::Yearly.root_goal_type(), GoalType::LongTerm);
    }

    #[test]
    fn empty_tree_response_is_tagged() {
        let goal_id = uuid::Uuid::nil();
        let json = serde_json::to_value(GoalTreeResponse::Empty { goal_id }).unwrap();
        assert_eq!(json["state"], "empty");
        assert_eq!(json["goal_id"], goal_id.to_string());
    }

    #[test]
    fn statuses_use_snake_case() {
        assert_eq!(
            serde_json::to_string(&GoalStatus::NotStarted).unwrap(),
            "\"not_started\""
        );
        assert_eq!("cancelled".parse::<GoalStatus>().unwrap(), GoalStatus::Cancelled);
        assert_eq!("family".parse::<GoalDimension>().unwrap(), GoalDimension::Family);
        assert!("weekly".parse::<GoalPeriod>().is_err());
    }
}
