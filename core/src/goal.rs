use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const DEFAULT_PRIORITY: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Longevity,
    Fitness,
    Weight,
    MentalHealth,
    Other,
}

impl GoalType {
    pub fn as_str(self) -> &'static str {
        match self {
            GoalType::Longevity => "longevity",
            GoalType::Fitness => "fitness",
            GoalType::Weight => "weight",
            GoalType::MentalHealth => "mental_health",
            GoalType::Other => "other",
        }
    }
}

impl std::str::FromStr for GoalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "longevity" => Ok(GoalType::Longevity),
            "fitness" => Ok(GoalType::Fitness),
            "weight" => Ok(GoalType::Weight),
            "mental_health" => Ok(GoalType::MentalHealth),
            "other" => Ok(GoalType::Other),
            other => Err(format!("unknown goal type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Achieved,
    Paused,
    Cancelled,
}

impl GoalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Achieved => "achieved",
            GoalStatus::Paused => "paused",
            GoalStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for GoalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(GoalStatus::Active),
            "achieved" => Ok(GoalStatus::Achieved),
            "paused" => Ok(GoalStatus::Paused),
            "cancelled" => Ok(GoalStatus::Cancelled),
            other => Err(format!("unknown goal status '{other}'")),
        }
    }
}

/// A long-running health goal ("get to 12% body fat", "sleep 8 hours").
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthGoal {
    pub goal_id: Uuid,
    pub user_id: Uuid,
    pub goal_type: GoalType,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_value: Option<f64>,
    /// Target dates may sit in the future — that is the point of a goal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
    pub priority: i32,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateGoalRequest {
    pub goal_type: GoalType,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub target_value: Option<f64>,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub status: Option<GoalStatus>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateGoalRequest {
    #[serde(default)]
    pub goal_type: Option<GoalType>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub target_value: Option<f64>,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub status: Option<GoalStatus>,
}

impl UpdateGoalRequest {
    pub fn is_empty(&self) -> bool {
        self.goal_type.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.target_value.is_none()
            && self.target_date.is_none()
            && self.priority.is_none()
            && self.status.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_type_round_trips_through_storage_form() {
        for t in [
            GoalType::Longevity,
            GoalType::Fitness,
            GoalType::Weight,
            GoalType::MentalHealth,
            GoalType::Other,
        ] {
            assert_eq!(t.as_str().parse::<GoalType>(), Ok(t));
        }
        assert!("cardio".parse::<GoalType>().is_err());
    }

    #[test]
    fn wire_form_uses_snake_case() {
        let json = serde_json::to_string(&GoalType::MentalHealth).unwrap();
        assert_eq!(json, "\"mental_health\"");
        let json = serde_json::to_string(&GoalStatus::Active).unwrap();
        assert_eq!(json, "\"active\"");
    }

    #[test]
    fn create_request_rejects_unknown_fields() {
        let raw = r#"{"goalType": "fitness", "title": "run", "deadline": "2026-01-01"}"#;
        assert!(serde_json::from_str::<CreateGoalRequest>(raw).is_err());
    }
}
