use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    Diet,
    Exercise,
    Sleep,
    Fasting,
    Restriction,
    Other,
}

impl PolicyType {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyType::Diet => "diet",
            PolicyType::Exercise => "exercise",
            PolicyType::Sleep => "sleep",
            PolicyType::Fasting => "fasting",
            PolicyType::Restriction => "restriction",
            PolicyType::Other => "other",
        }
    }
}

impl std::str::FromStr for PolicyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "diet" => Ok(PolicyType::Diet),
            "exercise" => Ok(PolicyType::Exercise),
            "sleep" => Ok(PolicyType::Sleep),
            "fasting" => Ok(PolicyType::Fasting),
            "restriction" => Ok(PolicyType::Restriction),
            "other" => Ok(PolicyType::Other),
            other => Err(format!("unknown policy type '{other}'")),
        }
    }
}

/// A standing rule the user lives by ("16:8 fasting", "no caffeine after
/// noon"). `rules` is free-form JSON — structure varies per policy type.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthPolicy {
    pub policy_id: Uuid,
    pub user_id: Uuid,
    pub policy_type: PolicyType,
    pub title: String,
    pub description: String,
    pub rules: serde_json::Value,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreatePolicyRequest {
    pub policy_type: PolicyType,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: Option<serde_json::Value>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdatePolicyRequest {
    #[serde(default)]
    pub policy_type: Option<PolicyType>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: Option<serde_json::Value>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl UpdatePolicyRequest {
    pub fn is_empty(&self) -> bool {
        self.policy_type.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.rules.is_none()
            && self.is_active.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_type_round_trips_through_storage_form() {
        for t in [
            PolicyType::Diet,
            PolicyType::Exercise,
            PolicyType::Sleep,
            PolicyType::Fasting,
            PolicyType::Restriction,
            PolicyType::Other,
        ] {
            assert_eq!(t.as_str().parse::<PolicyType>(), Ok(t));
        }
    }

    #[test]
    fn create_request_rejects_unknown_fields() {
        let raw = r#"{"policyType": "diet", "title": "no sugar", "color": "red"}"#;
        assert!(serde_json::from_str::<CreatePolicyRequest>(raw).is_err());
    }
}
