use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::FieldError;

pub const DEFAULT_SEVERITY: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConcernCategory {
    Physical,
    Mental,
}

impl ConcernCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ConcernCategory::Physical => "PHYSICAL",
            ConcernCategory::Mental => "MENTAL",
        }
    }
}

impl std::str::FromStr for ConcernCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PHYSICAL" => Ok(ConcernCategory::Physical),
            "MENTAL" => Ok(ConcernCategory::Mental),
            other => Err(format!("unknown concern category '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConcernStatus {
    Active,
    Improved,
    Resolved,
}

impl ConcernStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConcernStatus::Active => "ACTIVE",
            ConcernStatus::Improved => "IMPROVED",
            ConcernStatus::Resolved => "RESOLVED",
        }
    }
}

impl std::str::FromStr for ConcernStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(ConcernStatus::Active),
            "IMPROVED" => Ok(ConcernStatus::Improved),
            "RESOLVED" => Ok(ConcernStatus::Resolved),
            other => Err(format!("unknown concern status '{other}'")),
        }
    }
}

/// A tracked health concern ("lower back pain", "poor sleep"). A concern can
/// belong to both categories at once (e.g. chronic pain affecting mood).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthConcern {
    pub concern_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Vec<ConcernCategory>,
    pub severity: i32,
    pub status: ConcernStatus,
    /// Free-form notes on what makes the concern worse.
    pub triggers: String,
    /// Free-form notes on how the concern has evolved.
    pub history: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateConcernRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: Vec<ConcernCategory>,
    #[serde(default)]
    pub severity: Option<i32>,
    #[serde(default)]
    pub status: Option<ConcernStatus>,
    #[serde(default)]
    pub triggers: Option<String>,
    #[serde(default)]
    pub history: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateConcernRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Vec<ConcernCategory>>,
    #[serde(default)]
    pub severity: Option<i32>,
    #[serde(default)]
    pub status: Option<ConcernStatus>,
    #[serde(default)]
    pub triggers: Option<String>,
    #[serde(default)]
    pub history: Option<String>,
}

impl UpdateConcernRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.severity.is_none()
            && self.status.is_none()
            && self.triggers.is_none()
            && self.history.is_none()
    }
}

/// Category lists must be non-empty and free of duplicates.
pub fn validate_categories(categories: &[ConcernCategory]) -> Result<(), FieldError> {
    if categories.is_empty() {
        return Err(FieldError::new(
            "category",
            "category must contain at least one of PHYSICAL, MENTAL",
        ));
    }
    for (i, category) in categories.iter().enumerate() {
        if categories[..i].contains(category) {
            return Err(FieldError::new(
                "category",
                format!("category contains duplicate entry {}", category.as_str()),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_must_be_non_empty_and_unique() {
        assert!(validate_categories(&[]).is_err());
        assert!(validate_categories(&[ConcernCategory::Physical]).is_ok());
        assert!(
            validate_categories(&[ConcernCategory::Physical, ConcernCategory::Mental]).is_ok()
        );
        assert!(
            validate_categories(&[ConcernCategory::Mental, ConcernCategory::Mental]).is_err()
        );
    }

    #[test]
    fn categories_use_screaming_case_on_the_wire() {
        let parsed: Vec<ConcernCategory> =
            serde_json::from_str(r#"["PHYSICAL", "MENTAL"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![ConcernCategory::Physical, ConcernCategory::Mental]
        );
        assert!(serde_json::from_str::<ConcernCategory>("\"physical\"").is_err());
    }
}
