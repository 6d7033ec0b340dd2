use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::FieldError;

/// Cap on journal content, measured in characters after any append join.
pub const MAX_CONTENT_CHARS: usize = 10_000;
pub const MAX_TAGS: usize = 10;
/// Appended content is joined to the existing entry with a blank line.
pub const APPEND_SEPARATOR: &str = "\n\n";

/// One journal entry per (user, date).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood_score: Option<i32>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create the entry for a date, or append to it when one already exists.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddJournalRequest {
    /// Defaults to the caller's current date when absent.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub content: String,
    #[serde(default)]
    pub mood_score: Option<i32>,
    /// On append, replaces the stored tags only when supplied.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Full replacement of the supplied fields. An explicit empty tags array
/// clears the stored tags — an absent field leaves them alone.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateJournalRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub mood_score: Option<i32>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl UpdateJournalRequest {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.mood_score.is_none() && self.tags.is_none()
    }
}

pub fn append_content(existing: &str, addition: &str) -> String {
    format!("{existing}{APPEND_SEPARATOR}{addition}")
}

pub fn validate_content(content: &str) -> Result<(), FieldError> {
    if content.trim().is_empty() {
        return Err(FieldError::new("content", "content must not be empty"));
    }
    let chars = content.chars().count();
    if chars > MAX_CONTENT_CHARS {
        return Err(FieldError::new(
            "content",
            format!("content is {chars} characters, maximum is {MAX_CONTENT_CHARS}"),
        ));
    }
    Ok(())
}

/// Tags are stored as provided — no case normalization.
pub fn validate_tags(tags: &[String]) -> Result<(), FieldError> {
    if tags.len() > MAX_TAGS {
        return Err(FieldError::new(
            "tags",
            format!("at most {MAX_TAGS} tags allowed, got {}", tags.len()),
        ));
    }
    if tags.iter().any(|t| t.trim().is_empty()) {
        return Err(FieldError::new("tags", "tags must not contain empty strings"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_request_accepts_an_absent_date() {
        let req: AddJournalRequest = serde_json::from_str(r#"{"content": "slept well"}"#).unwrap();
        assert_eq!(req.date, None);
        let req: AddJournalRequest =
            serde_json::from_str(r#"{"date": "2026-03-01", "content": "ran 5k"}"#).unwrap();
        assert_eq!(req.date, Some("2026-03-01".parse().unwrap()));
    }

    #[test]
    fn append_joins_with_a_blank_line() {
        assert_eq!(append_content("slept well", "ran 5k"), "slept well\n\nran 5k");
    }

    #[test]
    fn content_cap_applies_to_character_count() {
        assert!(validate_content("fine").is_ok());
        assert!(validate_content("").is_err());
        assert!(validate_content("  \n ").is_err());
        let long = "x".repeat(MAX_CONTENT_CHARS);
        assert!(validate_content(&long).is_ok());
        let too_long = "x".repeat(MAX_CONTENT_CHARS + 1);
        assert!(validate_content(&too_long).is_err());
    }

    #[test]
    fn tag_limits() {
        let ok: Vec<String> = (0..MAX_TAGS).map(|i| format!("tag{i}")).collect();
        assert!(validate_tags(&ok).is_ok());
        let too_many: Vec<String> = (0..=MAX_TAGS).map(|i| format!("tag{i}")).collect();
        assert!(validate_tags(&too_many).is_err());
        assert!(validate_tags(&["ok".to_string(), " ".to_string()]).is_err());
        // tags keep their case as provided
        assert!(validate_tags(&["Sleep".to_string(), "sleep".to_string()]).is_ok());
    }

    #[test]
    fn empty_tags_array_is_distinct_from_absent() {
        let with_empty: UpdateJournalRequest = serde_json::from_str(r#"{"tags": []}"#).unwrap();
        assert_eq!(with_empty.tags, Some(vec![]));
        let absent: UpdateJournalRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.tags, None);
        assert!(absent.is_empty());
        assert!(!with_empty.is_empty());
    }
}
