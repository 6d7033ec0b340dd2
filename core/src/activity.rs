use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Exercise,
    Meal,
    Sleep,
    Meditation,
    Medication,
    Therapy,
    Social,
    Work,
    Leisure,
    Supplement,
    Other,
}

/// One thing that happened during the day. Entries are keyed by `time`
/// within their day — there is no separate entry id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    /// 24h "HH:MM". Addressing key for update/delete within the day.
    pub time: String,
    pub activity_type: ActivityType,
    #[serde(default)]
    pub description: String,
    /// What was involved (foods eaten, exercises done, pills taken).
    /// A bare string is accepted and coerced to a one-element list.
    #[serde(default, deserialize_with = "items_one_or_many")]
    pub items: Vec<String>,
}

fn items_one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(item)) => vec![item],
        Some(OneOrMany::Many(items)) => items,
    })
}

/// The single record per (user, date) holding that day's ordered entries.
///
/// Reading a day that was never written yields an empty day rather than an
/// error; such a day carries no audit timestamps because no record exists.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivity {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub activities: Vec<ActivityEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DailyActivity {
    /// The day as read when no record exists: no entries, no timestamps.
    pub fn empty(user_id: Uuid, date: NaiveDate) -> Self {
        DailyActivity {
            user_id,
            date,
            activities: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

/// Append entries to a day (creates the day record when absent).
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddActivitiesRequest {
    pub activities: Vec<ActivityEntry>,
}

/// Replace the day's entry list wholesale.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReplaceActivitiesRequest {
    pub activities: Vec<ActivityEntry>,
}

/// Patch for the single entry addressed by (date, time).
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateActivityRequest {
    #[serde(default)]
    pub activity_type: Option<ActivityType>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub items: Option<Vec<String>>,
}

impl UpdateActivityRequest {
    pub fn is_empty(&self) -> bool {
        self.activity_type.is_none() && self.description.is_none() && self.items.is_none()
    }
}

/// Apply a patch to the entry at `time`. Returns false when no entry
/// matches, leaving the list untouched.
pub fn patch_entry(entries: &mut [ActivityEntry], time: &str, patch: &UpdateActivityRequest) -> bool {
    let Some(entry) = entries.iter_mut().find(|e| e.time == time) else {
        return false;
    };
    if let Some(activity_type) = patch.activity_type {
        entry.activity_type = activity_type;
    }
    if let Some(description) = &patch.description {
        entry.description = description.clone();
    }
    if let Some(items) = &patch.items {
        entry.items = items.clone();
    }
    true
}

/// Remove the entry at `time`. Returns false when no entry matches.
pub fn remove_entry(entries: &mut Vec<ActivityEntry>, time: &str) -> bool {
    let before = entries.len();
    entries.retain(|e| e.time != time);
    entries.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(time: &str) -> ActivityEntry {
        ActivityEntry {
            time: time.to_string(),
            activity_type: ActivityType::Exercise,
            description: "morning run".to_string(),
            items: vec!["5k".to_string()],
        }
    }

    #[test]
    fn patch_updates_only_supplied_fields() {
        let mut entries = vec![entry("07:30"), entry("12:00")];
        let patch = UpdateActivityRequest {
            description: Some("interval run".to_string()),
            ..Default::default()
        };

        assert!(patch_entry(&mut entries, "07:30", &patch));
        assert_eq!(entries[0].description, "interval run");
        assert_eq!(entries[0].activity_type, ActivityType::Exercise);
        assert_eq!(entries[0].items, vec!["5k".to_string()]);
        assert_eq!(entries[1].description, "morning run");
    }

    #[test]
    fn patch_misses_unknown_time() {
        let mut entries = vec![entry("07:30")];
        assert!(!patch_entry(
            &mut entries,
            "08:00",
            &UpdateActivityRequest::default()
        ));
        assert_eq!(entries[0], entry("07:30"));
    }

    #[test]
    fn remove_drops_exactly_the_addressed_entry() {
        let mut entries = vec![entry("07:30"), entry("12:00")];
        assert!(remove_entry(&mut entries, "12:00"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].time, "07:30");
        assert!(!remove_entry(&mut entries, "12:00"));
    }

    #[test]
    fn bare_string_items_coerce_to_a_list() {
        let raw = r#"{"time": "08:00", "activityType": "meal", "items": "oatmeal"}"#;
        let entry: ActivityEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.items, vec!["oatmeal".to_string()]);

        let raw = r#"{"time": "08:00", "activityType": "meal"}"#;
        let entry: ActivityEntry = serde_json::from_str(raw).unwrap();
        assert!(entry.items.is_empty());
    }

    #[test]
    fn unwritten_day_reads_as_an_empty_list() {
        let day = DailyActivity::empty(Uuid::now_v7(), "2026-03-01".parse().unwrap());
        let json = serde_json::to_value(&day).unwrap();
        assert_eq!(json["activities"], serde_json::json!([]));
        assert!(json.get("createdAt").is_none());
        assert!(json.get("updatedAt").is_none());
    }
}
