use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A point-in-time body measurement. At least one of the three fields is
/// present; the record is keyed by (user, measuredAt).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BodyMeasurement {
    pub user_id: Uuid,
    pub measured_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_fat_percentage: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A field value together with the time of the record that set it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldSnapshot {
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Per-field view over all of a user's measurements. "Latest" carries each
/// field's newest observation, "oldest" its first — different fields may
/// come from different records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<FieldSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<FieldSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_fat_percentage: Option<FieldSnapshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedSummaries {
    pub latest: MeasurementSummary,
    pub oldest: MeasurementSummary,
}

/// Recompute both derived summaries from the full record set. Pure — the
/// caller rewrites the stored singletons with the output after every
/// mutation, so stale derived state heals on the next write. Returns None
/// when no records remain (the singletons are then deleted).
pub fn recompute_summaries(records: &[BodyMeasurement]) -> Option<DerivedSummaries> {
    if records.is_empty() {
        return None;
    }

    let mut latest = MeasurementSummary::default();
    let mut oldest = MeasurementSummary::default();

    for record in records {
        track_field(record.weight, record.measured_at, &mut latest.weight, &mut oldest.weight);
        track_field(record.height, record.measured_at, &mut latest.height, &mut oldest.height);
        track_field(
            record.body_fat_percentage,
            record.measured_at,
            &mut latest.body_fat_percentage,
            &mut oldest.body_fat_percentage,
        );
    }

    Some(DerivedSummaries { latest, oldest })
}

fn track_field(
    value: Option<f64>,
    at: DateTime<Utc>,
    latest: &mut Option<FieldSnapshot>,
    oldest: &mut Option<FieldSnapshot>,
) {
    let Some(value) = value else { return };
    let snapshot = FieldSnapshot {
        value,
        recorded_at: at,
    };
    // Ties go to the record seen later in the scan.
    match latest {
        Some(current) if at < current.recorded_at => {}
        _ => *latest = Some(snapshot),
    }
    match oldest {
        Some(current) if at > current.recorded_at => {}
        _ => *oldest = Some(snapshot),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddMeasurementRequest {
    /// Defaults to now when omitted. May not be in the future.
    #[serde(default)]
    pub measurement_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub body_fat_percentage: Option<f64>,
}

impl AddMeasurementRequest {
    pub fn has_any_field(&self) -> bool {
        self.weight.is_some() || self.height.is_some() || self.body_fat_percentage.is_some()
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateMeasurementRequest {
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub body_fat_percentage: Option<f64>,
}

impl UpdateMeasurementRequest {
    pub fn is_empty(&self) -> bool {
        self.weight.is_none() && self.height.is_none() && self.body_fat_percentage.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
    }

    fn record(
        measured_at: DateTime<Utc>,
        weight: Option<f64>,
        height: Option<f64>,
        body_fat: Option<f64>,
    ) -> BodyMeasurement {
        BodyMeasurement {
            user_id: Uuid::now_v7(),
            measured_at,
            weight,
            height,
            body_fat_percentage: body_fat,
            created_at: measured_at,
            updated_at: measured_at,
        }
    }

    #[test]
    fn empty_record_set_yields_no_summaries() {
        assert_eq!(recompute_summaries(&[]), None);
    }

    #[test]
    fn fields_are_tracked_independently_across_records() {
        // weight@T1, height@T2, weight@T3
        let records = vec![
            record(at(1), Some(70.0), None, None),
            record(at(2), None, Some(170.0), None),
            record(at(3), Some(68.0), None, None),
        ];

        let summaries = recompute_summaries(&records).unwrap();

        assert_eq!(
            summaries.latest.weight,
            Some(FieldSnapshot { value: 68.0, recorded_at: at(3) })
        );
        assert_eq!(
            summaries.latest.height,
            Some(FieldSnapshot { value: 170.0, recorded_at: at(2) })
        );
        assert_eq!(summaries.latest.body_fat_percentage, None);

        assert_eq!(
            summaries.oldest.weight,
            Some(FieldSnapshot { value: 70.0, recorded_at: at(1) })
        );
        assert_eq!(
            summaries.oldest.height,
            Some(FieldSnapshot { value: 170.0, recorded_at: at(2) })
        );
    }

    #[test]
    fn order_of_input_does_not_matter() {
        let mut records = vec![
            record(at(1), Some(70.0), None, Some(22.0)),
            record(at(2), None, Some(170.0), None),
            record(at(3), Some(68.0), None, None),
        ];
        let forward = recompute_summaries(&records).unwrap();
        records.reverse();
        let backward = recompute_summaries(&records).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn single_record_is_both_latest_and_oldest() {
        let records = vec![record(at(1), Some(70.0), Some(170.0), Some(22.0))];
        let summaries = recompute_summaries(&records).unwrap();
        assert_eq!(summaries.latest, summaries.oldest);
        assert_eq!(summaries.latest.weight.unwrap().value, 70.0);
    }

    #[test]
    fn add_request_knows_whether_any_field_is_set() {
        let req = AddMeasurementRequest {
            measurement_time: None,
            weight: None,
            height: None,
            body_fat_percentage: None,
        };
        assert!(!req.has_any_field());
        let req = AddMeasurementRequest {
            weight: Some(70.0),
            ..req
        };
        assert!(req.has_any_field());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let raw = r#"{"weight": 70, "bmi": 22}"#;
        assert!(serde_json::from_str::<AddMeasurementRequest>(raw).is_err());
    }
}
