use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::store::MAX_KEY_LEN;

pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Longest centerId that still fits a `{date}_{centerId}` partition key.
pub const MAX_CENTER_ID_LEN: usize = MAX_KEY_LEN - "YYYY-MM-DD_".len();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

/// Row of the `AttendanceByDate` view, keyed `({date}_{centerId}, studentId)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByDateEntry {
    pub status: AttendanceStatus,
    pub student_name: String,
    pub marked_at: DateTime<Utc>,
    pub marked_by: String,
}

/// Row of the `AttendanceByStudent` view, keyed `(studentId, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByStudentEntry {
    pub status: AttendanceStatus,
    pub center_id: String,
    pub marked_at: DateTime<Utc>,
    pub marked_by: String,
}

/// Wire shape of one attendance fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(
    example = json!({
        "studentId": "s1",
        "studentName": "Amina Yusuf",
        "date": "2024-03-10",
        "status": "present",
        "centerId": "center-north",
        "markedBy": "staff-7",
        "markedAt": "2024-03-10T08:02:11.417Z"
    })
)]
pub struct AttendanceRecord {
    pub student_id: String,
    pub student_name: String,
    #[schema(example = "2024-03-10", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub center_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marked_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(format = "date-time", value_type = Option<String>)]
    pub marked_at: Option<DateTime<Utc>>,
}

impl AttendanceRecord {
    pub fn from_by_date(date: NaiveDate, center_id: &str, student_id: String, entry: ByDateEntry) -> Self {
        Self {
            student_id,
            student_name: entry.student_name,
            date,
            status: entry.status,
            center_id: center_id.to_string(),
            marked_by: Some(entry.marked_by),
            marked_at: Some(entry.marked_at),
        }
    }
}

/// Parses a strict `YYYY-MM-DD` calendar day.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let day = NaiveDate::parse_from_str(raw, DAY_FORMAT).ok()?;
    // chrono accepts unpadded fields; require the canonical spelling
    (day.format(DAY_FORMAT).to_string() == raw).then_some(day)
}

pub fn day_key(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

pub fn by_date_partition(date: NaiveDate, center_id: &str) -> String {
    format!("{}_{}", day_key(date), center_id)
}

/// Partition-key range `[D_, D~)` holding every center's roster for `date`.
pub fn by_date_range(date: NaiveDate) -> (String, String) {
    let day = day_key(date);
    (format!("{day}_"), format!("{day}~"))
}

/// Recovers the center id from a by-date partition key of `date`.
pub fn center_from_partition(partition_key: &str, date: NaiveDate) -> Option<&str> {
    partition_key
        .strip_prefix(&day_key(date))
        .and_then(|rest| rest.strip_prefix('_'))
        .filter(|center| !center.is_empty())
}
