//! Repairs divergence between the two attendance views for one day.
//!
//! The by-date and by-student rows of a mark are written one after the other
//! without a transaction, so a failed second write or two interleaved batches
//! can leave them disagreeing. For each student touched on that day the row
//! with the latest `markedAt` is taken as the fact (by-date wins a tie) and
//! both views are rewritten from it.

use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::attendance::{
        AttendanceStatus, ByDateEntry, ByStudentEntry, by_date_partition, by_date_range,
        center_from_partition, day_key, parse_day,
    },
    models::ApiResponse,
    store::{StoreError, Table},
    utils::student_directory::StudentDirectory,
};
use actix_web::{HttpResponse, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{info, warn};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReconcileRequest {
    #[schema(example = "2024-03-10")]
    pub date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReconcileReport {
    #[schema(example = "2024-03-10", format = "date", value_type = String)]
    pub date: NaiveDate,
    /// students with at least one row on that day
    pub checked: usize,
    /// students whose rows were rewritten
    pub repaired: Vec<String>,
}

struct Fact {
    center_id: String,
    student_name: String,
    status: AttendanceStatus,
    marked_at: DateTime<Utc>,
    marked_by: String,
}

impl Fact {
    fn matches_by_date(&self, entry: &ByDateEntry) -> bool {
        entry.status == self.status
            && entry.marked_at == self.marked_at
            && entry.marked_by == self.marked_by
    }

    fn by_date(&self) -> ByDateEntry {
        ByDateEntry {
            status: self.status,
            student_name: self.student_name.clone(),
            marked_at: self.marked_at,
            marked_by: self.marked_by.clone(),
        }
    }

    fn by_student(&self) -> ByStudentEntry {
        ByStudentEntry {
            status: self.status,
            center_id: self.center_id.clone(),
            marked_at: self.marked_at,
            marked_by: self.marked_by.clone(),
        }
    }
}

fn pick_fact(
    date_rows: &[(String, ByDateEntry)],
    student_row: Option<&ByStudentEntry>,
    fallback_name: &str,
) -> Option<Fact> {
    let latest_by_date = date_rows.iter().max_by_key(|(_, e)| e.marked_at);

    match (latest_by_date, student_row) {
        (Some((_, d)), Some(s)) if s.marked_at > d.marked_at => Some(Fact {
            student_name: date_rows
                .iter()
                .find(|(c, _)| *c == s.center_id)
                .map(|(_, e)| e.student_name.clone())
                .unwrap_or_else(|| fallback_name.to_string()),
            center_id: s.center_id.clone(),
            status: s.status,
            marked_at: s.marked_at,
            marked_by: s.marked_by.clone(),
        }),
        (Some((center_id, d)), _) => Some(Fact {
            center_id: center_id.clone(),
            student_name: d.student_name.clone(),
            status: d.status,
            marked_at: d.marked_at,
            marked_by: d.marked_by.clone(),
        }),
        (None, Some(s)) => Some(Fact {
            center_id: s.center_id.clone(),
            student_name: fallback_name.to_string(),
            status: s.status,
            marked_at: s.marked_at,
            marked_by: s.marked_by.clone(),
        }),
        (None, None) => None,
    }
}

pub async fn reconcile_day(
    directory: &StudentDirectory,
    date: NaiveDate,
) -> Result<ReconcileReport, StoreError> {
    let store = directory.store();
    let day = day_key(date);

    // studentId -> [(centerId, row)]
    let (from, to) = by_date_range(date);
    let mut by_date: BTreeMap<String, Vec<(String, ByDateEntry)>> = BTreeMap::new();
    for row in store
        .query_partition_range::<ByDateEntry>(Table::AttendanceByDate, &from, &to)
        .await?
    {
        if let Some(center_id) = center_from_partition(&row.partition_key, date) {
            by_date
                .entry(row.row_key)
                .or_default()
                .push((center_id.to_string(), row.value));
        }
    }

    // a by-student row without any by-date row is only found via the directory
    let names: HashMap<String, String> = directory
        .list_all()
        .await?
        .into_iter()
        .map(|s| (s.id.clone(), s.display_name()))
        .collect();
    let candidates: BTreeSet<String> = by_date.keys().chain(names.keys()).cloned().collect();

    let mut checked = 0;
    let mut repaired = Vec::new();

    for student_id in candidates {
        let date_rows = by_date.remove(&student_id).unwrap_or_default();
        let student_row: Option<ByStudentEntry> = store
            .get(Table::AttendanceByStudent, &student_id, &day)
            .await?;

        let fallback_name = names.get(&student_id).map(String::as_str).unwrap_or(&student_id);
        let Some(fact) = pick_fact(&date_rows, student_row.as_ref(), fallback_name) else {
            continue;
        };
        checked += 1;

        let mut changed = false;

        for (center_id, _) in date_rows.iter().filter(|(c, _)| *c != fact.center_id) {
            store
                .delete(Table::AttendanceByDate, &by_date_partition(date, center_id), &student_id)
                .await?;
            changed = true;
        }

        let current = date_rows
            .iter()
            .find(|(c, _)| *c == fact.center_id)
            .map(|(_, e)| e);
        if !current.is_some_and(|e| fact.matches_by_date(e)) {
            store
                .upsert(
                    Table::AttendanceByDate,
                    &by_date_partition(date, &fact.center_id),
                    &student_id,
                    &fact.by_date(),
                )
                .await?;
            changed = true;
        }

        let wanted = fact.by_student();
        if student_row.as_ref() != Some(&wanted) {
            store
                .upsert(Table::AttendanceByStudent, &student_id, &day, &wanted)
                .await?;
            changed = true;
        }

        if changed {
            warn!(student_id = %student_id, %date, "Repaired diverged attendance views");
            repaired.push(student_id);
        }
    }

    Ok(ReconcileReport {
        date,
        checked,
        repaired,
    })
}

/// Repair divergent attendance views for one day (admin only)
#[utoipa::path(
    post,
    path = "/api/attendance/reconcile",
    request_body = ReconcileRequest,
    responses(
        (status = 200, description = "Reconciliation report", body = ReconcileReport),
        (status = 400, description = "Missing or malformed date"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn reconcile_attendance(
    auth: AuthUser,
    directory: web::Data<StudentDirectory>,
    payload: web::Json<ReconcileRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let date = payload
        .date
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::BadRequest("date is required (YYYY-MM-DD)".into()))
        .and_then(|d| {
            parse_day(d).ok_or_else(|| ApiError::BadRequest("date must be YYYY-MM-DD".into()))
        })?;

    let report = reconcile_day(directory.get_ref(), date).await?;

    info!(
        %date,
        checked = report.checked,
        repaired = report.repaired.len(),
        user_id = %auth.user_id,
        "Attendance reconciliation finished"
    );

    Ok(HttpResponse::Ok().json(ApiResponse::ok(report)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_710_057_600 + secs, 0).unwrap()
    }

    fn date_row(center: &str, status: AttendanceStatus, secs: i64) -> (String, ByDateEntry) {
        (
            center.to_string(),
            ByDateEntry {
                status,
                student_name: "Amina Yusuf".into(),
                marked_at: at(secs),
                marked_by: format!("by-{secs}"),
            },
        )
    }

    fn student_row(center: &str, status: AttendanceStatus, secs: i64) -> ByStudentEntry {
        ByStudentEntry {
            status,
            center_id: center.into(),
            marked_at: at(secs),
            marked_by: format!("by-{secs}"),
        }
    }

    #[test]
    fn newer_by_student_row_wins() {
        let rows = vec![date_row("north", AttendanceStatus::Present, 10)];
        let s = student_row("north", AttendanceStatus::Absent, 20);

        let fact = pick_fact(&rows, Some(&s), "x").unwrap();
        assert_eq!(fact.status, AttendanceStatus::Absent);
        assert_eq!(fact.student_name, "Amina Yusuf");
    }

    #[test]
    fn by_date_wins_ties_and_newer() {
        let rows = vec![
            date_row("north", AttendanceStatus::Present, 10),
            date_row("south", AttendanceStatus::Absent, 30),
        ];
        let s = student_row("north", AttendanceStatus::Present, 30);

        let fact = pick_fact(&rows, Some(&s), "x").unwrap();
        assert_eq!(fact.center_id, "south");
        assert_eq!(fact.status, AttendanceStatus::Absent);
    }

    #[test]
    fn lone_by_student_row_uses_directory_name() {
        let s = student_row("north", AttendanceStatus::Present, 5);
        let fact = pick_fact(&[], Some(&s), "Directory Name").unwrap();
        assert_eq!(fact.student_name, "Directory Name");
        assert!(pick_fact(&[], None, "x").is_none());
    }
}
