use crate::{
    auth::auth::{AccessScope, AuthUser},
    error::ApiError,
    model::attendance::{
        AttendanceRecord, AttendanceStatus, ByDateEntry, ByStudentEntry, by_date_partition,
        by_date_range, center_from_partition, day_key, parse_day,
    },
    models::ApiResponse,
    store::{Table, TableStore},
    utils::student_directory::StudentDirectory,
};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    /// Roster for one day (YYYY-MM-DD)
    pub date: Option<String>,
    /// History for one student
    pub student_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DayQuery {
    /// Day to report (YYYY-MM-DD), defaults to today (UTC)
    pub date: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkItem {
    #[schema(example = "s1")]
    pub student_id: Option<String>,
    // kept as text so a bad value fails only this record
    #[schema(example = "present")]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[schema(example = json!({
    "date": "2024-03-10",
    "records": [
        {"studentId": "s1", "status": "present"},
        {"studentId": "s2", "status": "absent"}
    ]
}))]
pub struct MarkAttendanceRequest {
    pub date: Option<String>,
    pub records: Option<Vec<MarkItem>>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct MarkAttendanceResult {
    pub saved: Vec<AttendanceRecord>,
    #[schema(example = json!(["Student bad-id not found"]))]
    pub errors: Vec<String>,
}

/// One row of the daily roster: a student and that day's status, if marked.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub student_id: String,
    pub student_name: String,
    pub center_id: String,
    #[schema(example = "2024-03-10", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(nullable = true)]
    pub status: Option<AttendanceStatus>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CenterSummary {
    pub center_id: String,
    pub present: usize,
    pub absent: usize,
    pub total: usize,
}

fn required_day(raw: Option<&str>) -> Result<NaiveDate, ApiError> {
    match raw.map(str::trim).filter(|d| !d.is_empty()) {
        None => Err(ApiError::BadRequest("date is required (YYYY-MM-DD)".into())),
        Some(d) => parse_day(d).ok_or_else(|| ApiError::BadRequest("date must be YYYY-MM-DD".into())),
    }
}

fn day_or_today(raw: Option<&str>) -> Result<NaiveDate, ApiError> {
    match raw.map(str::trim).filter(|d| !d.is_empty()) {
        None => Ok(Utc::now().date_naive()),
        Some(_) => required_day(raw),
    }
}

/* =========================
Write path
========================= */

/// Records one mark into both views. The error string is the per-item
/// message returned to the caller.
async fn mark_one(
    directory: &StudentDirectory,
    scope: &AccessScope,
    marked_by: &str,
    date: NaiveDate,
    position: usize,
    item: &MarkItem,
) -> Result<AttendanceRecord, String> {
    let student_id = item
        .student_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| format!("Record {position} is missing studentId"))?;

    // 1️⃣ status
    let status: AttendanceStatus = match item.status.as_deref().map(str::trim) {
        Some(raw) => raw
            .parse()
            .map_err(|_| format!("Invalid status '{raw}' for student {student_id}"))?,
        None => return Err(format!("Missing status for student {student_id}")),
    };

    // 2️⃣ owning center
    let student = match directory.get(student_id).await {
        Ok(Some(s)) => s,
        Ok(None) => return Err(format!("Student {student_id} not found")),
        Err(e) => {
            error!(error = %e, student_id, "Student lookup failed");
            return Err(format!("Failed to process student {student_id}"));
        }
    };

    // 3️⃣ access
    if !scope.allows(&student.center_id) {
        return Err(format!("Access denied for student {student_id}"));
    }

    // 4️⃣ one clock read shared by both views
    let now = Utc::now().trunc_subsecs(3);
    let store = directory.store();
    let day = day_key(date);

    // 5️⃣ the center of an earlier mark for the same day, if the student moved since
    let stale_center = match store
        .get::<ByStudentEntry>(Table::AttendanceByStudent, student_id, &day)
        .await
    {
        Ok(previous) => previous
            .map(|p| p.center_id)
            .filter(|c| *c != student.center_id),
        Err(e) => {
            error!(error = %e, student_id, %date, "Previous mark lookup failed");
            return Err(format!("Failed to process student {student_id}"));
        }
    };

    // 6️⃣ by-date view
    let by_date = ByDateEntry {
        status,
        student_name: student.display_name(),
        marked_at: now,
        marked_by: marked_by.to_string(),
    };
    let partition = by_date_partition(date, &student.center_id);
    if let Err(e) = store
        .upsert(Table::AttendanceByDate, &partition, student_id, &by_date)
        .await
    {
        error!(error = %e, student_id, %date, "By-date write failed");
        return Err(format!("Failed to process student {student_id}"));
    }

    if let Some(old_center) = stale_center {
        let old_partition = by_date_partition(date, &old_center);
        if let Err(e) = store
            .delete(Table::AttendanceByDate, &old_partition, student_id)
            .await
        {
            // reconciliation removes the leftover row
            error!(
                error = %e,
                student_id,
                %date,
                old_center = %old_center,
                "Stale by-date row left, views diverged"
            );
            return Err(format!("Failed to process student {student_id}"));
        }
    }

    // 7️⃣ by-student view
    let by_student = ByStudentEntry {
        status,
        center_id: student.center_id.clone(),
        marked_at: now,
        marked_by: marked_by.to_string(),
    };
    if let Err(e) = store
        .upsert(Table::AttendanceByStudent, student_id, &day, &by_student)
        .await
    {
        // the by-date row is already written; reconciliation repairs this
        error!(error = %e, student_id, %date, "By-student write failed, views diverged");
        return Err(format!("Failed to process student {student_id}"));
    }

    Ok(AttendanceRecord::from_by_date(
        date,
        &student.center_id,
        student_id.to_string(),
        by_date,
    ))
}

/// Processes every record in order; failures never abort the batch.
pub async fn mark_batch(
    directory: &StudentDirectory,
    caller: &AuthUser,
    date: NaiveDate,
    items: &[MarkItem],
) -> MarkAttendanceResult {
    let scope = caller.scope();
    let mut result = MarkAttendanceResult::default();

    for (index, item) in items.iter().enumerate() {
        match mark_one(directory, &scope, &caller.user_id, date, index + 1, item).await {
            Ok(record) => result.saved.push(record),
            Err(message) => {
                debug!(%message, "Attendance record rejected");
                result.errors.push(message);
            }
        }
    }

    result
}

/* =========================
Read path
========================= */

/// Every mark for `date` visible to `scope`.
pub async fn roster_by_date(
    store: &TableStore,
    scope: &AccessScope,
    date: NaiveDate,
) -> Result<Vec<AttendanceRecord>, ApiError> {
    match scope {
        AccessScope::Center(center_id) => {
            let rows = store
                .query_partition::<ByDateEntry>(
                    Table::AttendanceByDate,
                    &by_date_partition(date, center_id),
                )
                .await?;

            Ok(rows
                .into_iter()
                .map(|e| AttendanceRecord::from_by_date(date, center_id, e.row_key, e.value))
                .collect())
        }
        AccessScope::Global => {
            let (from, to) = by_date_range(date);
            let rows = store
                .query_partition_range::<ByDateEntry>(Table::AttendanceByDate, &from, &to)
                .await?;

            Ok(rows
                .into_iter()
                .filter_map(|e| {
                    let Some(center_id) = center_from_partition(&e.partition_key, date) else {
                        warn!(partition_key = %e.partition_key, "Skipping malformed by-date key");
                        return None;
                    };
                    let center_id = center_id.to_string();
                    Some(AttendanceRecord::from_by_date(date, &center_id, e.row_key, e.value))
                })
                .collect())
        }
        AccessScope::Nothing => Err(ApiError::Forbidden("No center assigned".into())),
    }
}

/// A student's full history, most recent first.
pub async fn history_for_student(
    directory: &StudentDirectory,
    scope: &AccessScope,
    student_id: &str,
) -> Result<Vec<AttendanceRecord>, ApiError> {
    let student = directory
        .get(student_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Student {student_id} not found")))?;

    scope.check(&student.center_id)?;

    let rows = directory
        .store()
        .query_partition::<ByStudentEntry>(Table::AttendanceByStudent, student_id)
        .await?;

    let name = student.display_name();
    let mut records: Vec<AttendanceRecord> = rows
        .into_iter()
        .filter_map(|e| {
            let Some(date) = parse_day(&e.row_key) else {
                warn!(student_id, row_key = %e.row_key, "Skipping malformed by-student key");
                return None;
            };
            Some(AttendanceRecord {
                student_id: student.id.clone(),
                student_name: name.clone(),
                date,
                status: e.value.status,
                center_id: student.center_id.clone(),
                marked_by: Some(e.value.marked_by),
                marked_at: Some(e.value.marked_at),
            })
        })
        .collect();

    records.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(records)
}

/* =========================
Handlers
========================= */

/// Batch mark attendance for one day
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = MarkAttendanceRequest,
    responses(
        (status = 200, description = "Batch processed; inspect `errors` for rejected records", body = MarkAttendanceResult),
        (status = 400, description = "Missing or malformed date, or no records", body = Object, example = json!({
            "success": false,
            "error": "records must be a non-empty array"
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(
    name = "attendance_mark",
    skip(auth, directory, payload),
    fields(user_id = %auth.user_id, role = %auth.role)
)]
pub async fn mark_attendance(
    auth: AuthUser,
    directory: web::Data<StudentDirectory>,
    payload: web::Json<MarkAttendanceRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let date = required_day(payload.date.as_deref())?;

    let records = match payload.records {
        Some(r) if !r.is_empty() => r,
        _ => return Err(ApiError::BadRequest("records must be a non-empty array".into())),
    };

    let result = mark_batch(directory.get_ref(), &auth, date, &records).await;

    info!(
        %date,
        submitted = records.len(),
        saved = result.saved.len(),
        failed = result.errors.len(),
        "Attendance batch processed"
    );

    Ok(HttpResponse::Ok().json(ApiResponse::ok(result)))
}

/// Query attendance by date or by student
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Attendance records", body = [AttendanceRecord]),
        (status = 400, description = "Neither or both of date and studentId given"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Student belongs to another center"),
        (status = 404, description = "Student not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    store: web::Data<TableStore>,
    directory: web::Data<StudentDirectory>,
    query: web::Query<AttendanceQuery>,
) -> Result<HttpResponse, ApiError> {
    let date = query.date.as_deref().map(str::trim).filter(|d| !d.is_empty());
    let student_id = query
        .student_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let records = match (date, student_id) {
        (Some(raw), None) => {
            let date = required_day(Some(raw))?;
            roster_by_date(store.get_ref(), &auth.scope(), date).await?
        }
        (None, Some(student_id)) => {
            history_for_student(directory.get_ref(), &auth.scope(), student_id).await?
        }
        (None, None) => {
            return Err(ApiError::BadRequest("Provide either date or studentId".into()));
        }
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest(
                "Provide only one of date or studentId".into(),
            ));
        }
    };

    Ok(HttpResponse::Ok().json(ApiResponse::ok(records)))
}

/// Every accessible student with that day's status (or null)
#[utoipa::path(
    get,
    path = "/api/attendance/students",
    params(DayQuery),
    responses(
        (status = 200, description = "Daily roster", body = [RosterEntry]),
        (status = 400, description = "Malformed date"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No center assigned")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn attendance_students(
    auth: AuthUser,
    directory: web::Data<StudentDirectory>,
    query: web::Query<DayQuery>,
) -> Result<HttpResponse, ApiError> {
    let date = day_or_today(query.date.as_deref())?;
    let scope = auth.scope();

    let marks: HashMap<String, AttendanceStatus> =
        roster_by_date(directory.store(), &scope, date)
            .await?
            .into_iter()
            .map(|r| (r.student_id, r.status))
            .collect();

    let mut students: Vec<_> = directory
        .list_all()
        .await?
        .into_iter()
        .filter(|s| scope.allows(&s.center_id))
        .collect();
    students.sort_by(|a, b| {
        (a.last_name.as_str(), a.first_name.as_str()).cmp(&(b.last_name.as_str(), b.first_name.as_str()))
    });

    let roster: Vec<RosterEntry> = students
        .into_iter()
        .map(|s| RosterEntry {
            status: marks.get(&s.id).copied(),
            student_name: s.display_name(),
            student_id: s.id,
            center_id: s.center_id,
            date,
        })
        .collect();

    Ok(HttpResponse::Ok().json(ApiResponse::ok(roster)))
}

/// Per-center present/absent counts for one day.
pub fn summarize(records: &[AttendanceRecord]) -> Vec<CenterSummary> {
    let mut by_center: BTreeMap<&str, CenterSummary> = BTreeMap::new();

    for record in records {
        let entry = by_center
            .entry(record.center_id.as_str())
            .or_insert_with(|| CenterSummary {
                center_id: record.center_id.clone(),
                ..Default::default()
            });
        match record.status {
            AttendanceStatus::Present => entry.present += 1,
            AttendanceStatus::Absent => entry.absent += 1,
        }
        entry.total += 1;
    }

    by_center.into_values().collect()
}

/// Daily attendance summary per center
#[utoipa::path(
    get,
    path = "/api/attendance/summary",
    params(DayQuery),
    responses(
        (status = 200, description = "Counts per center", body = [CenterSummary]),
        (status = 400, description = "Malformed date"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No center assigned")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn attendance_summary(
    auth: AuthUser,
    store: web::Data<TableStore>,
    query: web::Query<DayQuery>,
) -> Result<HttpResponse, ApiError> {
    let date = day_or_today(query.date.as_deref())?;
    let records = roster_by_date(store.get_ref(), &auth.scope(), date).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(summarize(&records))))
}
