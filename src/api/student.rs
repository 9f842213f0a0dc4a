use crate::{
    auth::auth::{AccessScope, AuthUser},
    error::ApiError,
    model::{
        attendance::MAX_CENTER_ID_LEN,
        role::Role,
        student::{Student, StudentStatus},
    },
    models::ApiResponse,
    utils::student_directory::StudentDirectory,
};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudent {
    #[schema(example = "Amina")]
    pub first_name: String,
    #[schema(example = "Yusuf")]
    pub last_name: String,
    /// Required for admins; staff default to their own center
    #[schema(example = "center-north")]
    pub center_id: Option<String>,
    #[schema(example = "amina@example.org", format = "email")]
    pub email: Option<String>,
    #[schema(example = "2024-01-08", format = "date", value_type = Option<String>)]
    pub enrolled_at: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudent {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub center_id: Option<String>,
    pub email: Option<String>,
    pub status: Option<StudentStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StudentQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub center_id: Option<String>,
    pub status: Option<StudentStatus>,
    /// Matches first name, last name or email
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentListResponse {
    pub data: Vec<Student>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: usize,
}

fn non_empty(field: &str, value: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ApiError::BadRequest(format!("{field} must not be empty")))
    } else {
        Ok(value.to_string())
    }
}

fn clean_center(center_id: &str) -> Result<String, ApiError> {
    let center_id = non_empty("centerId", center_id)?;
    // centerId becomes part of the by-date partition key
    if center_id
        .chars()
        .any(|c| matches!(c, '/' | '\\' | '#' | '?' | '~') || c.is_control())
    {
        return Err(ApiError::BadRequest("centerId contains reserved characters".into()));
    }
    if center_id.len() > MAX_CENTER_ID_LEN {
        return Err(ApiError::BadRequest(format!(
            "centerId must be at most {MAX_CENTER_ID_LEN} bytes"
        )));
    }
    Ok(center_id)
}

/// Create Student
#[utoipa::path(
    post,
    path = "/api/students",
    request_body = CreateStudent,
    responses(
        (status = 201, description = "Student created", body = Student),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Center outside the caller's scope"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Student",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_student(
    auth: AuthUser,
    directory: web::Data<StudentDirectory>,
    payload: web::Json<CreateStudent>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();

    let center_id = match (auth.scope(), payload.center_id.as_deref()) {
        (AccessScope::Global, Some(c)) => clean_center(c)?,
        (AccessScope::Global, None) => {
            return Err(ApiError::BadRequest("centerId is required".into()));
        }
        (AccessScope::Center(own), None) => own,
        (AccessScope::Center(own), Some(c)) => {
            let c = clean_center(c)?;
            AccessScope::Center(own).check(&c)?;
            c
        }
        (AccessScope::Nothing, _) => {
            return Err(ApiError::Forbidden("No center assigned".into()));
        }
    };

    let now = Utc::now().trunc_subsecs(3);
    let student = Student {
        id: Uuid::new_v4().to_string(),
        first_name: non_empty("firstName", &payload.first_name)?,
        last_name: non_empty("lastName", &payload.last_name)?,
        center_id,
        email: payload.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()),
        status: StudentStatus::Active,
        enrolled_at: payload.enrolled_at.unwrap_or_else(|| now.date_naive()),
        created_at: now,
    };

    directory.save(&student).await.map_err(|e| {
        error!(error = %e, "Failed to create student");
        ApiError::from(e)
    })?;

    info!(student_id = %student.id, center_id = %student.center_id, "Student created");
    Ok(HttpResponse::Created().json(ApiResponse::ok(student)))
}

/// List Students
#[utoipa::path(
    get,
    path = "/api/students",
    params(StudentQuery),
    responses(
        (status = 200, description = "Paginated student list", body = StudentListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Center outside the caller's scope")
    ),
    tag = "Student",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_students(
    auth: AuthUser,
    directory: web::Data<StudentDirectory>,
    query: web::Query<StudentQuery>,
) -> Result<HttpResponse, ApiError> {
    let scope = auth.scope();
    if scope == AccessScope::Nothing {
        return Err(ApiError::Forbidden("No center assigned".into()));
    }
    if let Some(center_id) = &query.center_id {
        scope.check(center_id)?;
    }

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let search = query
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let mut students: Vec<Student> = directory
        .list_all()
        .await?
        .into_iter()
        .filter(|s| scope.allows(&s.center_id))
        .filter(|s| query.center_id.as_ref().is_none_or(|c| *c == s.center_id))
        .filter(|s| query.status.is_none_or(|st| st == s.status))
        .filter(|s| {
            search.as_ref().is_none_or(|needle| {
                s.first_name.to_lowercase().contains(needle)
                    || s.last_name.to_lowercase().contains(needle)
                    || s
                        .email
                        .as_ref()
                        .is_some_and(|e| e.to_lowercase().contains(needle))
            })
        })
        .collect();

    students.sort_by(|a, b| {
        (a.last_name.as_str(), a.first_name.as_str(), a.id.as_str())
            .cmp(&(b.last_name.as_str(), b.first_name.as_str(), b.id.as_str()))
    });

    let total = students.len();
    let offset = ((page - 1) as usize).saturating_mul(per_page as usize);
    let data = students
        .into_iter()
        .skip(offset)
        .take(per_page as usize)
        .collect();

    Ok(HttpResponse::Ok().json(StudentListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

async fn load_accessible(
    directory: &StudentDirectory,
    auth: &AuthUser,
    student_id: &str,
) -> Result<Student, ApiError> {
    let student = directory
        .get(student_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Student {student_id} not found")))?;

    auth.scope().check(&student.center_id)?;
    Ok(student)
}

/// Get Student by ID
#[utoipa::path(
    get,
    path = "/api/students/{student_id}",
    params(
        ("student_id", Path, description = "Student ID")
    ),
    responses(
        (status = 200, description = "Student found", body = Student),
        (status = 403, description = "Student belongs to another center"),
        (status = 404, description = "Student not found", body = Object, example = json!({
            "success": false,
            "error": "Student 42 not found"
        }))
    ),
    tag = "Student",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_student(
    auth: AuthUser,
    directory: web::Data<StudentDirectory>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let student = load_accessible(directory.get_ref(), &auth, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(student)))
}

/// Update Student
#[utoipa::path(
    put,
    path = "/api/students/{student_id}",
    params(
        ("student_id", Path, description = "Student ID")
    ),
    request_body = UpdateStudent,
    responses(
        (status = 200, description = "Student updated", body = Student),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Outside the caller's scope, or a staff move between centers"),
        (status = 404, description = "Student not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Student",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_student(
    auth: AuthUser,
    directory: web::Data<StudentDirectory>,
    path: web::Path<String>,
    payload: web::Json<UpdateStudent>,
) -> Result<HttpResponse, ApiError> {
    let mut student = load_accessible(directory.get_ref(), &auth, &path.into_inner()).await?;
    let changes = payload.into_inner();

    if let Some(first_name) = &changes.first_name {
        student.first_name = non_empty("firstName", first_name)?;
    }
    if let Some(last_name) = &changes.last_name {
        student.last_name = non_empty("lastName", last_name)?;
    }
    if let Some(email) = changes.email {
        let email = email.trim().to_string();
        student.email = (!email.is_empty()).then_some(email);
    }
    if let Some(status) = changes.status {
        student.status = status;
    }
    if let Some(center_id) = &changes.center_id {
        let center_id = clean_center(center_id)?;
        if center_id != student.center_id {
            if auth.role != Role::Admin {
                return Err(ApiError::Forbidden("Only admins can move students between centers".into()));
            }
            info!(student_id = %student.id, from = %student.center_id, to = %center_id, "Student moved");
            student.center_id = center_id;
        }
    }

    directory.save(&student).await.map_err(|e| {
        error!(error = %e, student_id = %student.id, "Failed to update student");
        ApiError::from(e)
    })?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(student)))
}
