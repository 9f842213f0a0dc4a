use crate::api::attendance::{
    CenterSummary, MarkAttendanceRequest, MarkAttendanceResult, MarkItem, RosterEntry,
};
use crate::api::reconcile::{ReconcileReport, ReconcileRequest};
use crate::api::student::{CreateStudent, StudentListResponse, UpdateStudent};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::student::{Student, StudentStatus};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "EduTrack API",
        version = "1.0.0",
        description = r#"
## EduTrack

Attendance and enrollment tracking for educational centers.

### Key Features
- **Attendance**
  - Batch mark a day's attendance, partial success per record
  - Day rosters per center and per-student history
  - Daily per-center summary and view reconciliation
- **Students**
  - Create, update, list and view students per center

### Security
Every endpoint requires a **JWT Bearer** token. `admin` callers see every
center; `staff` callers are limited to the center in their token.

### Response Format
`{ "success": true, "data": ... }` on success,
`{ "success": false, "error": "..." }` otherwise.
"#,
    ),
    paths(
        crate::api::attendance::mark_attendance,
        crate::api::attendance::list_attendance,
        crate::api::attendance::attendance_students,
        crate::api::attendance::attendance_summary,
        crate::api::reconcile::reconcile_attendance,

        crate::api::student::create_student,
        crate::api::student::list_students,
        crate::api::student::get_student,
        crate::api::student::update_student
    ),
    components(
        schemas(
            AttendanceRecord,
            AttendanceStatus,
            MarkItem,
            MarkAttendanceRequest,
            MarkAttendanceResult,
            RosterEntry,
            CenterSummary,
            ReconcileRequest,
            ReconcileReport,
            Student,
            StudentStatus,
            CreateStudent,
            UpdateStudent,
            StudentListResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Attendance marking and queries"),
        (name = "Student", description = "Student management APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
