use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Every student lives in this partition of the `Students` table.
pub const STUDENT_PARTITION: &str = "student";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StudentStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(
    example = json!({
        "id": "5b0c6f0e-4f7a-4c41-9d6e-0d4c2b8f3a11",
        "firstName": "Amina",
        "lastName": "Yusuf",
        "centerId": "center-north",
        "email": "amina@example.org",
        "status": "active",
        "enrolledAt": "2024-01-08",
        "createdAt": "2024-01-08T09:12:44Z"
    })
)]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub center_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub status: StudentStatus,
    #[schema(example = "2024-01-08", format = "date", value_type = String)]
    pub enrolled_at: NaiveDate,
    #[schema(example = "2024-01-08T09:12:44Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl Student {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
