use serde::{Deserialize, Serialize};

/// JWT claims issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// user id of the caller
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: String,
    /// Present only for center-scoped staff
    #[serde(rename = "centerId", default, skip_serializing_if = "Option::is_none")]
    pub center_id: Option<String>,
    pub exp: usize,
    pub jti: String,
}

/// Success envelope: `{ "success": true, "data": ... }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
