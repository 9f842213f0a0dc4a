use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    /// sees and marks attendance for every center
    Admin,
    /// restricted to one assigned center
    Staff,
}

impl Role {
    pub fn from_claim(role: &str) -> Option<Self> {
        role.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_claim_values() {
        assert_eq!(Role::from_claim("admin"), Some(Role::Admin));
        assert_eq!(Role::from_claim("Staff"), Some(Role::Staff));
        assert_eq!(Role::from_claim("student"), None);
        assert_eq!(Role::Staff.to_string(), "staff");
    }
}
