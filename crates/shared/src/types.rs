//! Common types used across MentorHub

use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Role of an account on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Mentee,
    Mentor,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Mentee
    }
}

impl UserRole {
    /// Check whether this account offers sessions
    pub fn is_mentor(&self) -> bool {
        matches!(self, Self::Mentor)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mentee => write!(f, "mentee"),
            Self::Mentor => write!(f, "mentor"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mentee" => Ok(Self::Mentee),
            "mentor" => Ok(Self::Mentor),
            _ => Err(format!("Invalid user role: {}", s)),
        }
    }
}

/// Identity provider an account signed up with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Credentials,
    Google,
    Github,
}

impl Default for AuthProvider {
    fn default() -> Self {
        Self::Credentials
    }
}

impl AuthProvider {
    /// Federated providers never authenticate with a local password
    pub fn is_federated(&self) -> bool {
        !matches!(self, Self::Credentials)
    }
}

impl std::fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Credentials => write!(f, "credentials"),
            Self::Google => write!(f, "google"),
            Self::Github => write!(f, "github"),
        }
    }
}

impl std::str::FromStr for AuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "credentials" => Ok(Self::Credentials),
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            _ => Err(format!("Invalid auth provider: {}", s)),
        }
    }
}

/// Lifecycle status of a mentorship session booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Rejected,
    Completed,
}

impl Default for BookingStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl BookingStatus {
    /// Only completed sessions are eligible for review
    pub fn is_reviewable(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Rejected => write!(f, "rejected"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "rejected" => Ok(Self::Rejected),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid booking status: {}", s)),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_default() {
        assert_eq!(UserRole::default(), UserRole::Mentee);
    }

    #[test]
    fn test_user_role_display_and_parse() {
        assert_eq!(format!("{}", UserRole::Mentor), "mentor");
        assert_eq!("mentee".parse::<UserRole>().unwrap(), UserRole::Mentee);
        assert_eq!("MENTOR".parse::<UserRole>().unwrap(), UserRole::Mentor);
        assert!("admin".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_user_role_is_mentor() {
        assert!(UserRole::Mentor.is_mentor());
        assert!(!UserRole::Mentee.is_mentor());
    }

    #[test]
    fn test_auth_provider_default() {
        assert_eq!(AuthProvider::default(), AuthProvider::Credentials);
    }

    #[test]
    fn test_auth_provider_federated() {
        assert!(!AuthProvider::Credentials.is_federated());
        assert!(AuthProvider::Google.is_federated());
        assert!(AuthProvider::Github.is_federated());
    }

    #[test]
    fn test_auth_provider_display_and_parse() {
        assert_eq!(format!("{}", AuthProvider::Github), "github");
        assert_eq!(
            "google".parse::<AuthProvider>().unwrap(),
            AuthProvider::Google
        );
        assert!("twitter".parse::<AuthProvider>().is_err());
    }

    #[test]
    fn test_booking_status_default() {
        assert_eq!(BookingStatus::default(), BookingStatus::Pending);
    }

    #[test]
    fn test_booking_status_reviewable() {
        assert!(BookingStatus::Completed.is_reviewable());
        assert!(!BookingStatus::Pending.is_reviewable());
        assert!(!BookingStatus::Confirmed.is_reviewable());
        assert!(!BookingStatus::Rejected.is_reviewable());
    }

    #[test]
    fn test_booking_status_display_and_parse() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Rejected,
            BookingStatus::Completed,
        ] {
            let round_trip: BookingStatus = status.to_string().parse().unwrap();
            assert_eq!(round_trip, status);
        }
        assert!("cancelled".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_booking_status_serde() {
        let json = serde_json::to_string(&BookingStatus::Confirmed).unwrap();
        assert_eq!(json, r#""confirmed""#);
        let status: BookingStatus = serde_json::from_str(r#""rejected""#).unwrap();
        assert_eq!(status, BookingStatus::Rejected);
    }
}
