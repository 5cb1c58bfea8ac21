use serde::Serialize;

use super::business::SocialProfiles;

/// Result of enriching one website. `error` is only set when nothing usable
/// was found.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContactInfo {
    pub emails: Vec<String>,
    pub social_profiles: SocialProfiles,
    pub error: Option<String>,
}

impl ContactInfo {
    pub fn failed(reason: impl Into<String>) -> Self {
        ContactInfo {
            error: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty() && self.social_profiles.is_empty()
    }
}
