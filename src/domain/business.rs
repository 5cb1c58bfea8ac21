use serde::Serialize;

use super::contact::ContactInfo;

pub const NOT_AVAILABLE: &str = "N/A";
pub const MAX_EMAILS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialPlatform {
    Facebook,
    Instagram,
    Twitter,
    Linkedin,
    Youtube,
}

impl SocialPlatform {
    /// Label used in exports, e.g. `Facebook: https://...`.
    pub fn label(&self) -> &'static str {
        match self {
            SocialPlatform::Facebook => "Facebook",
            SocialPlatform::Instagram => "Instagram",
            SocialPlatform::Twitter => "Twitter",
            SocialPlatform::Linkedin => "Linkedin",
            SocialPlatform::Youtube => "Youtube",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocialLink {
    pub platform: SocialPlatform,
    pub url: String,
}

/// Platform to profile url, kept in the order the links were first seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SocialProfiles(Vec<SocialLink>);

impl SocialProfiles {
    /// Records `url` for `platform` unless that platform already has a link.
    /// Returns whether the link was kept.
    pub fn insert_first(&mut self, platform: SocialPlatform, url: String) -> bool {
        if self.contains(platform) {
            return false;
        }
        self.0.push(SocialLink { platform, url });
        true
    }

    pub fn contains(&self, platform: SocialPlatform) -> bool {
        self.0.iter().any(|link| link.platform == platform)
    }

    pub fn get(&self, platform: SocialPlatform) -> Option<&str> {
        self.0
            .iter()
            .find(|link| link.platform == platform)
            .map(|link| link.url.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SocialLink> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessRecord {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub category: String,
    pub website: String,
    pub rating: String,
    pub review_count: String,
    pub emails: Vec<String>,
    pub social_profiles: SocialProfiles,
}

impl BusinessRecord {
    pub fn has_website(&self) -> bool {
        !self.website.trim().is_empty() && self.website != NOT_AVAILABLE
    }

    /// Copies the enrichment result onto the record. Only emails and social
    /// profiles are touched.
    pub fn apply_contact_info(&mut self, info: &ContactInfo) {
        let mut emails: Vec<String> = Vec::with_capacity(MAX_EMAILS);
        for email in &info.emails {
            if emails.len() == MAX_EMAILS {
                break;
            }
            if !emails.contains(email) {
                emails.push(email.clone());
            }
        }
        self.emails = emails;
        self.social_profiles = info.social_profiles.clone();
    }
}
