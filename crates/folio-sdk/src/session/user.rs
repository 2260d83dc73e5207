//! Merged user view and optimistic profile patches

use folio_client::{CustomInstructions, Profile, Session};
use serde::Serialize;

/// Session merged with its profile
///
/// Profile fields win over session fields where both exist. `username` is
/// always the local part of the session email, even when the profile row
/// stores its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub username: String,
    pub profile: Profile,
}

impl UserView {
    pub fn merge(session: &Session, profile: Profile) -> Self {
        Self {
            id: profile.id.clone().unwrap_or_else(|| session.id.clone()),
            email: profile.email.clone().unwrap_or_else(|| session.email.clone()),
            username: username_from_email(&session.email),
            profile,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.profile.is_subscribed
    }

    /// "First Last", falling back to the username
    pub fn display_name(&self) -> String {
        match (&self.profile.first_name, &self.profile.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.username.clone(),
        }
    }
}

/// Local part of an email address
pub fn username_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or_default().to_string()
}

/// Partial profile update; `None` leaves the field unchanged
///
/// Nullable columns take `Some(None)` to clear them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    pub is_subscribed: Option<bool>,
    pub stripe_customer: Option<Option<String>>,
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
    pub has_seen_tour: Option<bool>,
    pub has_seen_latest_update: Option<bool>,
    pub has_seen_community_banner: Option<bool>,
    pub interval: Option<Option<String>>,
    pub daily_free_token: Option<i64>,
    pub custom_instructions: Option<Option<CustomInstructions>>,
    pub editor_language: Option<Option<String>>,
}

impl ProfilePatch {
    pub fn apply_to(self, profile: &mut Profile) {
        if let Some(v) = self.is_subscribed {
            profile.is_subscribed = v;
        }
        if let Some(v) = self.stripe_customer {
            profile.stripe_customer = v;
        }
        if let Some(v) = self.first_name {
            profile.first_name = v;
        }
        if let Some(v) = self.last_name {
            profile.last_name = v;
        }
        if let Some(v) = self.has_seen_tour {
            profile.has_seen_tour = v;
        }
        if let Some(v) = self.has_seen_latest_update {
            profile.has_seen_latest_update = v;
        }
        if let Some(v) = self.has_seen_community_banner {
            profile.has_seen_community_banner = v;
        }
        if let Some(v) = self.interval {
            profile.interval = v;
        }
        if let Some(v) = self.daily_free_token {
            profile.daily_free_token = v;
        }
        if let Some(v) = self.custom_instructions {
            profile.custom_instructions = v;
        }
        if let Some(v) = self.editor_language {
            profile.editor_language = v;
        }
    }
}
