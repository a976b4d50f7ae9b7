use crate::UserId;

/// Known placeholder avatars the upstream serves for accounts without a real
/// picture. Rendering these looks broken, so they normalize to "no avatar".
const PLACEHOLDER_AVATAR_MARKERS: &[&str] = &["mystery-person", "mystery_person", "default-avatar"];

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct UserLite {
    pub id: UserId,
    pub username: String,
    pub avatar: Option<String>,
}

impl UserLite {
    pub fn new(id: UserId, username: impl Into<String>) -> UserLite {
        UserLite {
            id,
            username: username.into(),
            avatar: None,
        }
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> UserLite {
        self.avatar = normalize_avatar_ref(&avatar.into());
        self
    }
}

/// Vector-graphic avatars and the known placeholder URLs are not renderable
/// as profile pictures; treat them as absent.
pub fn normalize_avatar_ref(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    if lowered.ends_with(".svg") {
        return None;
    }
    if PLACEHOLDER_AVATAR_MARKERS.iter().any(|m| lowered.contains(m)) {
        return None;
    }
    Some(String::from(trimmed))
}
