//! Singleton administrative record.

use serde::Serialize;
use sqlx::FromRow;

/// Integration settings for the catalog's admin front end.
///
/// Stored as the single row of `admin_details`. The password is kept for the
/// admin front end's own login check and is never serialized.
#[derive(Serialize, Clone, FromRow)]
pub struct AdminDetails {
    #[serde(skip_serializing)]
    pub password: String,

    pub public_key: String,

    pub service_id: String,

    pub template_id: String,
}

impl std::fmt::Debug for AdminDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminDetails")
            .field("password", &"<redacted>")
            .field("public_key", &self.public_key)
            .field("service_id", &self.service_id)
            .field("template_id", &self.template_id)
            .finish()
    }
}
