mod models;
mod queries;

pub use models::*;
pub use queries::looks_like_email;

use crate::platform::PlatformClient;

/// Typed access to the platform's logical tables.
///
/// All methods delegate to the hosted row API; there is no local database.
/// Cheap to clone. `as_user` scopes writes to a signed-in user's token so
/// the platform's row-level policies apply.
#[derive(Debug, Clone)]
pub struct Store {
    platform: PlatformClient,
}

impl Store {
    #[must_use]
    pub fn new(platform: PlatformClient) -> Self {
        Self { platform }
    }

    #[must_use]
    pub fn as_user(&self, access_token: &str) -> Self {
        Self {
            platform: self.platform.as_user(access_token),
        }
    }

    #[must_use]
    pub fn platform(&self) -> &PlatformClient {
        &self.platform
    }
}
