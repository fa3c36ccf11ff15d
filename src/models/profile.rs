use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub profile_photo_url: String,
    pub is_seller: bool,
    pub created_at: i64,
}
