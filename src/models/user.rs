use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::Role;

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    #[serde(rename = "_id")]
    pub user_id: String,
}
