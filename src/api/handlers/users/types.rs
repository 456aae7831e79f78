use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::handlers::auth::types::UserResponse;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserEnvelope {
    pub message: String,
    pub user: UserResponse,
}

impl UserEnvelope {
    pub fn new(message: &str, user: UserResponse) -> Self {
        Self {
            message: message.to_string(),
            user,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserListResponse {
    pub message: String,
    pub users: Vec<UserResponse>,
    pub count: usize,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UpdateRoleRequest {
    pub role: String,
    /// Required for evaluators to review; omitted or null clears it.
    #[serde(default)]
    pub department: Option<String>,
}
