//! Authentication service models

pub mod session_hash;
pub mod user;

// Re-export for convenience
pub use session_hash::{Credential, NewSessionHash, SessionAction, SessionHash};
pub use user::{
    ConfirmRequest, EmailRequest, NewUser, RegisterRequest, ResetPasswordRequest, User,
    UserResponse,
};

use serde::Serialize;

/// Success envelope shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
