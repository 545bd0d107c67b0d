//! UseCase: ユーザーの作成・取得

use std::sync::Arc;

use crate::domain::{DisplayName, GatewayError, MemberId, User, UserRepository};

use super::error::{CreateUserError, QueryError};

/// ユーザー作成のユースケース
pub struct CreateUserUseCase {
    repository: Arc<dyn UserRepository>,
}

impl CreateUserUseCase {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    /// ユーザー名を検証してユーザーを作成
    pub async fn execute(&self, username: String) -> Result<User, CreateUserError> {
        let username = DisplayName::new(username)?;
        let user = self
            .repository
            .create_user(username)
            .await
            .map_err(|e| match e {
                GatewayError::AlreadyExists => CreateUserError::UsernameTaken,
                other => CreateUserError::Persistence(other),
            })?;
        tracing::info!("User '{}' ({}) created", user.id, user.username);
        Ok(user)
    }
}

/// ユーザー取得のユースケース
pub struct GetUserUseCase {
    repository: Arc<dyn UserRepository>,
}

impl GetUserUseCase {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(&self, user_id: MemberId) -> Result<User, QueryError> {
        Ok(self.repository.get_user(&user_id).await?)
    }
}
