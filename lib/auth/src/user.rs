use serde::{Deserialize, Serialize};

use threadboard_utils::checks::check_username;
use threadboard_utils::errors::AppError;

/// Acting user, as supplied by the upstream session provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub username: String,
}

impl User {
    pub fn new(user_id: i64, username: &str) -> Result<Self, AppError> {
        check_username(username)?;
        Ok(User {
            user_id,
            username: String::from(username),
        })
    }

    /// Returns Ok if the user is the owner of the content created by `owner_id`, `AppError::Unauthorized` otherwise.
    pub fn check_is_owner(&self, owner_id: i64) -> Result<(), AppError> {
        match self.user_id == owner_id {
            true => Ok(()),
            false => Err(AppError::Unauthorized),
        }
    }
}

#[cfg(test)]
mod tests {
    use threadboard_utils::errors::AppError;

    use crate::user::User;

    #[test]
    fn test_user_new() {
        let user = User::new(1, "user").expect("Should create user.");
        assert_eq!(user.user_id, 1);
        assert_eq!(user.username, "user");
        assert!(matches!(User::new(1, ""), Err(AppError::ValidationError(_))));
        assert!(matches!(User::new(1, "invalid name"), Err(AppError::ValidationError(_))));
    }

    #[test]
    fn test_user_check_is_owner() {
        let user = User {
            user_id: 1,
            username: String::from("user"),
        };
        assert_eq!(user.check_is_owner(1), Ok(()));
        assert_eq!(user.check_is_owner(2), Err(AppError::Unauthorized));
    }
}
