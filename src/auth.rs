//! Bearer-token authentication for the API.
//!
//! Tokens are opaque strings stored on the users table. Handlers that need
//! a caller add a [`CurrentUser`] argument; extraction fails with a 401
//! when the header is missing or the token matches no user.

use axum::{RequestPartsExt, async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::error::ApiError;
use crate::handler::AppState;
use crate::model::User;
use crate::store::Store;

pub struct CurrentUser(pub User);

impl CurrentUser {
    /// Write access to a book: staff always, otherwise only the owner.
    pub fn can_modify(&self, owner_id: Option<i64>) -> bool {
        self.0.is_staff || owner_id == Some(self.0.id)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ApiError::Unauthenticated)?;

        let store = Store::new(&state.db);
        let user = store
            .find_user_by_token(bearer.token())
            .await?
            .ok_or(ApiError::Unauthenticated)?;

        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, is_staff: bool) -> CurrentUser {
        CurrentUser(User {
            id,
            username: format!("user{id}"),
            first_name: String::new(),
            last_name: String::new(),
            is_staff,
        })
    }

    #[test]
    fn owner_can_modify_own_book() {
        assert!(user(1, false).can_modify(Some(1)));
        assert!(!user(1, false).can_modify(Some(2)));
        assert!(!user(1, false).can_modify(None));
    }

    #[test]
    fn staff_can_modify_any_book() {
        assert!(user(1, true).can_modify(Some(2)));
        assert!(user(1, true).can_modify(None));
    }
}
