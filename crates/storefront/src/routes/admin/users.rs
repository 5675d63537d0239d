//! Back-office user management.
//!
//! Admins cannot demote or delete themselves, so the back-office always
//! keeps at least the admin who is using it.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tracing::instrument;

use verdora_core::{Role, User, UserId, UserPatch};

use crate::data::DataError;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAdmin, Shopper};
use crate::models::Flash;
use crate::routes::{Chrome, redirect_with};
use crate::state::AppState;

/// User row for templates.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: &'static str,
    pub is_admin: bool,
    /// The signed-in admin's own row; role and delete controls are hidden.
    pub is_self: bool,
}

impl UserRow {
    fn new(user: &User, me: &UserId) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name.clone(),
            email: user.email.to_string(),
            role: user.role.as_str(),
            is_admin: user.is_admin(),
            is_self: &user.id == me,
        }
    }
}

/// Role change form data.
#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub role: String,
}

/// User listing template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/users.html")]
pub struct UsersTemplate {
    pub chrome: Chrome,
    pub users: Vec<UserRow>,
}

/// Why an admin may not apply `role` to `target`, if they may not.
fn role_change_refusal(me: &UserId, target: &UserId, role: Role) -> Option<&'static str> {
    (me == target && role != Role::Admin)
        .then_some("You cannot remove your own administrator role")
}

/// List users, admins first.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    shopper: Shopper,
) -> Result<impl IntoResponse, AppError> {
    let mut users = state.data().list_users().await?;
    users.sort_by(|a, b| {
        b.is_admin()
            .cmp(&a.is_admin())
            .then_with(|| a.name.cmp(&b.name))
    });

    Ok(UsersTemplate {
        chrome: Chrome::load(&state, &shopper, "/admin/users").await?,
        users: users.iter().map(|u| UserRow::new(u, &admin.id)).collect(),
    })
}

/// Change a user's role.
#[instrument(skip(state, admin, shopper), fields(admin_id = %admin.id))]
pub async fn update_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    shopper: Shopper,
    Path(id): Path<String>,
    Form(form): Form<RoleForm>,
) -> Result<Redirect, AppError> {
    let target = UserId::new(id);

    let role = match form.role.parse::<Role>() {
        Ok(role) => role,
        Err(message) => {
            return Ok(redirect_with(&shopper.session, Flash::error(message), "/admin/users").await);
        }
    };
    if let Some(refusal) = role_change_refusal(&admin.id, &target, role) {
        return Ok(redirect_with(&shopper.session, Flash::error(refusal), "/admin/users").await);
    }

    let patch = UserPatch {
        role: Some(role),
        ..UserPatch::default()
    };
    let flash = match state.data().update_user(&target, &patch).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, role = %role, "User role changed");
            Flash::success(format!("{} is now {}", user.name, role.as_str()))
        }
        Err(DataError::NotFound(_)) => Flash::error("That user no longer exists"),
        Err(e) => return Err(e.into()),
    };
    Ok(redirect_with(&shopper.session, flash, "/admin/users").await)
}

/// Delete a user. Their orders are kept.
#[instrument(skip(state, admin, shopper), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    shopper: Shopper,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let target = UserId::new(id);
    if target == admin.id {
        return Ok(redirect_with(
            &shopper.session,
            Flash::error("You cannot delete your own account"),
            "/admin/users",
        )
        .await);
    }

    let flash = match state.data().delete_user(&target).await {
        Ok(()) => {
            tracing::info!(user_id = %target, "User deleted");
            Flash::success("User deleted")
        }
        Err(DataError::NotFound(_)) => Flash::error("That user no longer exists"),
        Err(e) => return Err(e.into()),
    };
    Ok(redirect_with(&shopper.session, flash, "/admin/users").await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_cannot_demote_self() {
        let me = UserId::new("1");
        assert!(role_change_refusal(&me, &me, Role::User).is_some());
        assert!(role_change_refusal(&me, &me, Role::Admin).is_none());
        assert!(role_change_refusal(&me, &UserId::new("2"), Role::User).is_none());
    }

    #[test]
    fn test_user_row_marks_self() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": "1",
            "name": "Ada Admin",
            "email": "ada@example.com",
            "password": "$argon2id$stub",
            "role": "admin"
        }))
        .unwrap();
        let row = UserRow::new(&user, &UserId::new("1"));
        assert!(row.is_self);
        assert!(row.is_admin);
        assert_eq!(row.role, "admin");
        assert!(!UserRow::new(&user, &UserId::new("2")).is_self);
    }
}
