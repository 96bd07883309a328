//! Admin gate for destructive and administrative operations.
//!
//! The gate holds no state of its own: it asks its [`RoleSource`] for the
//! current role on every check, so a role change takes effect immediately.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{SequencerError, SequencerResult};

/// Role of the signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Operator,
    Local,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Operator => "Operator",
            Role::Local => "Local",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "operator" => Ok(Role::Operator),
            "local" => Ok(Role::Local),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
}

impl User {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            workspace: None,
        }
    }
}

/// Answers "who is acting right now".
pub trait RoleSource: Send + Sync {
    /// `None` when nobody is signed in.
    fn current_role(&self) -> Option<Role>;
}

/// A role that never changes.
#[derive(Debug, Clone, Copy)]
pub struct StaticRole(pub Role);

impl RoleSource for StaticRole {
    fn current_role(&self) -> Option<Role> {
        Some(self.0)
    }
}

/// The session user, shared with whatever handles sign-in.
#[derive(Debug, Clone, Default)]
pub struct SessionUser {
    user: Arc<RwLock<Option<User>>>,
}

impl SessionUser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_user(&self, user: Option<User>) {
        match self.user.write() {
            Ok(mut guard) => *guard = user,
            Err(poisoned) => *poisoned.into_inner() = user,
        }
    }

    pub fn user(&self) -> Option<User> {
        match self.user.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl RoleSource for SessionUser {
    fn current_role(&self) -> Option<Role> {
        self.user().map(|u| u.role)
    }
}

/// Refuses administrative operations for non-admin users.
#[derive(Clone)]
pub struct PermissionGate {
    source: Arc<dyn RoleSource>,
}

impl fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionGate")
            .field("role", &self.source.current_role())
            .finish()
    }
}

impl PermissionGate {
    pub fn new(source: Arc<dyn RoleSource>) -> Self {
        Self { source }
    }

    pub fn is_admin(&self) -> bool {
        self.source.current_role() == Some(Role::Admin)
    }

    /// Fail with `PermissionDenied` unless the current user is an admin.
    pub fn check(&self, action: &str) -> SequencerResult<()> {
        if self.is_admin() {
            return Ok(());
        }
        let role = self
            .source
            .current_role()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "anonymous".to_string());
        warn!(action, %role, "administrative action refused");
        Err(SequencerError::PermissionDenied(format!(
            "{action} requires the Admin role (current: {role})"
        )))
    }

    /// Run `op` only after the admin check passes.
    pub fn with_permission_check<T, F>(&self, action: &str, op: F) -> SequencerResult<T>
    where
        F: FnOnce() -> SequencerResult<T>,
    {
        self.check(action)?;
        op()
    }

    /// Async variant of [`PermissionGate::with_permission_check`]. The future
    /// is not even created when the check fails.
    pub async fn with_permission_check_async<T, F, Fut>(
        &self,
        action: &str,
        op: F,
    ) -> SequencerResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SequencerResult<T>>,
    {
        self.check(action)?;
        op().await
    }
}
