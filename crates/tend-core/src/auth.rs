//! Auth collaborator: who is signed in.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::error::CoreError;

/// Current user, consumed read-only by the services to scope every query.
#[derive(Debug, Default)]
pub struct Session {
    user_id: RwLock<Option<Uuid>>,
}

impl Session {
    pub fn signed_in(user_id: Uuid) -> Self {
        Self {
            user_id: RwLock::new(Some(user_id)),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Uuid>> {
        self.user_id.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Uuid>> {
        self.user_id.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn user_id(&self) -> Option<Uuid> {
        *self.read()
    }

    pub fn require_user(&self) -> Result<Uuid, CoreError> {
        self.user_id().ok_or(CoreError::Unauthenticated)
    }

    pub fn sign_in(&self, user_id: Uuid) {
        *self.write() = Some(user_id);
    }

    pub fn sign_out(&self) {
        *self.write() = None;
    }
}
