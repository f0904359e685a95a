//! Admin authorization.

use crate::bot::transport::UserId;

/// Decides whether a user may perform privileged operations (uploads and
/// bulk deletes).
pub trait Authorizer: Send + Sync {
    fn is_admin(&self, user: UserId) -> bool;
}

/// Fixed admin list from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticAdminList {
    admins: Vec<UserId>,
}

impl StaticAdminList {
    pub fn new(admins: Vec<UserId>) -> Self {
        Self { admins }
    }
}

impl Authorizer for StaticAdminList {
    fn is_admin(&self, user: UserId) -> bool {
        self.admins.contains(&user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_check() {
        let auth = StaticAdminList::new(vec![11, 22]);
        assert!(auth.is_admin(11));
        assert!(!auth.is_admin(33));
        assert!(!StaticAdminList::default().is_admin(11));
    }
}
