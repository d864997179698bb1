#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Option<String>,
    pub is_staff: bool,
}

impl Actor {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            user_id: Some(id.into()),
            is_staff: false,
        }
    }

    pub fn staff() -> Self {
        Self {
            user_id: None,
            is_staff: true,
        }
    }

    pub fn is(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id)
    }

    pub fn can_manage(&self, owner_id: &str) -> bool {
        self.is_staff || self.is(owner_id)
    }
}
