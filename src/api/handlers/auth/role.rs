//! Role hierarchy for authorization checks.
//!
//! Roles form a total order; every permission check reduces to comparing
//! levels. Unknown or absent roles get level 0 and therefore pass no check.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    SuperAdmin,
    Editor,
    Viewer,
}

impl Role {
    /// Parse the stored role string. Unknown values map to `None` (level 0).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "super_admin" => Some(Self::SuperAdmin),
            "editor" => Some(Self::Editor),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }

    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::SuperAdmin => 3,
            Self::Editor => 2,
            Self::Viewer => 1,
        }
    }
}

/// Level lookup that treats unknown/absent roles as 0.
#[must_use]
pub const fn level_of(role: Option<Role>) -> u8 {
    match role {
        Some(role) => role.level(),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::{Role, level_of};

    #[test]
    fn parse_known_roles() {
        assert_eq!(Role::parse("super_admin"), Some(Role::SuperAdmin));
        assert_eq!(Role::parse("editor"), Some(Role::Editor));
        assert_eq!(Role::parse("viewer"), Some(Role::Viewer));
        assert_eq!(Role::parse(" VIEWER "), Some(Role::Viewer));
    }

    #[test]
    fn parse_unknown_is_none() {
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn levels_are_total_order() {
        assert!(Role::SuperAdmin.level() > Role::Editor.level());
        assert!(Role::Editor.level() > Role::Viewer.level());
        assert!(Role::Viewer.level() > level_of(None));
    }

    #[test]
    fn round_trip_as_str() {
        for role in [Role::SuperAdmin, Role::Editor, Role::Viewer] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }
}
