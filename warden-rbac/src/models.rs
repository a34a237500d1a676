//! Data models for the policy engine

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::roles::RoleSlug;

/// Prefix of resource keys that protect HTTP API routes
pub const API_RESOURCE_PREFIX: &str = "api:";

/// Prefix of resource keys that gate console menu entries
pub const MENU_RESOURCE_PREFIX: &str = "menu:";

/// Separator between resource and action in the administrative encoding
pub const PERMISSION_SEPARATOR: &str = ",";

/// Action granted on menu resources
pub const MENU_READ_ACTION: &str = "read";

/// Numeric user identifier
pub type UserId = u64;

/// Left-hand side of an authorization check
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Subject {
    User(UserId),
    Role(RoleSlug),
}

impl Subject {
    pub fn user(id: UserId) -> Self {
        Self::User(id)
    }

    pub fn role(slug: RoleSlug) -> Self {
        Self::Role(slug)
    }

    /// Subject string as stored in grant and membership tuples
    pub fn policy_key(&self) -> String {
        match self {
            Self::User(id) => id.to_string(),
            Self::Role(slug) => slug.as_str().to_string(),
        }
    }

    /// Decode a stored subject string: all digits is a user, anything else a role
    pub fn from_policy_key(key: &str) -> Self {
        if !key.is_empty() && key.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(id) = key.parse() {
                return Self::User(id);
            }
        }
        Self::Role(RoleSlug::from_policy_key(key))
    }

    pub fn is_role(&self) -> bool {
        matches!(self, Self::Role(_))
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{}", id),
            Self::Role(slug) => write!(f, "role:{}", slug),
        }
    }
}

/// Protected object, keyed by prefix plus the unmodified route path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    Api(String),
    Menu(String),
}

impl Resource {
    pub fn api(path: impl Into<String>) -> Self {
        Self::Api(path.into())
    }

    pub fn menu(path: impl Into<String>) -> Self {
        Self::Menu(path.into())
    }

    /// Resource key used for exact-string matching
    pub fn key(&self) -> String {
        match self {
            Self::Api(path) => format!("{}{}", API_RESOURCE_PREFIX, path),
            Self::Menu(path) => format!("{}{}", MENU_RESOURCE_PREFIX, path),
        }
    }
}

/// A `(resource, action)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    pub resource: String,
    pub action: String,
}

impl Permission {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// Permission to call an API route with the given HTTP method
    pub fn api(path: &str, method: &str) -> Self {
        Self::new(Resource::api(path).key(), method)
    }

    /// Permission to see a menu entry
    pub fn menu_read(path: &str) -> Self {
        Self::new(Resource::menu(path).key(), MENU_READ_ACTION)
    }

    /// Encode as `resource,action` for the administrative surface
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.resource, PERMISSION_SEPARATOR, self.action)
    }

    /// Decode `resource,action`; anything other than two non-empty parts is rejected
    pub fn decode(value: &str) -> Option<Self> {
        let parts: Vec<&str> = value.split(PERMISSION_SEPARATOR).collect();
        match parts.as_slice() {
            [resource, action] if !resource.is_empty() && !action.is_empty() => {
                Some(Self::new(*resource, *action))
            }
            _ => None,
        }
    }

    /// Menu path if this is a menu read grant
    pub fn readable_menu_path(&self) -> Option<&str> {
        if self.action != MENU_READ_ACTION {
            return None;
        }
        self.menu_path()
    }

    /// Menu path for any menu grant regardless of action
    pub fn menu_path(&self) -> Option<&str> {
        self.resource.strip_prefix(MENU_RESOURCE_PREFIX)
    }

    pub fn matches(&self, resource: &str, action: &str) -> bool {
        self.resource == resource && self.action == action
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Stored `(subject, resource, action)` grant record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrantTuple {
    pub subject: String,
    pub resource: String,
    pub action: String,
}

impl GrantTuple {
    pub fn new(subject: impl Into<String>, permission: Permission) -> Self {
        Self {
            subject: subject.into(),
            resource: permission.resource,
            action: permission.action,
        }
    }

    pub fn permission(&self) -> Permission {
        Permission::new(self.resource.clone(), self.action.clone())
    }
}

/// Stored `(user, role)` membership record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MembershipTuple {
    pub user: String,
    pub role: String,
}

impl MembershipTuple {
    pub fn new(user: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            role: role.into(),
        }
    }
}

/// Role record as held by the record store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: i64,
    pub slug: RoleSlug,
    pub display_name: String,
}

impl Role {
    pub fn new(id: i64, slug: RoleSlug, display_name: impl Into<String>) -> Self {
        Self {
            id,
            slug,
            display_name: display_name.into(),
        }
    }

    pub fn subject(&self) -> Subject {
        Subject::Role(self.slug.clone())
    }
}

/// Console menu entry
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MenuNode {
    pub id: i64,
    pub parent_id: i64,
    pub path: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub keep_alive: bool,
    pub hide_in_menu: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub weight: i32,
}

impl MenuNode {
    pub fn new(id: i64, parent_id: i64, path: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            parent_id,
            path: path.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }
}

/// Declared API route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRoute {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub name: String,
    pub path: String,
    pub method: String,
}

impl ApiRoute {
    pub fn new(group: &str, name: &str, path: &str, method: &str) -> Self {
        Self {
            id: 0,
            group: group.to_string(),
            name: name.to_string(),
            path: path.to_string(),
            method: method.to_string(),
        }
    }

    pub fn permission(&self) -> Permission {
        Permission::api(&self.path, &self.method)
    }
}
