//! User, group and permission records.
//!
//! These are plain records; enforcing permissions is left to whatever
//! serves the store.

use crate::query::{Filterable, serialized_property};
use crate::MlgateError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    #[default]
    Regular,
}

/// The kind of resource a permission applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Model,
    User,
    Group,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::User => "user",
            Self::Group => "group",
        }
    }
}

/// The operation a permission grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Any,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Delete => "delete",
            Self::Any => "any",
        }
    }
}

/// Permission to apply `method` to a resource (or to all resources of a type
/// when `resource_id` is absent).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub resource_type: ResourceType,
    #[serde(default)]
    pub resource_id: Option<String>,
    pub method: Method,
}

impl Permission {
    /// Store key: `<type>-<id>-<method>`, with `all` for a missing id.
    pub fn key(&self) -> String {
        format!(
            "{}-{}-{}",
            self.resource_type.as_str(),
            self.resource_id.as_deref().unwrap_or("all"),
            self.method.as_str()
        )
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub role: Role,
    /// Names of the groups the user belongs to.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Result<Self, MlgateError> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(MlgateError::Validation(
                "username must not be empty".to_string(),
            ));
        }
        Ok(Self {
            username,
            email: None,
            full_name: None,
            disabled: false,
            role: Role::default(),
            groups: Vec::new(),
        })
    }
}

impl Filterable for User {
    fn identifier(&self) -> String {
        self.username.clone()
    }
    fn item_type(&self) -> String {
        "user".to_string()
    }
    fn property(&self, name: &str) -> Option<Value> {
        serialized_property(self, name)
    }
}

impl Filterable for Group {
    fn identifier(&self) -> String {
        self.name.clone()
    }
    fn item_type(&self) -> String {
        "group".to_string()
    }
    fn property(&self, name: &str) -> Option<Value> {
        serialized_property(self, name)
    }
}

impl Filterable for Permission {
    fn identifier(&self) -> String {
        self.key()
    }
    fn item_type(&self) -> String {
        "permission".to_string()
    }
    fn property(&self, name: &str) -> Option<Value> {
        serialized_property(self, name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::query::Filter;

    #[test]
    fn permission_key_format() {
        let p = Permission {
            resource_type: ResourceType::Model,
            resource_id: Some("m1".to_string()),
            method: Method::Get,
        };
        assert_eq!(p.key(), "model-m1-get");

        let any = Permission {
            resource_type: ResourceType::Group,
            resource_id: None,
            method: Method::Any,
        };
        assert_eq!(any.key(), "group-all-any");
    }

    #[test]
    fn users_are_filterable_by_role() {
        let mut user = User::new("ana").unwrap();
        user.role = Role::Admin;
        assert!(Filter::property("role", "admin").matches(&user));
        assert!(User::new(" ").is_err());
    }
}
