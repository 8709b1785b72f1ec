//! Permission codename catalog.
//!
//! Codenames follow `{action}_{resource}`. Listing pets and species uses the
//! plural noun (`list_pets`, `list_species`); category kinds never do
//! (`list_category_size`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Group granted to administrators.
pub const ADMIN_GROUP: &str = "admin";
/// Group every registered user joins.
pub const USER_GROUP: &str = "user";

/// Action part of a codename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// List a collection.
    List,
    /// Create an item.
    Add,
    /// Modify an item.
    Update,
    /// Remove an item.
    Delete,
    /// Read a single item.
    View,
    /// Register an account.
    Register,
    /// Log in.
    Login,
}

impl Action {
    /// Codename prefix for this action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::View => "view",
            Self::Register => "register",
            Self::Login => "login",
        }
    }

    /// The five actions every category kind exposes.
    pub const CATEGORY: [Self; 5] = [Self::List, Self::Add, Self::Update, Self::Delete, Self::View];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category types. Each one is its own codename namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    /// Living environment.
    Environment,
    /// Health condition.
    Condition,
    /// Purpose of the animal.
    Purpose,
    /// Natural habitat.
    Habitat,
    /// Origin.
    Origin,
    /// Size class.
    Size,
    /// Age class.
    Age,
}

impl CategoryKind {
    /// All category kinds, in catalog order.
    pub const ALL: [Self; 7] = [
        Self::Environment,
        Self::Condition,
        Self::Purpose,
        Self::Habitat,
        Self::Origin,
        Self::Size,
        Self::Age,
    ];

    /// Lowercase name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Environment => "environment",
            Self::Condition => "condition",
            Self::Purpose => "purpose",
            Self::Habitat => "habitat",
            Self::Origin => "origin",
            Self::Size => "size",
            Self::Age => "age",
        }
    }

    /// Codename suffix shared by every permission on this kind.
    #[must_use]
    pub fn permission_prefix(self) -> String {
        format!("category_{}", self.as_str())
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A permission-gated resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "kind")]
pub enum Resource {
    /// Pets.
    Pet,
    /// Species.
    Specie,
    /// User accounts.
    User,
    /// One category kind.
    Category(CategoryKind),
}

impl Resource {
    /// App label used for the permission's content type.
    #[must_use]
    pub const fn app_label(self) -> &'static str {
        match self {
            Self::Pet => "pet",
            Self::Specie => "specie",
            Self::User => "user",
            Self::Category(_) => "category",
        }
    }

    /// Codename for `action` on this resource.
    #[must_use]
    pub fn codename(self, action: Action) -> String {
        match (self, action) {
            (Self::Pet, Action::List) => "list_pets".to_string(),
            (Self::Specie, Action::List) => "list_species".to_string(),
            (Self::Category(kind), action) => format!("{action}_{}", kind.permission_prefix()),
            (resource, action) => format!("{action}_{}", resource.app_label()),
        }
    }
}

/// One seeded permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Content type app label.
    pub app_label: String,
    /// Permission codename.
    pub codename: String,
}

impl CatalogEntry {
    fn new(resource: Resource, action: Action) -> Self {
        Self {
            app_label: resource.app_label().to_string(),
            codename: resource.codename(action),
        }
    }

    /// Human-readable permission name.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("Can {}", self.codename)
    }
}

/// Every permission in the seeded catalog.
#[must_use]
pub fn default_catalog() -> Vec<CatalogEntry> {
    let mut entries = vec![
        CatalogEntry::new(Resource::User, Action::Register),
        CatalogEntry::new(Resource::User, Action::Login),
        CatalogEntry::new(Resource::Specie, Action::List),
        CatalogEntry::new(Resource::Specie, Action::Add),
        CatalogEntry::new(Resource::Specie, Action::Update),
        CatalogEntry::new(Resource::Specie, Action::Delete),
        CatalogEntry::new(Resource::Pet, Action::Add),
        CatalogEntry::new(Resource::Pet, Action::List),
        CatalogEntry::new(Resource::Pet, Action::Update),
        CatalogEntry::new(Resource::Pet, Action::Delete),
    ];

    for kind in CategoryKind::ALL {
        for action in Action::CATEGORY {
            entries.push(CatalogEntry::new(Resource::Category(kind), action));
        }
    }

    entries
}

/// Default grants per group, as `(group, codenames)`.
///
/// `admin` and `user` receive the same baseline. Category writes and specie
/// writes are left to superusers or explicit grants.
#[must_use]
pub fn default_group_grants() -> Vec<(&'static str, Vec<String>)> {
    let mut baseline = vec![
        Resource::User.codename(Action::Register),
        Resource::User.codename(Action::Login),
        Resource::Specie.codename(Action::List),
        Resource::Pet.codename(Action::Add),
        Resource::Pet.codename(Action::List),
        Resource::Pet.codename(Action::Update),
        Resource::Pet.codename(Action::Delete),
    ];
    for kind in CategoryKind::ALL {
        baseline.push(Resource::Category(kind).codename(Action::List));
        baseline.push(Resource::Category(kind).codename(Action::View));
    }

    vec![(ADMIN_GROUP, baseline.clone()), (USER_GROUP, baseline)]
}
