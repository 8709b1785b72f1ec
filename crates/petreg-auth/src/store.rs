//! Sled-backed storage for principals, groups and permissions.

use std::fmt::Display;
use std::path::Path;

use petreg_core::{ClientId, UserId};
use serde::{Serialize, de::DeserializeOwned};
use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, TransactionError};

use super::AuthError;
use super::models::{AuthContentType, AuthGroup, AuthPermission, Client, User};

/// Reads the resolvers need from the backing store.
///
/// Every call is a fresh read. Implementations must not cache membership,
/// so grant changes apply to the very next check.
pub trait AuthStore: Send + Sync {
    /// Load a client by integer ID.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn get_client(&self, id: ClientId) -> Result<Option<Client>, AuthError>;

    /// Load a user by ID.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn get_user(&self, id: UserId) -> Result<Option<User>, AuthError>;

    /// Codenames granted directly to a user.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn direct_permission_codenames(&self, user: UserId) -> Result<Vec<String>, AuthError>;

    /// IDs of the groups a user belongs to.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn group_ids_for_user(&self, user: UserId) -> Result<Vec<u64>, AuthError>;

    /// Codenames granted to a group.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn group_permission_codenames(&self, group_id: u64) -> Result<Vec<String>, AuthError>;
}

const IDX: &[u8] = b"idx:";

/// Auth store backed by sled.
///
/// Entities are JSON values keyed by ID, with `idx:` entries in the same
/// tree for unique lookups. Junction trees hold `{left}/{right}` keys with
/// empty values.
pub struct SledAuthStore {
    db: sled::Db,
    clients: sled::Tree,
    users: sled::Tree,
    groups: sled::Tree,
    permissions: sled::Tree,
    content_types: sled::Tree,
    user_groups: sled::Tree,
    user_permissions: sled::Tree,
    group_permissions: sled::Tree,
}

impl SledAuthStore {
    /// Open or create an auth store under the given directory.
    ///
    /// # Errors
    ///
    /// Returns error if database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, AuthError> {
        let db = sled::open(path.join("auth")).map_err(storage("Failed to open auth database"))?;
        Self::with_db(db)
    }

    /// Create a store over an existing sled database.
    ///
    /// # Errors
    ///
    /// Returns error if trees cannot be opened.
    pub fn with_db(db: sled::Db) -> Result<Self, AuthError> {
        let tree = |name: &str| {
            db.open_tree(name)
                .map_err(|e| AuthError::Storage(format!("Failed to open {name} tree: {e}")))
        };

        Ok(Self {
            clients: tree("clients")?,
            users: tree("users")?,
            groups: tree("groups")?,
            permissions: tree("permissions")?,
            content_types: tree("content_types")?,
            user_groups: tree("user_groups")?,
            user_permissions: tree("user_permissions")?,
            group_permissions: tree("group_permissions")?,
            db,
        })
    }

    /// Get the underlying sled database.
    #[must_use]
    pub const fn db(&self) -> &sled::Db {
        &self.db
    }

    fn next_id(&self) -> Result<u64, AuthError> {
        self.db.generate_id().map_err(storage("ID generation error"))
    }

    fn flush(&self) -> Result<(), AuthError> {
        self.db.flush().map_err(storage("Flush error"))?;
        Ok(())
    }

    // Clients

    /// Allocate the next client ID.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails or the ID space is exhausted.
    pub fn next_client_id(&self) -> Result<ClientId, AuthError> {
        let id = i64::try_from(self.next_id()?)
            .map_err(|_| AuthError::Storage("Client ID space exhausted".to_string()))?;
        Ok(ClientId::new(id))
    }

    /// Insert a new client.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the public client ID is taken.
    pub fn insert_client(&self, client: &Client) -> Result<(), AuthError> {
        let key = client.id.to_string();
        claim_index(
            &self.clients,
            &format!("idx:client_id:{}", client.client_id),
            key.as_bytes(),
            || format!("client {}", client.client_id),
        )?;
        put_json(&self.clients, key.as_bytes(), client)?;
        self.flush()
    }

    /// Look up a client by its public identifier.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get_client_by_public_id(&self, client_id: &str) -> Result<Option<Client>, AuthError> {
        match lookup_index(&self.clients, &format!("idx:client_id:{client_id}"))? {
            Some(id) => get_json(&self.clients, id.as_bytes()),
            None => Ok(None),
        }
    }

    /// Overwrite an existing client. The public identifier never changes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the client doesn't exist.
    pub fn update_client(&self, client: &Client) -> Result<(), AuthError> {
        let key = client.id.to_string();
        if !self
            .clients
            .contains_key(key.as_bytes())
            .map_err(storage("Get error"))?
        {
            return Err(AuthError::NotFound(format!("client {}", client.client_id)));
        }
        put_json(&self.clients, key.as_bytes(), client)?;
        self.flush()
    }

    /// List all clients.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list_clients(&self) -> Result<Vec<Client>, AuthError> {
        list_records(&self.clients)
    }

    // Users

    /// Check if any users exist.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn has_users(&self) -> Result<bool, AuthError> {
        Ok(self.users.first().map_err(storage("Iter error"))?.is_some())
    }

    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the email is taken.
    pub fn insert_user(&self, user: &User) -> Result<(), AuthError> {
        let key = user.id.to_string();
        claim_index(
            &self.users,
            &email_index(&user.email),
            key.as_bytes(),
            || format!("user {}", user.email),
        )?;
        put_json(&self.users, key.as_bytes(), user)?;
        self.flush()
    }

    /// Insert a new user together with one group membership.
    ///
    /// The record, its email index and the membership commit in a single
    /// transaction, so a failure leaves none of them behind.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the email is taken.
    pub fn insert_user_in_group(&self, user: &User, group_id: u64) -> Result<(), AuthError> {
        let key = user.id.to_string();
        let index = email_index(&user.email);
        let membership = format!("{}/{group_id}", user.id);
        let record = serde_json::to_vec(user).map_err(storage("Serialization error"))?;

        let result: Result<(), TransactionError<()>> = (&self.users, &self.user_groups)
            .transaction(|(users, user_groups)| {
                if users.get(index.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(()));
                }
                users.insert(index.as_bytes(), key.as_bytes())?;
                users.insert(key.as_bytes(), record.as_slice())?;
                user_groups.insert(membership.as_bytes(), sled::IVec::default())?;
                Ok(())
            });

        match result {
            Ok(()) => self.flush(),
            Err(TransactionError::Abort(())) => {
                Err(AuthError::Conflict(format!("user {}", user.email)))
            }
            Err(TransactionError::Storage(e)) => Err(storage("Transaction error")(e)),
        }
    }

    /// Look up a user by normalized email.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        match lookup_index(&self.users, &email_index(email))? {
            Some(id) => get_json(&self.users, id.as_bytes()),
            None => Ok(None),
        }
    }

    /// Overwrite an existing user, moving the email index if it changed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user doesn't exist, `Conflict` if the new
    /// email belongs to someone else.
    pub fn update_user(&self, user: &User) -> Result<(), AuthError> {
        let key = user.id.to_string();
        let existing = self
            .get_user(user.id)?
            .ok_or_else(|| AuthError::NotFound(format!("user {}", user.id)))?;

        if existing.email != user.email {
            claim_index(
                &self.users,
                &email_index(&user.email),
                key.as_bytes(),
                || format!("user {}", user.email),
            )?;
            self.users
                .remove(email_index(&existing.email).as_bytes())
                .map_err(storage("Index remove error"))?;
        }

        put_json(&self.users, key.as_bytes(), user)?;
        self.flush()
    }

    /// Delete a user along with their memberships and direct grants.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn delete_user(&self, id: UserId) -> Result<bool, AuthError> {
        let Some(user) = self.get_user(id)? else {
            return Ok(false);
        };

        self.clear_user_grants(id)?;
        self.users
            .remove(email_index(&user.email).as_bytes())
            .map_err(storage("Index remove error"))?;
        self.users
            .remove(id.to_string().as_bytes())
            .map_err(storage("Delete error"))?;
        self.flush()?;
        Ok(true)
    }

    /// List all users.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list_users(&self) -> Result<Vec<User>, AuthError> {
        list_records(&self.users)
    }

    // Groups, content types, permissions

    /// Create a group.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the name is taken.
    pub fn create_group(&self, name: &str) -> Result<AuthGroup, AuthError> {
        let group = AuthGroup {
            id: self.next_id()?,
            name: name.to_string(),
        };
        let key = group.id.to_string();
        claim_index(
            &self.groups,
            &format!("idx:name:{name}"),
            key.as_bytes(),
            || format!("group {name}"),
        )?;
        put_json(&self.groups, key.as_bytes(), &group)?;
        self.flush()?;
        Ok(group)
    }

    /// Look up a group by name.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get_group_by_name(&self, name: &str) -> Result<Option<AuthGroup>, AuthError> {
        match lookup_index(&self.groups, &format!("idx:name:{name}"))? {
            Some(id) => get_json(&self.groups, id.as_bytes()),
            None => Ok(None),
        }
    }

    /// List all groups.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list_groups(&self) -> Result<Vec<AuthGroup>, AuthError> {
        list_records(&self.groups)
    }

    /// Fetch the content type for `(app_label, model)`, creating it if absent.
    ///
    /// Returns the content type and whether it was created.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get_or_create_content_type(
        &self,
        app_label: &str,
        model: &str,
    ) -> Result<(AuthContentType, bool), AuthError> {
        let index = format!("idx:label:{app_label}:{model}");
        if let Some(id) = lookup_index(&self.content_types, &index)? {
            if let Some(existing) = get_json(&self.content_types, id.as_bytes())? {
                return Ok((existing, false));
            }
        }

        let content_type = AuthContentType {
            id: self.next_id()?,
            app_label: app_label.to_string(),
            model: model.to_string(),
        };
        let key = content_type.id.to_string();
        put_json(&self.content_types, key.as_bytes(), &content_type)?;
        self.content_types
            .insert(index.as_bytes(), key.as_bytes())
            .map_err(storage("Index error"))?;
        self.flush()?;
        Ok((content_type, true))
    }

    /// Create a permission.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the codename is taken.
    pub fn create_permission(
        &self,
        codename: &str,
        name: &str,
        content_type_id: u64,
    ) -> Result<AuthPermission, AuthError> {
        let permission = AuthPermission {
            id: self.next_id()?,
            name: name.to_string(),
            codename: codename.to_string(),
            content_type_id,
        };
        let key = permission.id.to_string();
        claim_index(
            &self.permissions,
            &codename_index(codename),
            key.as_bytes(),
            || format!("permission {codename}"),
        )?;
        put_json(&self.permissions, key.as_bytes(), &permission)?;
        self.flush()?;
        Ok(permission)
    }

    /// Look up a permission by codename.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get_permission_by_codename(
        &self,
        codename: &str,
    ) -> Result<Option<AuthPermission>, AuthError> {
        match lookup_index(&self.permissions, &codename_index(codename))? {
            Some(id) => self.get_permission(parse_id(&id)?),
            None => Ok(None),
        }
    }

    /// Look up a permission by ID.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get_permission(&self, id: u64) -> Result<Option<AuthPermission>, AuthError> {
        get_json(&self.permissions, id.to_string().as_bytes())
    }

    /// List all permissions.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list_permissions(&self) -> Result<Vec<AuthPermission>, AuthError> {
        list_records(&self.permissions)
    }

    // Associations

    /// Grant a permission to a group. Returns `false` if already granted.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn grant_group_permission(
        &self,
        group_id: u64,
        permission_id: u64,
    ) -> Result<bool, AuthError> {
        self.link(&self.group_permissions, group_id, permission_id)
    }

    /// Add a user to a group. Returns `false` if already a member.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn add_user_to_group(&self, user: UserId, group_id: u64) -> Result<bool, AuthError> {
        self.link(&self.user_groups, user, group_id)
    }

    /// Remove a user from a group. Returns `false` if not a member.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn remove_user_from_group(&self, user: UserId, group_id: u64) -> Result<bool, AuthError> {
        self.unlink(&self.user_groups, user, group_id)
    }

    /// Grant a permission directly to a user. Returns `false` if already held.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn grant_user_permission(
        &self,
        user: UserId,
        permission_id: u64,
    ) -> Result<bool, AuthError> {
        self.link(&self.user_permissions, user, permission_id)
    }

    /// Revoke a direct user permission. Returns `false` if it wasn't held.
    ///
    /// Group-inherited grants are unaffected.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn revoke_user_permission(
        &self,
        user: UserId,
        permission_id: u64,
    ) -> Result<bool, AuthError> {
        self.unlink(&self.user_permissions, user, permission_id)
    }

    /// Groups a user belongs to.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn user_groups(&self, user: UserId) -> Result<Vec<AuthGroup>, AuthError> {
        let mut groups = Vec::new();
        for id in linked_ids(&self.user_groups, user)? {
            if let Some(group) = get_json(&self.groups, id.to_string().as_bytes())? {
                groups.push(group);
            }
        }
        Ok(groups)
    }

    /// Permissions granted directly to a user.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn user_permissions(&self, user: UserId) -> Result<Vec<AuthPermission>, AuthError> {
        self.permissions_for(&self.user_permissions, user)
    }

    /// Permissions granted to a group.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn group_permissions(&self, group_id: u64) -> Result<Vec<AuthPermission>, AuthError> {
        self.permissions_for(&self.group_permissions, group_id)
    }

    /// Drop every group membership and direct grant of a user.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn clear_user_grants(&self, user: UserId) -> Result<(), AuthError> {
        for tree in [&self.user_groups, &self.user_permissions] {
            let prefix = format!("{user}/");
            for entry in tree.scan_prefix(prefix.as_bytes()) {
                let (key, _) = entry.map_err(storage("Iter error"))?;
                tree.remove(key).map_err(storage("Delete error"))?;
            }
        }
        self.flush()
    }

    fn link(&self, tree: &sled::Tree, left: impl Display, right: u64) -> Result<bool, AuthError> {
        let added = tree
            .insert(format!("{left}/{right}").as_bytes(), sled::IVec::default())
            .map_err(storage("Insert error"))?
            .is_none();
        self.flush()?;
        Ok(added)
    }

    fn unlink(&self, tree: &sled::Tree, left: impl Display, right: u64) -> Result<bool, AuthError> {
        let removed = tree
            .remove(format!("{left}/{right}").as_bytes())
            .map_err(storage("Delete error"))?
            .is_some();
        self.flush()?;
        Ok(removed)
    }

    fn permissions_for(
        &self,
        tree: &sled::Tree,
        left: impl Display,
    ) -> Result<Vec<AuthPermission>, AuthError> {
        let mut permissions = Vec::new();
        for id in linked_ids(tree, left)? {
            if let Some(permission) = self.get_permission(id)? {
                permissions.push(permission);
            }
        }
        Ok(permissions)
    }
}

impl AuthStore for SledAuthStore {
    fn get_client(&self, id: ClientId) -> Result<Option<Client>, AuthError> {
        get_json(&self.clients, id.to_string().as_bytes())
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>, AuthError> {
        get_json(&self.users, id.to_string().as_bytes())
    }

    fn direct_permission_codenames(&self, user: UserId) -> Result<Vec<String>, AuthError> {
        Ok(self
            .user_permissions(user)?
            .into_iter()
            .map(|p| p.codename)
            .collect())
    }

    fn group_ids_for_user(&self, user: UserId) -> Result<Vec<u64>, AuthError> {
        linked_ids(&self.user_groups, user)
    }

    fn group_permission_codenames(&self, group_id: u64) -> Result<Vec<String>, AuthError> {
        Ok(self
            .group_permissions(group_id)?
            .into_iter()
            .map(|p| p.codename)
            .collect())
    }
}

impl std::fmt::Debug for SledAuthStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledAuthStore")
            .field("clients", &self.clients.len())
            .field("users", &self.users.len())
            .field("groups", &self.groups.len())
            .finish_non_exhaustive()
    }
}

fn storage<E: Display>(context: &'static str) -> impl FnOnce(E) -> AuthError {
    move |e| AuthError::Storage(format!("{context}: {e}"))
}

fn email_index(email: &str) -> String {
    format!("idx:email:{email}")
}

fn codename_index(codename: &str) -> String {
    format!("idx:codename:{codename}")
}

fn get_json<T: DeserializeOwned>(tree: &sled::Tree, key: &[u8]) -> Result<Option<T>, AuthError> {
    match tree.get(key).map_err(storage("Get error"))? {
        Some(value) => serde_json::from_slice(&value)
            .map(Some)
            .map_err(storage("Deserialization error")),
        None => Ok(None),
    }
}

fn put_json<T: Serialize>(tree: &sled::Tree, key: &[u8], value: &T) -> Result<(), AuthError> {
    let bytes = serde_json::to_vec(value).map_err(storage("Serialization error"))?;
    tree.insert(key, bytes).map_err(storage("Insert error"))?;
    Ok(())
}

/// Atomically claim a unique index key, failing with `Conflict` if it is taken.
fn claim_index(
    tree: &sled::Tree,
    index_key: &str,
    id: &[u8],
    describe: impl FnOnce() -> String,
) -> Result<(), AuthError> {
    tree.compare_and_swap(index_key.as_bytes(), None::<&[u8]>, Some(id))
        .map_err(storage("Index error"))?
        .map_err(|_| AuthError::Conflict(describe()))
}

fn lookup_index(tree: &sled::Tree, index_key: &str) -> Result<Option<String>, AuthError> {
    Ok(tree
        .get(index_key.as_bytes())
        .map_err(storage("Index lookup error"))?
        .map(|id| String::from_utf8_lossy(&id).into_owned()))
}

fn list_records<T: DeserializeOwned>(tree: &sled::Tree) -> Result<Vec<T>, AuthError> {
    let mut records = Vec::new();
    for entry in tree.iter() {
        let (key, value) = entry.map_err(storage("Iter error"))?;
        if key.starts_with(IDX) {
            continue;
        }
        records.push(serde_json::from_slice(&value).map_err(storage("Deserialization error"))?);
    }
    Ok(records)
}

fn linked_ids(tree: &sled::Tree, left: impl Display) -> Result<Vec<u64>, AuthError> {
    let prefix = format!("{left}/");
    let mut ids = Vec::new();
    for entry in tree.scan_prefix(prefix.as_bytes()) {
        let (key, _) = entry.map_err(storage("Iter error"))?;
        let key = String::from_utf8_lossy(&key);
        if let Some(right) = key.strip_prefix(&prefix) {
            ids.push(parse_id(right)?);
        }
    }
    Ok(ids)
}

fn parse_id(raw: &str) -> Result<u64, AuthError> {
    raw.parse()
        .map_err(|e| AuthError::Storage(format!("Corrupt ID {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use pretty_assertions::assert_eq;

    fn user(email: &str) -> User {
        User::new(email, "hash".to_string())
    }

    #[test]
    fn test_user_crud() {
        let (_dir, store) = testing::store();
        assert!(!store.has_users().unwrap());

        let alice = user("alice@example.com");
        store.insert_user(&alice).unwrap();
        assert!(store.has_users().unwrap());

        let loaded = store.get_user(alice.id).unwrap().unwrap();
        assert_eq!(loaded.email, "alice@example.com");

        let by_email = store.get_user_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, alice.id);

        assert_eq!(store.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_email() {
        let (_dir, store) = testing::store();
        store.insert_user(&user("dup@example.com")).unwrap();

        let result = store.insert_user(&user("dup@example.com"));
        assert!(matches!(result, Err(AuthError::Conflict(_))));
        assert_eq!(store.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_insert_user_in_group_is_atomic() {
        let (_dir, store) = testing::store();
        let group = store.create_group("user").unwrap();

        let alice = user("alice@example.com");
        store.insert_user_in_group(&alice, group.id).unwrap();
        assert_eq!(store.user_groups(alice.id).unwrap(), vec![group.clone()]);
        assert_eq!(
            store.get_user_by_email("alice@example.com").unwrap().unwrap().id,
            alice.id
        );

        let clash = user("alice@example.com");
        let result = store.insert_user_in_group(&clash, group.id);
        assert!(matches!(result, Err(AuthError::Conflict(_))));
        assert!(store.get_user(clash.id).unwrap().is_none());
        assert!(store.user_groups(clash.id).unwrap().is_empty());
        assert_eq!(store.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_update_user_moves_email_index() {
        let (_dir, store) = testing::store();
        let mut alice = user("alice@example.com");
        store.insert_user(&alice).unwrap();
        store.insert_user(&user("bob@example.com")).unwrap();

        alice.email = "bob@example.com".to_string();
        assert!(matches!(
            store.update_user(&alice),
            Err(AuthError::Conflict(_))
        ));

        alice.email = "alice2@example.com".to_string();
        store.update_user(&alice).unwrap();
        assert!(store.get_user_by_email("alice@example.com").unwrap().is_none());
        assert_eq!(
            store
                .get_user_by_email("alice2@example.com")
                .unwrap()
                .unwrap()
                .id,
            alice.id
        );
    }

    #[test]
    fn test_update_missing_user() {
        let (_dir, store) = testing::store();
        let ghost = user("ghost@example.com");
        assert!(matches!(
            store.update_user(&ghost),
            Err(AuthError::NotFound(_))
        ));
    }

    #[test]
    fn test_client_crud() {
        let (_dir, store) = testing::store();
        let id = store.next_client_id().unwrap();
        let client = Client::new(id, "public-id", "hash".to_string());
        store.insert_client(&client).unwrap();

        assert_eq!(store.get_client(id).unwrap().unwrap().client_id, "public-id");
        assert_eq!(
            store.get_client_by_public_id("public-id").unwrap().unwrap().id,
            id
        );

        let other = Client::new(store.next_client_id().unwrap(), "public-id", "h".to_string());
        assert!(matches!(
            store.insert_client(&other),
            Err(AuthError::Conflict(_))
        ));
        assert_eq!(store.list_clients().unwrap().len(), 1);
    }

    #[test]
    fn test_client_ids_increase() {
        let (_dir, store) = testing::store();
        let a = store.next_client_id().unwrap();
        let b = store.next_client_id().unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_group_and_permission_uniqueness() {
        let (_dir, store) = testing::store();
        store.create_group("admin").unwrap();
        assert!(matches!(
            store.create_group("admin"),
            Err(AuthError::Conflict(_))
        ));

        let (ct, created) = store.get_or_create_content_type("pet", "add_pet").unwrap();
        assert!(created);
        let (again, created) = store.get_or_create_content_type("pet", "add_pet").unwrap();
        assert!(!created);
        assert_eq!(again, ct);

        store.create_permission("add_pet", "Can add_pet", ct.id).unwrap();
        assert!(matches!(
            store.create_permission("add_pet", "dup", ct.id),
            Err(AuthError::Conflict(_))
        ));
        assert_eq!(store.list_permissions().unwrap().len(), 1);
    }

    #[test]
    fn test_junctions() {
        let (_dir, store) = testing::store();
        let alice = user("alice@example.com");
        store.insert_user(&alice).unwrap();

        let group = store.create_group("user").unwrap();
        let (ct, _) = store.get_or_create_content_type("pet", "list_pets").unwrap();
        let list = store.create_permission("list_pets", "Can list_pets", ct.id).unwrap();
        let (ct, _) = store.get_or_create_content_type("pet", "delete_pet").unwrap();
        let delete = store.create_permission("delete_pet", "Can delete_pet", ct.id).unwrap();

        assert!(store.grant_group_permission(group.id, list.id).unwrap());
        assert!(!store.grant_group_permission(group.id, list.id).unwrap());
        assert!(store.add_user_to_group(alice.id, group.id).unwrap());
        assert!(store.grant_user_permission(alice.id, delete.id).unwrap());

        assert_eq!(store.group_ids_for_user(alice.id).unwrap(), vec![group.id]);
        assert_eq!(store.user_groups(alice.id).unwrap(), vec![group.clone()]);
        assert_eq!(
            store.group_permission_codenames(group.id).unwrap(),
            vec!["list_pets".to_string()]
        );
        assert_eq!(
            store.direct_permission_codenames(alice.id).unwrap(),
            vec!["delete_pet".to_string()]
        );

        assert!(store.revoke_user_permission(alice.id, delete.id).unwrap());
        assert!(!store.revoke_user_permission(alice.id, delete.id).unwrap());
        assert!(store.remove_user_from_group(alice.id, group.id).unwrap());
        assert!(store.group_ids_for_user(alice.id).unwrap().is_empty());
    }

    #[test]
    fn test_delete_user_clears_grants() {
        let (_dir, store) = testing::store();
        let alice = user("alice@example.com");
        store.insert_user(&alice).unwrap();
        let group = store.create_group("user").unwrap();
        store.add_user_to_group(alice.id, group.id).unwrap();

        assert!(store.delete_user(alice.id).unwrap());
        assert!(store.get_user(alice.id).unwrap().is_none());
        assert!(store.get_user_by_email("alice@example.com").unwrap().is_none());
        assert!(store.group_ids_for_user(alice.id).unwrap().is_empty());
        assert!(!store.delete_user(alice.id).unwrap());

        // Email is free again.
        store.insert_user(&user("alice@example.com")).unwrap();
    }

    #[test]
    fn test_reopen_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let alice = user("alice@example.com");
        {
            let store = SledAuthStore::open(dir.path()).unwrap();
            store.insert_user(&alice).unwrap();
        }
        let store = SledAuthStore::open(dir.path()).unwrap();
        assert!(store.get_user(alice.id).unwrap().is_some());
    }
}
