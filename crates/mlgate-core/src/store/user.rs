//! # User Store
//!
//! Users, groups and permissions as three flat collections. A user may only
//! list groups that exist.

use crate::model::{Group, Permission, User};
use crate::primitives::USER_FOLDER;
use crate::query::Query;
use crate::storage::{Collection, StorageBackend};
use crate::store::{BoxedMapper, ResourceMapper, SessionState};
use crate::types::check_identifier;
use crate::uri::StoreUri;
use crate::MlgateError;
use tracing::{debug, warn};

const USERS: &str = "users";
const GROUPS: &str = "groups";
const PERMISSIONS: &str = "permissions";

fn collection(name: &'static str, endpoint: &'static str) -> Collection<'static> {
    #[cfg(not(feature = "remote"))]
    let _ = endpoint;
    Collection {
        name,
        fs_base: name,
        #[cfg(feature = "remote")]
        http_path: crate::storage::http::user_store_path(endpoint),
        #[cfg(not(feature = "remote"))]
        http_path: String::new(),
    }
}

/// A shareable handle to a user store.
#[derive(Debug, Clone)]
pub struct UserStore {
    uri: StoreUri,
    backend: StorageBackend,
}

/// Open the user store a URI selects.
pub fn create_user_store(uri: &str) -> Result<UserStore, MlgateError> {
    UserStore::open(&StoreUri::parse(uri)?, None)
}

impl UserStore {
    pub fn open(uri: &StoreUri, token: Option<&str>) -> Result<Self, MlgateError> {
        let backend =
            StorageBackend::open(uri, USER_FOLDER, &[USERS, GROUPS, PERMISSIONS], token)?;
        Ok(Self {
            uri: uri.clone(),
            backend,
        })
    }

    pub fn uri(&self) -> &StoreUri {
        &self.uri
    }

    pub fn session(&self) -> UserSession {
        UserSession {
            store: self.clone(),
            state: SessionState::default(),
        }
    }

    /// Run `f` in a session that is closed on every exit path.
    pub fn with_session<T>(
        &self,
        f: impl FnOnce(&mut UserSession) -> Result<T, MlgateError>,
    ) -> Result<T, MlgateError> {
        let mut session = self.session();
        let result = f(&mut session);
        let closed = session.close();
        let value = result?;
        closed?;
        Ok(value)
    }
}

pub struct UserSession {
    store: UserStore,
    state: SessionState,
}

impl UserSession {
    pub fn user_mapper(&self) -> Result<BoxedMapper<User>, MlgateError> {
        self.state.ensure_open("user")?;
        Ok(Box::new(UserMapper {
            inner: self.store.backend.mapper(collection(USERS, "user")),
            groups: self.store.backend.mapper(collection(GROUPS, "group")),
        }))
    }

    pub fn group_mapper(&self) -> Result<BoxedMapper<Group>, MlgateError> {
        self.state.ensure_open("user")?;
        Ok(self.store.backend.mapper(collection(GROUPS, "group")))
    }

    pub fn permission_mapper(&self) -> Result<BoxedMapper<Permission>, MlgateError> {
        self.state.ensure_open("user")?;
        Ok(self.store.backend.mapper(collection(PERMISSIONS, "permission")))
    }

    /// Close the session. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), MlgateError> {
        if !self.state.mark_closed() {
            return Ok(());
        }
        self.store.backend.check_alive()?;
        debug!(uri = %self.store.uri.uri, "user session closed");
        Ok(())
    }
}

impl Drop for UserSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(uri = %self.store.uri.uri, error = %e, "failed to close user session");
        }
    }
}

struct UserMapper {
    inner: BoxedMapper<User>,
    groups: BoxedMapper<Group>,
}

impl UserMapper {
    fn check(&mut self, user: &User) -> Result<(), MlgateError> {
        check_identifier("user", &user.username)?;
        for group in &user.groups {
            if !self.groups.exists(group)? {
                return Err(MlgateError::Validation(format!(
                    "user '{}' lists unknown group '{group}'",
                    user.username
                )));
            }
        }
        Ok(())
    }
}

impl ResourceMapper for UserMapper {
    type Resource = User;

    fn create(&mut self, user: User) -> Result<User, MlgateError> {
        self.check(&user)?;
        self.inner.create(user)
    }

    fn edit(&mut self, user: User) -> Result<User, MlgateError> {
        self.check(&user)?;
        self.inner.edit(user)
    }

    fn read(&mut self, key: &str) -> Result<User, MlgateError> {
        self.inner.read(key)
    }

    fn list(&mut self) -> Result<Vec<String>, MlgateError> {
        self.inner.list()
    }

    fn delete(&mut self, key: &str) -> Result<User, MlgateError> {
        self.inner.delete(key)
    }

    fn search(&mut self, query: &Query) -> Result<Vec<User>, MlgateError> {
        self.inner.search(query)
    }
}
