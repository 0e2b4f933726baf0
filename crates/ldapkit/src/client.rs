//! Pooled directory client.

use crate::config::DirectoryConfig;
use crate::entry::{Entry, EntryWriter, MutableEntry};
use crate::request::{
    AddRequest, DeleteRequest, ModifyRequest, PasswordModifyRequest, WriteRequest,
};
use crate::schema::{RootDse, Schema, ROOT_DSE_ATTRIBUTES, SCHEMA_ATTRIBUTES};
use crate::search::{LdapEntry, SearchRequest, SearchScope, MATCH_ALL_FILTER};
use crate::session::{bind_as, LdapConnector, LdapSession, RealLdapConnector, SessionFactory};
use crate::Result;
use async_trait::async_trait;
use ldapkit_core::{BindCredentials, Error, PoolStatus, SessionPool};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Future returned by operations run through [`DirectoryClient::execute`].
pub type SessionFuture<'s, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 's>>;

/// Directory client holding a bounded pool of sessions bound as the configured identity.
#[derive(Clone)]
pub struct DirectoryClient {
    config: Arc<DirectoryConfig>,
    pool: SessionPool<SessionFactory>,
}

impl DirectoryClient {
    /// Creates a client that uses the real LDAP connector. No connection is opened until the
    /// first operation.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the pool settings are invalid.
    pub fn new(config: DirectoryConfig) -> Result<Self> {
        let config = Arc::new(config);
        let connector: Arc<dyn LdapConnector> = Arc::new(RealLdapConnector::new(config.clone()));
        Self::build(config, connector)
    }

    /// Creates a client and opens its first sessions.
    ///
    /// # Errors
    ///
    /// Returns the dial or bind error of the first session.
    pub async fn connect(config: DirectoryConfig) -> Result<Self> {
        let client = Self::new(config)?;
        drop(client.pool.get().await?);
        let opened = client.pool.warm_up().await;
        info!(url = %client.config.url(), sessions = opened, "connected to directory");
        Ok(client)
    }

    /// Creates a client dialing through a custom connector.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the pool settings are invalid.
    pub fn with_connector(
        config: DirectoryConfig,
        connector: Arc<dyn LdapConnector>,
    ) -> Result<Self> {
        Self::build(Arc::new(config), connector)
    }

    fn build(config: Arc<DirectoryConfig>, connector: Arc<dyn LdapConnector>) -> Result<Self> {
        let factory = SessionFactory::new(connector, config.clone());
        let pool = SessionPool::new(factory, config.pool().clone())?;
        Ok(Self { config, pool })
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Runs `operation` on a pooled session bound as the default identity.
    ///
    /// The session goes back to the pool whatever the outcome, unless the operation failed at
    /// the transport level, in which case it is discarded.
    ///
    /// ```ignore
    /// let dn = dn.to_string();
    /// client
    ///     .execute(move |session| Box::pin(async move { session.delete(&dn).await }))
    ///     .await?;
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the pool's checkout error or the operation's error.
    pub async fn execute<F, T>(&self, operation: F) -> Result<T>
    where
        F: for<'s> FnOnce(&'s mut dyn LdapSession) -> SessionFuture<'s, T> + Send,
        T: Send,
    {
        let mut session = self.pool.get().await?;
        let result = operation(&mut **session).await;
        if let Err(err) = &result {
            if is_session_fault(err) {
                debug!(error = %err, "discarding session after transport failure");
                session.retire_on_release();
            }
        }
        result
    }

    /// Runs `operation` on a pooled session rebound as `credentials`.
    ///
    /// The session is rebound to the default identity afterwards, including when the bind as
    /// `credentials` fails. If that rebind fails, or the call is cancelled before it happens,
    /// the session is discarded instead of returned.
    ///
    /// # Errors
    ///
    /// Returns the pool's checkout error, the bind error for `credentials`, or the
    /// operation's error.
    pub async fn execute_as<F, T>(&self, credentials: &BindCredentials, operation: F) -> Result<T>
    where
        F: for<'s> FnOnce(&'s mut dyn LdapSession) -> SessionFuture<'s, T> + Send,
        T: Send,
    {
        let mut session = self.pool.get().await?;
        session.retire_on_release();

        let result = match bind_as(&mut **session, credentials).await {
            Ok(()) => operation(&mut **session).await,
            Err(err) => Err(err),
        };

        match bind_as(&mut **session, self.config.credentials()).await {
            Ok(()) => session.keep(),
            Err(err) => warn!(
                bind_dn = %self.config.credentials().bind_dn(),
                error = %err,
                "failed to restore default identity, discarding session"
            ),
        }
        result
    }

    /// Verifies that `dn` can bind with `password`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentials`] if the server rejects the bind.
    pub async fn check_bind(&self, dn: &str, password: &str) -> Result<()> {
        let credentials = BindCredentials::new(dn, password);
        self.execute_as(&credentials, |_| Box::pin(async { Ok(()) }))
            .await
    }

    /// Runs a search.
    ///
    /// # Errors
    ///
    /// Returns the server's error for the search.
    pub async fn search(&self, request: SearchRequest) -> Result<Vec<LdapEntry>> {
        self.execute(move |session| Box::pin(async move { session.search(&request).await }))
            .await
    }

    /// Runs a search with the paged results control, collecting every page.
    ///
    /// # Errors
    ///
    /// Returns the server's error for the search.
    pub async fn search_paged(
        &self,
        request: SearchRequest,
        page_size: i32,
    ) -> Result<Vec<LdapEntry>> {
        self.execute(move |session| {
            Box::pin(async move { session.search_paged(&request, page_size).await })
        })
        .await
    }

    /// Subtree search returning entries ready for editing.
    ///
    /// # Errors
    ///
    /// Returns the server's error for the search.
    pub async fn quick_search(
        &self,
        base: &str,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<Entry>> {
        let request = SearchRequest::new(base, SearchScope::Subtree, filter)
            .attributes(attributes.iter().copied());
        let entries = self.search(request).await?;
        Ok(entries.into_iter().map(Entry::from).collect())
    }

    /// Reads the entry named `dn`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no such entry exists.
    pub async fn lookup(&self, dn: &str) -> Result<Entry> {
        let entries = self.search(SearchRequest::base_object(dn)).await?;
        entries
            .into_iter()
            .next()
            .map(Entry::from)
            .ok_or_else(|| Error::NotFound(format!("entry `{dn}` not found")))
    }

    /// Reads the entry named `dn`, or returns a fresh entry that creates it on commit.
    ///
    /// # Errors
    ///
    /// Returns any lookup error other than not-found.
    pub async fn lookup_or_create(&self, dn: &str) -> Result<Entry> {
        match self.lookup(dn).await {
            Ok(entry) => Ok(entry),
            Err(err) if err.is_not_found() => {
                debug!(dn = %dn, "entry not found, starting a new one");
                Ok(Entry::new(dn))
            }
            Err(err) => Err(err),
        }
    }

    /// Finds the single entry under `base` matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MultipleMatches`] if more than one entry matches.
    pub async fn find_one(
        &self,
        base: &str,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Option<Entry>> {
        let request = SearchRequest::new(base, SearchScope::Subtree, filter)
            .attributes(attributes.iter().copied());
        let mut entries = self.search(request).await?;
        match entries.len() {
            0 => Ok(None),
            1 => Ok(entries.pop().map(Entry::from)),
            count => Err(Error::MultipleMatches {
                base: base.to_string(),
                filter: filter.to_string(),
                count,
            }),
        }
    }

    /// Commits `entry` through this client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DoubleCommit`] for an already committed entry, or the write's error.
    pub async fn commit(&self, entry: &mut Entry) -> Result<()> {
        entry.commit(self).await
    }

    /// Same as [`commit`](Self::commit).
    ///
    /// # Errors
    ///
    /// See [`commit`](Self::commit).
    pub async fn update(&self, entry: &mut Entry) -> Result<()> {
        self.commit(entry).await
    }

    /// Loads or creates `dn`, applies `transform`, and commits if anything changed.
    ///
    /// Returns true if a write was issued.
    ///
    /// # Errors
    ///
    /// Returns the lookup error, the transform's error, or the write's error.
    pub async fn update_entry<F>(&self, dn: &str, transform: F) -> Result<bool>
    where
        F: FnOnce(&mut Entry) -> Result<()> + Send,
    {
        let mut entry = self.lookup_or_create(dn).await?;
        transform(&mut entry)?;
        if !entry.is_changed() {
            debug!(dn = %dn, "entry already up to date");
            return Ok(false);
        }
        self.commit(&mut entry).await?;
        Ok(true)
    }

    /// Creates an entry.
    ///
    /// # Errors
    ///
    /// Returns the server's error, e.g. result code 68 if the entry exists.
    pub async fn add(&self, request: AddRequest) -> Result<()> {
        let dn = request.dn().to_string();
        self.execute(move |session| Box::pin(async move { session.add(&request).await }))
            .await?;
        info!(dn = %dn, "added entry");
        Ok(())
    }

    /// Applies a modify request.
    ///
    /// # Errors
    ///
    /// Returns the server's error.
    pub async fn modify(&self, request: ModifyRequest) -> Result<()> {
        let dn = request.dn().to_string();
        let steps = request.modifications().len();
        self.execute(move |session| Box::pin(async move { session.modify(&request).await }))
            .await?;
        info!(dn = %dn, steps, "modified entry");
        Ok(())
    }

    /// Deletes an entry.
    ///
    /// # Errors
    ///
    /// Returns the server's error, e.g. [`Error::NotFound`].
    pub async fn delete(&self, request: DeleteRequest) -> Result<()> {
        let dn = request.dn().to_string();
        self.execute(move |session| Box::pin(async move { session.delete(request.dn()).await }))
            .await?;
        info!(dn = %dn, "deleted entry");
        Ok(())
    }

    /// Asks the server whether `attribute` of `dn` holds `value`.
    ///
    /// # Errors
    ///
    /// Returns the server's error.
    pub async fn compare(&self, dn: &str, attribute: &str, value: &str) -> Result<bool> {
        let (dn, attribute, value) = (dn.to_string(), attribute.to_string(), value.to_string());
        self.execute(move |session| {
            Box::pin(async move { session.compare(&dn, &attribute, &value).await })
        })
        .await
    }

    /// Changes a password through the password modify extended operation.
    ///
    /// Returns the password the server generated when the request carried no new one.
    ///
    /// # Errors
    ///
    /// Returns the server's error, e.g. result code 53 if its password policy refuses the change.
    pub async fn password_modify(&self, request: PasswordModifyRequest) -> Result<Option<String>> {
        let user = request.user_identity().unwrap_or_default().to_string();
        let generated = self
            .execute(move |session| {
                Box::pin(async move { session.password_modify(&request).await })
            })
            .await?;
        info!(user = %user, generated = generated.is_some(), "modified password");
        Ok(generated)
    }

    /// Reads the root DSE.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the server hides its root DSE.
    pub async fn root_dse(&self) -> Result<RootDse> {
        let entries = self
            .search(SearchRequest::root_dse(ROOT_DSE_ATTRIBUTES.iter().copied()))
            .await?;
        entries
            .first()
            .map(RootDse::from)
            .ok_or_else(|| Error::NotFound("root DSE not readable".to_string()))
    }

    /// Reads the schema published by the root DSE's subschema entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no subschema entry is advertised or readable.
    pub async fn schema(&self) -> Result<Schema> {
        let subschema = self
            .root_dse()
            .await?
            .subschema_subentry
            .ok_or_else(|| Error::NotFound("no subschema entry advertised".to_string()))?;

        let request = SearchRequest::new(subschema.as_str(), SearchScope::Base, MATCH_ALL_FILTER)
            .attributes(SCHEMA_ATTRIBUTES.iter().copied());
        let entries = self.search(request).await?;
        entries
            .first()
            .map(Schema::from)
            .ok_or_else(|| Error::NotFound(format!("subschema entry `{subschema}` not found")))
    }

    /// Opens sessions up to the pool's minimum; returns how many were opened.
    pub async fn warm_up(&self) -> usize {
        self.pool.warm_up().await
    }

    /// Pool occupancy.
    #[must_use]
    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Closes idle sessions and rejects further checkouts.
    pub async fn close(&self) {
        self.pool.close().await;
        info!(url = %self.config.url(), "directory client closed");
    }
}

#[async_trait]
impl EntryWriter for DirectoryClient {
    async fn write(&self, request: WriteRequest) -> Result<()> {
        match request {
            WriteRequest::Add(request) => self.add(request).await,
            WriteRequest::Modify(request) => self.modify(request).await,
            WriteRequest::Delete(request) => self.delete(request).await,
        }
    }
}

fn is_session_fault(err: &Error) -> bool {
    matches!(err, Error::ConnectionError(_) | Error::Timeout(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryState;
    use crate::request::DirectoryModification;
    use crate::session::{MockLdapConnector, MockLdapSession};
    use std::collections::HashMap;

    const ADMIN_DN: &str = "cn=admin,dc=example,dc=com";

    fn sample_config() -> DirectoryConfig {
        DirectoryConfig::new(
            "ldap://ldap.example.com",
            BindCredentials::new(ADMIN_DN, "secret"),
        )
        .unwrap()
    }

    fn sample_entry(dn: &str, attributes: &[(&str, &[&str])]) -> LdapEntry {
        LdapEntry {
            dn: dn.to_string(),
            attributes: attributes
                .iter()
                .map(|(name, values)| {
                    (
                        (*name).to_string(),
                        values.iter().map(ToString::to_string).collect(),
                    )
                })
                .collect::<HashMap<_, _>>(),
        }
    }

    fn admin_session() -> MockLdapSession {
        let mut session = MockLdapSession::new();
        session
            .expect_simple_bind()
            .withf(|dn, password| dn == ADMIN_DN && password == "secret")
            .returning(|_, _| Ok(()));
        session
    }

    fn client_with(session: MockLdapSession) -> DirectoryClient {
        let mut connector = MockLdapConnector::new();
        connector
            .expect_connect()
            .times(1)
            .return_once(move || Ok(Box::new(session)));
        DirectoryClient::with_connector(sample_config(), Arc::new(connector)).unwrap()
    }

    #[tokio::test]
    async fn lookup_reads_base_object() {
        let mut session = admin_session();
        session
            .expect_search()
            .withf(|request| {
                request.base() == "uid=jdoe,dc=example,dc=com"
                    && request.scope() == SearchScope::Base
                    && request.entry_limit() == 1
            })
            .returning(|request| {
                Ok(vec![sample_entry(
                    request.base(),
                    &[("uid", &["jdoe"]), ("mail", &["jdoe@example.com"])],
                )])
            });

        let client = client_with(session);
        let entry = client.lookup("uid=jdoe,dc=example,dc=com").await.unwrap();
        assert_eq!(entry.state(), EntryState::Existing);
        assert_eq!(entry.value("MAIL"), Some("jdoe@example.com"));
        assert_eq!(client.pool_status().idle, 1);
    }

    #[tokio::test]
    async fn lookup_or_create_branches_on_not_found() {
        let mut session = admin_session();
        session
            .expect_search()
            .returning(|_| Err(Error::from_result_code(32, "no such object")));

        let client = client_with(session);
        let err = client.lookup("cn=missing").await.unwrap_err();
        assert!(err.is_not_found());

        let entry = client.lookup_or_create("cn=missing").await.unwrap();
        assert_eq!(entry.state(), EntryState::New);
        assert_eq!(entry.dn(), "cn=missing");
    }

    #[tokio::test]
    async fn lookup_or_create_propagates_other_errors() {
        let mut session = admin_session();
        session
            .expect_search()
            .returning(|_| Err(Error::from_result_code(50, "insufficient access")));

        let client = client_with(session);
        let err = client.lookup_or_create("cn=secret").await.unwrap_err();
        assert_eq!(err.result_code(), Some(50));
    }

    #[tokio::test]
    async fn find_one_distinguishes_match_counts() {
        let mut session = admin_session();
        let mut sequence = mockall::Sequence::new();
        session
            .expect_search()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(Vec::new()));
        session
            .expect_search()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(vec![sample_entry("uid=a,dc=x", &[("uid", &["a"])])]));
        session
            .expect_search()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| {
                Ok(vec![
                    sample_entry("uid=a,dc=x", &[]),
                    sample_entry("uid=b,dc=x", &[]),
                ])
            });

        let client = client_with(session);
        assert!(client
            .find_one("dc=x", "(uid=z)", &[])
            .await
            .unwrap()
            .is_none());

        let entry = client.find_one("dc=x", "(uid=a)", &["uid"]).await.unwrap();
        assert_eq!(entry.unwrap().dn(), "uid=a,dc=x");

        let err = client
            .find_one("dc=x", "(objectClass=person)", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MultipleMatches { count: 2, .. }));
    }

    #[tokio::test]
    async fn commit_sends_ordered_modify() {
        let mut session = admin_session();
        session
            .expect_search()
            .returning(|_| Ok(vec![sample_entry("cn=staff,dc=x", &[("member", &["uid=a"])])]));
        session
            .expect_modify()
            .withf(|request| {
                request.dn() == "cn=staff,dc=x"
                    && request.modifications()
                        == [
                            DirectoryModification::Add {
                                attribute: "member".to_string(),
                                values: vec!["uid=b".to_string()],
                            },
                            DirectoryModification::Delete {
                                attribute: "member".to_string(),
                                values: vec!["uid=a".to_string()],
                            },
                        ]
            })
            .times(1)
            .returning(|_| Ok(()));

        let client = client_with(session);
        let mut entry = client.lookup("cn=staff,dc=x").await.unwrap();
        entry.sync_values("member", ["uid=b"]);
        client.commit(&mut entry).await.unwrap();

        let err = client.update(&mut entry).await.unwrap_err();
        assert!(matches!(err, Error::DoubleCommit(_)));
    }

    #[tokio::test]
    async fn update_entry_skips_unchanged_entry() {
        let mut session = admin_session();
        session
            .expect_search()
            .returning(|_| Ok(vec![sample_entry("ou=People,dc=x", &[("ou", &["People"])])]));
        session.expect_modify().never();

        let client = client_with(session);
        let written = client
            .update_entry("ou=People,dc=x", |entry| {
                entry.add_value("ou", "People");
                Ok(())
            })
            .await
            .unwrap();
        assert!(!written);
    }

    #[tokio::test]
    async fn update_entry_creates_missing_entry() {
        let mut session = admin_session();
        session
            .expect_search()
            .returning(|_| Err(Error::from_result_code(32, "no such object")));
        session
            .expect_add()
            .withf(|request| {
                request.dn() == "ou=Groups,dc=x"
                    && request.values("objectclass")
                        == Some(&["top".to_string(), "organizationalUnit".to_string()][..])
            })
            .times(1)
            .returning(|_| Ok(()));

        let client = client_with(session);
        let written = client
            .update_entry("ou=Groups,dc=x", |entry| {
                entry.add_values("objectclass", ["top", "organizationalUnit"]);
                entry.add_value("ou", "Groups");
                Ok(())
            })
            .await
            .unwrap();
        assert!(written);
    }

    #[tokio::test]
    async fn update_entry_propagates_transform_error() {
        let mut session = admin_session();
        session.expect_search().returning(|_| Ok(Vec::new()));

        let client = client_with(session);
        let err = client
            .update_entry("cn=x", |_| Err(Error::InvalidRequest("rejected".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn execute_as_rebinds_to_default_identity() {
        let mut session = MockLdapSession::new();
        let mut sequence = mockall::Sequence::new();
        session
            .expect_simple_bind()
            .withf(|dn, _| dn == ADMIN_DN)
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(()));
        session
            .expect_simple_bind()
            .withf(|dn, password| dn == "uid=jdoe,dc=x" && password == "hunter2")
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(()));
        session
            .expect_compare()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _| Ok(true));
        session
            .expect_simple_bind()
            .withf(|dn, _| dn == ADMIN_DN)
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(()));

        let client = client_with(session);
        let credentials = BindCredentials::new("uid=jdoe,dc=x", "hunter2");
        let matched = client
            .execute_as(&credentials, |session| {
                Box::pin(async move { session.compare("uid=jdoe,dc=x", "uid", "jdoe").await })
            })
            .await
            .unwrap();
        assert!(matched);
        assert_eq!(client.pool_status().idle, 1);
    }

    #[tokio::test]
    async fn execute_as_discards_session_when_rebind_fails() {
        let mut first = MockLdapSession::new();
        let mut binds = mockall::Sequence::new();
        first
            .expect_simple_bind()
            .times(2)
            .in_sequence(&mut binds)
            .returning(|_, _| Ok(()));
        first
            .expect_simple_bind()
            .times(1)
            .in_sequence(&mut binds)
            .returning(|_, _| Err(Error::ConnectionError("connection reset".to_string())));

        let mut second = admin_session();
        second.expect_delete().times(1).returning(|_| Ok(()));

        let mut connector = MockLdapConnector::new();
        let mut dials = mockall::Sequence::new();
        connector
            .expect_connect()
            .times(1)
            .in_sequence(&mut dials)
            .return_once(move || Ok(Box::new(first)));
        connector
            .expect_connect()
            .times(1)
            .in_sequence(&mut dials)
            .return_once(move || Ok(Box::new(second)));
        let client = DirectoryClient::with_connector(sample_config(), Arc::new(connector)).unwrap();

        let credentials = BindCredentials::new("uid=jdoe,dc=x", "hunter2");
        client
            .execute_as(&credentials, |_| Box::pin(async { Ok(()) }))
            .await
            .unwrap();
        assert_eq!(client.pool_status().idle, 0);

        client.delete(DeleteRequest::new("cn=old,dc=x")).await.unwrap();
        assert_eq!(client.pool_status().idle, 1);
    }

    #[tokio::test]
    async fn check_bind_reports_invalid_credentials() {
        let mut session = admin_session();
        session
            .expect_simple_bind()
            .withf(|dn, _| dn == "uid=jdoe,dc=x")
            .returning(|_, _| Err(Error::from_result_code(49, "invalid credentials")));

        let client = client_with(session);
        let err = client.check_bind("uid=jdoe,dc=x", "wrong").await.unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials(_)));

        let err = client.check_bind("uid=jdoe,dc=x", "wrong").await.unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials(_)));
        assert_eq!(client.pool_status().idle, 1);
    }

    #[tokio::test]
    async fn check_bind_refuses_empty_password_locally() {
        let mut session = admin_session();
        session
            .expect_simple_bind()
            .withf(|dn, _| dn == "uid=victim,dc=x")
            .never();

        let client = client_with(session);
        let err = client.check_bind("uid=victim,dc=x", "").await.unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials(_)));

        let ran = client
            .execute_as(&BindCredentials::new("uid=victim,dc=x", ""), |_| {
                Box::pin(async { Ok(true) })
            })
            .await;
        assert!(matches!(ran, Err(Error::InvalidCredentials(_))));
        assert_eq!(client.pool_status().idle, 1);
    }

    #[tokio::test]
    async fn password_modify_returns_generated_password() {
        let mut session = admin_session();
        session
            .expect_password_modify()
            .withf(|request| {
                request.user_identity() == Some("uid=jdoe,dc=x")
                    && request.old_password().is_none()
                    && request.new_password().is_none()
            })
            .times(1)
            .returning(|_| Ok(Some("Xk2-generated".to_string())));
        session
            .expect_password_modify()
            .withf(|request| request.new_password() == Some("short"))
            .times(1)
            .returning(|_| Err(Error::from_result_code(53, "password fails quality checks")));

        let client = client_with(session);
        let generated = client
            .password_modify(PasswordModifyRequest::new("uid=jdoe,dc=x", "", ""))
            .await
            .unwrap();
        assert_eq!(generated.as_deref(), Some("Xk2-generated"));

        let err = client
            .password_modify(PasswordModifyRequest::new("uid=jdoe,dc=x", "", "short"))
            .await
            .unwrap_err();
        assert_eq!(err.result_code(), Some(53));
        assert_eq!(client.pool_status().idle, 1);
    }

    #[tokio::test]
    async fn execute_returns_session_after_operation_error() {
        let mut session = admin_session();
        session
            .expect_delete()
            .returning(|_| Err(Error::from_result_code(32, "no such object")));

        let client = client_with(session);
        let err = client
            .delete(DeleteRequest::new("cn=gone,dc=x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(client.pool_status().idle, 1);
        assert_eq!(client.pool_status().in_use, 0);
    }

    #[tokio::test]
    async fn execute_discards_session_after_transport_error() {
        let mut session = admin_session();
        session
            .expect_search()
            .returning(|_| Err(Error::Timeout("directory search timed out".to_string())));

        let client = client_with(session);
        let err = client.lookup("cn=slow").await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(client.pool_status().idle, 0);
    }

    #[tokio::test]
    async fn schema_follows_subschema_subentry() {
        let mut session = admin_session();
        session
            .expect_search()
            .withf(|request| request.base().is_empty())
            .returning(|_| {
                Ok(vec![sample_entry(
                    "",
                    &[
                        ("subschemaSubentry", &["cn=Subschema"]),
                        ("namingContexts", &["dc=example,dc=com"]),
                    ],
                )])
            });
        session
            .expect_search()
            .withf(|request| request.base() == "cn=Subschema")
            .returning(|_| {
                Ok(vec![sample_entry(
                    "cn=Subschema",
                    &[("attributeTypes", &["( 2.5.4.3 NAME 'cn' )"])],
                )])
            });

        let client = client_with(session);
        let root = client.root_dse().await.unwrap();
        assert_eq!(root.naming_contexts, ["dc=example,dc=com"]);

        let schema = client.schema().await.unwrap();
        assert_eq!(schema.attribute_types, ["( 2.5.4.3 NAME 'cn' )"]);
    }
}
