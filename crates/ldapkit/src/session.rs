//! Directory sessions and the factory the pool uses to open them.

use crate::config::DirectoryConfig;
use crate::request::{AddRequest, DirectoryModification, ModifyRequest, PasswordModifyRequest};
use crate::search::{LdapEntry, SearchRequest, NO_ATTRIBUTES};
use crate::Result;
use async_trait::async_trait;
use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::exop::{PasswordModify, PasswordModifyResp};
use ldap3::result::ExopResult;
use ldap3::{LdapConnAsync, LdapConnSettings, LdapError, Mod, SearchEntry, SearchOptions};
use ldapkit_core::{BindCredentials, Error, ManageSession};
use native_tls::{Certificate, TlsConnector};
use std::collections::HashSet;
use std::fs;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// LDAP result code for `sizeLimitExceeded`; the entries received so far are still valid.
const RESULT_SIZE_LIMIT_EXCEEDED: u32 = 4;

/// One authenticated connection to the directory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LdapSession: Send {
    /// Rebinds the connection. An empty password performs an unauthenticated bind.
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()>;

    /// Runs a search and collects every returned entry.
    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<LdapEntry>>;

    /// Runs a search using the paged results control.
    async fn search_paged(
        &mut self,
        request: &SearchRequest,
        page_size: i32,
    ) -> Result<Vec<LdapEntry>>;

    /// Creates an entry.
    async fn add(&mut self, request: &AddRequest) -> Result<()>;

    /// Applies modification steps to an entry, in order.
    async fn modify(&mut self, request: &ModifyRequest) -> Result<()>;

    /// Deletes an entry.
    async fn delete(&mut self, dn: &str) -> Result<()>;

    /// Asks the server whether `attribute` of `dn` holds `value`.
    async fn compare(&mut self, dn: &str, attribute: &str, value: &str) -> Result<bool>;

    /// Runs the password modify extended operation; returns the generated password, if any.
    async fn password_modify(&mut self, request: &PasswordModifyRequest) -> Result<Option<String>>;

    /// Closes the connection.
    async fn unbind(&mut self) -> Result<()>;
}

/// Opens unauthenticated transport-level sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LdapConnector: Send + Sync {
    /// Dials the server.
    async fn connect(&self) -> Result<Box<dyn LdapSession>>;
}

/// Binds `session` as `credentials`.
///
/// Credentials built without a password perform an unauthenticated bind. An empty password is
/// refused before reaching the server, which would otherwise treat it as unauthenticated too.
///
/// # Errors
///
/// Returns [`Error::InvalidCredentials`] for an empty password or when the server rejects the
/// identity.
pub async fn bind_as(session: &mut dyn LdapSession, credentials: &BindCredentials) -> Result<()> {
    let password = match credentials.bind_password() {
        Some("") => {
            return Err(Error::InvalidCredentials(format!(
                "empty password for `{}`",
                credentials.bind_dn()
            )));
        }
        Some(password) => password,
        None => "",
    };
    session.simple_bind(credentials.bind_dn(), password).await
}

/// Pool hooks producing sessions bound as the configured default identity.
pub struct SessionFactory {
    connector: Arc<dyn LdapConnector>,
    config: Arc<DirectoryConfig>,
}

impl SessionFactory {
    /// Creates a factory dialing through `connector`.
    #[must_use]
    pub fn new(connector: Arc<dyn LdapConnector>, config: Arc<DirectoryConfig>) -> Self {
        Self { connector, config }
    }

    /// Default bind identity of every session.
    #[must_use]
    pub fn credentials(&self) -> &BindCredentials {
        self.config.credentials()
    }
}

#[async_trait]
impl ManageSession for SessionFactory {
    type Session = Box<dyn LdapSession>;

    async fn create(&self) -> Result<Self::Session> {
        let mut session = self.connector.connect().await.map_err(connection_error)?;
        bind_as(&mut *session, self.config.credentials())
            .await
            .map_err(connection_error)?;
        debug!(
            url = %self.config.url(),
            bind_dn = %self.config.credentials().bind_dn(),
            "opened directory session"
        );
        Ok(session)
    }

    async fn is_alive(&self, session: &mut Self::Session) -> bool {
        session
            .search(&SearchRequest::root_dse([NO_ATTRIBUTES]))
            .await
            .is_ok()
    }

    async fn close(&self, mut session: Self::Session) {
        if let Err(err) = session.unbind().await {
            debug!(error = %err, "unbind failed while closing session");
        }
    }
}

fn connection_error(err: Error) -> Error {
    match err {
        Error::InvalidCredentials(_) | Error::Timeout(_) | Error::ConnectionError(_) => err,
        other => Error::ConnectionError(other.to_string()),
    }
}

/// Real LDAP connector backed by `ldap3`.
pub struct RealLdapConnector {
    config: Arc<DirectoryConfig>,
}

impl RealLdapConnector {
    /// Creates a new connector instance.
    #[must_use]
    pub fn new(config: Arc<DirectoryConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LdapConnector for RealLdapConnector {
    async fn connect(&self) -> Result<Box<dyn LdapSession>> {
        let settings = build_ldap_settings(&self.config)?;
        let (conn, ldap) = LdapConnAsync::with_settings(settings, self.config.url())
            .await
            .map_err(|err| Error::ConnectionError(err.to_string()))?;
        ldap3::drive!(conn);
        Ok(Box::new(RealLdapSession {
            inner: ldap,
            operation_timeout: self.config.operation_timeout(),
        }))
    }
}

struct RealLdapSession {
    inner: ldap3::Ldap,
    operation_timeout: Duration,
}

async fn run<F, T>(limit: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = ldap3::result::Result<T>>,
{
    timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout(format!("directory {operation} timed out")))?
        .map_err(map_ldap_error)
}

fn search_options(request: &SearchRequest) -> SearchOptions {
    SearchOptions::new()
        .deref(request.deref_policy().into())
        .sizelimit(request.entry_limit())
        .timelimit(request.seconds_limit())
        .typesonly(request.is_types_only())
}

fn to_value_set(values: &[String]) -> HashSet<String> {
    values.iter().cloned().collect()
}

#[async_trait]
impl LdapSession for RealLdapSession {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()> {
        let result = run(
            self.operation_timeout,
            "bind",
            self.inner.simple_bind(dn, password),
        )
        .await?;
        ensure_ldap_success(result)
    }

    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<LdapEntry>> {
        let ldap3::SearchResult(entries, result) = run(
            self.operation_timeout,
            "search",
            self.inner
                .with_search_options(search_options(request))
                .search(
                    request.base(),
                    request.scope().into(),
                    request.filter(),
                    request.requested_attributes().to_vec(),
                ),
        )
        .await?;
        ensure_search_success(result)?;

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(LdapEntry::from)
            .collect())
    }

    async fn search_paged(
        &mut self,
        request: &SearchRequest,
        page_size: i32,
    ) -> Result<Vec<LdapEntry>> {
        let limit = self.operation_timeout;
        let adapters: Vec<Box<dyn Adapter<_, _>>> = vec![
            Box::new(EntriesOnly::new()),
            Box::new(PagedResults::new(page_size)),
        ];
        let mut stream = run(
            limit,
            "search",
            self.inner
                .with_search_options(search_options(request))
                .streaming_search_with(
                    adapters,
                    request.base(),
                    request.scope().into(),
                    request.filter(),
                    request.requested_attributes().to_vec(),
                ),
        )
        .await?;

        let mut entries = Vec::new();
        while let Some(entry) = run(limit, "search", stream.next()).await? {
            entries.push(LdapEntry::from(SearchEntry::construct(entry)));
        }
        ensure_search_success(stream.finish().await)?;
        Ok(entries)
    }

    async fn add(&mut self, request: &AddRequest) -> Result<()> {
        let attributes = request
            .attributes()
            .iter()
            .map(|attribute| (attribute.name().to_string(), to_value_set(attribute.values())))
            .collect::<Vec<_>>();

        let result = run(
            self.operation_timeout,
            "add",
            self.inner.add(request.dn(), attributes),
        )
        .await?;
        ensure_ldap_success(result)
    }

    async fn modify(&mut self, request: &ModifyRequest) -> Result<()> {
        let mods = request
            .modifications()
            .iter()
            .map(|m| match m {
                DirectoryModification::Add { attribute, values } => {
                    Mod::Add(attribute.clone(), to_value_set(values))
                }
                DirectoryModification::Delete { attribute, values } => {
                    Mod::Delete(attribute.clone(), to_value_set(values))
                }
                DirectoryModification::Replace { attribute, values } => {
                    Mod::Replace(attribute.clone(), to_value_set(values))
                }
            })
            .collect::<Vec<_>>();

        let result = run(
            self.operation_timeout,
            "modify",
            self.inner.modify(request.dn(), mods),
        )
        .await?;
        ensure_ldap_success(result)
    }

    async fn delete(&mut self, dn: &str) -> Result<()> {
        let result = run(self.operation_timeout, "delete", self.inner.delete(dn)).await?;
        ensure_ldap_success(result)
    }

    async fn compare(&mut self, dn: &str, attribute: &str, value: &str) -> Result<bool> {
        let result = run(
            self.operation_timeout,
            "compare",
            self.inner.compare(dn, attribute, value),
        )
        .await?;
        result.equal().map_err(map_ldap_error)
    }

    async fn password_modify(&mut self, request: &PasswordModifyRequest) -> Result<Option<String>> {
        let exop = PasswordModify {
            user_id: request.user_identity(),
            old_pass: request.old_password(),
            new_pass: request.new_password(),
        };
        let ExopResult(response, result) = run(
            self.operation_timeout,
            "password modify",
            self.inner.extended(exop),
        )
        .await?;
        ensure_ldap_success(result)?;

        // The response value is only present when the server generated the password.
        Ok(response
            .val
            .is_some()
            .then(|| response.parse::<PasswordModifyResp>().gen_pass))
    }

    async fn unbind(&mut self) -> Result<()> {
        run(self.operation_timeout, "unbind", self.inner.unbind()).await
    }
}

fn build_ldap_settings(config: &DirectoryConfig) -> Result<LdapConnSettings> {
    let mut settings = LdapConnSettings::new()
        .set_conn_timeout(config.connection_timeout())
        .set_starttls(config.starttls());

    if !config.tls_verify() {
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| {
                Error::ConfigError(format!("failed to construct TLS connector: {err}"))
            })?;
        settings = settings.set_connector(connector).set_no_tls_verify(true);
    } else if let Some(cert_path) = config.tls_ca_cert() {
        let pem = fs::read(cert_path).map_err(|err| {
            Error::ConfigError(format!(
                "failed to read CA certificate {}: {err}",
                cert_path.display()
            ))
        })?;
        let certificate = Certificate::from_pem(&pem)
            .map_err(|err| Error::ConfigError(format!("invalid CA certificate: {err}")))?;
        let connector = TlsConnector::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|err| Error::ConfigError(format!("failed to load CA certificate: {err}")))?;
        settings = settings.set_connector(connector);
    }

    Ok(settings)
}

fn map_ldap_error(err: LdapError) -> Error {
    match err {
        LdapError::LdapResult { result } => Error::from_result_code(result.rc, result.text),
        LdapError::FilterParsing => Error::InvalidRequest("malformed search filter".to_string()),
        other => Error::ConnectionError(other.to_string()),
    }
}

fn ensure_ldap_success(result: ldap3::LdapResult) -> Result<()> {
    if result.rc == 0 {
        Ok(())
    } else {
        Err(Error::from_result_code(result.rc, result.text))
    }
}

fn ensure_search_success(result: ldap3::LdapResult) -> Result<()> {
    if result.rc == RESULT_SIZE_LIMIT_EXCEEDED {
        debug!("search stopped at the size limit");
        return Ok(());
    }
    ensure_ldap_success(result)
}
