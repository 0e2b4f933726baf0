//! Change-tracking LDAP entries and a pooled directory client.
//!
//! Entries are loaded (or created) through a [`DirectoryClient`], edited through the
//! [`MutableEntry`] operations, and committed as a single add, modify or delete request that
//! carries only the edits which actually changed something.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod attribute;
mod change;
mod client;
mod config;
pub mod entities;
mod entry;
mod request;
mod schema;
mod search;
mod session;

pub use attribute::{Attribute, AttributeMap, ValueMatch};
pub use change::{ChangeAction, ChangeLog, ChangeRecord};
pub use client::{DirectoryClient, SessionFuture};
pub use config::{DirectoryConfig, DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_OPERATION_TIMEOUT_SECS};
pub use entry::{Entry, EntryState, EntryWriter, MutableEntry};
pub use request::{
    compile, AddRequest, DeleteRequest, DirectoryModification, ModifyRequest, PasswordModifyRequest,
    WriteRequest,
};
pub use schema::{RootDse, Schema};
pub use search::{DerefPolicy, LdapEntry, SearchRequest, SearchScope, MATCH_ALL_FILTER};
pub use session::{bind_as, LdapConnector, LdapSession, RealLdapConnector, SessionFactory};

pub use ldapkit_core::{BindCredentials, Error, PoolConfig, PoolStatus};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = ldapkit_core::Result<T>;
