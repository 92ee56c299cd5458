//! Credential store model and accessors for the Agave session cache.
//!
//! The store is the host CLI's `config.json`: `sessions[tenant][username][client_name]` holds
//! one [`AuthRecord`] per cached OAuth client. Keys this crate does not know about are kept
//! verbatim so rewriting the file after a refresh never drops data written by the login flow.

pub mod file;
pub mod record;

pub use file::*;
pub use record::*;

// std
use std::path::PathBuf;
// self
use crate::_prelude::*;

/// Error type produced by credential store access.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum StoreError {
	/// The store (or pointer) file does not exist.
	#[error("No credential store found at {}.", path.display())]
	NotFound {
		/// Path that was looked up.
		path: PathBuf,
	},
	/// The file exists but is not valid JSON for the expected shape.
	#[error("Failed to parse {}: {message}.", path.display())]
	Parse {
		/// Offending file.
		path: PathBuf,
		/// Parser message, including the JSON path of the failure.
		message: String,
	},
	/// Any other I/O failure while reading or writing the store.
	#[error("I/O failure on {}: {message}.", path.display())]
	Io {
		/// Offending file.
		path: PathBuf,
		/// Human-readable error payload.
		message: String,
	},
	/// Serialization failures while rendering the store or a record.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// An expected key is absent from the nested session structure.
	#[error("Credential store is missing `{key}`.")]
	MissingKey {
		/// Dotted path of the missing key.
		key: String,
	},
}

/// Sessions cached for one tenant, keyed by username then client name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantSessions(BTreeMap<String, BTreeMap<String, AuthRecord>>);
impl TenantSessions {
	/// Iterates over every `(username, client_name, record)` triple.
	pub fn clients(&self) -> impl Iterator<Item = (&str, &str, &AuthRecord)> {
		self.0.iter().flat_map(|(username, clients)| {
			clients
				.iter()
				.map(move |(client, record)| (username.as_str(), client.as_str(), record))
		})
	}

	/// Returns the record cached for `username` + `client_name`.
	pub fn get(&self, username: &str, client_name: &str) -> Option<&AuthRecord> {
		self.0.get(username).and_then(|clients| clients.get(client_name))
	}

	/// Inserts or replaces a record, returning the previous one.
	pub fn insert(
		&mut self,
		username: impl Into<String>,
		client_name: impl Into<String>,
		record: AuthRecord,
	) -> Option<AuthRecord> {
		self.0.entry(username.into()).or_default().insert(client_name.into(), record)
	}
}

/// In-memory view of the credential store file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialStore {
	/// Cached sessions keyed by tenant code.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sessions: Option<BTreeMap<String, TenantSessions>>,
	/// Top-level keys owned by other tools.
	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
}
impl CredentialStore {
	/// Returns the sessions cached for `tenant`.
	pub fn tenant(&self, tenant: &str) -> Result<&TenantSessions, StoreError> {
		self.sessions
			.as_ref()
			.ok_or_else(|| StoreError::MissingKey { key: "sessions".into() })?
			.get(tenant)
			.ok_or_else(|| StoreError::MissingKey { key: format!("sessions.{tenant}") })
	}

	/// Inserts or replaces the record cached under `tenant` / `username` / `client_name`.
	pub fn upsert(
		&mut self,
		tenant: impl Into<String>,
		username: impl Into<String>,
		client_name: impl Into<String>,
		record: AuthRecord,
	) -> Option<AuthRecord> {
		self.sessions
			.get_or_insert_with(BTreeMap::new)
			.entry(tenant.into())
			.or_default()
			.insert(username, client_name, record)
	}
}
