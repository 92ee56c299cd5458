//! Plugin configuration read from the host tool's `fetch_config.agave` section.

// std
use std::path::{Path, PathBuf};
// self
use crate::{_prelude::*, error::ConfigError, tenant::DEFAULT_TENANTS_URL};

/// Default credential store location, relative to the home directory.
pub const DEFAULT_STORE_PATH: &str = "~/.agave/config.json";

/// Settings for the Agave fetch transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgaveConfig {
	/// Credential store path; `~` expands to the home directory. Falls back to
	/// [`DEFAULT_STORE_PATH`] when unset or empty.
	#[serde(default)]
	pub config_file_path: Option<String>,
	/// Tenant directory endpoint.
	#[serde(default = "default_tenants_url")]
	pub tenants_url: Url,
}
impl AgaveConfig {
	/// Extracts the `fetch_config.agave` section from the host configuration document.
	///
	/// Missing sections yield the defaults; a malformed section is logged and ignored.
	pub fn from_host_config(host: &serde_json::Value) -> Self {
		let Some(section) = host.get("fetch_config").and_then(|fetch| fetch.get("agave")) else {
			return Self::default();
		};

		match serde_path_to_error::deserialize(section) {
			Ok(config) => config,
			Err(e) => {
				tracing::warn!(error = %e, "Ignoring malformed fetch_config.agave section.");

				Self::default()
			},
		}
	}

	/// Overrides the credential store path.
	pub fn with_config_file_path(mut self, path: impl AsRef<Path>) -> Self {
		self.config_file_path = Some(path.as_ref().to_string_lossy().into_owned());

		self
	}

	/// Overrides the tenant directory endpoint.
	pub fn with_tenants_url(mut self, url: Url) -> Self {
		self.tenants_url = url;

		self
	}

	/// Resolves the credential store path, expanding `~`.
	pub fn store_path(&self) -> Result<PathBuf, ConfigError> {
		let raw = self
			.config_file_path
			.as_deref()
			.map(str::trim)
			.filter(|path| !path.is_empty())
			.unwrap_or(DEFAULT_STORE_PATH);

		expand_home(raw)
	}
}
impl Default for AgaveConfig {
	fn default() -> Self {
		Self { config_file_path: None, tenants_url: default_tenants_url() }
	}
}

fn default_tenants_url() -> Url {
	Url::parse(DEFAULT_TENANTS_URL).expect("Default tenants URL must be valid.")
}

fn expand_home(raw: &str) -> Result<PathBuf, ConfigError> {
	let rest = match raw.strip_prefix('~') {
		Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => rest,
		_ => return Ok(PathBuf::from(raw)),
	};
	let home = dirs::home_dir().ok_or(ConfigError::MissingHomeDir)?;
	let rest = rest.trim_start_matches(['/', '\\']);

	Ok(if rest.is_empty() { home } else { home.join(rest) })
}
