//! File access for the credential store and its `current` pointer.
//!
//! Nothing here locks the files: two processes refreshing against the same store can lose an
//! update. Writes go through a temporary sibling and a rename so readers never see a torn file.

// std
use std::{
	fs::{self, File},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};
// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	store::{AuthRecord, CredentialStore, StoreError},
};

/// File name of the active-session pointer, stored next to the credential store.
pub const CURRENT_POINTER_FILE: &str = "current";

/// Result of [`update_current_pointer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerUpdate {
	/// The pointer named the same client and was rewritten.
	Replaced,
	/// The pointer names another client and was left untouched.
	Unrelated,
	/// The pointer could not be read, parsed, or written; nothing changed.
	Unavailable,
}

/// Loads the credential store at `path`.
pub fn load_store(path: &Path) -> Result<CredentialStore, StoreError> {
	read_json(path)
}

/// Serializes `store` and replaces the file at `path`.
pub fn save_store(store: &CredentialStore, path: &Path) -> Result<(), StoreError> {
	let serialized = serde_json::to_vec(store)
		.map_err(|e| StoreError::Serialization { message: e.to_string() })?;

	replace_file(path, &serialized)
}

/// Returns the `current` pointer path that sits next to `store_path`.
pub fn current_pointer_path(store_path: &Path) -> PathBuf {
	let absolute = std::path::absolute(store_path).unwrap_or_else(|_| store_path.to_path_buf());

	match absolute.parent() {
		Some(dir) => dir.join(CURRENT_POINTER_FILE),
		None => PathBuf::from(CURRENT_POINTER_FILE),
	}
}

/// Rewrites the pointer with `record` when it names the same client; best effort.
///
/// Failures are logged and reported as [`PointerUpdate::Unavailable`]; they never propagate.
pub fn update_current_pointer(record: &AuthRecord, pointer_path: &Path) -> PointerUpdate {
	let current: AuthRecord = match read_json(pointer_path) {
		Ok(current) => current,
		Err(StoreError::NotFound { .. }) => {
			tracing::debug!(path = %pointer_path.display(), "No current session pointer to update.");

			return PointerUpdate::Unavailable;
		},
		Err(e) => {
			tracing::warn!(error = %e, "Unable to read the current session pointer.");

			return PointerUpdate::Unavailable;
		},
	};
	let Some(current_client) = current.get("client_name") else {
		tracing::warn!(
			path = %pointer_path.display(),
			"Invalid current session pointer: missing client_name."
		);

		return PointerUpdate::Unavailable;
	};

	if Some(current_client) != record.get("client_name") {
		return PointerUpdate::Unrelated;
	}

	let written = serde_json::to_vec(record)
		.map_err(|e| StoreError::Serialization { message: e.to_string() })
		.and_then(|bytes| replace_file(pointer_path, &bytes));

	match written {
		Ok(()) => PointerUpdate::Replaced,
		Err(e) => {
			tracing::warn!(error = %e, "Unable to write the current session pointer.");

			PointerUpdate::Unavailable
		},
	}
}

fn read_json<T>(path: &Path) -> Result<T, StoreError>
where
	T: DeserializeOwned,
{
	let bytes = fs::read(path).map_err(|e| match e.kind() {
		ErrorKind::NotFound => StoreError::NotFound { path: path.to_path_buf() },
		_ => io_error(path, e),
	})?;
	let mut de = serde_json::Deserializer::from_slice(&bytes);

	serde_path_to_error::deserialize(&mut de)
		.map_err(|e| StoreError::Parse { path: path.to_path_buf(), message: e.to_string() })
}

fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| StoreError::Io {
			path: parent.to_path_buf(),
			message: format!("Failed to create directory: {e}"),
		})?;
	}

	Ok(())
}

fn replace_file(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
	ensure_parent_exists(path)?;

	let mut tmp_path = path.as_os_str().to_owned();

	tmp_path.push(".tmp");

	let tmp_path = PathBuf::from(tmp_path);

	{
		let mut file = File::create(&tmp_path).map_err(|e| io_error(&tmp_path, e))?;

		file.write_all(contents).map_err(|e| io_error(&tmp_path, e))?;
		file.sync_all().map_err(|e| io_error(&tmp_path, e))?;
	}

	fs::rename(&tmp_path, path).map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, e: std::io::Error) -> StoreError {
	StoreError::Io { path: path.to_path_buf(), message: e.to_string() }
}
