//! Cached OAuth client record as written by the Agave CLI login flow.

// crates.io
use serde_json::{Map, Value};
use time::{UtcOffset, format_description::BorrowedFormatItem, macros::format_description};
// self
use crate::{_prelude::*, store::StoreError};

const EXPIRY_HEAD: &[BorrowedFormatItem<'static>] = format_description!(
	"[weekday repr:short] [month repr:short] [day padding:none] [hour]:[minute]:[second]"
);
const SECRET_KEYS: &[&str] = &["access_token", "refresh_token", "apisecret"];

/// One cached session: the OAuth client, its tokens, and the tenant it belongs to.
///
/// The record is kept as the JSON object the CLI wrote. Known keys (`access_token`,
/// `refresh_token`, `apikey`, `apisecret`, `baseurl`, `client_name`, ...) are read through
/// [`AuthRecord::get`] / [`AuthRecord::require`]; every key, explicit `null`s included, is written
/// back exactly as it was read.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthRecord(Map<String, Value>);
impl AuthRecord {
	/// Returns the string stored under `key`; `null`, absent, and non-string values are `None`.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).and_then(Value::as_str)
	}

	/// Returns the raw JSON value stored under `key`.
	pub fn value(&self, key: &str) -> Option<&Value> {
		self.0.get(key)
	}

	/// Returns the string stored under `key` or a [`StoreError::MissingKey`].
	pub fn require(&self, key: &str) -> Result<&str, StoreError> {
		self.get(key).ok_or_else(|| StoreError::MissingKey { key: key.to_owned() })
	}

	/// Sets `key` to `value`.
	pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
		self.0.insert(key.to_owned(), value.into());

		self
	}

	/// Returns a copy carrying the tokens of a successful refresh issued at `now`.
	///
	/// `created_at` becomes `now` in epoch seconds (as a string) and `expires_at` the local time at
	/// `now + expires_in`. Every other key is copied unchanged.
	pub fn refreshed(
		&self,
		access_token: impl Into<String>,
		refresh_token: impl Into<String>,
		expires_in: i64,
		now: OffsetDateTime,
	) -> Result<Self, StoreError> {
		let expires_at = format_expires_at(now + Duration::seconds(expires_in))?;

		Ok(self
			.clone()
			.with("access_token", access_token.into())
			.with("refresh_token", refresh_token.into())
			.with("expires_in", expires_in)
			.with("created_at", now.unix_timestamp().to_string())
			.with("expires_at", expires_at))
	}
}
impl Debug for AuthRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut map = f.debug_map();

		for (key, value) in &self.0 {
			if SECRET_KEYS.contains(&key.as_str()) && !value.is_null() {
				map.entry(key, &"<redacted>");
			} else {
				map.entry(key, value);
			}
		}

		map.finish()
	}
}

/// Formats `instant` in local time as `<Wkd> <Mon> <day> <HH:MM:SS> <TZ> <year>`.
///
/// The zone renders as `UTC` for a zero offset and `+HHMM`/`-HHMM` otherwise, never as a zone
/// abbreviation. On Unix the local offset is unavailable once a multi-threaded runtime is running,
/// so under the usual tokio runtime the UTC fallback is the normal case and the string is in UTC.
pub fn format_expires_at(instant: OffsetDateTime) -> Result<String, StoreError> {
	let offset = UtcOffset::local_offset_at(instant).unwrap_or(UtcOffset::UTC);
	let local = instant.to_offset(offset);
	let head = local
		.format(EXPIRY_HEAD)
		.map_err(|e| StoreError::Serialization { message: e.to_string() })?;
	let zone = if offset.is_utc() {
		"UTC".to_owned()
	} else {
		let (hours, minutes, _) = offset.as_hms();
		let sign = if offset.is_negative() { '-' } else { '+' };

		format!("{sign}{:02}{:02}", hours.unsigned_abs(), minutes.unsigned_abs())
	};

	Ok(format!("{head} {zone} {}", local.year()))
}
