//! Base-URL → tenant code map and URL-prefix detection.

pub mod directory;

pub use directory::*;

// self
use crate::_prelude::*;

/// Immutable mapping from normalized tenant base URL to tenant code.
///
/// Keys are lower-cased and always end in `/`. Detection assumes that at most one base URL in the
/// map is a prefix of any given URL; when the tenant list violates that, the lexicographically
/// first matching base URL wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TenantMap(BTreeMap<String, String>);
impl TenantMap {
	/// Builds a map from `(base_url, code)` pairs, normalizing every base URL.
	pub fn new<I, B, C>(entries: I) -> Self
	where
		I: IntoIterator<Item = (B, C)>,
		B: AsRef<str>,
		C: Into<String>,
	{
		Self(
			entries
				.into_iter()
				.map(|(base, code)| (normalize_base_url(base.as_ref()), code.into()))
				.collect(),
		)
	}

	/// Returns the tenant code owning `url`, if any base URL is a prefix of it.
	pub fn detect(&self, url: &str) -> Option<&str> {
		let url = url.to_lowercase();

		self.0.iter().find(|(base, _)| url.starts_with(base.as_str())).map(|(_, code)| code.as_str())
	}

	/// Number of known tenants.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when no tenants are known.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

fn normalize_base_url(raw: &str) -> String {
	let mut base = raw.trim().to_lowercase();

	if !base.ends_with('/') {
		base.push('/');
	}

	base
}
