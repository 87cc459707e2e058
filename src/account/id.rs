//! Strongly typed identifiers enforced across the daemon.
//!
//! Every identifier here ends up as a path component under the ticket directory, so the
//! validators reject anything that could escape it.

// std
use std::{borrow::Borrow, ops::Deref};
// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, $normalize:path, $check:path) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after normalization and validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let normalized = $normalize(value.as_ref());

				validate_view($kind, &normalized)?;
				$check($kind, &normalized)?;

				Ok(Self(normalized))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;
const LEASE_ID_LEN: usize = 20;
const LEASE_SEQUENCE_WIDTH: usize = 12;
const LEASE_SUFFIX_LEN: usize = LEASE_ID_LEN - LEASE_SEQUENCE_WIDTH;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (lease, account, realm).
		kind: &'static str,
	},
	/// The identifier contains whitespace or control characters.
	#[error("{kind} identifier contains whitespace or control characters.")]
	ContainsWhitespace {
		/// Kind of identifier (lease, account, realm).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (lease, account, realm).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
	/// The identifier contains a character outside its allowed set.
	#[error("{kind} identifier contains the forbidden character {character:?}.")]
	InvalidCharacter {
		/// Kind of identifier (lease, account, realm).
		kind: &'static str,
		/// Offending character.
		character: char,
	},
	/// The identifier is a reserved path name such as `.` or `..`.
	#[error("{kind} identifier is reserved.")]
	Reserved {
		/// Kind of identifier (lease, account, realm).
		kind: &'static str,
	},
}

def_id! { LeaseId, "Opaque server-generated identifier grouping the tickets of one lease.", "Lease", keep, check_lease_token }
def_id! { AccountName, "gMSA account name, stored without the trailing `$`.", "Account", strip_machine_suffix, check_path_component }
def_id! { Realm, "Kerberos realm, normalized to upper case.", "Realm", to_upper, check_path_component }

impl LeaseId {
	/// Mints an identifier from a sequence number followed by a random alphanumeric suffix.
	///
	/// The sequence is rendered as 12 lowercase hex digits, so identifiers minted from a
	/// strictly increasing sequence never repeat.
	pub fn mint(sequence: u64) -> Self {
		let suffix: String =
			rand::rng().sample_iter(Alphanumeric).take(LEASE_SUFFIX_LEN).map(char::from).collect();

		Self(format!("{sequence:0width$x}{suffix}", width = LEASE_SEQUENCE_WIDTH))
	}

	/// Sequence number of an identifier produced by [`mint`](Self::mint).
	pub fn sequence(&self) -> Option<u64> {
		if self.0.len() != LEASE_ID_LEN {
			return None;
		}

		let prefix = &self.0[..LEASE_SEQUENCE_WIDTH];

		if !prefix.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
			return None;
		}

		u64::from_str_radix(prefix, 16).ok()
	}
}

fn keep(view: &str) -> String {
	view.to_owned()
}

fn strip_machine_suffix(view: &str) -> String {
	view.strip_suffix('$').unwrap_or(view).to_owned()
}

fn to_upper(view: &str) -> String {
	view.to_uppercase()
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(|c| c.is_whitespace() || c.is_control()) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

fn check_lease_token(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	match view.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_')) {
		Some(character) => Err(IdentifierError::InvalidCharacter { kind, character }),
		None => Ok(()),
	}
}

fn check_path_component(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.chars().all(|c| c == '.') {
		return Err(IdentifierError::Reserved { kind });
	}
	if let Some(character) =
		view.chars().find(|c| matches!(c, '/' | '\\' | '@' | ':' | '$' | '*' | '?' | '"'))
	{
		return Err(IdentifierError::InvalidCharacter { kind, character });
	}

	Ok(())
}
