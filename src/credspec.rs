//! Credential spec documents and their resolution into account identities.
//!
//! A request carries one JSON document per credential spec. Parsing happens in two passes:
//! the raw text must first be well-formed JSON ([`ParseError::Malformed`] otherwise), then it
//! must match the credential spec shape ([`ParseError::Incomplete`], with the JSON path of the
//! offending field). Values that parse but cannot name a ticket path or principal are reported
//! as [`ParseError::Invalid`].
//!
//! A single descriptor that names no usable account does not sink its document:
//! [`resolve_request`] sets it aside as a [`RejectedDescriptor`] as long as the document still
//! names at least one usable account.

// self
use crate::{
	_prelude::*,
	account::{AccountIdentity, AccountName, Realm},
};

const ACTIVE_DIRECTORY_PLUGIN: &str = "ActiveDirectory";
const GMSA_PATH: &str = "ActiveDirectoryConfig.GroupManagedServiceAccounts";

/// Coarse classification of a [`ParseError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseErrorKind {
	/// Document is not well-formed JSON.
	Malformed,
	/// A required field is absent, empty, or of the wrong shape.
	Incomplete,
	/// A field is present but semantically unusable.
	Invalid,
}
impl ParseErrorKind {
	/// Returns a stable label suitable for logs and wire messages.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Malformed => "malformed",
			Self::Incomplete => "incomplete",
			Self::Invalid => "invalid",
		}
	}
}
impl Display for ParseErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Errors raised while parsing or validating a credential spec.
#[derive(Debug, ThisError)]
pub enum ParseError {
	/// Document is not well-formed JSON.
	#[error("Credential spec #{index} is not valid JSON: {source}.")]
	Malformed {
		/// Position of the document in the request.
		index: usize,
		/// Underlying syntax error.
		#[source]
		source: serde_json::Error,
	},
	/// A required field is missing or has the wrong shape.
	#[error("Credential spec #{index} is incomplete at `{path}`: {reason}.")]
	Incomplete {
		/// Position of the document in the request.
		index: usize,
		/// JSON path of the offending field.
		path: String,
		/// Human-readable explanation.
		reason: String,
	},
	/// A field holds a value that cannot be provisioned.
	#[error("Credential spec #{index} is invalid at `{path}`: {reason}.")]
	Invalid {
		/// Position of the document in the request.
		index: usize,
		/// JSON path of the offending field.
		path: String,
		/// Human-readable explanation.
		reason: String,
	},
}
impl ParseError {
	/// Returns the coarse error classification.
	pub fn kind(&self) -> ParseErrorKind {
		match self {
			Self::Malformed { .. } => ParseErrorKind::Malformed,
			Self::Incomplete { .. } => ParseErrorKind::Incomplete,
			Self::Invalid { .. } => ParseErrorKind::Invalid,
		}
	}

	/// Position of the offending document in the request.
	pub fn index(&self) -> usize {
		match self {
			Self::Malformed { index, .. }
			| Self::Incomplete { index, .. }
			| Self::Invalid { index, .. } => *index,
		}
	}
}
impl From<RejectedDescriptor> for ParseError {
	fn from(rejected: RejectedDescriptor) -> Self {
		let RejectedDescriptor { index, kind, path, reason, .. } = rejected;

		match kind {
			ParseErrorKind::Incomplete => Self::Incomplete { index, path, reason },
			_ => Self::Invalid { index, path, reason },
		}
	}
}

/// One gMSA descriptor that names no usable account.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Credential spec #{index} names an unusable account at `{path}`: {reason}.")]
pub struct RejectedDescriptor {
	/// Position of the document in the request.
	pub index: usize,
	/// Position of the descriptor within its document.
	pub position: usize,
	/// Account name as written in the descriptor.
	pub name: String,
	/// Either [`ParseErrorKind::Incomplete`] or [`ParseErrorKind::Invalid`].
	pub kind: ParseErrorKind,
	/// JSON path of the offending field.
	pub path: String,
	/// Human-readable explanation.
	pub reason: String,
}
impl RejectedDescriptor {
	/// Label naming the descriptor in responses: its account name, or its path when blank.
	pub fn account(&self) -> &str {
		match self.name.trim() {
			"" => &self.path,
			name => name,
		}
	}
}

/// Every usable identity of a request plus the descriptors that were set aside.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedRequest {
	/// Identities in request order, duplicates included.
	pub identities: Vec<AccountIdentity>,
	/// Descriptors that name no usable account, in request order.
	pub rejected: Vec<RejectedDescriptor>,
}

/// Credential spec document describing gMSA accounts and their domain context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CredentialSpec {
	/// Credential plugins the credential spec targets; must include `ActiveDirectory`.
	pub cms_plugins: Vec<String>,
	/// Domain the host is joined to.
	pub domain_join_config: DomainJoinConfig,
	/// Accounts to provision.
	pub active_directory_config: ActiveDirectoryConfig,
}
impl CredentialSpec {
	/// Parses and validates a single document at position `index` of a request.
	pub fn parse(index: usize, raw: &str) -> Result<Self, ParseError> {
		let value: serde_json::Value =
			serde_json::from_str(raw).map_err(|source| ParseError::Malformed { index, source })?;
		let spec: Self = serde_path_to_error::deserialize(value).map_err(|e| {
			let path = e.path().to_string();

			ParseError::Incomplete { index, path, reason: e.into_inner().to_string() }
		})?;

		spec.validate(index)?;

		Ok(spec)
	}

	/// Lazily resolves every descriptor into an [`AccountIdentity`], in document order.
	pub fn identities(
		&self,
		index: usize,
	) -> impl Iterator<Item = Result<AccountIdentity, ParseError>> + '_ {
		self.active_directory_config
			.group_managed_service_accounts
			.iter()
			.enumerate()
			.map(move |(position, descriptor)| {
				descriptor.resolve(index, position, &self.domain_join_config).map_err(Into::into)
			})
	}

	/// Splits the descriptors into usable identities and rejected ones.
	///
	/// Fails with the first rejection when no descriptor is usable.
	pub fn partition(
		&self,
		index: usize,
	) -> Result<(Vec<AccountIdentity>, Vec<RejectedDescriptor>), ParseError> {
		let mut identities = Vec::new();
		let mut rejected = Vec::new();

		for (position, descriptor) in
			self.active_directory_config.group_managed_service_accounts.iter().enumerate()
		{
			match descriptor.resolve(index, position, &self.domain_join_config) {
				Ok(identity) => identities.push(identity),
				Err(e) => rejected.push(e),
			}
		}

		if identities.is_empty() {
			return Err(rejected.into_iter().next().map(Into::into).unwrap_or_else(|| {
				ParseError::Incomplete {
					index,
					path: GMSA_PATH.into(),
					reason: "no service accounts are listed".into(),
				}
			}));
		}

		Ok((identities, rejected))
	}

	fn validate(&self, index: usize) -> Result<(), ParseError> {
		if !self.cms_plugins.iter().any(|plugin| plugin == ACTIVE_DIRECTORY_PLUGIN) {
			return Err(ParseError::Invalid {
				index,
				path: "CmsPlugins".into(),
				reason: format!("the {ACTIVE_DIRECTORY_PLUGIN} plugin is not listed"),
			});
		}
		if self.active_directory_config.group_managed_service_accounts.is_empty() {
			return Err(ParseError::Incomplete {
				index,
				path: GMSA_PATH.into(),
				reason: "no service accounts are listed".into(),
			});
		}

		Ok(())
	}
}

/// Domain-join context of the host the credential spec was generated for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DomainJoinConfig {
	/// Domain security identifier.
	pub sid: String,
	/// Machine account the credential spec was generated on.
	pub machine_account_name: String,
	/// Domain GUID.
	pub guid: String,
	/// DNS name of the forest root.
	pub dns_tree_name: String,
	/// DNS name of the domain; the default realm for descriptors without a scope.
	pub dns_name: String,
	/// NetBIOS name of the domain.
	pub net_bios_name: String,
}

/// Active Directory section of a credential spec.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActiveDirectoryConfig {
	/// gMSA descriptors to provision.
	pub group_managed_service_accounts: Vec<GmsaDescriptor>,
}

/// One gMSA entry of a credential spec.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GmsaDescriptor {
	/// Account name, with or without the trailing `$`.
	pub name: String,
	/// Domain qualifier; falls back to the domain-join DNS name when absent or empty.
	#[serde(default)]
	pub scope: Option<String>,
}
impl GmsaDescriptor {
	fn resolve(
		&self,
		index: usize,
		position: usize,
		domain: &DomainJoinConfig,
	) -> Result<AccountIdentity, RejectedDescriptor> {
		let base = format!("{GMSA_PATH}[{position}]");
		let reject = |kind, field: &str, reason: String| RejectedDescriptor {
			index,
			position,
			name: self.name.clone(),
			kind,
			path: format!("{base}.{field}"),
			reason,
		};
		let name = self.name.trim();

		if name.is_empty() {
			return Err(reject(ParseErrorKind::Incomplete, "Name", "account name is empty".into()));
		}

		let scope = self
			.scope
			.as_deref()
			.map(str::trim)
			.filter(|scope| !scope.is_empty())
			.unwrap_or_else(|| domain.dns_name.trim());

		if scope.is_empty() {
			return Err(reject(
				ParseErrorKind::Incomplete,
				"Scope",
				"no scope given and DomainJoinConfig.DnsName is empty".into(),
			));
		}

		let account = AccountName::new(name)
			.map_err(|e| reject(ParseErrorKind::Invalid, "Name", e.to_string()))?;
		let realm = Realm::new(scope)
			.map_err(|e| reject(ParseErrorKind::Invalid, "Scope", e.to_string()))?;

		Ok(AccountIdentity::new(account, realm))
	}
}

/// Resolves every document of a request into an order-preserving identity sequence.
///
/// Documents are parsed as the iterator advances; a document that fails to parse yields a
/// single error in its place. Duplicates are kept.
pub fn resolve_identities<'a, I>(
	documents: I,
) -> impl Iterator<Item = Result<AccountIdentity, ParseError>> + 'a
where
	I: IntoIterator<Item = &'a str>,
	I::IntoIter: 'a,
{
	documents.into_iter().enumerate().flat_map(|(index, raw)| match CredentialSpec::parse(index, raw)
	{
		Ok(spec) => spec.identities(index).collect::<Vec<_>>(),
		Err(e) => vec![Err(e)],
	})
}

/// Resolves a whole request, setting aside unusable descriptors.
///
/// A document that fails to parse, or that names no usable account, fails the request.
pub fn resolve_request<'a, I>(documents: I) -> Result<ResolvedRequest, ParseError>
where
	I: IntoIterator<Item = &'a str>,
{
	let mut resolved = ResolvedRequest::default();

	for (index, raw) in documents.into_iter().enumerate() {
		let (identities, rejected) = CredentialSpec::parse(index, raw)?.partition(index)?;

		resolved.identities.extend(identities);
		resolved.rejected.extend(rejected);
	}

	Ok(resolved)
}
