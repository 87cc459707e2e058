//! Resolved (account, realm) pairs that tickets are requested for.

// self
use crate::{
	_prelude::*,
	account::{AccountName, Realm},
};

/// Account plus realm pair a ticket is requested for.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountIdentity {
	/// gMSA account name without the machine suffix.
	pub account: AccountName,
	/// Kerberos realm the account lives in.
	pub realm: Realm,
}
impl AccountIdentity {
	/// Pairs an account with its realm.
	pub fn new(account: AccountName, realm: Realm) -> Self {
		Self { account, realm }
	}

	/// Kerberos principal name, e.g. `WebApp01$@CONTOSO.COM`.
	pub fn principal(&self) -> String {
		format!("{}$@{}", self.account, self.realm)
	}

	/// Directory name used for this identity inside a lease directory.
	pub fn path_component(&self) -> String {
		format!("{}@{}", self.account, self.realm)
	}
}
impl Display for AccountIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.principal())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn principal_restores_machine_suffix() {
		let identity = AccountIdentity::new(
			AccountName::new("WebApp01$").expect("Account fixture should be valid."),
			Realm::new("contoso.com").expect("Realm fixture should be valid."),
		);

		assert_eq!(identity.principal(), "WebApp01$@CONTOSO.COM");
		assert_eq!(identity.path_component(), "WebApp01@CONTOSO.COM");
		assert_eq!(identity.to_string(), identity.principal());
	}
}
