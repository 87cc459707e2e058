//! Local credential-issuance daemon: turns gMSA credential specs into Kerberos ticket caches,
//! groups them under revocable leases, and serves create/delete requests over a Unix socket.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod account;
pub mod acquire;
pub mod config;
pub mod credspec;
pub mod error;
pub mod manager;
pub mod obs;
pub mod provision;
pub mod registry;
pub mod rpc;
pub mod ticket;

mod _prelude {
	pub use std::{
		collections::{HashMap, HashSet},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		path::{Path, PathBuf},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::Mutex;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;

	pub use crate::error::{Error, Result};
}

#[cfg(test)] use color_eyre as _;
