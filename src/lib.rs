//! OpenID Connect / OAuth 2.0 relying-party pipeline: typed request construction, ordered
//! argument processors, response verification, and correlation-state stores shared by every
//! RP round trip (discovery, webfinger, authorization, token, refresh, user-info, registration).

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod client;
pub mod context;
pub mod error;
pub mod http;
pub mod message;
pub mod obs;
pub mod processor;
pub mod service;
pub mod state;

#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::{
		_prelude::*,
		message::{Claims, Value},
	};

	// self
	#[cfg(feature = "reqwest")]
	use crate::{
		client::{Client, ReqwestRpClient},
		context::ServiceContext,
		http::ReqwestHttpClient,
		state::{MemoryStateStore, StateStore},
	};

	/// Builds a claim map from `(name, value)` pairs.
	pub fn claims<I, K, V>(pairs: I) -> Claims
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<Value>,
	{
		pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
	}

	/// Builds a reqwest transport that accepts the self-signed certificates served by
	/// `httpmock`.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs a [`Client`] over an in-memory store and the insecure test transport.
	#[cfg(feature = "reqwest")]
	pub fn build_reqwest_test_client(context: ServiceContext) -> (ReqwestRpClient, Arc<MemoryStateStore>) {
		let store_backend = Arc::new(MemoryStateStore::default());
		let store: Arc<dyn StateStore> = store_backend.clone();

		(Client::with_transport(context, store, test_reqwest_http_client()), store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, BTreeSet, HashMap, hash_map::DefaultHasher},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{Hash, Hasher},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tokio as _};
