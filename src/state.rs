//! Correlation-state contracts: `state key -> StateRecord` plus the `nonce -> state key`
//! reverse index used to stitch asynchronous round trips back together.

pub mod memory;

pub use memory::MemoryStateStore;

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
// self
use crate::{
	_prelude::*,
	message::{Claims, Message, MessageKind},
};

const TOKEN_BYTES: usize = 32;

/// Message slots held by a [`StateRecord`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateItem {
	/// The authorization (or authentication) request as sent.
	AuthorizationRequest,
	/// The authorization (or authentication) response as received.
	AuthorizationResponse,
	/// The authorization-code token response.
	TokenResponse,
	/// The latest refresh-token response.
	RefreshTokenResponse,
	/// The user-info response.
	UserInfo,
	/// The decoded and validated ID token.
	VerifiedIdToken,
}
impl StateItem {
	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			StateItem::AuthorizationRequest => "authorization_request",
			StateItem::AuthorizationResponse => "authorization_response",
			StateItem::TokenResponse => "token_response",
			StateItem::RefreshTokenResponse => "refresh_token_response",
			StateItem::UserInfo => "user_info",
			StateItem::VerifiedIdToken => "verified_id_token",
		}
	}

	/// Returns `true` if a message of `kind` may occupy this slot.
	pub fn accepts(self, kind: MessageKind) -> bool {
		match self {
			StateItem::AuthorizationRequest => matches!(
				kind,
				MessageKind::AuthorizationRequest | MessageKind::AuthenticationRequest
			),
			StateItem::AuthorizationResponse => matches!(
				kind,
				MessageKind::AuthorizationResponse | MessageKind::AuthenticationResponse
			),
			StateItem::TokenResponse | StateItem::RefreshTokenResponse =>
				kind == MessageKind::AccessTokenResponse,
			StateItem::UserInfo => kind == MessageKind::OpenIdSchema,
			StateItem::VerifiedIdToken => kind == MessageKind::IdToken,
		}
	}
}
impl Display for StateItem {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One correlated protocol exchange.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
	/// Issuer the exchange was started against.
	pub issuer: String,
	/// At most one message per slot.
	pub items: BTreeMap<StateItem, Message>,
	/// PKCE verifier bound to this exchange, if any.
	pub code_verifier: Option<String>,
}
impl StateRecord {
	/// Creates a record bound to `issuer` with every slot empty.
	pub fn new(issuer: impl Into<String>) -> Self {
		Self { issuer: issuer.into(), ..Default::default() }
	}

	/// Message stored in `item`, if any.
	pub fn item(&self, item: StateItem) -> Option<&Message> {
		self.items.get(&item)
	}

	/// Stores `message` in `item` after checking its shape; the record is untouched on failure.
	pub fn set(&mut self, item: StateItem, message: Message) -> Result<(), StateError> {
		if !item.accepts(message.kind()) {
			return Err(StateError::ShapeMismatch { item, found: message.kind() });
		}

		self.items.insert(item, message);

		Ok(())
	}
}

/// Error type produced by [`StateStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StateError {
	/// No record exists for the state key.
	#[error("No state record exists for `{state}`.")]
	StateNotFound {
		/// Requested state key.
		state: String,
	},
	/// No state key is bound to the nonce.
	#[error("No state key is bound to nonce `{nonce}`.")]
	NonceNotFound {
		/// Requested nonce.
		nonce: String,
	},
	/// The nonce is already bound to a different state key.
	#[error("Nonce `{nonce}` is already bound to another state key.")]
	NonceInUse {
		/// Offending nonce.
		nonce: String,
	},
	/// The record exists but the slot is empty.
	#[error("State record `{state}` holds no {item}.")]
	ItemNotFound {
		/// Requested state key.
		state: String,
		/// Empty slot.
		item: StateItem,
	},
	/// The message shape does not fit the slot.
	#[error("A {found} message cannot be stored as {item}.")]
	ShapeMismatch {
		/// Target slot.
		item: StateItem,
		/// Shape that was offered.
		found: MessageKind,
	},
	/// The record carries no PKCE verifier.
	#[error("State record `{state}` has no code verifier.")]
	CodeVerifierNotFound {
		/// Requested state key.
		state: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Storage contract for correlation state.
///
/// Implementations must allocate collision-free keys without a global lock, must not contend on
/// different state keys, and must serialize mutations of the same record so it is never left
/// partially updated.
pub trait StateStore
where
	Self: Send + Sync,
{
	/// Creates a record bound to `issuer`.
	///
	/// A missing or empty `state` allocates a fresh random key; an explicit key replaces any
	/// existing record under that key.
	fn create_state_record(&self, issuer: &str, state: Option<&str>) -> Result<String, StateError>;

	/// Stores `message` in the `item` slot of the record keyed by `state`.
	fn store_item(&self, message: &Message, state: &str, item: StateItem) -> Result<(), StateError>;

	/// Returns the message stored in the `item` slot.
	fn get_item(&self, state: &str, item: StateItem) -> Result<Message, StateError>;

	/// Returns the issuer bound to the record.
	fn get_issuer(&self, state: &str) -> Result<String, StateError>;

	/// Binds `nonce` to `state`.
	fn store_state_key_for_nonce(&self, nonce: &str, state: &str) -> Result<(), StateError>;

	/// Returns the state key bound to `nonce`.
	fn get_state_key_by_nonce(&self, nonce: &str) -> Result<String, StateError>;

	/// Persists the PKCE verifier for the record.
	fn store_code_verifier(&self, state: &str, verifier: &str) -> Result<(), StateError>;

	/// Returns the PKCE verifier for the record.
	fn get_code_verifier(&self, state: &str) -> Result<String, StateError>;

	/// Removes the record and every nonce bound to it.
	fn remove_state(&self, state: &str) -> Result<StateRecord, StateError>;

	/// Copies `params` from the `item` slot into `args`, overwriting existing entries.
	fn extend_request_args(
		&self,
		args: &mut Claims,
		state: &str,
		item: StateItem,
		params: &[&str],
	) -> Result<(), StateError> {
		let message = self.get_item(state, item)?;

		for param in params {
			if let Some(value) = message.get(param) {
				args.insert((*param).to_owned(), value.clone());
			}
		}

		Ok(())
	}

	/// Copies `params` from several slots in order; later slots win, empty slots are skipped.
	fn multiple_extend_request_args(
		&self,
		args: &mut Claims,
		state: &str,
		items: &[StateItem],
		params: &[&str],
	) -> Result<(), StateError> {
		self.get_issuer(state)?;

		for item in items {
			match self.extend_request_args(args, state, *item, params) {
				Ok(()) | Err(StateError::ItemNotFound { .. }) => {},
				Err(e) => return Err(e),
			}
		}

		Ok(())
	}
}

/// Generates an opaque, URL-safe random token (256 bits of entropy).
pub fn random_token() -> String {
	let mut bytes = [0_u8; TOKEN_BYTES];

	rand::rng().fill(&mut bytes);

	URL_SAFE_NO_PAD.encode(bytes)
}
