//! Thread-safe in-memory [`StateStore`] for single-process deployments and tests.

// self
use crate::{
	_prelude::*,
	message::Message,
	state::{StateError, StateItem, StateRecord, StateStore, random_token},
};

const SHARDS: usize = 16;

type RecordCell = Arc<Mutex<StateRecord>>;
type Shard = RwLock<HashMap<String, RecordCell>>;

/// Sharded in-process store.
///
/// Records are spread over independently locked shards and each record sits behind its own
/// mutex, so lookups on different keys do not contend and concurrent writes to one record are
/// serialized.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
	shards: [Shard; SHARDS],
	nonces: RwLock<HashMap<String, String>>,
}
impl MemoryStateStore {
	/// Number of live records.
	pub fn len(&self) -> usize {
		self.shards.iter().map(|shard| shard.read().len()).sum()
	}

	/// Returns `true` when no record is stored.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn shard(&self, state: &str) -> &Shard {
		let mut hasher = DefaultHasher::new();

		state.hash(&mut hasher);

		&self.shards[(hasher.finish() % SHARDS as u64) as usize]
	}

	fn record(&self, state: &str) -> Result<RecordCell, StateError> {
		self.shard(state)
			.read()
			.get(state)
			.cloned()
			.ok_or_else(|| StateError::StateNotFound { state: state.to_owned() })
	}

	fn insert_fresh(&self, issuer: &str) -> String {
		loop {
			let key = random_token();
			let mut shard = self.shard(&key).write();

			if shard.contains_key(&key) {
				continue;
			}

			shard.insert(key.clone(), Arc::new(Mutex::new(StateRecord::new(issuer))));

			return key;
		}
	}
}
impl StateStore for MemoryStateStore {
	fn create_state_record(&self, issuer: &str, state: Option<&str>) -> Result<String, StateError> {
		match state.filter(|s| !s.is_empty()) {
			Some(key) => {
				self.shard(key)
					.write()
					.insert(key.to_owned(), Arc::new(Mutex::new(StateRecord::new(issuer))));

				Ok(key.to_owned())
			},
			None => Ok(self.insert_fresh(issuer)),
		}
	}

	fn store_item(&self, message: &Message, state: &str, item: StateItem) -> Result<(), StateError> {
		let cell = self.record(state)?;
		let mut record = cell.lock();

		record.set(item, message.clone())
	}

	fn get_item(&self, state: &str, item: StateItem) -> Result<Message, StateError> {
		let cell = self.record(state)?;
		let record = cell.lock();

		record
			.item(item)
			.cloned()
			.ok_or_else(|| StateError::ItemNotFound { state: state.to_owned(), item })
	}

	fn get_issuer(&self, state: &str) -> Result<String, StateError> {
		Ok(self.record(state)?.lock().issuer.clone())
	}

	fn store_state_key_for_nonce(&self, nonce: &str, state: &str) -> Result<(), StateError> {
		self.record(state)?;

		let mut nonces = self.nonces.write();

		match nonces.get(nonce) {
			Some(bound) if bound != state =>
				Err(StateError::NonceInUse { nonce: nonce.to_owned() }),
			_ => {
				nonces.insert(nonce.to_owned(), state.to_owned());

				Ok(())
			},
		}
	}

	fn get_state_key_by_nonce(&self, nonce: &str) -> Result<String, StateError> {
		self.nonces
			.read()
			.get(nonce)
			.cloned()
			.ok_or_else(|| StateError::NonceNotFound { nonce: nonce.to_owned() })
	}

	fn store_code_verifier(&self, state: &str, verifier: &str) -> Result<(), StateError> {
		self.record(state)?.lock().code_verifier = Some(verifier.to_owned());

		Ok(())
	}

	fn get_code_verifier(&self, state: &str) -> Result<String, StateError> {
		self.record(state)?
			.lock()
			.code_verifier
			.clone()
			.ok_or_else(|| StateError::CodeVerifierNotFound { state: state.to_owned() })
	}

	fn remove_state(&self, state: &str) -> Result<StateRecord, StateError> {
		let cell = self
			.shard(state)
			.write()
			.remove(state)
			.ok_or_else(|| StateError::StateNotFound { state: state.to_owned() })?;

		self.nonces.write().retain(|_, bound| bound != state);

		let record = cell.lock().clone();

		Ok(record)
	}
}
