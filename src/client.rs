//! Relying-party facade binding a context, a state store, a transport, and one service per
//! built-in operation.

// self
use crate::{
	_prelude::*,
	context::ServiceContext,
	error::TransportError,
	http::{HttpArguments, HttpResponse, HttpTransport},
	message::{Claims, ErrorResponse, Message, MessageKind},
	obs::{ServiceSpan, ServiceStage},
	service::{Service, ServiceConfig, ServiceKind},
	state::StateStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestRpClient = Client<ReqwestHttpClient>;

/// Drives every relying-party round trip against one provider.
///
/// The client owns its [`ServiceContext`]; mutating operations (`parse_response`, `request`)
/// take `&mut self`, so concurrent use of one client requires external synchronization. The
/// state store is shared and may be used from any number of clients.
#[derive(Clone)]
pub struct Client<T>
where
	T: ?Sized + HttpTransport,
{
	/// Transport executing outbound requests.
	pub transport: Arc<T>,
	/// Correlation store shared by every stateful service.
	pub store: Arc<dyn StateStore>,
	/// Client knowledge updated by responses.
	pub context: ServiceContext,
	services: HashMap<ServiceKind, Service>,
}
impl<T> Client<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a client over a caller-provided transport with every built-in service.
	pub fn with_transport(
		context: ServiceContext,
		store: Arc<dyn StateStore>,
		transport: impl Into<Arc<T>>,
	) -> Self {
		let services = ServiceKind::ALL
			.into_iter()
			.map(|kind| (kind, Service::new(kind, store.clone())))
			.collect();

		Self { transport: transport.into(), store, context, services }
	}

	/// Returns the service for `kind`.
	pub fn service(&self, kind: ServiceKind) -> Option<&Service> {
		self.services.get(&kind)
	}

	/// Returns the service for `kind` mutably (e.g., to append processors).
	pub fn service_mut(&mut self, kind: ServiceKind) -> Option<&mut Service> {
		self.services.get_mut(&kind)
	}

	/// Replaces the service for `kind`.
	pub fn insert_service(&mut self, kind: ServiceKind, service: Service) {
		self.services.insert(kind, service);
	}

	/// Rebuilds the service for `kind` with overrides.
	pub fn configure(&mut self, kind: ServiceKind, config: ServiceConfig) {
		self.services.insert(kind, Service::with_config(kind, config, self.store.clone()));
	}

	/// Builds the request for `kind` without sending it.
	///
	/// Front-channel operations (authorization, authentication) stop here: the caller redirects
	/// the user agent to the returned URL and later feeds the redirect to
	/// [`Client::parse_response`].
	pub fn build_request(
		&self,
		kind: ServiceKind,
		args: Option<Claims>,
		state: Option<&str>,
	) -> Result<HttpArguments> {
		self.registered(kind)?.build_request(&self.context, args, state)
	}

	/// Parses and applies a response body (or redirect URL) for `kind`.
	pub fn parse_response(&mut self, kind: ServiceKind, body: &str, state: Option<&str>) -> Result<Message> {
		let service = self
			.services
			.get(&kind)
			.ok_or(Error::Misuse { service: kind.as_str(), reason: "service is not registered" })?;

		service.consume_response(&mut self.context, body, state)
	}

	/// Builds, sends, and consumes one back-channel round trip.
	///
	/// Non-2xx answers become [`Error::ErrorResponse`] when the body is an RFC 6749 error
	/// object, and [`TransportError::UnexpectedStatus`] otherwise.
	pub async fn request(
		&mut self,
		kind: ServiceKind,
		args: Option<Claims>,
		state: Option<&str>,
	) -> Result<Message> {
		let request = self.build_request(kind, args, state)?;
		let span = ServiceSpan::new(kind.as_str(), ServiceStage::Request).with_state(state);
		let response = span.instrument(self.transport.execute(request)).await?;

		span.record_status(response.status);

		if !response.is_success() {
			#[cfg(feature = "tracing")]
			tracing::warn!(service = kind.as_str(), status = response.status, "provider rejected request");

			return Err(status_error(response));
		}

		self.parse_response(kind, &response.body, state)
	}

	fn registered(&self, kind: ServiceKind) -> Result<&Service> {
		self.services
			.get(&kind)
			.ok_or(Error::Misuse { service: kind.as_str(), reason: "service is not registered" })
	}
}
#[cfg(feature = "reqwest")]
impl Client<ReqwestHttpClient> {
	/// Creates a client backed by a default reqwest transport.
	pub fn new(context: ServiceContext, store: Arc<dyn StateStore>) -> Self {
		Self::with_transport(context, store, ReqwestHttpClient::default())
	}
}
impl<T> Debug for Client<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("context", &self.context)
			.field("services", &self.services.len())
			.finish_non_exhaustive()
	}
}

fn status_error(response: HttpResponse) -> Error {
	let HttpResponse { status, body, .. } = response;

	match Message::from_json(MessageKind::ErrorResponse, &body).and_then(ErrorResponse::from_message) {
		Ok(error) => error.with_status(status).into(),
		Err(_) => TransportError::UnexpectedStatus { status, body }.into(),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{http::TransportFuture, state::MemoryStateStore};

	struct Canned(HttpResponse);
	impl HttpTransport for Canned {
		fn execute(&self, _: HttpArguments) -> TransportFuture<'_> {
			let response = self.0.clone();

			Box::pin(async move { Ok(response) })
		}
	}

	fn client(status: u16, body: &str) -> Client<Canned> {
		let mut context = ServiceContext {
			issuer: Some("https://op.example.com".into()),
			client_id: Some("client".into()),
			client_secret: Some("secret".into()),
			..Default::default()
		};

		context.endpoints.insert(
			"token_endpoint".into(),
			Url::parse("https://op.example.com/token").expect("Fixture URL should parse."),
		);

		Client::with_transport(
			context,
			Arc::new(MemoryStateStore::default()),
			Canned(HttpResponse { status, body: body.into(), content_type: None }),
		)
	}

	fn refresh_args() -> Claims {
		crate::_preludet::claims([("refresh_token", "rt-1")])
	}

	#[tokio::test]
	async fn error_bodies_surface_with_status() {
		let mut client = client(400, r#"{"error":"invalid_grant","error_description":"revoked"}"#);
		let state = client
			.store
			.create_state_record("https://op.example.com", None)
			.expect("Record should be created.");
		let err = client
			.request(ServiceKind::RefreshAccessToken, Some(refresh_args()), Some(&state))
			.await
			.expect_err("A 400 must fail.");

		assert!(matches!(
			err,
			Error::ErrorResponse(ref e) if e.error == "invalid_grant" && e.status == Some(400)
		));
	}

	#[tokio::test]
	async fn opaque_failures_keep_the_body() {
		let mut client = client(502, "upstream down");
		let state = client
			.store
			.create_state_record("https://op.example.com", None)
			.expect("Record should be created.");
		let err = client
			.request(ServiceKind::RefreshAccessToken, Some(refresh_args()), Some(&state))
			.await
			.expect_err("A 502 must fail.");

		assert!(matches!(
			err,
			Error::Transport(TransportError::UnexpectedStatus { status: 502, ref body }) if body == "upstream down"
		));
	}

	#[test]
	fn every_built_in_service_is_registered() {
		let client = client(200, "{}");

		for kind in ServiceKind::ALL {
			assert_eq!(client.service(kind).map(Service::name), Some(kind.as_str()));
		}
	}
}
