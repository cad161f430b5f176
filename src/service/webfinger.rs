//! OpenID issuer discovery via RFC 7033 webfinger.

// self
use crate::{
	_prelude::*,
	context::ServiceContext,
	http::HttpMethod,
	message::{Claims, Message, MessageKind, SerializationType, Value, ValidationErrors, Violation, ViolationKind},
	service::{ClientAuthMethod, HookEnv, ServiceDescriptor, ServiceHooks},
};

/// Link relation naming an OpenID Connect issuer.
pub const OIDC_ISSUER_REL: &str = "http://openid.net/specs/connect/1.0/issuer";
/// Well-known webfinger path.
pub const WEBFINGER_PATH: &str = "/.well-known/webfinger";

/// Webfinger issuer lookup.
pub const WEBFINGER: ServiceDescriptor = ServiceDescriptor {
	name: "webfinger",
	endpoint_name: None,
	request_kind: Some(MessageKind::WebfingerRequest),
	response_kind: MessageKind::JsonResourceDescriptor,
	http_method: HttpMethod::Get,
	auth_method: ClientAuthMethod::None,
	negotiate_auth_method: false,
	serialization: SerializationType::UrlEncoded,
	deserialization: SerializationType::Json,
	state_item: None,
	default_args: &[("rel", OIDC_ISSUER_REL)],
	pre_constructors: &[],
	post_constructors: &[],
	hooks: ServiceHooks {
		endpoint: Some(webfinger_endpoint),
		construct_request: Some(normalize_request),
		update_context: Some(update_issuer),
		..ServiceHooks::DEFAULT
	},
};

/// Normalizes a user input into a webfinger resource.
///
/// `user@host` becomes `acct:user@host`, a bare host or path becomes `https://...`, and URLs
/// lose their fragment.
pub fn normalize_resource(resource: &str) -> String {
	let resource = resource.trim();

	if resource.starts_with("acct:") {
		return resource.to_owned();
	}
	if resource.contains("://") {
		return resource.split('#').next().unwrap_or(resource).to_owned();
	}

	match resource.split_once('@') {
		Some((local, _)) if !local.contains('/') => format!("acct:{resource}"),
		_ => format!("https://{}", resource.split('#').next().unwrap_or(resource)),
	}
}

/// Host (with port, when present) that answers for a normalized resource.
pub fn resource_host(resource: &str) -> Result<String> {
	let not_allowed = || Error::ValueNotAllowed { parameter: "resource".into(), value: resource.into() };

	if let Some(account) = resource.strip_prefix("acct:") {
		let host = account
			.rsplit_once('@')
			.map(|(_, host)| host.split('/').next().unwrap_or(host))
			.filter(|host| !host.is_empty())
			.ok_or_else(not_allowed)?;

		return Ok(host.to_owned());
	}

	let url = Error::parse_url(resource)?;
	let host = url.host_str().ok_or_else(not_allowed)?;

	Ok(match url.port() {
		Some(port) => format!("{host}:{port}"),
		None => host.to_owned(),
	})
}

/// Issuer named by the first link with the OpenID issuer relation.
pub fn issuer_link(descriptor: &Message) -> Option<&str> {
	descriptor
		.get("links")
		.and_then(Value::as_array)?
		.iter()
		.filter_map(Value::as_object)
		.filter(|link| link.get("rel").and_then(Value::as_str) == Some(OIDC_ISSUER_REL))
		.find_map(|link| link.get("href").and_then(Value::as_str))
}

fn webfinger_endpoint(_: &ServiceContext, args: &mut Claims) -> Result<Url> {
	let Some(raw) = args.get("resource").and_then(Value::as_str) else {
		return Err(ValidationErrors::from(vec![Violation::new(
			"resource",
			ViolationKind::MissingRequiredValue,
		)])
		.into());
	};
	let resource = normalize_resource(raw);
	let host = resource_host(&resource)?;

	args.insert("resource".into(), Value::String(resource));

	Error::parse_url(&format!("https://{host}{WEBFINGER_PATH}"))
}

fn normalize_request(request: &mut Message, _: &ServiceContext) -> Result<()> {
	if let Some(raw) = request.get_str("resource") {
		let resource = normalize_resource(raw);

		request.insert("resource", resource);
	}

	Ok(())
}

fn update_issuer(message: &mut Message, ctx: &mut ServiceContext, _: &HookEnv<'_>) -> Result<()> {
	let href = issuer_link(message)
		.ok_or(Error::MissingRequiredAttribute { attribute: "issuer" })?
		.to_owned();
	let secure = href.starts_with("https://");
	let plain = href.starts_with("http://");

	if !(secure || (plain && ctx.allow.http_links)) {
		return Err(Error::ValueNotAllowed { parameter: "href".into(), value: href });
	}

	ctx.set_issuer(href);

	Ok(())
}
