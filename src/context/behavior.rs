//! Negotiation of client preferences against provider-advertised capabilities.

// self
use crate::{
	_prelude::*,
	message::{Claims, Value},
};

/// Client preference names paired with the provider metadata that advertises support.
pub const PREFERENCE_SUPPORT: &[(&str, &str)] = &[
	("response_types", "response_types_supported"),
	("grant_types", "grant_types_supported"),
	("token_endpoint_auth_method", "token_endpoint_auth_methods_supported"),
	("token_endpoint_auth_signing_alg", "token_endpoint_auth_signing_alg_values_supported"),
	("id_token_signed_response_alg", "id_token_signing_alg_values_supported"),
	("userinfo_signed_response_alg", "userinfo_signing_alg_values_supported"),
	("request_object_signing_alg", "request_object_signing_alg_values_supported"),
	("subject_type", "subject_types_supported"),
	("code_challenge_method", "code_challenge_methods_supported"),
];

/// Computes the behavior: each preference intersected with what the provider supports.
///
/// Preferences without an advertised counterpart are kept verbatim. Single-valued preferences
/// resolve to the first supported value; list preferences keep every supported entry in
/// preference order. Response types are compared with their tokens sorted.
pub fn negotiate_behavior(preferences: &Claims, provider_info: &Claims) -> Result<Claims> {
	let mut behavior = Claims::new();

	for (name, preferred) in preferences {
		let supported = PREFERENCE_SUPPORT
			.iter()
			.find(|(pref, _)| *pref == name.as_str())
			.and_then(|(_, support)| provider_info.get(*support))
			.map(string_values);
		let Some(supported) = supported else {
			behavior.insert(name.clone(), preferred.clone());

			continue;
		};
		let canonical =
			|value: &str| if name == "response_types" { sort_tokens(value) } else { value.to_owned() };
		let supported: BTreeSet<String> = supported.iter().map(|v| canonical(v.as_str())).collect();
		let matched: Vec<String> = string_values(preferred)
			.into_iter()
			.filter(|candidate| supported.contains(&canonical(candidate.as_str())))
			.collect();

		if matched.is_empty() {
			return Err(Error::ValueNotAllowed {
				parameter: name.clone(),
				value: string_values(preferred).join(", "),
			});
		}

		let value = match preferred {
			Value::Array(_) => Value::from(matched),
			_ => Value::from(matched.into_iter().next().unwrap_or_default()),
		};

		behavior.insert(name.clone(), value);
	}

	Ok(behavior)
}

/// Sorts the space-separated tokens of `value`.
pub fn sort_tokens(value: &str) -> String {
	let mut tokens: Vec<&str> = value.split_whitespace().collect();

	tokens.sort_unstable();
	tokens.join(" ")
}

fn string_values(value: &Value) -> Vec<String> {
	match value {
		Value::String(s) => vec![s.clone()],
		Value::Array(items) => items.iter().filter_map(Value::as_str).map(str::to_owned).collect(),
		_ => Vec::new(),
	}
}
