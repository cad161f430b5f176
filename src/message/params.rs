//! Parameter definitions, value coercers, and violation reporting shared by message
//! verification and the request-argument processor chain.

// crates.io
use serde_json::Value;
// self
use crate::_prelude::*;

/// Wire-level shape of a claim value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
	/// Single string.
	String,
	/// List of strings; a lone string is wrapped into a one-element list.
	StringList,
	/// Space-delimited string; a list of strings is joined with single spaces.
	SpaceSeparated,
	/// Signed integer; numeric strings are parsed.
	Integer,
	/// Boolean; `"true"`/`"false"` strings are parsed.
	Boolean,
	/// JSON object; JSON-encoded strings are parsed.
	Object,
	/// List of JSON objects; a lone object is wrapped into a one-element list.
	ObjectList,
}
impl ParamType {
	/// Normalizes `value` into this shape, returning a human-readable cause on failure.
	pub fn coerce(self, value: &Value) -> Result<Value, String> {
		match (self, value) {
			(ParamType::String, Value::String(_)) => Ok(value.clone()),
			(ParamType::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
			(ParamType::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
			(ParamType::String, Value::Array(items)) if items.len() == 1 =>
				ParamType::String.coerce(&items[0]),
			(ParamType::StringList, Value::String(s)) => Ok(Value::Array(vec![Value::String(s.clone())])),
			(ParamType::StringList, Value::Array(items)) =>
				if items.iter().all(Value::is_string) {
					Ok(value.clone())
				} else {
					Err("expected a list of strings".into())
				},
			(ParamType::SpaceSeparated, Value::String(s)) =>
				Ok(Value::String(s.split_whitespace().collect::<Vec<_>>().join(" "))),
			(ParamType::SpaceSeparated, Value::Array(items)) => {
				let mut parts = Vec::with_capacity(items.len());

				for item in items {
					match item.as_str() {
						Some(s) => parts.extend(s.split_whitespace()),
						None => return Err("expected a list of strings".into()),
					}
				}

				Ok(Value::String(parts.join(" ")))
			},
			(ParamType::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(value.clone()),
			(ParamType::Integer, Value::String(s)) => s
				.trim()
				.parse::<i64>()
				.map(Value::from)
				.map_err(|e| format!("expected an integer: {e}")),
			(ParamType::Boolean, Value::Bool(_)) => Ok(value.clone()),
			(ParamType::Boolean, Value::String(s)) => match s.as_str() {
				"true" => Ok(Value::Bool(true)),
				"false" => Ok(Value::Bool(false)),
				_ => Err(format!("expected a boolean, found `{s}`")),
			},
			(ParamType::Object, Value::Object(_)) => Ok(value.clone()),
			(ParamType::Object, Value::String(s)) => match serde_json::from_str::<Value>(s) {
				Ok(parsed @ Value::Object(_)) => Ok(parsed),
				_ => Err("expected a JSON object".into()),
			},
			(ParamType::ObjectList, Value::Object(_)) => Ok(Value::Array(vec![value.clone()])),
			(ParamType::ObjectList, Value::Array(items)) =>
				if items.iter().all(Value::is_object) {
					Ok(value.clone())
				} else {
					Err("expected a list of objects".into())
				},
			(kind, other) => Err(format!("expected {}, found {}", kind.as_str(), json_type(other))),
		}
	}

	/// Returns a stable label for error messages.
	pub const fn as_str(self) -> &'static str {
		match self {
			ParamType::String => "a string",
			ParamType::StringList => "a list of strings",
			ParamType::SpaceSeparated => "a space-separated string",
			ParamType::Integer => "an integer",
			ParamType::Boolean => "a boolean",
			ParamType::Object => "an object",
			ParamType::ObjectList => "a list of objects",
		}
	}
}

/// Declared parameter: name, value shape, and presence requirement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParamSpec {
	/// Claim name.
	pub name: &'static str,
	/// Expected value shape.
	pub kind: ParamType,
	/// Whether the claim must be present.
	pub required: bool,
}
impl ParamSpec {
	/// Declares a required parameter.
	pub const fn required(name: &'static str, kind: ParamType) -> Self {
		Self { name, kind, required: true }
	}

	/// Declares an optional parameter.
	pub const fn optional(name: &'static str, kind: ParamType) -> Self {
		Self { name, kind, required: false }
	}

	/// Checks presence and coerces the claim in place, appending any violation to `out`.
	pub fn check(&self, claims: &mut crate::message::Claims, out: &mut Vec<Violation>) {
		match claims.get(self.name) {
			None | Some(Value::Null) =>
				if self.required {
					out.push(Violation::new(self.name, ViolationKind::MissingRequiredValue));
				},
			Some(value) => match self.kind.coerce(value) {
				Ok(coerced) => {
					claims.insert(self.name.to_owned(), coerced);
				},
				Err(cause) => out.push(
					Violation::new(self.name, ViolationKind::InvalidValueFormat).with_cause(cause),
				),
			},
		}
	}
}

/// Category of a single parameter violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
	/// A required parameter is absent.
	MissingRequiredValue,
	/// A parameter is present but fails type or shape coercion.
	InvalidValueFormat,
	/// A parameter carries a disallowed value.
	ValueNotAllowed,
}
impl ViolationKind {
	/// Returns a stable label suitable for messages.
	pub const fn as_str(self) -> &'static str {
		match self {
			ViolationKind::MissingRequiredValue => "missing required value",
			ViolationKind::InvalidValueFormat => "invalid value format",
			ViolationKind::ValueNotAllowed => "value not allowed",
		}
	}
}
impl Display for ViolationKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One violated parameter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
	/// Parameter name.
	pub parameter: String,
	/// Violation category.
	pub kind: ViolationKind,
	/// Optional cause, such as the coercion failure.
	pub cause: Option<String>,
}
impl Violation {
	/// Creates a violation without a cause.
	pub fn new(parameter: impl Into<String>, kind: ViolationKind) -> Self {
		Self { parameter: parameter.into(), kind, cause: None }
	}

	/// Attaches a cause.
	pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
		self.cause = Some(cause.into());

		self
	}
}
impl Display for Violation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "`{}`: {}", self.parameter, self.kind)?;

		if let Some(cause) = &self.cause {
			write!(f, " ({cause})")?;
		}

		Ok(())
	}
}

/// Aggregate of every violation found in one validation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[error("{}", render(.0))]
pub struct ValidationErrors(pub Vec<Violation>);
impl ValidationErrors {
	/// Returns `true` when no violation was recorded.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Number of recorded violations.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Iterator over violations in the order they were recorded.
	pub fn iter(&self) -> impl Iterator<Item = &Violation> {
		self.0.iter()
	}

	/// Returns `true` if `parameter` was flagged with `kind`.
	pub fn contains(&self, parameter: &str, kind: ViolationKind) -> bool {
		self.0.iter().any(|v| v.parameter == parameter && v.kind == kind)
	}

	/// Converts into `Ok(())` when empty.
	pub fn into_result(self) -> Result<(), Self> {
		if self.is_empty() { Ok(()) } else { Err(self) }
	}
}
impl From<Vec<Violation>> for ValidationErrors {
	fn from(value: Vec<Violation>) -> Self {
		Self(value)
	}
}
impl Extend<Violation> for ValidationErrors {
	fn extend<T: IntoIterator<Item = Violation>>(&mut self, iter: T) {
		self.0.extend(iter);
	}
}

/// Returns `true` if the space-delimited `value` contains `token` as a whole word.
pub fn contains_token(value: &str, token: &str) -> bool {
	value.split_whitespace().any(|candidate| candidate == token)
}

fn render(violations: &[Violation]) -> String {
	let joined = violations.iter().map(Violation::to_string).collect::<Vec<_>>().join("; ");

	format!("{} invalid parameter(s): {joined}", violations.len())
}

fn json_type(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}
