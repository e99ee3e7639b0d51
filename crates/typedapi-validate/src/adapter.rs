//! The validation adapter shared by every endpoint.

use crate::error::{FieldError, Translator, ValidationError};
use crate::wire::WireNames;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use validator::{ValidationErrors, ValidationErrorsKind};

static SHARED: OnceLock<Arc<Validator>> = OnceLock::new();

/// Runs `validator` rules and turns the result into an ordered list of
/// [`FieldError`]s with human-readable sentences.
///
/// Most applications use [`Validator::shared`]. Tests or endpoints that need
/// different messages construct their own instance and pass it at mount time.
///
/// ```rust
/// use typedapi_validate::Validator;
/// use validator::Validate;
///
/// #[derive(Validate)]
/// struct CreateItem {
///     #[validate(required)]
///     message: Option<String>,
/// }
///
/// let validator = Validator::shared();
/// let err = validator.validate(&CreateItem { message: None }).unwrap_err();
/// assert_eq!(validator.first_violation_message(&err), "Field 'message' is required.");
/// ```
#[derive(Clone, Default)]
pub struct Validator {
    translator: Option<Arc<dyn Translator>>,
}

impl Validator {
    /// Create a validator producing the built-in English messages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator that consults `translator` before the built-in
    /// messages.
    pub fn with_translator(translator: impl Translator + 'static) -> Self {
        Self {
            translator: Some(Arc::new(translator)),
        }
    }

    /// The process-wide default instance. Initialized on first use and never
    /// mutated afterwards.
    pub fn shared() -> Arc<Validator> {
        SHARED.get_or_init(|| Arc::new(Validator::new())).clone()
    }

    /// Validate a value, collecting every violation. Fields are reported
    /// under their Rust names.
    pub fn validate<T>(&self, value: &T) -> Result<(), ValidationError>
    where
        T: validator::Validate + ?Sized,
    {
        self.validate_named(value, &WireNames::new())
    }

    /// Validate a value, reporting top-level fields under the names callers
    /// send them as.
    ///
    /// ```rust
    /// use serde::Deserialize;
    /// use typedapi_validate::{Validator, WireNames};
    /// use validator::Validate;
    ///
    /// #[derive(Deserialize, Validate)]
    /// #[serde(rename_all = "camelCase")]
    /// struct CreateQueue {
    ///     #[validate(required)]
    ///     queue_name: Option<String>,
    /// }
    ///
    /// let validator = Validator::shared();
    /// let names = WireNames::of::<CreateQueue>();
    /// let err = validator
    ///     .validate_named(&CreateQueue { queue_name: None }, &names)
    ///     .unwrap_err();
    /// assert_eq!(validator.first_violation_message(&err), "Field 'queueName' is required.");
    /// ```
    pub fn validate_named<T>(&self, value: &T, names: &WireNames) -> Result<(), ValidationError>
    where
        T: validator::Validate + ?Sized,
    {
        value
            .validate()
            .map_err(|errors| self.convert(&errors, names))
    }

    /// The single sentence shown to API callers: the first violation only.
    pub fn first_violation_message(&self, err: &ValidationError) -> String {
        match err.first() {
            Some(field) => field.message.clone(),
            None => "Request validation failed.".to_string(),
        }
    }

    fn convert(&self, errors: &ValidationErrors, names: &WireNames) -> ValidationError {
        let mut fields = Vec::new();
        self.collect(errors, None, names, &mut fields);
        ValidationError::new(fields)
    }

    fn collect(
        &self,
        errors: &ValidationErrors,
        prefix: Option<&str>,
        names: &WireNames,
        out: &mut Vec<FieldError>,
    ) {
        let mut entries: Vec<(String, &ValidationErrorsKind)> = errors
            .errors()
            .iter()
            .map(|(field, kind)| {
                let path = match prefix {
                    Some(prefix) => format!("{prefix}.{field}"),
                    None => names.resolve(field).to_string(),
                };
                (path, kind)
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (path, kind) in entries {
            match kind {
                ValidationErrorsKind::Field(errs) => {
                    for err in errs {
                        out.push(self.field_error(&path, err));
                    }
                }
                ValidationErrorsKind::Struct(inner) => self.collect(inner, Some(&path), names, out),
                ValidationErrorsKind::List(items) => {
                    for (index, inner) in items {
                        self.collect(inner, Some(&format!("{path}[{index}]")), names, out);
                    }
                }
            }
        }
    }

    fn field_error(&self, path: &str, err: &validator::ValidationError) -> FieldError {
        let code = err.code.to_string();
        let params: HashMap<String, Value> = err
            .params
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();

        let message = self
            .translator
            .as_ref()
            .and_then(|t| t.translate(&code, path, Some(&params)))
            .or_else(|| err.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| describe(path, &code, &params));

        if params.is_empty() {
            FieldError::new(path, code, message)
        } else {
            FieldError::with_params(path, code, message, params)
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("translator", &self.translator.is_some())
            .finish()
    }
}

/// Render a violation as `Field '<name>' ...` sentence.
fn describe(field: &str, code: &str, params: &HashMap<String, Value>) -> String {
    match code {
        "required" => format!("Field '{field}' is required."),
        "length" => describe_length(field, params),
        "range" => describe_range(field, params),
        "email" => format!("Field '{field}' must be a valid email address."),
        "url" => format!("Field '{field}' must be a valid URL."),
        "regex" => format!("Field '{field}' is not in the expected format."),
        "must_match" => match params.get("other").and_then(Value::as_str) {
            Some(other) => format!("Field '{field}' must match field '{other}'."),
            None => format!("Field '{field}' must match another field."),
        },
        "contains" => match params.get("needle").and_then(Value::as_str) {
            Some(needle) => format!("Field '{field}' must contain '{needle}'."),
            None => fallback(field, code),
        },
        "does_not_contain" => match params.get("needle").and_then(Value::as_str) {
            Some(needle) => format!("Field '{field}' must not contain '{needle}'."),
            None => fallback(field, code),
        },
        "non_control_character" => {
            format!("Field '{field}' must not contain control characters.")
        }
        _ => fallback(field, code),
    }
}

fn fallback(field: &str, code: &str) -> String {
    format!("Validation on field '{field}' failed on the '{code}' rule.")
}

fn describe_length(field: &str, params: &HashMap<String, Value>) -> String {
    let (len, is_text) = match params.get("value") {
        Some(Value::String(s)) => (Some(s.chars().count() as u64), true),
        Some(Value::Array(items)) => (Some(items.len() as u64), false),
        Some(Value::Object(map)) => (Some(map.len() as u64), false),
        _ => (None, true),
    };
    let bound = |name: &str| params.get(name).and_then(Value::as_u64);

    let phrase = |qualifier: &str, n: u64| {
        if is_text {
            format!("Field '{field}' must be {qualifier} {n} character(s) long.")
        } else {
            format!("Field '{field}' must contain {qualifier} {n} element(s).")
        }
    };

    if let Some(equal) = bound("equal") {
        return phrase("exactly", equal);
    }

    match (len, bound("min"), bound("max")) {
        (Some(len), Some(min), _) if len < min => phrase("at least", min),
        (_, _, Some(max)) => phrase("at most", max),
        (_, Some(min), None) => phrase("at least", min),
        _ => fallback(field, "length"),
    }
}

fn describe_range(field: &str, params: &HashMap<String, Value>) -> String {
    let value = params.get("value").and_then(Value::as_f64);
    let bound = |name: &str| {
        params
            .get(name)
            .filter(|v| v.is_number())
            .map(|v| (v.as_f64().unwrap_or_default(), v.to_string()))
    };

    if let (Some(value), Some((min, shown))) = (value, bound("min")) {
        if value < min {
            return format!("Field '{field}' must be greater than or equal to {shown}.");
        }
    }
    if let (Some(value), Some((min, shown))) = (value, bound("exclusive_min")) {
        if value <= min {
            return format!("Field '{field}' must be greater than {shown}.");
        }
    }
    if let (Some(value), Some((max, shown))) = (value, bound("max")) {
        if value > max {
            return format!("Field '{field}' must be less than or equal to {shown}.");
        }
    }
    if let (Some(value), Some((max, shown))) = (value, bound("exclusive_max")) {
        if value >= max {
            return format!("Field '{field}' must be less than {shown}.");
        }
    }

    match (bound("min"), bound("max")) {
        (Some((_, min)), Some((_, max))) => {
            format!("Field '{field}' must be between {min} and {max}.")
        }
        _ => fallback(field, "range"),
    }
}
