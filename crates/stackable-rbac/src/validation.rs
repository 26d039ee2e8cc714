/*
   Checks performed locally before a request is sent, so that invalid configuration is reported
   once at the boundary instead of surfacing as a rejected request.

   Warning: These must not be stricter than what the API server enforces for RBAC objects.
*/

// This is adapted from Kubernetes.
// See apimachinery/pkg/util/validation/validation.go, apimachinery/pkg/api/validation/path/name.go
// and pkg/apis/rbac/validation/validation.go in the Kubernetes source

use std::{fmt::Display, sync::LazyLock};

use const_format::concatcp;
use regex::Regex;
use snafu::{IntoError, Snafu};

/// Minimal length required by RFC 1123 is 63. Up to 255 allowed, unsupported by k8s.
const RFC_1123_LABEL_MAX_LENGTH: usize = 63;
const RFC_1123_LABEL_FMT: &str = "[a-z0-9]([-a-z0-9]*[a-z0-9])?";
const RFC_1123_LABEL_ERROR_MSG: &str = "a lowercase RFC 1123 label must consist of lower case alphanumeric characters or '-', and must start and end with an alphanumeric character";

/// This is a subdomain's max length in DNS (RFC 1123)
const RFC_1123_SUBDOMAIN_MAX_LENGTH: usize = 253;
const RFC_1123_SUBDOMAIN_FMT: &str =
    concatcp!(RFC_1123_LABEL_FMT, "(\\.", RFC_1123_LABEL_FMT, ")*");
const RFC_1123_SUBDOMAIN_ERROR_MSG: &str = "a lowercase RFC 1123 subdomain must consist of lower case alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character";

const QUALIFIED_NAME_MAX_LENGTH: usize = 63;
const QUALIFIED_NAME_FMT: &str = "([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]";
const QUALIFIED_NAME_ERROR_MSG: &str = "name part must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character";

const LABEL_VALUE_MAX_LENGTH: usize = 63;
const LABEL_VALUE_FMT: &str = concatcp!("(", QUALIFIED_NAME_FMT, ")?");
const LABEL_VALUE_ERROR_MSG: &str = "a valid label must be an empty string or consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character";

/// RBAC object names are only required to be valid path segments.
const OBJECT_NAME_MAX_LENGTH: usize = RFC_1123_SUBDOMAIN_MAX_LENGTH;
const PATH_SEGMENT_FORBIDDEN_NAMES: &[&str] = &[".", ".."];
const PATH_SEGMENT_FORBIDDEN_SUBSTRINGS: &[&str] = &["/", "%"];

// Lazily initialized regular expressions
static RFC_1123_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{RFC_1123_LABEL_FMT}$")).expect("failed to compile RFC 1123 label regex")
});

static RFC_1123_SUBDOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{RFC_1123_SUBDOMAIN_FMT}$"))
        .expect("failed to compile RFC 1123 subdomain regex")
});

static QUALIFIED_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{QUALIFIED_NAME_FMT}$")).expect("failed to compile qualified name regex")
});

static LABEL_VALUE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{LABEL_VALUE_FMT}$")).expect("failed to compile label value regex")
});

type Result<T = (), E = Errors> = std::result::Result<T, E>;

/// A collection of errors discovered during validation.
#[derive(Debug, Default)]
pub struct Errors(Vec<Error>);

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: Error) {
        self.0.push(error);
    }

    /// Records all errors of `result` (if any) as belonging to `field`.
    pub fn field(&mut self, field: impl Into<String>, result: Result) {
        if let Err(Self(errors)) = result {
            let field = field.into();
            self.0.extend(errors.into_iter().map(|error| Error::Field {
                field: field.clone(),
                source: Box::new(error),
            }));
        }
    }

    /// Merges another collection into this one.
    pub fn extend(&mut self, result: Result) {
        if let Err(Self(errors)) = result {
            self.0.extend(errors);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.0.iter()
    }

    /// Returns [`Ok`] if no errors were recorded.
    pub fn into_result(self) -> Result {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl<'a> IntoIterator for &'a Errors {
    type IntoIter = std::slice::Iter<'a, Error>;
    type Item = &'a Error;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Display for Errors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            let prefix = match i {
                0 => "",
                _ => ", ",
            };
            write!(f, "{prefix}{error}")?;
        }
        Ok(())
    }
}
impl std::error::Error for Errors {}

/// A single validation error.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(transparent)]
    Regex { source: RegexError },

    #[snafu(display("input is {length} bytes long but must be no more than {max_length}"))]
    TooLong { length: usize, max_length: usize },

    #[snafu(display("input must not be empty"))]
    Empty,

    #[snafu(display("input may not be {value:?}"))]
    ForbiddenName { value: &'static str },

    #[snafu(display("input may not contain {substring:?}"))]
    ForbiddenSubstring { substring: &'static str },

    #[snafu(display("prefix part {prefix:?} is invalid: {source}"))]
    Prefix { prefix: String, source: Errors },

    #[snafu(display("a qualified name must consist of an optional prefix and a name part separated by a single '/'"))]
    QualifiedNameFormat,

    #[snafu(display("{field} is required"))]
    Required { field: String },

    #[snafu(display("{field} is forbidden: {reason}"))]
    Forbidden { field: String, reason: &'static str },

    #[snafu(display("{field}: {source}"))]
    Field { field: String, source: Box<Error> },
}

#[derive(Debug)]
pub struct RegexError {
    /// The primary error message.
    msg: &'static str,

    /// The regex that the input must match.
    regex: &'static str,

    /// Examples of valid inputs (if non-empty).
    examples: &'static [&'static str],
}

impl Display for RegexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            msg,
            regex,
            examples,
        } = self;
        write!(f, "{msg} (")?;
        if !examples.is_empty() {
            for (i, example) in examples.iter().enumerate() {
                let prefix = match i {
                    0 => "e.g.",
                    _ => "or",
                };
                write!(f, "{prefix} {example:?}, ")?;
            }
        }
        write!(f, "regex used for validation is {regex:?})")
    }
}

impl std::error::Error for RegexError {}

/// Returns [`Ok`] if `value`'s length fits within `max_length`.
fn validate_str_length(value: &str, max_length: usize) -> Result<(), Error> {
    if value.len() > max_length {
        TooLongSnafu {
            length: value.len(),
            max_length,
        }
        .fail()
    } else {
        Ok(())
    }
}

/// Returns [`Ok`] if `value` matches `regex`.
fn validate_str_regex(
    value: &str,
    regex: &'static Regex,
    error_msg: &'static str,
    examples: &'static [&'static str],
) -> Result<(), Error> {
    if regex.is_match(value) {
        Ok(())
    } else {
        Err(RegexError {
            msg: error_msg,
            regex: regex
                .as_str()
                // Clean up start/end-of-line markers
                .trim_start_matches('^')
                .trim_end_matches('$'),
            examples,
        }
        .into())
    }
}

fn validate_not_empty(value: &str) -> Result<(), Error> {
    if value.is_empty() {
        EmptySnafu.fail()
    } else {
        Ok(())
    }
}

/// Returns [`Ok`] if *all* validations are [`Ok`], otherwise returns all errors.
fn validate_all(validations: impl IntoIterator<Item = Result<(), Error>>) -> Result {
    let errors = validations
        .into_iter()
        .filter_map(|res| res.err())
        .collect::<Vec<_>>();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Errors(errors))
    }
}

/// Tests for a string that conforms to the definition of a lowercase label in DNS (RFC 1123).
/// This is the format of namespace names.
pub fn is_rfc_1123_label(value: &str) -> Result {
    validate_all([
        validate_str_length(value, RFC_1123_LABEL_MAX_LENGTH),
        validate_str_regex(
            value,
            &RFC_1123_LABEL_REGEX,
            RFC_1123_LABEL_ERROR_MSG,
            &["my-name", "123-abc"],
        ),
    ])
}

/// Tests for a string that conforms to the definition of a lowercase subdomain in DNS (RFC 1123).
pub fn is_rfc_1123_subdomain(value: &str) -> Result {
    validate_all([
        validate_str_length(value, RFC_1123_SUBDOMAIN_MAX_LENGTH),
        validate_str_regex(
            value,
            &RFC_1123_SUBDOMAIN_REGEX,
            RFC_1123_SUBDOMAIN_ERROR_MSG,
            &["example.com"],
        ),
    ])
}

/// Tests whether a string can be used as the name of an RBAC object.
///
/// RBAC names only need to be usable as a single URL path segment, which is why names like
/// `system:controller:bootstrap-signer` are valid.
pub fn is_rbac_name(value: &str) -> Result {
    let mut validations = vec![
        validate_not_empty(value),
        validate_str_length(value, OBJECT_NAME_MAX_LENGTH),
    ];

    validations.extend(
        PATH_SEGMENT_FORBIDDEN_NAMES
            .iter()
            .filter(|forbidden| **forbidden == value)
            .map(|forbidden| ForbiddenNameSnafu { value: *forbidden }.fail()),
    );
    validations.extend(
        PATH_SEGMENT_FORBIDDEN_SUBSTRINGS
            .iter()
            .filter(|forbidden| value.contains(**forbidden))
            .map(|forbidden| {
                ForbiddenSubstringSnafu {
                    substring: *forbidden,
                }
                .fail()
            }),
    );

    validate_all(validations)
}

/// Tests for a qualified name, as used by label and annotation keys, e.g.
/// `app.kubernetes.io/name` or `owner`.
pub fn is_qualified_name(value: &str) -> Result {
    let (prefix, name) = match value.split('/').collect::<Vec<_>>().as_slice() {
        [name] => (None, *name),
        [prefix, name] => (Some(*prefix), *name),
        _ => return validate_all([QualifiedNameFormatSnafu.fail()]),
    };

    let mut validations = vec![
        validate_not_empty(name),
        validate_str_length(name, QUALIFIED_NAME_MAX_LENGTH),
        validate_str_regex(
            name,
            &QUALIFIED_NAME_REGEX,
            QUALIFIED_NAME_ERROR_MSG,
            &["MyName", "my.name", "123-abc"],
        ),
    ];

    if let Some(prefix) = prefix {
        let prefix_result = if prefix.is_empty() {
            validate_all([EmptySnafu.fail()])
        } else {
            is_rfc_1123_subdomain(prefix)
        };

        if let Err(source) = prefix_result {
            validations.push(Err(PrefixSnafu {
                prefix: prefix.to_owned(),
            }
            .into_error(source)));
        }
    }

    validate_all(validations)
}

/// Tests for a valid label value, which may be empty.
pub fn is_label_value(value: &str) -> Result {
    validate_all([
        validate_str_length(value, LABEL_VALUE_MAX_LENGTH),
        validate_str_regex(
            value,
            &LABEL_VALUE_REGEX,
            LABEL_VALUE_ERROR_MSG,
            &["MyValue", "my_value", "12345"],
        ),
    ])
}

/// Shorthand to record a missing required field.
pub fn required(field: impl Into<String>) -> Errors {
    Errors(vec![Error::Required {
        field: field.into(),
    }])
}

/// Shorthand to record a field which must not be set.
pub fn forbidden(field: impl Into<String>, reason: &'static str) -> Errors {
    Errors(vec![Error::Forbidden {
        field: field.into(),
        reason,
    }])
}
