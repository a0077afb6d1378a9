//! Error types shared across the workspace.
//!
//! - [`ConfigError`]: loading and validating a [`MapperConfig`](crate::MapperConfig).
//! - [`ConfigurationError`]: a mapping cannot be planned (raised at plan-build
//!   time, deterministic, never retried).
//! - [`ConversionError`]: a value failed a parse or range check while mapping.
//! - [`MapError`]: what a mapping call returns, carrying the offending type
//!   pair and member path.

use camino::Utf8PathBuf;

/// Errors that can occur while loading mapper configuration.
///
/// # Examples
///
/// ```
/// use om_core::ConfigError;
///
/// let error = ConfigError::InvalidOption {
///     option: "defaults.collection_behavior".to_owned(),
///     reason: "needs a comparer".to_owned(),
/// };
/// assert!(error.to_string().contains("collection_behavior"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// An I/O error occurred while reading configuration.
    #[error("failed to read configuration {path}: {source}")]
    Io {
        /// The file that could not be read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the configuration file.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A mapping between two shapes cannot be planned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// No strategy handles the pair and no converter was registered.
    #[error("no transformation strategy for {pair}")]
    NoStrategy {
        /// Rendered type pair.
        pair: String,
    },

    /// Update behavior was requested for a collection without a comparer.
    #[error("collection behavior `update` for {pair} requires an element comparer")]
    MissingComparer {
        /// Rendered type pair.
        pair: String,
    },

    /// A polymorphic value's runtime shape has no registered target.
    #[error("runtime shape `{runtime}` has no registered mapping to a shape assignable to `{target}`")]
    UnmappedRuntimeShape {
        /// Runtime shape of the source value.
        runtime: String,
        /// Static target shape.
        target: String,
    },

    /// A target shape cannot be instantiated.
    #[error("shape `{shape}` cannot be constructed: {reason}")]
    NotConstructible {
        /// Shape name.
        shape: String,
        /// Why construction is impossible.
        reason: String,
    },

    /// A member path names a member the shape does not have.
    #[error("shape `{shape}` has no member `{member}`")]
    UnknownMember {
        /// Shape name.
        shape: String,
        /// Missing member.
        member: String,
    },

    /// A shape id or name is not part of the schema.
    #[error("unknown shape {0}")]
    UnknownShape(String),

    /// A correspondence is malformed.
    #[error("invalid correspondence for {pair}: {reason}")]
    InvalidCorrespondence {
        /// Rendered type pair.
        pair: String,
        /// What is wrong.
        reason: String,
    },

    /// The schema itself is malformed.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

impl ConfigurationError {
    /// Creates a [`ConfigurationError::NotConstructible`] error.
    #[inline]
    pub fn not_constructible(shape: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotConstructible {
            shape: shape.into(),
            reason: reason.into(),
        }
    }

    /// Creates a [`ConfigurationError::InvalidCorrespondence`] error.
    #[inline]
    pub fn invalid_correspondence(pair: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCorrespondence {
            pair: pair.into(),
            reason: reason.into(),
        }
    }
}

/// A value failed to convert at execution time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    /// Text could not be parsed as the target kind.
    #[error("cannot parse {input:?} as {target}")]
    Parse {
        /// The offending text.
        input: String,
        /// Target kind or shape.
        target: String,
    },

    /// A numeric value does not fit the target kind.
    #[error("value {value} is out of range for {target}")]
    OutOfRange {
        /// The offending value, rendered.
        value: String,
        /// Target kind.
        target: String,
    },

    /// Text names no variant of the enumeration.
    #[error("{name:?} is not a variant of `{enumeration}`")]
    UnknownEnumName {
        /// The offending name.
        name: String,
        /// Enumeration name.
        enumeration: String,
    },

    /// Raised by user converters.
    #[error("{0}")]
    Custom(String),
}

impl ConversionError {
    /// Creates a [`ConversionError::Parse`] error.
    #[inline]
    pub fn parse(input: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Parse {
            input: input.into(),
            target: target.into(),
        }
    }

    /// Creates a [`ConversionError::OutOfRange`] error.
    #[inline]
    pub fn out_of_range(value: impl ToString, target: impl Into<String>) -> Self {
        Self::OutOfRange {
            value: value.to_string(),
            target: target.into(),
        }
    }

    /// Creates a [`ConversionError::Custom`] error.
    #[inline]
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}

/// Error returned by a mapping call.
///
/// The member path grows while the error unwinds through nested members, so
/// the final path reads from the root, e.g. `Orders.Lines.Quantity`.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// The mapping could not be planned.
    #[error("{source}{}", member_suffix(.member))]
    Configuration {
        /// Member path where planning failed, if inside a member.
        member: Option<String>,
        /// The configuration failure.
        #[source]
        source: ConfigurationError,
    },

    /// A value failed to convert.
    #[error("failed to map {pair}{}: {source}", member_suffix(.member))]
    Conversion {
        /// Rendered type pair.
        pair: String,
        /// Member path of the failing value.
        member: Option<String>,
        /// The conversion failure.
        #[source]
        source: ConversionError,
    },

    /// A runtime value contradicts its declared shape.
    #[error("expected a value of shape `{expected}`, found {found}{}", member_suffix(.member))]
    ValueMismatch {
        /// Declared shape.
        expected: String,
        /// What was found instead.
        found: String,
        /// Member path of the value.
        member: Option<String>,
    },
}

#[allow(clippy::ref_option)]
fn member_suffix(member: &Option<String>) -> String {
    member
        .as_ref()
        .map(|path| format!(" at member `{path}`"))
        .unwrap_or_default()
}

impl MapError {
    /// Creates a [`MapError::Conversion`] error.
    #[inline]
    pub fn conversion(pair: impl Into<String>, source: ConversionError) -> Self {
        Self::Conversion {
            pair: pair.into(),
            member: None,
            source,
        }
    }

    /// Creates a [`MapError::ValueMismatch`] error.
    #[inline]
    pub fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::ValueMismatch {
            expected: expected.into(),
            found: found.into(),
            member: None,
        }
    }

    /// Prepends an enclosing member name to the member path.
    #[must_use]
    pub fn within(mut self, name: &str) -> Self {
        let slot = match &mut self {
            Self::Configuration { member, .. }
            | Self::Conversion { member, .. }
            | Self::ValueMismatch { member, .. } => member,
        };
        *slot = Some(match slot.take() {
            Some(inner) => format!("{name}.{inner}"),
            None => name.to_owned(),
        });
        self
    }

    /// Returns the member path of the failure, if any.
    #[must_use]
    pub fn member(&self) -> Option<&str> {
        match self {
            Self::Configuration { member, .. }
            | Self::Conversion { member, .. }
            | Self::ValueMismatch { member, .. } => member.as_deref(),
        }
    }

    /// Returns `true` for planning failures.
    #[inline]
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Returns `true` for value conversion failures.
    #[inline]
    #[must_use]
    pub const fn is_conversion(&self) -> bool {
        matches!(self, Self::Conversion { .. })
    }
}

impl From<ConfigurationError> for MapError {
    fn from(source: ConfigurationError) -> Self {
        Self::Configuration {
            member: None,
            source,
        }
    }
}
