//! The plan IR.
//!
//! A [`Plan`] is the compiled, immutable unit of work for a [`PlanKey`]. Plans
//! refer to nested units by key rather than by pointer, so a record shape
//! that contains itself compiles to a plan that names its own key.

use std::fmt::{self, Write as _};
use std::sync::Arc;

use om_core::{
    Converter, EffectiveOptions, Guard, MemberPath, ScalarKind, Schema, SequenceKind, ShapeId,
    SourceAccessor, TextCodec, TypePair,
};

/// Cache key of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlanKey {
    /// Source and target shapes.
    pub pair: TypePair,
    /// Effective options of the unit.
    pub options: EffectiveOptions,
}

impl PlanKey {
    /// Creates a plan key.
    #[must_use]
    pub const fn new(pair: TypePair, options: EffectiveOptions) -> Self {
        Self { pair, options }
    }
}

/// How a builtin scalar conversion is carried out.
///
/// Variants are listed in tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionMode {
    /// Same kind.
    Identity,
    /// Widening without precision loss, never fails.
    Implicit,
    /// Narrowing or lossy, range-checked.
    Explicit,
    /// Format then parse.
    Textual,
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Identity => "identity",
            Self::Implicit => "implicit",
            Self::Explicit => "explicit",
            Self::Textual => "textual",
        })
    }
}

/// How one member value is produced.
#[derive(Debug, Clone)]
pub enum ValueStep {
    /// A user converter yields the target member value directly.
    Convert(Converter),
    /// The value runs through the plan of the given key.
    Nested(PlanKey),
}

/// One correspondence, ready to run.
#[derive(Debug, Clone)]
pub struct MemberPlan {
    /// Where the value is read.
    pub source: SourceAccessor,
    /// Where the value is written.
    pub target: MemberPath,
    /// Skips the member when it rejects the source object.
    pub guard: Option<Guard>,
    /// How the value is produced.
    pub step: ValueStep,
}

/// Member steps of a struct or record plan.
#[derive(Debug, Clone, Default)]
pub struct RecordPlan {
    /// Steps in correspondence order.
    pub members: Vec<MemberPlan>,
}

/// Which side of an optional pair is optional.
#[derive(Debug, Clone)]
pub struct OptionalPlan {
    /// Plan of the unwrapped values; `None` when the inner shapes match.
    pub inner: Option<PlanKey>,
    /// Whether the target is optional; a required target gets its zero value
    /// for an absent source.
    pub target_optional: bool,
    /// Shape whose zero value stands in for absence on a required target.
    pub zero_shape: ShapeId,
}

/// Parse/format conversion between builtin scalars and textual shapes.
#[derive(Debug, Clone)]
pub struct TextualPlan {
    /// Codec formatting the source, or `None` for a builtin source.
    pub source_codec: Option<Arc<dyn TextCodec>>,
    /// Codec parsing the target, or `None` for a builtin target.
    pub target_codec: Option<Arc<dyn TextCodec>>,
    /// Builtin kind of the target when it has no codec.
    pub target_kind: Option<ScalarKind>,
}

/// Element conversion of an array or sequence.
#[derive(Debug, Clone)]
pub struct CollectionPlan {
    /// Plan of each element.
    pub element: PlanKey,
    /// Target element shape.
    pub element_shape: ShapeId,
}

/// Key and value conversion of a dictionary.
#[derive(Debug, Clone)]
pub struct DictionaryPlan {
    /// Plan of each key.
    pub key: PlanKey,
    /// Plan of each value.
    pub value: PlanKey,
}

/// The executable body of a plan.
#[derive(Debug, Clone)]
pub enum PlanBody {
    /// Returns the source value unchanged.
    Copy,
    /// Builtin scalar conversion.
    Scalar {
        /// Target kind.
        to: ScalarKind,
        /// Conversion mode.
        mode: ConversionMode,
    },
    /// Text to enumeration by name.
    TextToEnum {
        /// Target enumeration.
        enumeration: ShapeId,
    },
    /// Enumeration to its name.
    EnumToText {
        /// Source enumeration.
        enumeration: ShapeId,
    },
    /// Underlying value copy between enumerations.
    EnumToEnum {
        /// Target enumeration.
        target: ShapeId,
    },
    /// Enumeration to an integral scalar.
    EnumToIntegral {
        /// Target kind.
        to: ScalarKind,
    },
    /// Integral scalar to an enumeration.
    IntegralToEnum {
        /// Target enumeration.
        target: ShapeId,
        /// Its underlying kind.
        underlying: ScalarKind,
    },
    /// Optional wrapping and unwrapping.
    Optional(OptionalPlan),
    /// Member copy into a value-type struct.
    Struct(RecordPlan),
    /// Format/parse through a textual codec.
    Textual(TextualPlan),
    /// Array target.
    Array(CollectionPlan),
    /// Sequence target.
    Sequence {
        /// Container flavour of the target.
        kind: SequenceKind,
        /// Element conversion.
        plan: CollectionPlan,
    },
    /// Dictionary target.
    Dictionary(DictionaryPlan),
    /// Dispatch on the runtime shape of the source object.
    Polymorphic {
        /// Static target shape.
        target: ShapeId,
    },
    /// Tracked reference object.
    Reference(RecordPlan),
    /// User converter for the whole pair.
    Custom(Converter),
}

impl PlanBody {
    /// Nested units this body refers to, labelled for display.
    ///
    /// Members produced by a converter have no nested unit.
    #[must_use]
    pub fn children(&self) -> Vec<(String, Option<&PlanKey>)> {
        match self {
            Self::Optional(OptionalPlan { inner: Some(key), .. }) => {
                vec![("value".to_owned(), Some(key))]
            }
            Self::Struct(record) | Self::Reference(record) => record
                .members
                .iter()
                .map(|m| {
                    let label = format!(".{} <- {}", m.target, m.source.label());
                    match &m.step {
                        ValueStep::Nested(key) => (label, Some(key)),
                        ValueStep::Convert(_) => (format!("{label} (converter)"), None),
                    }
                })
                .collect(),
            Self::Array(plan) | Self::Sequence { plan, .. } => {
                vec![("[*]".to_owned(), Some(&plan.element))]
            }
            Self::Dictionary(plan) => vec![
                ("key".to_owned(), Some(&plan.key)),
                ("value".to_owned(), Some(&plan.value)),
            ],
            _ => Vec::new(),
        }
    }
}

/// A compiled plan.
#[derive(Debug, Clone)]
pub struct Plan {
    /// The key the plan was compiled for.
    pub key: PlanKey,
    /// Name of the strategy that built it (`custom` for pair converters).
    pub strategy: &'static str,
    /// What to execute.
    pub body: PlanBody,
}

impl Plan {
    /// One-line description, e.g. `text -> i32 [builtin-scalar: textual]`.
    #[must_use]
    pub fn summary(&self, schema: &Schema) -> String {
        let mut line = format!("{} [{}", schema.pair_label(self.key.pair), self.strategy);
        match &self.body {
            PlanBody::Scalar { mode, .. } => {
                let _ = write!(line, ": {mode}");
            }
            PlanBody::Sequence { kind, .. } => {
                let _ = write!(line, ": {}", kind.name());
            }
            _ => {}
        }
        line.push(']');
        let options = &self.key.options;
        if options != &EffectiveOptions::default() {
            let _ = write!(
                line,
                " {{{:?}, {:?}{}{}}}",
                options.reference_behavior,
                options.collection_behavior,
                if options.comparer.is_some() { ", comparer" } else { "" },
                if options.constructor.is_some() { ", constructor" } else { "" },
            );
        }
        line
    }
}
