//! Data model shared by the scanner, the generator and the metadata store.

use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt;

/// The only metadata version the generator understands.
pub const SUPPORTED_METADATA_VERSION: f64 = 1.1;

/// Function name → metadata, in the order the unit declared them.
pub type MetadataIndex = IndexMap<String, FunctionMetadata>;

/// Metadata describing one function's arguments and calling convention.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionMetadata {
    /// Metadata format version (`v`)
    #[serde(rename = "v", default = "default_version")]
    pub metadata_version: f64,
    /// Argument name → spec, in declared order
    #[serde(default)]
    pub args: IndexMap<String, ArgSpec>,
    /// How arguments are packed into the function's argument variable
    #[serde(default)]
    pub args_as: ArgsAs,
    /// Raise on failure instead of returning `[400, message]`
    #[serde(default)]
    pub result_naked: bool,
}

fn default_version() -> f64 {
    1.0
}

impl FunctionMetadata {
    pub fn has_supported_version(&self) -> bool {
        (self.metadata_version - SUPPORTED_METADATA_VERSION).abs() < f64::EPSILON
    }

    /// Names of required arguments, in declared order.
    pub fn required_args(&self) -> impl Iterator<Item = &str> {
        self.args
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
    }
}

/// Per-argument metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArgSpec {
    /// Uncompiled schema, e.g. `"int"` or `["int", {"min": 1}]`
    #[serde(default)]
    pub schema: Option<serde_json::Value>,
    #[serde(rename = "req", alias = "required", default)]
    pub required: bool,
}

/// Argument packing style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgsAs {
    #[default]
    Hash,
    HashRef,
    Array,
    ArrayRef,
}

impl ArgsAs {
    /// Only the two hash styles can be addressed by argument name.
    pub fn is_supported(self) -> bool {
        matches!(self, ArgsAs::Hash | ArgsAs::HashRef)
    }

    /// Variable kind that can hold every argument under this packing style:
    /// a hash for `hash`, a scalar holding the reference for `hashref`.
    pub fn aggregate_kind(self) -> VarKind {
        match self {
            ArgsAs::HashRef | ArgsAs::ArrayRef => VarKind::Scalar,
            ArgsAs::Hash => VarKind::Hash,
            ArgsAs::Array => VarKind::Array,
        }
    }
}

impl fmt::Display for ArgsAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArgsAs::Hash => "hash",
            ArgsAs::HashRef => "hashref",
            ArgsAs::Array => "array",
            ArgsAs::ArrayRef => "arrayref",
        };
        f.write_str(name)
    }
}

/// Structural kind of a declared variable, from its sigil.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Scalar,
    Array,
    Hash,
}

impl VarKind {
    pub fn from_sigil(sigil: char) -> Option<VarKind> {
        match sigil {
            '$' => Some(VarKind::Scalar),
            '@' => Some(VarKind::Array),
            '%' => Some(VarKind::Hash),
            _ => None,
        }
    }

    pub fn sigil(self) -> char {
        match self {
            VarKind::Scalar => '$',
            VarKind::Array => '@',
            VarKind::Hash => '%',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `# VALIDATE_ARG`
    Single,
    /// `# VALIDATE_ARGS`
    All,
}

/// A parsed `VALIDATE_ARG[S]` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionTag {
    pub kind: TagKind,
    /// Name declared on the line, without sigil
    pub bound_variable: String,
    pub var_kind: VarKind,
    /// Name given after the tag keyword, overriding `bound_variable`
    pub explicit_argument: Option<String>,
    /// Everything before the tag comment, verbatim
    pub leading_code: String,
    /// The tag comment itself, verbatim
    pub trailing_tag: String,
}

impl InjectionTag {
    /// Argument a `VALIDATE_ARG` tag refers to.
    pub fn argument_name(&self) -> &str {
        self.explicit_argument
            .as_deref()
            .unwrap_or(&self.bound_variable)
    }

    /// The declared variable with its sigil, e.g. `%args`.
    pub fn declared(&self) -> String {
        format!("{}{}", self.var_kind.sigil(), self.bound_variable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Notice,
    Warning,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Notice => "notice",
            Severity::Warning => "warning",
            Severity::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// One entry on the diagnostics channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: String,
    /// 1-based line number, when the diagnostic belongs to a line
    pub line: Option<usize>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: {}: {}", self.file, line, self.severity, self.message),
            None => write!(f, "{}: {}: {}", self.file, self.severity, self.message),
        }
    }
}
