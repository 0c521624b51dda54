//! Validation code generation for a tag line.
//!
//! Per argument, the generated code is
//!
//! ```text
//! [my $arg_err;] [<missing check>] [<schema code> <error check>]
//! ```
//!
//! all on one line. The missing check comes first so a required argument
//! that is absent never reaches the schema code.

use crate::error::GenerateError;
use crate::model::{ArgSpec, ArgsAs, FunctionMetadata, InjectionTag, VarKind, SUPPORTED_METADATA_VERSION};
use crate::schema::{perl_double_quoted, CompileRequest, ReturnKind, SchemaCompiler};
use crate::squash::squash;
use regex::Regex;
use std::sync::LazyLock;

/// Variable holding the schema error message within a function.
pub const ERR_TERM: &str = "$arg_err";

/// Status returned for any argument validation failure.
pub const INVALID_ARGUMENT_STATUS: u16 = 400;

static RE_BAREWORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*$").unwrap());

/// How a failing check leaves the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStyle {
    /// `die <message>;`
    Naked,
    /// `return [400, <message>];`
    Structured,
}

impl FailureStyle {
    pub fn for_metadata(meta: &FunctionMetadata) -> Self {
        if meta.result_naked {
            FailureStyle::Naked
        } else {
            FailureStyle::Structured
        }
    }

    fn fail(self, message: &str) -> String {
        match self {
            FailureStyle::Naked => format!("die {message};"),
            FailureStyle::Structured => format!("return [{INVALID_ARGUMENT_STATUS}, {message}];"),
        }
    }
}

/// Code to splice and the arguments it validates.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Generated {
    pub code: String,
    pub validated: Vec<String>,
}

/// One argument to check.
struct Target<'m> {
    name: &'m str,
    spec: &'m ArgSpec,
    /// Expression for the argument's value
    data_term: String,
    /// Expression true when the argument was not passed
    missing: String,
}

pub struct Generator<'c> {
    compiler: &'c dyn SchemaCompiler,
}

impl<'c> Generator<'c> {
    pub fn new(compiler: &'c dyn SchemaCompiler) -> Self {
        Self { compiler }
    }

    /// Code for a `VALIDATE_ARG` tag.
    ///
    /// `err_declared` tells whether an earlier tag in the same function
    /// already declared [`ERR_TERM`].
    pub fn single(
        &self,
        function: &str,
        meta: &FunctionMetadata,
        tag: &InjectionTag,
        err_declared: bool,
    ) -> Result<Generated, GenerateError> {
        check_metadata(function, meta)?;
        if tag.var_kind != VarKind::Scalar {
            return Err(GenerateError::WrongVarKind {
                tag: "VALIDATE_ARG",
                expected: VarKind::Scalar.sigil(),
                found: tag.declared(),
            });
        }
        let name = tag.argument_name();
        let (name, spec) = meta
            .args
            .get_key_value(name)
            .ok_or_else(|| GenerateError::UnknownArgument {
                function: function.to_string(),
                argument: name.to_string(),
            })?;
        if spec.schema.is_none() {
            return Err(GenerateError::MissingSchema {
                function: function.to_string(),
                argument: name.clone(),
            });
        }
        let var = format!("${}", tag.bound_variable);
        let target = Target {
            name,
            spec,
            missing: format!("!defined({var})"),
            data_term: var,
        };
        self.assemble(FailureStyle::for_metadata(meta), &[target], err_declared)
    }

    /// Code for a `VALIDATE_ARGS` tag: every argument in metadata order.
    pub fn all(
        &self,
        function: &str,
        meta: &FunctionMetadata,
        tag: &InjectionTag,
        err_declared: bool,
    ) -> Result<Generated, GenerateError> {
        check_metadata(function, meta)?;
        if let Some(name) = &tag.explicit_argument {
            return Err(GenerateError::ExplicitNameOnAll(name.clone()));
        }
        let expected = meta.args_as.aggregate_kind();
        if tag.var_kind != expected {
            return Err(GenerateError::WrongVarKind {
                tag: "VALIDATE_ARGS",
                expected: expected.sigil(),
                found: tag.declared(),
            });
        }
        let targets: Vec<Target> = meta
            .args
            .iter()
            .map(|(name, spec)| {
                let data_term = element_term(meta.args_as, &tag.bound_variable, name);
                Target {
                    name,
                    spec,
                    missing: format!("!exists({data_term})"),
                    data_term,
                }
            })
            .collect();
        self.assemble(FailureStyle::for_metadata(meta), &targets, err_declared)
    }

    fn assemble(
        &self,
        style: FailureStyle,
        targets: &[Target<'_>],
        mut err_declared: bool,
    ) -> Result<Generated, GenerateError> {
        let mut pieces = Vec::new();
        let mut validated = Vec::with_capacity(targets.len());
        for target in targets {
            let checks = self.checks_for(style, target)?;
            if !checks.is_empty() {
                if !err_declared {
                    pieces.push(format!("my {ERR_TERM};"));
                    err_declared = true;
                }
                pieces.extend(checks);
            }
            validated.push(target.name.to_string());
        }
        let code = if pieces.is_empty() {
            String::new()
        } else {
            let mut code = pieces.join(" ");
            code.push(' ');
            code
        };
        Ok(Generated { code, validated })
    }

    fn checks_for(&self, style: FailureStyle, target: &Target<'_>) -> Result<Vec<String>, GenerateError> {
        let mut checks = Vec::new();
        if target.spec.required {
            let message = perl_double_quoted(&format!("Missing required argument '{}'", target.name));
            checks.push(format!("if ({}) {{ {} }}", target.missing, style.fail(&message)));
        }
        if let Some(schema) = &target.spec.schema {
            let compiled = self
                .compiler
                .compile(&CompileRequest {
                    schema,
                    err_term: ERR_TERM,
                    data_term: &target.data_term,
                    data_name: target.name,
                    return_kind: ReturnKind::Str,
                })
                .map_err(|source| GenerateError::Compile {
                    argument: target.name.to_string(),
                    source,
                })?;
            let compiled = squash(&compiled);
            if !compiled.is_empty() {
                let prefix = perl_double_quoted(&format!("Invalid value for argument '{}': ", target.name));
                checks.push(compiled);
                checks.push(format!(
                    "if ({ERR_TERM}) {{ {} }}",
                    style.fail(&format!("{prefix} . {ERR_TERM}"))
                ));
            }
        }
        Ok(checks)
    }
}

fn check_metadata(function: &str, meta: &FunctionMetadata) -> Result<(), GenerateError> {
    if !meta.has_supported_version() {
        return Err(GenerateError::UnsupportedVersion {
            function: function.to_string(),
            found: meta.metadata_version,
            supported: SUPPORTED_METADATA_VERSION,
        });
    }
    if !meta.args_as.is_supported() {
        return Err(GenerateError::UnsupportedArgsAs {
            function: function.to_string(),
            args_as: meta.args_as,
        });
    }
    Ok(())
}

/// Access expression for one argument inside the argument variable.
fn element_term(args_as: ArgsAs, var: &str, key: &str) -> String {
    let key = if RE_BAREWORD.is_match(key) {
        key.to_string()
    } else {
        perl_double_quoted(key)
    };
    match args_as {
        ArgsAs::HashRef => format!("${var}->{{{key}}}"),
        _ => format!("${var}{{{key}}}"),
    }
}
