//! Schema compilation: turn a declarative schema into Perl that records
//! an error message when the data does not conform.
//!
//! Schemas come in two forms:
//!
//! - short: `"int"`, or `"int*"` to also require a defined value
//! - full: `["int", {"min": 1, "max": 10}]`
//!
//! The emitted code assigns a message string to the error term on the
//! first failing check and leaves it untouched otherwise. It is multi-line
//! and commented; callers squash it before splicing.

use crate::error::CompileError;
use serde_json::{Map, Value};

/// What the compiled code leaves in the error term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    /// A human-readable message
    Str,
    /// A plain truth value
    Bool,
}

impl ReturnKind {
    fn name(self) -> &'static str {
        match self {
            ReturnKind::Str => "str",
            ReturnKind::Bool => "bool",
        }
    }
}

/// One compilation job.
#[derive(Debug, Clone)]
pub struct CompileRequest<'a> {
    pub schema: &'a Value,
    /// Variable receiving the error, e.g. `$arg_err`
    pub err_term: &'a str,
    /// Expression evaluating to the data, e.g. `$args{arg1}`
    pub data_term: &'a str,
    /// Name of the data, used in comments
    pub data_name: &'a str,
    pub return_kind: ReturnKind,
}

/// Compiles schemas into code text.
pub trait SchemaCompiler {
    fn compile(&self, req: &CompileRequest<'_>) -> Result<String, CompileError>;
}

/// Built-in compiler emitting Perl.
#[derive(Debug, Default, Clone, Copy)]
pub struct PerlSchemaCompiler;

impl SchemaCompiler for PerlSchemaCompiler {
    fn compile(&self, req: &CompileRequest<'_>) -> Result<String, CompileError> {
        if req.return_kind != ReturnKind::Str {
            return Err(CompileError::ReturnKind(req.return_kind.name().to_string()));
        }
        let schema = normalize(req.schema)?;
        let checks = build_checks(&schema, req.data_term)?;
        Ok(emit(&schema, &checks, req))
    }
}

// -- Normalization ------------------------------------------------------------

#[derive(Debug)]
struct Schema {
    type_name: String,
    req: bool,
    clauses: Vec<(String, Value)>,
}

fn normalize(value: &Value) -> Result<Schema, CompileError> {
    match value {
        Value::String(s) => from_type_name(s, &Map::new()),
        Value::Array(items) => {
            let (Some(Value::String(name)), rest) = (items.first(), items.get(1..).unwrap_or(&[]))
            else {
                return Err(CompileError::Malformed(
                    "expected a type name as the first element".into(),
                ));
            };
            match rest {
                [] => from_type_name(name, &Map::new()),
                [Value::Object(clauses)] => from_type_name(name, clauses),
                _ => Err(CompileError::Malformed(
                    "expected [type] or [type, {clauses}]".into(),
                )),
            }
        }
        other => Err(CompileError::Malformed(format!(
            "expected a string or an array, got {other}"
        ))),
    }
}

fn from_type_name(name: &str, clauses: &Map<String, Value>) -> Result<Schema, CompileError> {
    let (base, star) = match name.strip_suffix('*') {
        Some(base) => (base, true),
        None => (name, false),
    };
    let type_name = match base {
        "num" => "float",
        other => other,
    };
    if !TYPES.contains(&type_name) {
        return Err(CompileError::UnknownType(base.to_string()));
    }
    let mut req = star;
    let mut rest = Vec::new();
    for (clause, value) in clauses {
        if clause == "req" {
            req |= value
                .as_bool()
                .ok_or_else(|| clause_value("req", "expected a boolean"))?;
        } else {
            rest.push((clause.clone(), value.clone()));
        }
    }
    Ok(Schema {
        type_name: type_name.to_string(),
        req,
        clauses: rest,
    })
}

const TYPES: &[&str] = &["any", "bool", "int", "float", "str", "array", "hash", "re"];

// -- Checks -------------------------------------------------------------------

/// A single failure condition and the message recorded when it holds.
struct Check {
    what: String,
    failure: String,
    message: String,
}

fn build_checks(schema: &Schema, d: &str) -> Result<Vec<Check>, CompileError> {
    let mut checks = Vec::new();
    if schema.req {
        checks.push(Check {
            what: "required".into(),
            failure: format!("!defined({d})"),
            message: "Required but not specified".into(),
        });
    }
    if let Some((cond, noun)) = type_check(&schema.type_name, d) {
        checks.push(Check {
            what: format!("type '{}'", schema.type_name),
            failure: format!("!({cond})"),
            message: format!("Not of type {noun}"),
        });
    }
    for (clause, value) in &schema.clauses {
        checks.push(clause_check(&schema.type_name, clause, value, d)?);
    }
    Ok(checks)
}

fn type_check(type_name: &str, d: &str) -> Option<(String, &'static str)> {
    let check = match type_name {
        "bool" => (format!("!ref({d})"), "boolean"),
        "int" => (format!("!ref({d}) && {d} =~ /\\A[+-]?[0-9]+\\z/"), "integer"),
        "float" => (
            format!(
                "!ref({d}) && {d} =~ /\\A[+-]?(?:[0-9]+(?:\\.[0-9]*)?|\\.[0-9]+)(?:[eE][+-]?[0-9]+)?\\z/"
            ),
            "number",
        ),
        "str" => (format!("!ref({d})"), "text"),
        "array" => (format!("ref({d}) eq 'ARRAY'"), "array"),
        "hash" => (format!("ref({d}) eq 'HASH'"), "hash"),
        "re" => (format!("!ref({d}) || ref({d}) eq 'Regexp'"), "regex pattern"),
        _ => return None,
    };
    Some(check)
}

fn is_numeric(type_name: &str) -> bool {
    matches!(type_name, "int" | "float")
}

fn clause_check(type_name: &str, clause: &str, value: &Value, d: &str) -> Result<Check, CompileError> {
    let unsupported = || CompileError::UnsupportedClause {
        type_name: type_name.to_string(),
        clause: clause.to_string(),
    };
    let (failure, message) = match clause {
        "min" | "max" | "xmin" | "xmax" => {
            let op = comparison(type_name, clause).ok_or_else(unsupported)?;
            let lit = ordered_literal(type_name, clause, value)?;
            let phrase = match clause {
                "min" => "at least",
                "max" => "at most",
                "xmin" => "larger than",
                _ => "smaller than",
            };
            (
                format!("!({d} {op} {lit})"),
                format!("Must be {phrase} {}", display(value)),
            )
        }
        "between" => {
            let lo_op = comparison(type_name, "min").ok_or_else(unsupported)?;
            let hi_op = comparison(type_name, "max").ok_or_else(unsupported)?;
            let [lo, hi] = value.as_array().map(Vec::as_slice).unwrap_or(&[]) else {
                return Err(clause_value(clause, "expected [min, max]"));
            };
            let lo_lit = ordered_literal(type_name, clause, lo)?;
            let hi_lit = ordered_literal(type_name, clause, hi)?;
            (
                format!("!({d} {lo_op} {lo_lit} && {d} {hi_op} {hi_lit})"),
                format!("Must be between {} and {}", display(lo), display(hi)),
            )
        }
        "min_len" | "max_len" | "len" => {
            let len = length_expr(type_name, d).ok_or_else(unsupported)?;
            let n = value
                .as_u64()
                .ok_or_else(|| clause_value(clause, "expected a non-negative integer"))?;
            let (op, phrase) = match clause {
                "min_len" => (">=", "Length must be at least"),
                "max_len" => ("<=", "Length must be at most"),
                _ => ("==", "Length must be"),
            };
            (format!("!({len} {op} {n})"), format!("{phrase} {n}"))
        }
        "in" => {
            if !is_numeric(type_name) && type_name != "str" {
                return Err(unsupported());
            }
            let items = value
                .as_array()
                .ok_or_else(|| clause_value(clause, "expected a list"))?;
            let literals = items
                .iter()
                .map(|item| ordered_literal(type_name, clause, item))
                .collect::<Result<Vec<_>, _>>()?;
            let eq = if is_numeric(type_name) { "==" } else { "eq" };
            let shown = items.iter().map(display).collect::<Vec<_>>().join(", ");
            (
                format!("!(grep {{ $_ {eq} {d} }} ({}))", literals.join(", ")),
                format!("Must be one of [{shown}]"),
            )
        }
        "match" => {
            if type_name != "str" {
                return Err(unsupported());
            }
            let pattern = value
                .as_str()
                .ok_or_else(|| clause_value(clause, "expected a pattern string"))?;
            (
                format!("!({d} =~ /{}/)", perl_regex_body(pattern)?),
                format!("Must match pattern {pattern}"),
            )
        }
        _ => return Err(unsupported()),
    };
    Ok(Check {
        what: format!("clause '{clause}'"),
        failure,
        message,
    })
}

fn comparison(type_name: &str, clause: &str) -> Option<&'static str> {
    let numeric = match type_name {
        "int" | "float" => true,
        "str" => false,
        _ => return None,
    };
    let op = match (clause, numeric) {
        ("min", true) => ">=",
        ("max", true) => "<=",
        ("xmin", true) => ">",
        ("xmax", true) => "<",
        ("min", false) => "ge",
        ("max", false) => "le",
        ("xmin", false) => "gt",
        ("xmax", false) => "lt",
        _ => return None,
    };
    Some(op)
}

fn length_expr(type_name: &str, d: &str) -> Option<String> {
    match type_name {
        "str" => Some(format!("length({d})")),
        "array" => Some(format!("scalar(@{{{d}}})")),
        "hash" => Some(format!("scalar(keys %{{{d}}})")),
        _ => None,
    }
}

/// Literal for a bound compared against data of `type_name`.
fn ordered_literal(type_name: &str, clause: &str, value: &Value) -> Result<String, CompileError> {
    match value {
        Value::Number(n) if is_numeric(type_name) => Ok(n.to_string()),
        Value::String(s) if type_name == "str" => Ok(perl_double_quoted(s)),
        _ => Err(clause_value(
            clause,
            &format!("{value} cannot be compared with type '{type_name}'"),
        )),
    }
}

/// Body of a `/.../` match: the delimiter, `@` and interpolating `$` are
/// escaped; escape pairs already in the pattern are kept as they are.
fn perl_regex_body(pattern: &str) -> Result<String, CompileError> {
    if pattern.contains(['\n', '\r']) {
        return Err(clause_value("match", "pattern must be a single line"));
    }
    let mut out = String::with_capacity(pattern.len() + 4);
    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                let Some(next) = chars.next() else {
                    return Err(clause_value("match", "pattern ends with a lone backslash"));
                };
                out.push('\\');
                out.push(next);
            }
            '/' | '@' => {
                out.push('\\');
                out.push(ch);
            }
            // `$` before `)`, `|` or the end is an anchor
            '$' if !matches!(chars.peek(), None | Some(')' | '|')) => out.push_str("\\$"),
            _ => out.push(ch),
        }
    }
    Ok(out)
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn clause_value(clause: &str, reason: &str) -> CompileError {
    CompileError::ClauseValue {
        clause: clause.to_string(),
        reason: reason.to_string(),
    }
}

// -- Emission -----------------------------------------------------------------

fn emit(schema: &Schema, checks: &[Check], req: &CompileRequest<'_>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "# validate '{}' against schema of type '{}'\n",
        req.data_name.escape_debug(),
        schema.type_name
    ));
    if checks.is_empty() {
        out.push_str("# nothing to check\n");
        return out;
    }

    let guarded = !schema.req;
    let indent = if guarded { "    " } else { "" };
    if guarded {
        out.push_str("# skip when undefined\n");
        out.push_str(&format!("if (defined({})) {{\n", req.data_term));
    }
    for (i, check) in checks.iter().enumerate() {
        let keyword = if i == 0 { "if" } else { "elsif" };
        out.push_str(&format!("{indent}# check {}\n", check.what));
        out.push_str(&format!("{indent}{keyword} ({}) {{\n", check.failure));
        out.push_str(&format!(
            "{indent}    {} = {};\n",
            req.err_term,
            perl_double_quoted(&check.message)
        ));
        out.push_str(&format!("{indent}}}\n"));
    }
    if guarded {
        out.push_str("}\n");
    }
    out
}

/// Perl double-quoted string literal with interpolation disabled.
pub fn perl_double_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' | '\\' | '$' | '@' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::squash::squash;
    use serde_json::json;

    fn compile(schema: Value, data_term: &str) -> Result<String, CompileError> {
        PerlSchemaCompiler.compile(&CompileRequest {
            schema: &schema,
            err_term: "$arg_err",
            data_term,
            data_name: "arg1",
            return_kind: ReturnKind::Str,
        })
    }

    #[test]
    fn int_is_guarded_on_defined() {
        let code = compile(json!("int"), "$arg1").unwrap();
        assert!(code.lines().count() > 1);
        assert!(code.contains("# skip when undefined"));
        assert_eq!(
            squash(&code),
            "if (defined($arg1)) { if (!(!ref($arg1) && $arg1 =~ /\\A[+-]?[0-9]+\\z/)) { $arg_err = \"Not of type integer\"; } }"
        );
    }

    #[test]
    fn star_requires_defined_value() {
        let code = squash(&compile(json!("str*"), "$x").unwrap());
        assert!(code.starts_with("if (!defined($x)) { $arg_err = \"Required but not specified\"; }"));
        assert!(code.contains("elsif (!(!ref($x)))"));
        assert!(!code.contains("if (defined($x))"));
    }

    #[test]
    fn req_clause_matches_star() {
        let a = compile(json!(["int", {"req": true}]), "$x").unwrap();
        let b = compile(json!("int*"), "$x").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn numeric_bounds_in_clause_order() {
        let code = squash(&compile(json!(["int", {"min": 1, "xmax": 10}]), "$n").unwrap());
        let min = code.find("!($n >= 1)").unwrap();
        let xmax = code.find("!($n < 10)").unwrap();
        assert!(min < xmax);
        assert!(code.contains("\"Must be at least 1\""));
        assert!(code.contains("\"Must be smaller than 10\""));
    }

    #[test]
    fn string_clauses() {
        let code = squash(
            &compile(
                json!(["str", {"min_len": 2, "in": ["a$b", "it's"], "match": "^a/b"}]),
                "$s",
            )
            .unwrap(),
        );
        assert!(code.contains("!(length($s) >= 2)"));
        assert!(code.contains("!(grep { $_ eq $s } (\"a\\$b\", \"it's\"))"));
        assert!(code.contains("\"Must be one of [a\\$b, it's]\""));
        assert!(code.contains("!($s =~ /^a\\/b/)"));
    }

    #[test]
    fn match_pattern_is_not_interpolated() {
        let code = |pattern: &str| squash(&compile(json!(["str", {"match": pattern}]), "$s").unwrap());
        assert!(code(r"^\w+@example\.com$").contains(r"!($s =~ /^\w+\@example\.com$/)"));
        assert!(code(r"a\/b").contains(r"!($s =~ /a\/b/)"));
        assert!(code(r"\\@").contains(r"!($s =~ /\\\@/)"));
        assert!(code(r"^(a$|b)$").contains(r"!($s =~ /^(a$|b)$/)"));
        assert!(code(r"^$x\$y").contains(r"!($s =~ /^\$x\$y/)"));
    }

    #[test]
    fn rejects_patterns_that_cannot_be_spliced() {
        for pattern in ["a\n#b", "a\rb", "ab\\"] {
            assert!(
                matches!(
                    compile(json!(["str", {"match": pattern}]), "$s"),
                    Err(CompileError::ClauseValue { ref clause, .. }) if clause == "match"
                ),
                "{pattern:?}"
            );
        }
    }

    #[test]
    fn line_breaks_in_names_and_literals_stay_escaped() {
        let schema = json!(["str", {"in": ["a\nb"], "min": "x\r"}]);
        let plain = compile(schema.clone(), "$s").unwrap();
        let odd = PerlSchemaCompiler
            .compile(&CompileRequest {
                schema: &schema,
                err_term: "$arg_err",
                data_term: "$s",
                data_name: "a\n#b\nc",
                return_kind: ReturnKind::Str,
            })
            .unwrap();
        assert_eq!(odd.lines().count(), plain.lines().count());
        assert_eq!(squash(&odd), squash(&plain));
        assert!(squash(&plain).contains(r#"(grep { $_ eq $s } ("a\nb"))"#));
        assert!(squash(&plain).contains(r#"!($s ge "x\r")"#));
    }

    #[test]
    fn between_and_aggregate_length() {
        let code = squash(&compile(json!(["float", {"between": [0, 1.5]}]), "$f").unwrap());
        assert!(code.contains("!($f >= 0 && $f <= 1.5)"));
        let code = squash(&compile(json!(["array", {"max_len": 3}]), "$args{list}").unwrap());
        assert!(code.contains("ref($args{list}) eq 'ARRAY'"));
        assert!(code.contains("!(scalar(@{$args{list}}) <= 3)"));
    }

    #[test]
    fn any_without_clauses_emits_no_code() {
        assert_eq!(squash(&compile(json!("any"), "$x").unwrap()), "");
    }

    #[test]
    fn num_is_float() {
        let code = compile(json!("num"), "$x").unwrap();
        assert!(code.contains("Not of type number"));
    }

    #[test]
    fn rejects_bad_schemas() {
        assert!(matches!(compile(json!("widget"), "$x"), Err(CompileError::UnknownType(t)) if t == "widget"));
        assert!(matches!(compile(json!(42), "$x"), Err(CompileError::Malformed(_))));
        assert!(matches!(compile(json!([{"min": 1}]), "$x"), Err(CompileError::Malformed(_))));
        assert!(matches!(
            compile(json!(["int", {"match": "x"}]), "$x"),
            Err(CompileError::UnsupportedClause { .. })
        ));
        assert!(matches!(
            compile(json!(["int", {"min": "one"}]), "$x"),
            Err(CompileError::ClauseValue { .. })
        ));
        assert!(matches!(
            compile(json!(["str", {"between": [1]}]), "$x"),
            Err(CompileError::ClauseValue { .. })
        ));
    }

    #[test]
    fn rejects_non_string_return_kind() {
        let schema = json!("int");
        let err = PerlSchemaCompiler
            .compile(&CompileRequest {
                schema: &schema,
                err_term: "$e",
                data_term: "$x",
                data_name: "x",
                return_kind: ReturnKind::Bool,
            })
            .unwrap_err();
        assert!(matches!(err, CompileError::ReturnKind(k) if k == "bool"));
    }

    #[test]
    fn double_quoted_escapes_interpolation() {
        assert_eq!(perl_double_quoted(r#"a "b" $c @d \e"#), r#""a \"b\" \$c \@d \\e""#);
        assert_eq!(perl_double_quoted("a\r\nb"), r#""a\r\nb""#);
    }
}
