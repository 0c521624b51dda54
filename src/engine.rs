//! Scan → resolve → generate → splice, one line at a time.
//!
//! The scanner carries three pieces of context from line to line: whether
//! it is inside a POD block, the current package with its metadata, and
//! the current sub with the arguments validated so far. Generated code is
//! appended to the tag's own line, so the output always has exactly as
//! many lines as the input.

use crate::classify::{self, LineKind};
use crate::codegen::Generator;
use crate::error::{FileError, GenerateError};
use crate::metadata::MetadataStore;
use crate::model::{Diagnostic, FunctionMetadata, InjectionTag, MetadataIndex, Severity, TagKind};
use crate::schema::SchemaCompiler;
use std::collections::HashSet;
use tracing::{debug, trace};

/// Result of a successful run over one file.
#[derive(Debug)]
pub struct Outcome {
    /// Rewritten text, or the original text when nothing was spliced
    pub text: String,
    /// Number of tag lines that received generated code
    pub tags_processed: usize,
    /// Warnings and notices, in line order
    pub diagnostics: Vec<Diagnostic>,
}

impl Outcome {
    pub fn is_modified(&self, original: &str) -> bool {
        self.text != original
    }
}

/// Process one source text.
///
/// `file` only names the source in diagnostics. Any fatal condition aborts
/// the whole file: no partially rewritten text is ever returned.
pub fn process(
    file: &str,
    source: &str,
    store: &dyn MetadataStore,
    compiler: &dyn SchemaCompiler,
) -> Result<Outcome, FileError> {
    let mut scanner = Scanner::new(file, store, compiler);
    let mut output = String::with_capacity(source.len());

    for (idx, raw) in source.split_inclusive('\n').enumerate() {
        let (body, eol) = split_eol(raw);
        match scanner.line(idx + 1, body) {
            Ok(Some(replacement)) => {
                output.push_str(&replacement);
                output.push_str(eol);
            }
            Ok(None) => output.push_str(raw),
            Err(fatal) => {
                return Err(FileError {
                    fatal,
                    diagnostics: scanner.diagnostics,
                })
            }
        }
    }
    scanner.finish_function();

    let text = if scanner.spliced > 0 {
        output
    } else {
        source.to_string()
    };
    Ok(Outcome {
        text,
        tags_processed: scanner.spliced,
        diagnostics: scanner.diagnostics,
    })
}

fn split_eol(raw: &str) -> (&str, &str) {
    if let Some(body) = raw.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = raw.strip_suffix('\n') {
        (body, "\n")
    } else {
        (raw, "")
    }
}

struct UnitContext {
    name: String,
    index: MetadataIndex,
}

/// Per-sub bookkeeping, replaced at every sub boundary.
struct FunctionScanState {
    name: String,
    /// Line of the `sub` declaration
    line: usize,
    meta: Option<FunctionMetadata>,
    validated: HashSet<String>,
    saw_all_tag: bool,
    err_declared: bool,
}

struct Scanner<'a> {
    file: &'a str,
    store: &'a dyn MetadataStore,
    generator: Generator<'a>,
    in_doc: bool,
    past_end: bool,
    unit: Option<UnitContext>,
    function: Option<FunctionScanState>,
    diagnostics: Vec<Diagnostic>,
    spliced: usize,
}

impl<'a> Scanner<'a> {
    fn new(file: &'a str, store: &'a dyn MetadataStore, compiler: &'a dyn SchemaCompiler) -> Self {
        Self {
            file,
            store,
            generator: Generator::new(compiler),
            in_doc: false,
            past_end: false,
            unit: None,
            function: None,
            diagnostics: Vec::new(),
            spliced: 0,
        }
    }

    /// Handle one line; `Some` replaces its content.
    fn line(&mut self, line: usize, body: &str) -> Result<Option<String>, Diagnostic> {
        if self.past_end {
            return Ok(None);
        }
        if self.in_doc {
            if classify::closes_doc(body) {
                trace!(line, "doc block closed");
                self.in_doc = false;
            }
            return Ok(None);
        }

        match classify::classify(body) {
            LineKind::DocOpen => {
                trace!(line, "doc block opened");
                self.in_doc = true;
                Ok(None)
            }
            LineKind::DocClose | LineKind::Other => Ok(None),
            LineKind::EndOfCode => {
                self.finish_function();
                self.past_end = true;
                Ok(None)
            }
            LineKind::Unit(name) => {
                self.enter_unit(line, name)?;
                Ok(None)
            }
            LineKind::Function(name) => {
                self.enter_function(line, name)?;
                Ok(None)
            }
            LineKind::Tag(tag) => self.splice(line, tag),
        }
    }

    fn enter_unit(&mut self, line: usize, name: String) -> Result<(), Diagnostic> {
        self.finish_function();
        let index = self.store.resolve(&name).map_err(|err| {
            self.diagnostic(
                Severity::Fatal,
                Some(line),
                format!("cannot load metadata for package '{name}': {err}"),
            )
        })?;
        debug!(unit = %name, functions = index.len(), "loaded package metadata");
        self.unit = Some(UnitContext { name, index });
        Ok(())
    }

    fn enter_function(&mut self, line: usize, name: String) -> Result<(), Diagnostic> {
        self.finish_function();
        let Some(unit) = &self.unit else {
            return Err(self.diagnostic(
                Severity::Fatal,
                Some(line),
                format!("sub '{name}' is declared outside of any package"),
            ));
        };
        let meta = unit.index.get(&name).cloned();
        debug!(unit = %unit.name, function = %name, resolved = meta.is_some(), "entering sub");
        self.function = Some(FunctionScanState {
            name,
            line,
            meta,
            validated: HashSet::new(),
            saw_all_tag: false,
            err_declared: false,
        });
        Ok(())
    }

    fn splice(&mut self, line: usize, tag: InjectionTag) -> Result<Option<String>, Diagnostic> {
        let Some(function) = self.function.as_mut() else {
            self.warn(line, format!("{} outside of any sub; line left unchanged", tag.trailing_tag.trim()));
            return Ok(None);
        };
        let Some(meta) = &function.meta else {
            let message = format!("no metadata for sub '{}'; line left unchanged", function.name);
            self.warn(line, message);
            return Ok(None);
        };

        let generated = match tag.kind {
            TagKind::Single => self
                .generator
                .single(&function.name, meta, &tag, function.err_declared),
            TagKind::All if function.saw_all_tag => {
                Err(GenerateError::DuplicateAll(function.name.clone()))
            }
            TagKind::All => self
                .generator
                .all(&function.name, meta, &tag, function.err_declared),
        };
        let generated = match generated {
            Ok(generated) => generated,
            Err(err) => return Err(self.diagnostic(Severity::Fatal, Some(line), err.to_string())),
        };

        if tag.kind == TagKind::All {
            function.saw_all_tag = true;
        }
        if !generated.code.is_empty() {
            function.err_declared = true;
        }
        debug!(line, function = %function.name, arguments = ?generated.validated, "spliced validation code");
        function.validated.extend(generated.validated);
        self.spliced += 1;

        Ok(Some(format!(
            "{}{}{}",
            tag.leading_code, generated.code, tag.trailing_tag
        )))
    }

    /// Leave the current sub, reporting required arguments nobody validated.
    fn finish_function(&mut self) {
        let Some(function) = self.function.take() else {
            return;
        };
        let Some(meta) = &function.meta else {
            return;
        };
        for arg in meta.required_args() {
            if !function.validated.contains(arg) {
                let notice = self.diagnostic(
                    Severity::Notice,
                    Some(function.line),
                    format!(
                        "argument '{arg}' of sub '{}' is required but not validated",
                        function.name
                    ),
                );
                self.diagnostics.push(notice);
            }
        }
    }

    fn warn(&mut self, line: usize, message: String) {
        let warning = self.diagnostic(Severity::Warning, Some(line), message);
        self.diagnostics.push(warning);
    }

    fn diagnostic(&self, severity: Severity, line: Option<usize>, message: String) -> Diagnostic {
        Diagnostic {
            severity,
            file: self.file.to_string(),
            line,
            message,
        }
    }
}
