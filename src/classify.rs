//! Line classification for the scanner.
//!
//! Only the handful of line shapes the scanner reacts to are recognized;
//! everything else is [`LineKind::Other`]. Declarations must sit on their
//! own line in conventional layout (`package Foo;`, `sub name {`).

use crate::model::InjectionTag;
use crate::tag;
use regex::Regex;
use std::sync::LazyLock;

static RE_DOC_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^=cut\b").unwrap());

static RE_DOC_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^=[a-zA-Z]\w*").unwrap());

static RE_END_OF_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^__(?:END|DATA)__[[:blank:]]*$").unwrap());

static RE_UNIT_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^[[:blank:]]*package[[:blank:]]+([A-Za-z_]\w*(?:::\w+)*)",
        r"(?:[[:blank:]]+v?[0-9][0-9._]*)?[[:blank:]]*[;{]"
    ))
    .unwrap()
});

static RE_FUNC_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[[:blank:]]*sub[[:blank:]]+([A-Za-z_]\w*)\b").unwrap());

/// What a single source line means to the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    DocOpen,
    DocClose,
    /// `__END__` / `__DATA__`
    EndOfCode,
    Unit(String),
    Function(String),
    Tag(InjectionTag),
    Other,
}

/// Classify a line (without its terminator) in code context.
pub fn classify(line: &str) -> LineKind {
    if RE_DOC_CLOSE.is_match(line) {
        return LineKind::DocClose;
    }
    if RE_DOC_OPEN.is_match(line) {
        return LineKind::DocOpen;
    }
    if RE_END_OF_CODE.is_match(line) {
        return LineKind::EndOfCode;
    }
    if let Some(caps) = RE_UNIT_DECL.captures(line) {
        return LineKind::Unit(caps[1].to_string());
    }
    if let Some(caps) = RE_FUNC_DECL.captures(line) {
        return LineKind::Function(caps[1].to_string());
    }
    match tag::parse(line) {
        Some(tag) => LineKind::Tag(tag),
        None => LineKind::Other,
    }
}

/// Inside a doc block only the close marker matters.
pub fn closes_doc(line: &str) -> bool {
    RE_DOC_CLOSE.is_match(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_markers() {
        assert_eq!(classify("=head1 NAME"), LineKind::DocOpen);
        assert_eq!(classify("=pod"), LineKind::DocOpen);
        assert_eq!(classify("=cut"), LineKind::DocClose);
        assert_eq!(classify(" =head1 indented"), LineKind::Other);
        assert!(closes_doc("=cut  "));
        assert!(!closes_doc("=cutting"));
    }

    #[test]
    fn unit_declarations() {
        assert_eq!(classify("package Foo;"), LineKind::Unit("Foo".into()));
        assert_eq!(
            classify("  package Foo::Bar::Baz ;"),
            LineKind::Unit("Foo::Bar::Baz".into())
        );
        assert_eq!(classify("package Foo 1.23;"), LineKind::Unit("Foo".into()));
        assert_eq!(classify("package Foo {"), LineKind::Unit("Foo".into()));
        assert_eq!(classify("package"), LineKind::Other);
    }

    #[test]
    fn function_declarations() {
        assert_eq!(classify("sub bar {"), LineKind::Function("bar".into()));
        assert_eq!(classify("sub _helper"), LineKind::Function("_helper".into()));
        assert_eq!(classify("my $cb = sub { 1 };"), LineKind::Other);
        assert_eq!(classify("subroutine();"), LineKind::Other);
    }

    #[test]
    fn end_of_code() {
        assert_eq!(classify("__END__"), LineKind::EndOfCode);
        assert_eq!(classify("__DATA__"), LineKind::EndOfCode);
        assert_eq!(classify("print __END__;"), LineKind::Other);
    }

    #[test]
    fn tag_lines() {
        match classify("    my $x = $args{x}; # VALIDATE_ARG") {
            LineKind::Tag(tag) => assert_eq!(tag.bound_variable, "x"),
            other => panic!("expected tag, got {other:?}"),
        }
        assert_eq!(classify("my $x = 1;"), LineKind::Other);
    }
}
