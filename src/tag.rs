//! `VALIDATE_ARG` / `VALIDATE_ARGS` tag parsing.
//!
//! A tag line declares one lexical variable and ends with the tag comment:
//!
//! ```text
//! my $arg1 = $args{arg1}; # VALIDATE_ARG
//! my $n = $args{count}; # VALIDATE_ARG count
//! my %args = @_; # VALIDATE_ARGS
//! ```

use crate::model::{InjectionTag, TagKind, VarKind};
use regex::Regex;
use std::sync::LazyLock;

static RE_TAG_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?P<lead>[[:blank:]]*my[[:blank:]]+(?P<sigil>[$@%])(?P<var>[A-Za-z_]\w*)",
        r"(?:[[:blank:]]*=.*)?;[[:blank:]]*)",
        r"(?P<tag>#[[:blank:]]*VALIDATE_(?P<kw>ARGS?)(?:[[:blank:]]+(?P<arg>[A-Za-z_]\w*))?[[:blank:]]*)$"
    ))
    .unwrap()
});

/// Parse a line (without its line terminator) as an injection tag.
///
/// Returns `None` when the line is not a tag line at all. Semantic checks
/// (variable kind, explicit names on `VALIDATE_ARGS`) are left to the
/// generator so they can be reported against the enclosing function.
pub fn parse(line: &str) -> Option<InjectionTag> {
    let caps = RE_TAG_LINE.captures(line)?;
    let sigil = caps["sigil"].chars().next()?;
    let kind = if &caps["kw"] == "ARGS" {
        TagKind::All
    } else {
        TagKind::Single
    };
    Some(InjectionTag {
        kind,
        bound_variable: caps["var"].to_string(),
        var_kind: VarKind::from_sigil(sigil)?,
        explicit_argument: caps.name("arg").map(|m| m.as_str().to_string()),
        leading_code: caps["lead"].to_string(),
        trailing_tag: caps["tag"].to_string(),
    })
}
