//! Locating the signature descrambler inside a player script.
//!
//! The provider renames and reshapes the descrambler between releases, so
//! the search is an ordered list of [`Matcher`]s, most specific first.
//! Supporting a new release shape means appending a matcher.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use tubesig_core::{Error, Result};

use crate::fragment::{definition_span, Definition};

/// Names found by the locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descrambler {
    /// Top-level descrambling function.
    pub function: String,
    /// Helper object the function calls into, if any.
    pub helper: Option<String>,
}

/// One structural pattern for the descrambler.
///
/// The pattern must have a `name` group and may have a `helper` group.
#[derive(Debug, Clone)]
pub struct Matcher {
    label: &'static str,
    pattern: Regex,
}

impl Matcher {
    pub fn new(label: &'static str, pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::Internal(format!("bad matcher `{label}`: {e}")))?;
        Ok(Self { label, pattern })
    }

    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// First hit of this matcher in a script.
    pub fn find(&self, script: &str) -> Option<Descrambler> {
        self.candidates(script).next()
    }

    /// Every hit of this matcher, in script order.
    pub fn candidates<'s>(&'s self, script: &'s str) -> impl Iterator<Item = Descrambler> + 's {
        self.pattern.captures_iter(script).filter_map(|caps| {
            let function = caps.name("name")?.as_str().to_string();
            let helper = caps.name("helper").map(|m| m.as_str().to_string());
            Some(Descrambler { function, helper })
        })
    }
}

const PATTERNS: &[(&str, &str)] = &[
    (
        "split-then-helper-call",
        r#"(?:^|[^\w$.])(?P<name>[a-zA-Z0-9$]{2,})\s*=\s*function\(\s*a\s*\)\s*\{\s*a\s*=\s*a\.split\(\s*""\s*\)\s*;\s*(?P<helper>[a-zA-Z0-9$]{2,})\.[a-zA-Z0-9$]{2}\(a,\d+\)"#,
    ),
    (
        "split",
        r#"(?:^|[^\w$.])(?P<name>[a-zA-Z0-9$]{2,})\s*=\s*function\(\s*a\s*\)\s*\{\s*a\s*=\s*a\.split\(\s*""\s*\)"#,
    ),
    (
        "split-any-argument",
        r#"(?:^|[^\w$.])(?P<name>[a-zA-Z0-9$]{2,})\s*=\s*function\(\s*[a-zA-Z0-9$]+\s*\)\s*\{\s*[a-zA-Z0-9$]+\s*=\s*[a-zA-Z0-9$]+\.split\(\s*(?:""|'')\s*\)"#,
    ),
    (
        "split-declaration",
        r#"function\s+(?P<name>[a-zA-Z0-9$]{2,})\s*\(\s*[a-zA-Z0-9$]+\s*\)\s*\{\s*[a-zA-Z0-9$]+\s*=\s*[a-zA-Z0-9$]+\.split\(\s*(?:""|'')\s*\)"#,
    ),
];

static DESCRAMBLER_MATCHERS: Lazy<Vec<Matcher>> = Lazy::new(|| {
    PATTERNS
        .iter()
        .filter_map(|(label, pattern)| Matcher::new(label, pattern).ok())
        .collect()
});

/// The built-in matchers in priority order.
pub fn matchers() -> &'static [Matcher] {
    &DESCRAMBLER_MATCHERS
}

/// Find the descrambler with the built-in matchers.
pub fn locate(script: &str) -> Result<Descrambler> {
    locate_with(matchers(), script)
}

/// Find the descrambler with a custom matcher list.
///
/// The first hit whose definition can be anchored as a standalone function
/// wins; member assignments such as `g.Ab=function` are passed over. When the
/// hit does not expose the helper, a narrower pattern scoped to the function
/// name is tried.
pub fn locate_with(matchers: &[Matcher], script: &str) -> Result<Descrambler> {
    for matcher in matchers {
        let Some(mut found) = matcher
            .candidates(script)
            .find(|c| definition_span(script, &c.function, Definition::Function).is_ok())
        else {
            continue;
        };

        debug!(
            "Descrambler `{}` matched by `{}`",
            found.function,
            matcher.label()
        );

        if found.helper.is_none() {
            found.helper = find_helper(script, &found.function)?;
        }
        return Ok(found);
    }

    Err(Error::DescramblerNotFound)
}

/// Recover the helper object referenced right after the split in `function`.
pub fn find_helper(script: &str, function: &str) -> Result<Option<String>> {
    let name = regex::escape(function);
    let pattern = format!(
        r#"(?:function\s+{name}|(?:^|[^\w$.]){name}\s*=\s*function)\s*\(\s*[a-zA-Z0-9$]+\s*\)\s*\{{\s*[a-zA-Z0-9$]+\s*=\s*[a-zA-Z0-9$]+\.split\(\s*(?:""|'')\s*\)\s*;\s*(?P<helper>[a-zA-Z0-9$]{{2,}})\."#
    );
    let re = Regex::new(&pattern)
        .map_err(|e| Error::Internal(format!("bad helper pattern for `{function}`: {e}")))?;

    Ok(re
        .captures(script)
        .and_then(|caps| caps.name("helper"))
        .map(|m| m.as_str().to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PLAYER: &str = r#"var Xy={rv:function(a){a.reverse()},sp:function(a,b){a.splice(0,b)}};
        Ab=function(a){a=a.split("");Xy.rv(a,3);Xy.sp(a,1);return a.join("")};"#;

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(matchers().len(), PATTERNS.len());
    }

    #[test]
    fn test_locate_with_helper() {
        let found = locate(PLAYER).unwrap();
        assert_eq!(found.function, "Ab");
        assert_eq!(found.helper.as_deref(), Some("Xy"));
    }

    #[test]
    fn test_first_matcher_exposes_helper() {
        let found = matchers()[0].find(PLAYER).unwrap();
        assert_eq!(found.helper.as_deref(), Some("Xy"));
    }

    #[test]
    fn test_helper_recovered_by_secondary_pattern() {
        let script = r#"q=1;b$c=function(z){z=z.split('');Qr.x(z);return z.join('')}"#;
        assert!(matchers()[0].find(script).is_none());
        let found = locate(script).unwrap();
        assert_eq!(found.function, "b$c");
        assert_eq!(found.helper.as_deref(), Some("Qr"));
    }

    #[test]
    fn test_no_helper_is_valid() {
        let script = r#"Ab=function(a){a=a.split("");a.reverse();return a.join("")}"#;
        let found = locate(script).unwrap();
        assert_eq!(found.function, "Ab");
        assert_eq!(found.helper, None);
    }

    #[test]
    fn test_declaration_form() {
        let script = r#"function Zz(b){b=b.split("");Hh.aa(b,2);return b.join("")}"#;
        let found = locate(script).unwrap();
        assert_eq!(found.function, "Zz");
        assert_eq!(found.helper.as_deref(), Some("Hh"));
    }

    #[test]
    fn test_single_char_names_rejected() {
        let script = r#"A=function(a){a=a.split("");return a.join("")}"#;
        assert!(matches!(locate(script), Err(Error::DescramblerNotFound)));
    }

    #[test]
    fn test_member_assignment_is_skipped() {
        let script = r#"g.Ab=function(a){a=a.split("");return a.join("")};Cd=function(a){a=a.split("");a.reverse();return a.join("")};"#;
        let found = locate(script).unwrap();
        assert_eq!(found.function, "Cd");
        assert!(crate::fragment::extract_function(script, &found.function).is_ok());
    }

    #[test]
    fn test_unanchorable_candidates_are_skipped() {
        let loose = [Matcher::new(
            "loose",
            r#"(?P<name>[a-zA-Z0-9$]{2,})=function\(a\)\{a=a\.split"#,
        )
        .unwrap()];
        let script = r#"g.Ab=function(a){a=a.split("");return a};Cd=function(a){a=a.split("");return a};"#;
        assert_eq!(loose[0].find(script).unwrap().function, "Ab");
        assert_eq!(locate_with(&loose, script).unwrap().function, "Cd");
    }

    #[test]
    fn test_not_found() {
        let err = locate("var x=function(){return 1};").unwrap_err();
        assert!(matches!(err, Error::DescramblerNotFound));
        assert!(err.is_descramble_failure());
    }

    #[test]
    fn test_custom_matcher_list() {
        let custom = [Matcher::new("rotate", r"(?P<name>rot[0-9]+)=function").unwrap()];
        let found = locate_with(&custom, "rot42=function(a){return a}").unwrap();
        assert_eq!(found.function, "rot42");
        assert_eq!(found.helper, None);
        assert!(locate_with(&[], PLAYER).is_err());
    }
}
