//! Order-independent composite tags.
//!
//! A tag expression such as `"media.image/png"` is split on separator runs
//! into literal tokens. Each token hashes to a literal [`Eid`] and the
//! composite id is their [`Eid::fold`], so `"a.b.cc"`, `"b.a.cc"` and
//! `"a.cc.b"` all name the same thing while `"a.cC.b"` does not.

use std::fmt;

use crate::model::eid::Eid;

/// Join character of canonic strings.
pub const CANONIC_WITH: char = '.';

/// Separator that marks a hidden leaf in canonic strings.
pub const CANONIC_HIDE: char = '~';

/// True for characters that separate tag tokens: `/ \ . + : ~` and
/// ASCII whitespace. Other Unicode spaces stay inside tokens.
#[inline]
pub fn is_tag_separator(c: char) -> bool {
    matches!(c, '/' | '\\' | '.' | '+' | ':' | '~') || c.is_ascii_whitespace()
}

/// Splits a tag expression into its non-empty tokens.
pub fn split_tags(input: &str) -> impl Iterator<Item = &str> {
    input.split(is_tag_separator).filter(|t| !t.is_empty())
}

/// Joins two tag expressions with exactly one `.` between them.
///
/// An empty half returns the other half unchanged.
pub fn join(prefix: &str, suffix: &str) -> String {
    if prefix.is_empty() {
        return suffix.to_string();
    }
    if suffix.is_empty() {
        return prefix.to_string();
    }
    let trailing = prefix.ends_with(CANONIC_WITH);
    let leading = suffix.starts_with(CANONIC_WITH);
    match (trailing, leading) {
        (false, false) => format!("{prefix}{CANONIC_WITH}{suffix}"),
        (true, true) => format!("{prefix}{}", &suffix[1..]),
        _ => format!("{prefix}{suffix}"),
    }
}

/// One token of a tag expression and its literal id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagLiteral {
    pub id: Eid,
    pub token: String,
}

impl TagLiteral {
    pub fn new(token: &str) -> Self {
        Self {
            id: Eid::from_token(token),
            token: token.to_string(),
        }
    }
}

impl fmt::Display for TagLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.token.is_empty() {
            f.write_str(&self.id.base32())
        } else {
            write!(f, "{:?}", self.token)
        }
    }
}

/// A composite tag: the folded id, the canonic string, and its literals.
///
/// Two specs are the same tag when their ids match; the canonic string
/// keeps the order the tokens were written in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSpec {
    pub id: Eid,
    pub canonic: String,
    pub tags: Vec<TagLiteral>,
}

impl TagSpec {
    /// Parses a tag expression from scratch.
    pub fn parse(expr: &str) -> Self {
        Self::default().with(expr)
    }

    /// Extends this spec with the tokens of `sub_tags`.
    ///
    /// Each token is folded into the id and appended to the canonic string
    /// with `.`. Empty tokens are skipped; an input with no tokens returns
    /// an equal spec.
    pub fn with(&self, sub_tags: &str) -> TagSpec {
        let mut spec = self.clone();
        spec.canonic.reserve(sub_tags.len() + 1);
        for token in split_tags(sub_tags) {
            let literal = TagLiteral::new(token);
            if !spec.canonic.is_empty() {
                spec.canonic.push(CANONIC_WITH);
            }
            spec.canonic.push_str(token);
            spec.id = spec.id.fold(literal.id);
            spec.tags.push(literal);
        }
        spec
    }

    /// Splits the canonic string `n` separators from the right.
    ///
    /// Both `.` and `~` count. `leaf_tags(2)` on `"a.b.c.d.ee"` gives
    /// `("a.b.c", "d.ee")`. With `n <= 0` the whole string is the prefix;
    /// with fewer than `n` separators it is the suffix.
    pub fn leaf_tags(&self, n: i32) -> (&str, &str) {
        let expr = self.canonic.as_str();
        if n <= 0 {
            return (expr, "");
        }
        let mut remaining = n;
        for (pos, c) in expr.char_indices().rev() {
            if c == CANONIC_WITH || c == CANONIC_HIDE {
                remaining -= 1;
                if remaining == 0 {
                    return (&expr[..pos], &expr[pos + 1..]);
                }
            }
        }
        ("", expr)
    }

    /// Canonic form, rebuilt from the literals when not recorded.
    pub fn canonic_string(&self) -> String {
        if !self.canonic.is_empty() {
            return self.canonic.clone();
        }
        self.tags
            .iter()
            .map(|t| t.token.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// True when both specs fold to the same id, regardless of token order.
    #[inline]
    pub fn same_tag(&self, other: &TagSpec) -> bool {
        self.id == other.id
    }
}

impl fmt::Display for TagSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonic_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_collapses_runs() {
        let tokens: Vec<_> = split_tags("  a..b//c:\\d+e~f\tg  ").collect();
        assert_eq!(tokens, ["a", "b", "c", "d", "e", "f", "g"]);
        assert_eq!(split_tags("./:~").count(), 0);
        assert_eq!(split_tags("").count(), 0);
    }

    #[test]
    fn test_unicode_spaces_stay_in_tokens() {
        let tokens: Vec<_> = split_tags("a\u{a0}b.c\u{3000}d\re").collect();
        assert_eq!(tokens, ["a\u{a0}b", "c\u{3000}d", "e"]);
        assert_ne!(TagSpec::parse("a\u{a0}b").id, TagSpec::parse("a b").id);
    }

    #[test]
    fn test_order_independent_ids() {
        let base = TagSpec::default();
        let abc = base.with("a.b.cc");
        let bac = base.with("b.a.cc");
        let acb = base.with("a.cc.b");
        let upper = base.with("a.cC.b");

        assert_eq!(abc.id, bac.id);
        assert_eq!(abc.id, acb.id);
        assert_ne!(abc.id, upper.id);

        assert_eq!(abc.canonic, "a.b.cc");
        assert_eq!(bac.canonic, "b.a.cc");
        assert!(abc.same_tag(&acb));
    }

    #[test]
    fn test_with_extends_base() {
        let base = TagSpec::parse("media");
        let png = base.with("image/png");
        assert_eq!(png.canonic, "media.image.png");
        assert_eq!(png.tags.len(), 3);
        assert_eq!(png.id, TagSpec::parse("png image media").id);
        assert_eq!(
            png.id,
            Eid::from_token("media")
                .fold(Eid::from_token("image"))
                .fold(Eid::from_token("png"))
        );
    }

    #[test]
    fn test_with_empty_input_is_identity() {
        let base = TagSpec::parse("a.b");
        assert_eq!(base.with(""), base);
        assert_eq!(base.with(" ./ "), base);
        assert_eq!(TagSpec::parse("").id, Eid::NIL);
    }

    #[test]
    fn test_leaf_tags() {
        let spec = TagSpec::parse("a.b.c.d.ee");
        assert_eq!(spec.leaf_tags(2), ("a.b.c", "d.ee"));
        assert_eq!(spec.leaf_tags(1), ("a.b.c.d", "ee"));
        assert_eq!(spec.leaf_tags(0), ("a.b.c.d.ee", ""));
        assert_eq!(spec.leaf_tags(-3), ("a.b.c.d.ee", ""));
        assert_eq!(spec.leaf_tags(9), ("", "a.b.c.d.ee"));

        let hidden = TagSpec {
            canonic: "a.b~c".to_string(),
            ..Default::default()
        };
        assert_eq!(hidden.leaf_tags(1), ("a.b", "c"));
        assert_eq!(hidden.leaf_tags(2), ("a", "b~c"));
    }

    #[test]
    fn test_join() {
        assert_eq!(join("a.b", "c"), "a.b.c");
        assert_eq!(join("a.b.", ".c"), "a.b.c");
        assert_eq!(join("a.b.", "c"), "a.b.c");
        assert_eq!(join("a", ".c"), "a.c");
        assert_eq!(join("", "c"), "c");
        assert_eq!(join("a", ""), "a");
    }

    #[test]
    fn test_display() {
        let spec = TagSpec::parse("x:y");
        assert_eq!(spec.to_string(), "x.y");
        let bare = TagSpec {
            canonic: String::new(),
            ..spec.clone()
        };
        assert_eq!(bare.to_string(), "x.y");
        assert_eq!(TagLiteral::new("x").to_string(), "\"x\"");
        let unnamed = TagLiteral {
            id: Eid::from_token("x"),
            token: String::new(),
        };
        assert_eq!(unnamed.to_string(), unnamed.id.base32());
    }
}
