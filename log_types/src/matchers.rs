//! Label matchers and their wire stringification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Comparison operator of a [`LabelMatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOp {
    /// Exact equality.
    Eq,
    /// Exact inequality.
    NotEq,
    /// Regular expression match.
    Regex,
    /// Negated regular expression match.
    NotRegex,
}

impl fmt::Display for MatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Regex => "=~",
            Self::NotRegex => "!~",
        };
        f.write_str(s)
    }
}

/// A single label matcher, e.g. `app="foo"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMatcher {
    /// Operator.
    pub op: MatchOp,
    /// Label name.
    pub name: String,
    /// Value (or pattern, for regex operators).
    pub value: String,
}

impl LabelMatcher {
    /// Create a new matcher.
    pub fn new(op: MatchOp, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            op,
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for LabelMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{:?}", self.name, self.op, self.value)
    }
}

/// Serialize matchers into the wire format understood by ingesters:
/// comma-joined matcher text wrapped in braces, `{}` when empty.
pub fn matchers_string(matchers: &[LabelMatcher]) -> String {
    let mut out = String::from("{");

    for (idx, m) in matchers.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push_str(&m.to_string());
    }

    out.push('}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_matchers() {
        assert_eq!(matchers_string(&[]), "{}");
    }

    #[test]
    fn test_single_matcher() {
        let m = LabelMatcher::new(MatchOp::Eq, "foo", "bar");
        assert_eq!(matchers_string(&[m]), r#"{foo="bar"}"#);
    }

    #[test]
    fn test_multiple_matchers() {
        let matchers = vec![
            LabelMatcher::new(MatchOp::Eq, "app", "web"),
            LabelMatcher::new(MatchOp::NotRegex, "env", "dev.*"),
        ];
        assert_eq!(matchers_string(&matchers), r#"{app="web",env!~"dev.*"}"#);
    }

    #[test]
    fn test_ops_render() {
        assert_eq!(
            LabelMatcher::new(MatchOp::NotEq, "a", "b").to_string(),
            r#"a!="b""#
        );
        assert_eq!(
            LabelMatcher::new(MatchOp::Regex, "a", "b+").to_string(),
            r#"a=~"b+""#
        );
    }

    #[test]
    fn test_value_is_quoted() {
        // Values containing quotes must stay parseable.
        let m = LabelMatcher::new(MatchOp::Eq, "msg", r#"say "hi""#);
        assert_eq!(m.to_string(), r#"msg="say \"hi\"""#);
    }
}
