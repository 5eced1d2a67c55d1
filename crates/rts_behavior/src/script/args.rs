//! Generic argument tree that gameset expressions are written in.
//!
//! Every evaluator and action is written as `Node(KIND, [args...])`. The
//! per-family compilers walk the arguments with an [`ArgCursor`], which
//! turns grammar mismatches into [`GameError::MalformedNode`].

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// One argument in a gameset expression.
///
/// ```ron
/// Node("ADDITION", [Num(1.0), Node("ITEM_VALUE", [Name("Health"), Node("SELF", [])])])
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Arg {
    /// Numeric literal.
    Num(f32),
    /// Bare name: an item, sequence, animation, tag, ...
    Name(String),
    /// A node of some family: kind tag plus arguments.
    Node(String, Vec<Arg>),
    /// Nested list, used for sub-sequences and option lists.
    List(Vec<Arg>),
}

impl Arg {
    /// Build a node.
    #[must_use]
    pub fn node(kind: &str, args: Vec<Arg>) -> Self {
        Self::Node(kind.to_string(), args)
    }

    /// Build a name.
    #[must_use]
    pub fn name(name: &str) -> Self {
        Self::Name(name.to_string())
    }

    /// Short description for error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Num(v) => format!("number {v}"),
            Self::Name(n) => format!("name '{n}'"),
            Self::Node(kind, _) => format!("node {kind}"),
            Self::List(items) => format!("list of {}", items.len()),
        }
    }
}

/// Sequential reader over one node's arguments.
#[derive(Debug)]
pub(crate) struct ArgCursor<'a> {
    family: &'static str,
    kind: &'a str,
    args: &'a [Arg],
    pos: usize,
}

impl<'a> ArgCursor<'a> {
    pub(crate) fn new(family: &'static str, kind: &'a str, args: &'a [Arg]) -> Self {
        Self {
            family,
            kind,
            args,
            pos: 0,
        }
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> GameError {
        GameError::malformed(self.family, self.kind, message)
    }

    /// Next argument of any shape.
    pub(crate) fn next(&mut self) -> Result<&'a Arg> {
        let arg = self
            .args
            .get(self.pos)
            .ok_or_else(|| self.error(format!("missing argument {}", self.pos + 1)))?;
        self.pos += 1;
        Ok(arg)
    }

    /// Next argument if there is one.
    pub(crate) fn next_opt(&mut self) -> Option<&'a Arg> {
        let arg = self.args.get(self.pos)?;
        self.pos += 1;
        Some(arg)
    }

    /// Next argument, which must be a name.
    pub(crate) fn name(&mut self) -> Result<&'a str> {
        match self.next()? {
            Arg::Name(name) => Ok(name),
            other => Err(self.error(format!("expected a name, found {}", other.describe()))),
        }
    }

    /// Next argument, which must be a numeric literal.
    pub(crate) fn literal(&mut self) -> Result<f32> {
        match self.next()? {
            Arg::Num(v) => Ok(*v),
            other => Err(self.error(format!("expected a number, found {}", other.describe()))),
        }
    }

    /// Next argument, which must be a list.
    pub(crate) fn list(&mut self) -> Result<&'a [Arg]> {
        match self.next()? {
            Arg::List(items) => Ok(items),
            other => Err(self.error(format!("expected a list, found {}", other.describe()))),
        }
    }

    /// Whether every argument has been consumed.
    pub(crate) fn is_done(&self) -> bool {
        self.pos >= self.args.len()
    }

    /// Fail if arguments are left over.
    pub(crate) fn finish(self) -> Result<()> {
        if self.is_done() {
            Ok(())
        } else {
            Err(self.error(format!(
                "{} unexpected trailing argument(s)",
                self.args.len() - self.pos
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_reads_in_order() {
        let args = vec![Arg::name("hp"), Arg::Num(2.0)];
        let mut cur = ArgCursor::new("numeric", "TEST", &args);
        assert_eq!(cur.name().unwrap(), "hp");
        assert_eq!(cur.literal().unwrap(), 2.0);
        assert!(cur.finish().is_ok());
    }

    #[test]
    fn test_cursor_reports_shape_mismatch() {
        let args = vec![Arg::Num(1.0)];
        let mut cur = ArgCursor::new("action", "SET_ITEM", &args);
        let err = cur.name().unwrap_err();
        assert!(matches!(err, GameError::MalformedNode { family: "action", .. }));
    }

    #[test]
    fn test_cursor_rejects_trailing() {
        let args = vec![Arg::Num(1.0), Arg::Num(2.0)];
        let mut cur = ArgCursor::new("numeric", "NEGATE", &args);
        cur.next().unwrap();
        assert!(cur.finish().is_err());
    }

    #[test]
    fn test_arg_parses_from_ron() {
        let arg: Arg = ron::from_str(r#"Node("SELF", [])"#).unwrap();
        assert_eq!(arg, Arg::node("SELF", vec![]));
    }
}
