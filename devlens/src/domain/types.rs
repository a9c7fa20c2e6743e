//! Domain types providing compile-time safety and self-documentation
//!
//! These types name the things every other module passes around: which
//! function an event belongs to, what kind of boundary it was, and how a
//! report should be ordered.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Module name recorded when a probe site has none.
pub const UNKNOWN_MODULE: &str = "unknown";

/// Identity of an instrumented function
///
/// `name` is the local (unqualified) function name, `module` is the Rust
/// module path the function lives in. Ordering is by name first so that
/// reports break ties on the function name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId {
    pub name: String,
    pub module: String,
}

impl FunctionId {
    /// Create a function identity, normalizing an empty module to `"unknown"`
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        let module = module.into();
        let module = if module.is_empty() { UNKNOWN_MODULE.to_string() } else { module };
        Self { name: name.into(), module }
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.module, self.name)
    }
}

/// Static description of a probe point
///
/// Built by the `probe!` macro from the enclosing function and
/// `module_path!()`, so creating one never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub name: &'static str,
    pub module: &'static str,
}

impl CallSite {
    #[must_use]
    pub const fn new(name: &'static str, module: &'static str) -> Self {
        Self { name, module }
    }

    /// Owned identity for storage in events and samples
    #[must_use]
    pub fn function_id(&self) -> FunctionId {
        FunctionId::new(self.name, self.module)
    }
}

/// One captured argument, rendered to text at capture time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub value: String,
}

impl Argument {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Render an argument list as `a=1, b=2`
#[must_use]
pub fn render_arguments(args: &[Argument]) -> String {
    args.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Function boundary transition observed by the hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Call,
    Return,
    Exception,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Call => "call",
            EventKind::Return => "return",
            EventKind::Exception => "exception",
        };
        f.write_str(s)
    }
}

/// Ordering applied to a profiling report
///
/// Count and time keys sort descending, `Name` sorts ascending. Every key
/// breaks ties on the function name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Calls,
    #[default]
    Cumulative,
    /// Own time, excluding nested instrumented calls
    Time,
    /// Function identity
    Name,
}

impl SortKey {
    /// Label used in the `Ordered by:` report header
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            SortKey::Calls => "call count",
            SortKey::Cumulative => "cumulative time",
            SortKey::Time => "internal time",
            SortKey::Name => "function name",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortKey::Calls => "calls",
            SortKey::Cumulative => "cumulative",
            SortKey::Time => "time",
            SortKey::Name => "filename",
        };
        f.write_str(s)
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "calls" | "ncalls" => Ok(SortKey::Calls),
            "cumulative" | "cumtime" => Ok(SortKey::Cumulative),
            "time" | "tottime" => Ok(SortKey::Time),
            "filename" | "name" => Ok(SortKey::Name),
            other => Err(format!(
                "unknown sort key '{other}' (expected calls, cumulative, time or filename)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_module_becomes_unknown() {
        let id = FunctionId::new("f", "");
        assert_eq!(id.module, UNKNOWN_MODULE);
        assert_eq!(id.to_string(), "unknown::f");
    }

    #[test]
    fn test_function_id_orders_by_name_first() {
        let a = FunctionId::new("alpha", "zzz");
        let b = FunctionId::new("beta", "aaa");
        assert!(a < b);
    }

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!("calls".parse::<SortKey>(), Ok(SortKey::Calls));
        assert_eq!("CUMULATIVE".parse::<SortKey>(), Ok(SortKey::Cumulative));
        assert_eq!("tottime".parse::<SortKey>(), Ok(SortKey::Time));
        assert_eq!("filename".parse::<SortKey>(), Ok(SortKey::Name));
        assert!("bogus".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_render_arguments() {
        let args = vec![Argument::new("x", "5"), Argument::new("y", "\"hi\"")];
        assert_eq!(render_arguments(&args), "x=5, y=\"hi\"");
        assert_eq!(render_arguments(&[]), "");
    }
}
