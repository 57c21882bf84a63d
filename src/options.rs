//! Stage configuration.
//!
//! Every stage is configured with an [Options] bag: option names mapped to strings, numbers or
//! booleans. Stages list the names they understand and reject anything else.
//!
//! ```
//! use las_pipeline::Options;
//! let options = Options::new()
//!     .with("filename", "points.las")
//!     .with("count", 10);
//! assert_eq!("points.las", options.get_str("filename").unwrap());
//! assert_eq!(Some(10), options.opt_u64("count").unwrap());
//! assert!(options.check_known("readers.las", &["filename"]).is_err());
//! ```

use crate::{Error, Result};
use std::{collections::BTreeMap, fmt};

/// One option value.
#[derive(Clone, Debug, PartialEq)]
#[allow(missing_docs)]
pub enum OptionValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

/// An ordered set of named option values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Options(BTreeMap<String, OptionValue>);

impl Options {
    /// Creates an empty option set.
    pub fn new() -> Options {
        Options::default()
    }

    /// Adds an option, replacing any previous value, and returns the set.
    pub fn with<V: Into<OptionValue>>(mut self, name: &str, value: V) -> Options {
        self.insert(name, value);
        self
    }

    /// Adds an option, returning the previous value.
    pub fn insert<V: Into<OptionValue>>(&mut self, name: &str, value: V) -> Option<OptionValue> {
        self.0.insert(name.to_string(), value.into())
    }

    /// Returns an option's value.
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.0.get(name)
    }

    /// Returns true if the option is set.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Returns the option names, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns true if no options are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fails with [Error::UnknownOption] on the first option not in `known`.
    pub fn check_known(&self, stage: &str, known: &[&str]) -> Result<()> {
        match self.names().find(|name| !known.contains(name)) {
            Some(name) => Err(Error::UnknownOption {
                stage: stage.to_string(),
                option: name.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Returns a required string option.
    pub fn get_str(&self, name: &str) -> Result<&str> {
        self.opt_str(name)?
            .ok_or_else(|| Error::MissingOption(name.to_string()))
    }

    /// Returns a string option, if set.
    pub fn opt_str(&self, name: &str) -> Result<Option<&str>> {
        match self.get(name) {
            None => Ok(None),
            Some(OptionValue::String(s)) => Ok(Some(s)),
            Some(value) => Err(invalid(name, format!("expected a string, found {}", value))),
        }
    }

    /// Returns a required float option.
    ///
    /// Integers and numeric strings are accepted too.
    pub fn get_f64(&self, name: &str) -> Result<f64> {
        self.opt_f64(name)?
            .ok_or_else(|| Error::MissingOption(name.to_string()))
    }

    /// Returns a float option, if set.
    pub fn opt_f64(&self, name: &str) -> Result<Option<f64>> {
        match self.get(name) {
            None => Ok(None),
            Some(OptionValue::Float(n)) => Ok(Some(*n)),
            Some(OptionValue::Integer(n)) => Ok(Some(*n as f64)),
            Some(OptionValue::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| invalid(name, format!("{:?} is not a number", s))),
            Some(value) => Err(invalid(name, format!("expected a number, found {}", value))),
        }
    }

    /// Returns a required non-negative integer option.
    pub fn get_u64(&self, name: &str) -> Result<u64> {
        self.opt_u64(name)?
            .ok_or_else(|| Error::MissingOption(name.to_string()))
    }

    /// Returns a non-negative integer option, if set.
    pub fn opt_u64(&self, name: &str) -> Result<Option<u64>> {
        match self.get(name) {
            None => Ok(None),
            Some(OptionValue::Integer(n)) => u64::try_from(*n)
                .map(Some)
                .map_err(|_| invalid(name, format!("{} is negative", n))),
            Some(OptionValue::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| invalid(name, format!("{:?} is not a non-negative integer", s))),
            Some(value) => Err(invalid(
                name,
                format!("expected a non-negative integer, found {}", value),
            )),
        }
    }

    /// Returns a required boolean option.
    pub fn get_bool(&self, name: &str) -> Result<bool> {
        self.opt_bool(name)?
            .ok_or_else(|| Error::MissingOption(name.to_string()))
    }

    /// Returns a boolean option, if set.
    ///
    /// The strings "true" and "false" are accepted too.
    pub fn opt_bool(&self, name: &str) -> Result<Option<bool>> {
        match self.get(name) {
            None => Ok(None),
            Some(OptionValue::Bool(b)) => Ok(Some(*b)),
            Some(OptionValue::String(s)) => match s.trim() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(invalid(name, format!("{:?} is not a boolean", s))),
            },
            Some(value) => Err(invalid(name, format!("expected a boolean, found {}", value))),
        }
    }
}

fn invalid(option: &str, reason: String) -> Error {
    Error::InvalidOption {
        option: option.to_string(),
        reason,
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::String(s) => write!(f, "{:?}", s),
            OptionValue::Integer(n) => write!(f, "{}", n),
            OptionValue::Float(n) => write!(f, "{}", n),
            OptionValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> OptionValue {
        OptionValue::String(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> OptionValue {
        OptionValue::String(s)
    }
}

impl From<i64> for OptionValue {
    fn from(n: i64) -> OptionValue {
        OptionValue::Integer(n)
    }
}

impl From<i32> for OptionValue {
    fn from(n: i32) -> OptionValue {
        OptionValue::Integer(n.into())
    }
}

impl From<u32> for OptionValue {
    fn from(n: u32) -> OptionValue {
        OptionValue::Integer(n.into())
    }
}

impl From<f64> for OptionValue {
    fn from(n: f64) -> OptionValue {
        OptionValue::Float(n)
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> OptionValue {
        OptionValue::Bool(b)
    }
}
