//! Call arguments for tasks and consumers.
//!
//! Results travel between threads as [`serde_json::Value`]s. When a consumer
//! is invoked the value is turned into [`Arguments`], either as one
//! positional argument or unpacked: an object becomes keyword arguments, an
//! array becomes positional arguments and any other value stays a single
//! positional argument.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use threadom_core::TaskError;

/// Positional and keyword arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    positional: Vec<Value>,
    keyword: Map<String, Value>,
}

impl Arguments {
    /// Empty arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `value` as the only positional argument, unmodified.
    pub fn single(value: impl Into<Value>) -> Self {
        Self {
            positional: vec![value.into()],
            keyword: Map::new(),
        }
    }

    /// Unpack `value` into arguments.
    pub fn unpack(value: Value) -> Self {
        match value {
            Value::Object(keyword) => Self {
                positional: Vec::new(),
                keyword,
            },
            Value::Array(positional) => Self {
                positional,
                keyword: Map::new(),
            },
            scalar => Self::single(scalar),
        }
    }

    /// Build from `value`, unpacking it if `unpack` is set.
    pub fn from_result(value: Value, unpack: bool) -> Self {
        if unpack {
            Self::unpack(value)
        } else {
            Self::single(value)
        }
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword argument.
    pub fn kwarg_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// Positional arguments in call order.
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    /// Keyword arguments.
    pub fn keyword(&self) -> &Map<String, Value> {
        &self.keyword
    }

    /// The positional argument at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// The keyword argument called `name`.
    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }

    /// Deserialize the positional argument at `index`.
    pub fn parse<T: DeserializeOwned>(&self, index: usize) -> Result<T, TaskError> {
        let value = self
            .get(index)
            .ok_or_else(|| TaskError::msg(format!("missing positional argument {index}")))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Deserialize the keyword argument called `name`.
    pub fn parse_kwarg<T: DeserializeOwned>(&self, name: &str) -> Result<T, TaskError> {
        let value = self
            .kwarg(name)
            .ok_or_else(|| TaskError::msg(format!("missing keyword argument '{name}'")))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Total number of arguments.
    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    /// Check if there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Split into positional and keyword parts.
    pub fn into_parts(self) -> (Vec<Value>, Map<String, Value>) {
        (self.positional, self.keyword)
    }
}
