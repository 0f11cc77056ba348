//! Converter table: named functions applied to matched output tokens.
//!
//! A converter receives the values emitted so far for its scope plus any
//! comma-separated arguments from the template (`!pow,3`) and returns a new
//! list of values. Values are dynamically typed JSON values so converters
//! can turn surface strings into numbers or booleans.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{ParlanceError, Result};

/// Converter signature: emitted values and template arguments in, values out.
pub type ConverterFn = dyn Fn(&[Value], &[String]) -> Result<Vec<Value>> + Send + Sync;

/// Named converter functions.
#[derive(Default)]
pub struct ConverterTable {
    converters: HashMap<String, Box<ConverterFn>>,
}

impl ConverterTable {
    /// An empty table.
    pub fn new() -> Self {
        ConverterTable::default()
    }

    /// The built-in table: `int`, `float`, `bool`, `lower`, `upper`.
    pub fn defaults() -> Self {
        let mut table = ConverterTable::new();
        table.insert("int", |values, _args| {
            values.iter().map(to_int).collect::<Result<Vec<_>>>()
        });
        table.insert("float", |values, _args| {
            values.iter().map(to_float).collect::<Result<Vec<_>>>()
        });
        table.insert("bool", |values, _args| {
            Ok(values.iter().map(to_bool).collect())
        });
        table.insert("lower", |values, _args| {
            Ok(values
                .iter()
                .map(|v| Value::String(value_to_string(v).to_lowercase()))
                .collect())
        });
        table.insert("upper", |values, _args| {
            Ok(values
                .iter()
                .map(|v| Value::String(value_to_string(v).to_uppercase()))
                .collect())
        });
        table
    }

    /// Register a converter under a name, replacing any existing one.
    pub fn insert<F>(&mut self, name: impl Into<String>, converter: F)
    where
        F: Fn(&[Value], &[String]) -> Result<Vec<Value>> + Send + Sync + 'static,
    {
        self.converters.insert(name.into(), Box::new(converter));
    }

    /// Look up a converter by bare name.
    pub fn get(&self, name: &str) -> Option<&ConverterFn> {
        self.converters.get(name).map(Box::as_ref)
    }
}

/// Resolves converter keys against a base table with optional overrides.
pub(crate) struct ConverterResolver<'a> {
    base: &'a ConverterTable,
    extra: Option<&'a ConverterTable>,
}

impl<'a> ConverterResolver<'a> {
    pub(crate) fn new(base: &'a ConverterTable, extra: Option<&'a ConverterTable>) -> Self {
        ConverterResolver { base, extra }
    }

    /// Apply a converter key of the form `name` or `name,arg1,arg2`.
    pub(crate) fn apply(&self, key: &str, values: &[Value]) -> Result<Vec<Value>> {
        let mut parts = key.split(',');
        let name = parts.next().unwrap_or(key);
        let args: Vec<String> = parts.map(str::to_string).collect();

        let converter = self
            .extra
            .and_then(|table| table.get(name))
            .or_else(|| self.base.get(name))
            .ok_or_else(|| {
                ParlanceError::recognition(format!("unknown converter `{name}`"))
            })?;

        converter(values, &args)
    }
}

/// Render a value the way it appears in output text: strings verbatim,
/// everything else in JSON form.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_int(value: &Value) -> Result<Value> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| ParlanceError::recognition(format!("`{s}` is not an integer"))),
        other => Err(ParlanceError::recognition(format!(
            "cannot convert {other} to an integer"
        ))),
    }
}

fn to_float(value: &Value) -> Result<Value> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| {
            ParlanceError::recognition(format!("`{value}` is not a number"))
        })
}

fn to_bool(value: &Value) -> Value {
    let truthy = match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "false" | "no" | "off" | "0" | "" => false,
            _ => true,
        },
        Value::Null => false,
        _ => true,
    };
    Value::Bool(truthy)
}
