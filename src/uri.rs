// src/uri.rs

//! URI specification resolution
//!
//! A repository URI in the configuration document is either a literal string
//! or a template with named arguments. Each argument is a literal scalar, a
//! variable reference, or a variable reference with a derived-value method
//! applied. The supported methods form a small closed set dispatched
//! explicitly; there is no reflection and no recursive resolution.
//!
//! Resolution is a pure function of `(spec, vars)`: the same input always
//! produces the same URI, which keeps rendered repository files reproducible.

use crate::vars::VariableSet;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// A URI as written in the configuration document
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UriSpec {
    /// Literal URI, returned verbatim
    Plain(String),
    /// Format template plus named arguments
    Template {
        template: String,
        #[serde(default)]
        format_args: BTreeMap<String, UriArg>,
    },
}

/// One named template argument
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UriArg {
    Ref(UriRef),
    Literal(Scalar),
}

/// A reference to a variable, optionally with a derived-value method applied
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UriRef {
    /// Substitute the variable's value
    Variable { name: String },
    /// Substitute the result of applying `method` to the variable's value
    Method {
        name: String,
        method: String,
        #[serde(default)]
        args: Vec<Scalar>,
        #[serde(default)]
        kwargs: BTreeMap<String, Scalar>,
    },
}

/// Literal scalar usable as a template or method argument
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Str(v) => write!(f, "{}", v),
        }
    }
}

/// Expand a URI specification into its final string
pub fn resolve(spec: &UriSpec, vars: &VariableSet) -> Result<String> {
    match spec {
        UriSpec::Plain(uri) => Ok(uri.clone()),
        UriSpec::Template {
            template,
            format_args,
        } => {
            let mut resolved = BTreeMap::new();
            for (name, arg) in format_args {
                resolved.insert(name.as_str(), resolve_arg(arg, vars)?);
            }
            format_template(template, &resolved)
        }
    }
}

fn resolve_arg(arg: &UriArg, vars: &VariableSet) -> Result<String> {
    match arg {
        UriArg::Literal(scalar) => Ok(scalar.to_string()),
        UriArg::Ref(UriRef::Variable { name }) => lookup(vars, name),
        UriArg::Ref(UriRef::Method {
            name,
            method,
            args,
            kwargs,
        }) => {
            let value = lookup(vars, name)?;
            apply_method(&value, name, method, args, kwargs)
        }
    }
}

fn lookup(vars: &VariableSet, name: &str) -> Result<String> {
    vars.get(name)
        .ok_or_else(|| Error::Config(format!("unknown variable '{name}' in URI spec")))
}

/// Dispatch a derived-value method on a resolved variable
///
/// The method set is closed; anything else is a configuration error.
fn apply_method(
    value: &str,
    variable: &str,
    method: &str,
    args: &[Scalar],
    kwargs: &BTreeMap<String, Scalar>,
) -> Result<String> {
    let positional = |index: usize, keyword: &str| -> Option<String> {
        args.get(index)
            .or_else(|| kwargs.get(keyword))
            .map(Scalar::to_string)
    };

    match method {
        "replace" => {
            let from = positional(0, "from").ok_or_else(|| {
                Error::Config(format!("method 'replace' on '{variable}' requires 'from'"))
            })?;
            let to = positional(1, "to").ok_or_else(|| {
                Error::Config(format!("method 'replace' on '{variable}' requires 'to'"))
            })?;
            Ok(value.replace(&from, &to))
        }
        "strip" => match positional(0, "chars") {
            Some(chars) => Ok(value
                .trim_matches(|c: char| chars.contains(c))
                .to_string()),
            None => Ok(value.trim().to_string()),
        },
        "lower" => Ok(value.to_lowercase()),
        "upper" => Ok(value.to_uppercase()),
        _ => Err(Error::Config(format!(
            "unknown method '{method}' on variable '{variable}'"
        ))),
    }
}

/// Substitute `{name}` placeholders with resolved arguments
///
/// `{{` and `}}` escape literal braces. Placeholders must be declared in the
/// argument map and every brace must be balanced.
fn format_template(template: &str, args: &BTreeMap<&str, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    return Err(Error::Config(format!(
                        "unterminated placeholder in template '{template}'"
                    )));
                }
                match args.get(name.as_str()) {
                    Some(value) => out.push_str(value),
                    None => {
                        return Err(Error::Config(format!(
                            "template references undeclared argument '{name}'"
                        )));
                    }
                }
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(Error::Config(format!(
                        "unbalanced '}}' in template '{template}'"
                    )));
                }
            }
            c => out.push(c),
        }
    }
    Ok(out)
}
