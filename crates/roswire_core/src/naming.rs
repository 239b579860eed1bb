//! ROS graph name validation and resolution.
//!
//! Name forms:
//! - global: `/a/b` (passes through resolution unchanged)
//! - relative: `a/b` (resolved against a namespace)
//! - private: `~a` (resolved against a node name)

use crate::error::{CoreError, Domain, ErrorKind, Payload, Result};

fn invalid_name(name: &str, reason: &'static str) -> CoreError {
    CoreError::warn()
        .domain(Domain::Naming)
        .kind(ErrorKind::InvalidArgument)
        .msg(reason)
        .payload(Payload::Context {
            key: "name",
            value: name.to_string().into(),
        })
        .build()
}

/// Check that a graph name is well-formed.
///
/// First character must be a letter, `/` or `~`; the rest letters, digits,
/// `_` or `/`. Empty segments (`//`) and trailing slashes are rejected,
/// except for the root namespace `/` itself.
pub fn validate(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let first = chars
        .next()
        .ok_or_else(|| invalid_name(name, "graph name must not be empty"))?;

    if !(first.is_ascii_alphabetic() || first == '/' || first == '~') {
        return Err(invalid_name(name, "graph name must start with a letter, '/' or '~'"));
    }
    for c in chars {
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '/') {
            return Err(invalid_name(name, "graph name contains an invalid character"));
        }
    }

    if name.contains("//") {
        return Err(invalid_name(name, "graph name contains an empty segment"));
    }
    if name.len() > 1 && name.ends_with('/') {
        return Err(invalid_name(name, "graph name must not end with '/'"));
    }
    Ok(())
}

/// Resolve `name` to a global name.
///
/// `namespace` must be a global name (e.g. `/`); `node_name` is the global
/// name private names resolve against.
pub fn resolve(namespace: &str, node_name: &str, name: &str) -> Result<String> {
    validate(name)?;

    if let Some(private) = name.strip_prefix('~') {
        validate(node_name)?;
        if !node_name.starts_with('/') {
            return Err(invalid_name(node_name, "node name must be global"));
        }
        return Ok(join(node_name, private));
    }

    if name.starts_with('/') {
        return Ok(name.to_string());
    }

    validate(namespace)?;
    if !namespace.starts_with('/') {
        return Err(invalid_name(namespace, "namespace must be global"));
    }
    Ok(join(namespace, name))
}

fn join(base: &str, rest: &str) -> String {
    if rest.is_empty() {
        base.to_string()
    } else if base == "/" {
        format!("/{rest}")
    } else {
        format!("{base}/{rest}")
    }
}
