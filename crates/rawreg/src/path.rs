//! Virtual path addressing.
//!
//! A virtual path names a location inside a container reached through a
//! delegate accessor: `scheme:underlying_path#fragment`. The scheme selects
//! the delegate, the underlying path is handed to it verbatim, and the
//! fragment is the `/`-separated path inside the container.
//!
//! Fragment components that contain a separator are wrapped in double quotes
//! (embedded quotes doubled), so [`quote_component`] and
//! [`split_components`] round-trip any name.

use crate::error::{AccessorError, AccessorResult};
use std::fmt;
use tracing::warn;

/// A parsed `scheme:underlying_path#fragment` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualPath {
    pub scheme: String,
    /// Present when the path was written with `//`, e.g. `file:///tmp/x`.
    pub authority: Option<String>,
    pub path: String,
    pub fragment: String,
}

impl VirtualPath {
    pub fn parse(input: &str) -> AccessorResult<Self> {
        let (scheme, rest) = input
            .split_once(':')
            .ok_or_else(|| AccessorError::MalformedPath(format!("{}: missing scheme", input)))?;
        if !is_valid_scheme(scheme) {
            return Err(AccessorError::MalformedPath(format!(
                "{}: invalid scheme '{}'",
                input, scheme
            )));
        }

        let (location, fragment) = match rest.split_once('#') {
            Some((location, fragment)) => (location, fragment),
            None => (rest, ""),
        };

        let (authority, path) = match location.strip_prefix("//") {
            Some(after) => {
                let split = after.find('/').unwrap_or(after.len());
                (Some(after[..split].to_string()), &after[split..])
            }
            None => (None, location),
        };

        Ok(VirtualPath {
            scheme: scheme.to_string(),
            authority,
            path: percent_decode(path)
                .ok_or_else(|| AccessorError::MalformedPath(format!("{}: bad escape", input)))?,
            fragment: percent_decode(fragment)
                .ok_or_else(|| AccessorError::MalformedPath(format!("{}: bad escape", input)))?,
        })
    }

    /// The same address with the fragment cleared.
    pub fn base(&self) -> VirtualPath {
        VirtualPath {
            fragment: String::new(),
            ..self.clone()
        }
    }

    /// Normalized container address, used as the cache key.
    ///
    /// An empty authority is dropped, so `file:///h` and `file:/h` name the
    /// same container.
    pub fn base_address(&self) -> String {
        let mut base = self.base();
        if base.authority.as_deref() == Some("") {
            base.authority = None;
        }
        base.to_string()
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if let Some(authority) = &self.authority {
            write!(f, "//{}", authority)?;
        }
        f.write_str(&escape(&self.path, &['%', '#']))?;
        if !self.fragment.is_empty() {
            write!(f, "#{}", escape(&self.fragment, &['%']))?;
        }
        Ok(())
    }
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.' | '_'))
}

fn escape(input: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if special.contains(&c) {
            out.push_str(&format!("%{:02X}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Decode `%XX` escapes. `None` on a truncated or non-hex escape.
fn percent_decode(input: &str) -> Option<String> {
    if !input.contains('%') {
        return Some(input.to_string());
    }
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(String::from_utf8_lossy(&out).into_owned())
}

/// Split a fragment into components on `/` or `\`, honoring quoted
/// components. Empty unquoted components are dropped.
pub fn split_components(fragment: &str) -> Vec<String> {
    let mut components = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quote = false;
    let mut chars = fragment.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quote {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quote = false;
                }
            } else {
                current.push(c);
            }
            continue;
        }

        match c {
            '"' => {
                in_quote = true;
                quoted = true;
            }
            '/' | '\\' => {
                if !current.is_empty() || quoted {
                    components.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() || quoted {
        components.push(current);
    }
    components
}

/// Quote a component if it would not survive [`split_components`] as-is.
pub fn quote_component(name: &str) -> String {
    if name.is_empty() || name.contains(['/', '\\', '"']) {
        format!("\"{}\"", name.replace('"', "\"\""))
    } else {
        name.to_string()
    }
}

/// Split a virtual path into its container address (with a trailing `#`) and
/// the in-container fragment.
pub fn get_root(path: &str) -> AccessorResult<(String, String)> {
    let vpath = VirtualPath::parse(path)?;
    Ok((format!("{}#", vpath.base()), vpath.fragment))
}

/// Append `stem` as one component of `root`'s fragment.
///
/// Never fails: an unparseable root is logged and joined textually.
pub fn path_join(root: &str, stem: &str) -> String {
    let mut vpath = match VirtualPath::parse(root) {
        Ok(v) => v,
        Err(e) => {
            warn!("path_join: cannot parse '{}': {}", root, e);
            return format!("{}/{}", root.trim_end_matches('/'), stem);
        }
    };

    let parent = vpath.fragment.trim_end_matches('/');
    vpath.fragment = if parent.is_empty() {
        quote_component(stem)
    } else {
        format!("{}/{}", parent, quote_component(stem))
    };
    vpath.to_string()
}
