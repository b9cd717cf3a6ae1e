use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::PathError;

/// Values substituted into `:name` placeholders.
pub type PathContext = BTreeMap<String, String>;

/// Characters `encodeURIComponent` leaves untouched.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Substitutes named placeholders in a path template.
///
/// `:name` is required; `:name?` is optional and drops its leading `/` when
/// no value is supplied. Values are percent-encoded as a single segment.
///
/// # Example
/// ```
/// use jwt_client_types::{PathContext, compile_path};
///
/// let ctx = PathContext::from([("userId".to_string(), "42".to_string())]);
/// assert_eq!(compile_path("/users/:userId/tags/:tag?", &ctx).unwrap(), "/users/42/tags");
/// ```
pub fn compile_path(pattern: &str, context: &PathContext) -> Result<String, PathError> {
    let mut output = String::with_capacity(pattern.len());
    let mut chars = pattern.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c != ':' {
            output.push(c);
            continue;
        }

        let mut end = start + 1;
        while let Some(&(i, next)) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                end = i + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }

        let name = &pattern[start + 1..end];
        if name.is_empty() {
            return Err(PathError::InvalidTemplate(format!(
                "missing parameter name at offset {}",
                start
            )));
        }

        let optional = matches!(chars.peek(), Some(&(_, '?')));
        if optional {
            chars.next();
        }

        match context.get(name).filter(|v| !v.is_empty()) {
            Some(value) => output.extend(utf8_percent_encode(value, COMPONENT)),
            None if optional => {
                if output.ends_with('/') {
                    output.pop();
                }
            }
            None => return Err(PathError::MissingParam(name.to_string())),
        }
    }

    Ok(output)
}
