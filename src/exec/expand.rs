//! Shell-style variable expansion for command lines.
//!
//! Supports `$NAME` and `${NAME}`. Unset variables expand to the empty
//! string. A `$` that does not start a valid reference is kept as-is.

/// Expand `$VAR` / `${VAR}` references in `input` using `lookup`.
pub fn expand<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) if end > 0 => {
                    let name = &braced[..end];
                    out.push_str(&lookup(name).unwrap_or_default());
                    rest = &braced[end + 1..];
                }
                // "${}" or unterminated: keep literally
                _ => {
                    out.push('$');
                    rest = after;
                }
            }
            continue;
        }

        let name_len = after
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
            .map(|(i, _)| i)
            .unwrap_or(after.len());

        if name_len == 0 {
            out.push('$');
            rest = after;
        } else {
            let name = &after[..name_len];
            out.push_str(&lookup(name).unwrap_or_default());
            rest = &after[name_len..];
        }
    }

    out.push_str(rest);
    out
}
