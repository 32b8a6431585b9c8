/// Replace `${ENV_VAR}` placeholders in config text.
///
/// Placeholders whose variable is unset, and malformed placeholders, are
/// emitted verbatim.
pub fn substitute_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(val) => out.push_str(&val),
                    Err(_) => {
                        out.push_str(&rest[start..start + 2 + end + 1]);
                    },
                }
                rest = &after[end + 1..];
            },
            // "${}" or no closing brace — keep the literal text.
            _ => {
                out.push_str(&rest[start..]);
                return out;
            },
        }
    }

    out.push_str(rest);
    out
}
