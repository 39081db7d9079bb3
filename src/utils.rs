/// Turns a display name into a folder name: lowercase, whitespace as `_`,
/// only `[a-z0-9_-]` kept, no repeated or surrounding underscores.
pub fn string_to_safe_path(value: &str) -> String {
    let mut out = String::with_capacity(value.len());

    for c in value.chars().flat_map(char::to_lowercase) {
        let c = if c.is_whitespace() { '_' } else { c };
        match c {
            '_' if out.is_empty() || out.ends_with('_') => {}
            'a'..='z' | '0'..='9' | '-' | '_' => out.push(c),
            _ => {}
        }
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}
