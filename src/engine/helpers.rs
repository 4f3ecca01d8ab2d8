/// Section sign used by the client for colour and format codes.
pub const COLOR_CHAR: char = '§';

/// Translate `&` colour/format codes into client codes.
/// - "&a" / "&A" => "§a"
/// - "&&" and unknown codes are left as-is
pub fn colorize(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '&' {
            if let Some(&next) = chars.peek() {
                if is_format_code(next) {
                    result.push(COLOR_CHAR);
                    result.push(next.to_ascii_lowercase());
                    chars.next();
                    continue;
                }
            }
        }
        result.push(c);
    }

    result
}

fn is_format_code(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), '0'..='9' | 'a'..='f' | 'k'..='o' | 'r')
}

/// Remove client colour codes, e.g. for log output.
pub fn strip_colors(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c == COLOR_CHAR {
            chars.next();
            continue;
        }
        result.push(c);
    }

    result
}

pub fn replace_player(template: &str, player_name: &str) -> String {
    template.replace("%player%", player_name)
}

/// Substitute `%key%` tokens from a list of pairs.
pub fn fill_template(template: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in pairs {
        out = out.replace(&format!("%{}%", key), value);
    }
    out
}
