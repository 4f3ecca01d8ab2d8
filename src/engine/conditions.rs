use crate::engine::host::{Host, Player};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeMode {
    All,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl Comparison {
    pub fn parse(op: &str) -> Option<Comparison> {
        match op {
            ">" => Some(Comparison::Gt),
            "<" => Some(Comparison::Lt),
            ">=" => Some(Comparison::Ge),
            "<=" => Some(Comparison::Le),
            "==" => Some(Comparison::Eq),
            "!=" => Some(Comparison::Ne),
            _ => None,
        }
    }

    pub fn apply(self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Gt => left > right,
            Comparison::Lt => left < right,
            Comparison::Ge => left >= right,
            Comparison::Le => left <= right,
            Comparison::Eq => left == right,
            Comparison::Ne => left != right,
        }
    }
}

/// `left op right`, both sides placeholder templates.
/// `op` is `None` when the source text was not a three-token comparison;
/// such an expression never holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub left: String,
    pub op: Option<Comparison>,
    pub right: String,
}

impl Expression {
    pub fn parse(raw: &str) -> Expression {
        let parts: Vec<&str> = raw.split_whitespace().collect();
        if let [left, op, right] = parts.as_slice() {
            if let Some(op) = Comparison::parse(op) {
                return Expression {
                    left: left.to_string(),
                    op: Some(op),
                    right: right.to_string(),
                };
            }
        }
        Expression {
            left: raw.trim().to_string(),
            op: None,
            right: String::new(),
        }
    }

    fn evaluate(&self, host: &dyn Host, player: &Player) -> bool {
        let Some(op) = self.op else {
            log::debug!("malformed expression '{}' evaluates false", self.left);
            return false;
        };

        let left = host.set_placeholders(player, &self.left);
        let right = host.set_placeholders(player, &self.right);

        match (left.trim().parse::<f64>(), right.trim().parse::<f64>()) {
            (Ok(l), Ok(r)) => op.apply(l, r),
            _ => {
                log::debug!(
                    "non-numeric operands in condition: '{}' / '{}'",
                    left.trim(),
                    right.trim()
                );
                false
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Permission(String),
    /// Holds when `%key%` substitutes to `true`.
    Placeholder(String),
    Expression(Expression),
    Composite {
        mode: CompositeMode,
        children: Vec<Condition>,
    },
}

impl Condition {
    /// Conditions only read host state; they never touch menus.
    pub fn check(&self, host: &dyn Host, player: &Player) -> bool {
        match self {
            Condition::Permission(name) => host.has_permission(player, name),
            Condition::Placeholder(key) => host
                .set_placeholders(player, &format!("%{}%", key))
                .trim()
                .eq_ignore_ascii_case("true"),
            Condition::Expression(expr) => expr.evaluate(host, player),
            Condition::Composite { mode, children } => match mode {
                CompositeMode::All => children.iter().all(|c| c.check(host, player)),
                CompositeMode::Any => children.iter().any(|c| c.check(host, player)),
            },
        }
    }
}

/// Parse `type:value` (or `type value`) into a condition.
/// Unknown types log a warning and yield `None`.
///
/// Composites: `all[c1; c2; ...]` / `any[...]`. Sub-conditions that fail to
/// parse are dropped. Splitting tracks bracket depth, so composites nest.
pub fn parse_condition(raw: &str) -> Option<Condition> {
    let s = raw.trim();
    if s.is_empty() {
        log::warn!("Empty condition string");
        return None;
    }

    if let Some((mode, body)) = split_composite(s) {
        let children = split_top_level(body)
            .into_iter()
            .filter_map(parse_condition)
            .collect();
        return Some(Condition::Composite { mode, children });
    }

    let (kind, value) = split_type_value(s);

    match kind.as_str() {
        "permission" | "perm" => Some(Condition::Permission(value.to_string())),
        "placeholder" | "papi" => Some(Condition::Placeholder(
            value.trim_matches('%').to_string(),
        )),
        "check" => {
            let expr = Expression::parse(value);
            if expr.op.is_none() {
                log::warn!("Malformed check expression '{}'; it will never hold", value);
            }
            Some(Condition::Expression(expr))
        }
        _ => {
            log::warn!("Unknown condition type: {}", kind);
            None
        }
    }
}

fn split_composite(s: &str) -> Option<(CompositeMode, &str)> {
    let head = s.get(..3)?;
    let mode = if head.eq_ignore_ascii_case("all") {
        CompositeMode::All
    } else if head.eq_ignore_ascii_case("any") {
        CompositeMode::Any
    } else {
        return None;
    };

    let rest = s[3..].trim_start();
    let body = rest.strip_prefix('[')?.strip_suffix(']')?;
    Some((mode, body))
}

/// Split on `;` at bracket depth zero.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, c) in body.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => {
                parts.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(body[start..].trim());

    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

/// Type ends at the first `:` or whitespace, whichever comes first.
fn split_type_value(s: &str) -> (String, &str) {
    match s.find(|c: char| c == ':' || c.is_whitespace()) {
        Some(idx) => {
            let sep_len = s[idx..].chars().next().map(char::len_utf8).unwrap_or(1);
            (s[..idx].to_lowercase(), s[idx + sep_len..].trim())
        }
        None => (s.to_lowercase(), ""),
    }
}
