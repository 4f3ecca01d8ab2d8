use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

pub const COLUMNS: usize = 9;
pub const QUOTE: char = '`';

/// Tokenise one row into at most `COLUMNS` slot tokens. A run wrapped in
/// backticks is one token; an unterminated quote swallows the rest of the row.
/// Quoted tokens keep their delimiters.
pub fn parse_row(row: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut in_quotes = false;
    let mut current = String::new();

    for c in row.chars() {
        if tokens.len() >= COLUMNS {
            break;
        }

        if c == QUOTE {
            in_quotes = !in_quotes;
            current.push(c);
            if !in_quotes {
                tokens.push(std::mem::take(&mut current));
            }
        } else if in_quotes {
            current.push(c);
        } else {
            tokens.push(c.to_string());
        }
    }

    // Unterminated quote: whatever was accumulated is one token.
    if in_quotes && !current.is_empty() && tokens.len() < COLUMNS {
        tokens.push(current);
    }

    tokens
}

/// The item key a token stands for (quote delimiters removed).
pub fn token_key(token: &str) -> &str {
    let inner = token.strip_prefix(QUOTE).unwrap_or(token);
    inner.strip_suffix(QUOTE).unwrap_or(inner)
}

/// Memo of parsed rows keyed on the raw row text.
#[derive(Default)]
pub struct RowCache {
    rows: RwLock<HashMap<String, Arc<[String]>>>,
}

impl RowCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(&self, row: &str) -> Arc<[String]> {
        if let Some(hit) = self.rows.read().get(row) {
            return hit.clone();
        }
        let parsed: Arc<[String]> = parse_row(row).into();
        self.rows
            .write()
            .entry(row.to_string())
            .or_insert(parsed)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    pub fn clear(&self) {
        self.rows.write().clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    rows: Vec<Arc<[String]>>,
}

impl Layout {
    pub fn parse<S: AsRef<str>>(rows: &[S], cache: &RowCache) -> Layout {
        Layout {
            rows: rows.iter().map(|r| cache.parse(r.as_ref())).collect(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Absolute slots (`row * COLUMNS + column`) holding `key`, row-major.
    pub fn slots_for(&self, key: &str) -> Vec<usize> {
        let mut slots = Vec::new();
        for (r, row) in self.rows.iter().enumerate() {
            for (c, token) in row.iter().enumerate() {
                if token_key(token) == key {
                    slots.push(r * COLUMNS + c);
                }
            }
        }
        slots
    }

    /// Rows as processed strings (tokens concatenated).
    pub fn processed_rows(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.concat()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_keys_map_row_major() {
        let cache = RowCache::new();
        let layout = Layout::parse(&["A B", "BBA"], &cache);

        assert_eq!(layout.slots_for("A"), vec![0, 11]);
        assert_eq!(layout.slots_for("B"), vec![2, 9, 10]);
        assert_eq!(layout.slots_for(" "), vec![1]);
        assert!(layout.slots_for("C").is_empty());
    }

    #[test]
    fn rows_truncate_at_nine_columns() {
        let row = parse_row("ABCDEFGHIJKL");
        assert_eq!(row.len(), COLUMNS);
        assert_eq!(row.last().map(String::as_str), Some("I"));
    }

    #[test]
    fn quoted_key_takes_one_slot() {
        let cache = RowCache::new();
        let layout = Layout::parse(&["`AB`C"], &cache);

        assert_eq!(layout.slots_for("AB"), vec![0]);
        assert_eq!(layout.slots_for("C"), vec![1]);
        assert!(layout.slots_for("A").is_empty());
        assert_eq!(layout.processed_rows(), vec!["`AB`C".to_string()]);
    }

    #[test]
    fn quoted_tokens_count_toward_column_limit() {
        let row = parse_row("`xx`12345678ZZ");
        assert_eq!(row.len(), COLUMNS);
        assert_eq!(row[0], "`xx`");
        assert_eq!(row[8], "8");
    }

    #[test]
    fn unterminated_quote_consumes_rest_of_row() {
        let row = parse_row("A`BCD EF");
        assert_eq!(row, vec!["A".to_string(), "`BCD EF".to_string()]);
        assert_eq!(token_key(&row[1]), "BCD EF");
    }

    #[test]
    fn cache_reuses_parsed_rows() {
        let cache = RowCache::new();
        let first = cache.parse("AAAAAAAAA");
        let second = cache.parse("AAAAAAAAA");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }
}
