//! Prefix query parsing shared by every index backend.
//!
//! Terms and names are split the way RediSearch's default tokenizer splits
//! text: on whitespace and the punctuation in [`SEPARATORS`]. Any other
//! character, `_` included, stays inside its token. A product name matches when
//! each term token is a case-insensitive prefix of some token of the name.

use super::r#trait::IndexError;

/// A parsed, non-empty prefix query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixQuery {
    tokens: Vec<String>,
}

/// Punctuation RediSearch treats as a token boundary.
pub const SEPARATORS: &str = ",.<>{}[]\"':;!@#$%^&*()-+=~/\\?|`";

fn is_separator(c: char) -> bool {
    c.is_whitespace() || SEPARATORS.contains(c)
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(is_separator)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Backslash-escape characters that carry meaning in the query syntax.
fn escape_token(token: &str) -> String {
    let mut escaped = String::with_capacity(token.len());
    for c in token.chars() {
        if !(c.is_alphanumeric() || c == '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl PrefixQuery {
    pub fn parse(term: &str) -> Result<Self, IndexError> {
        let tokens: Vec<String> = tokenize(term).collect();
        if tokens.is_empty() {
            return Err(IndexError::Query(format!(
                "search term {term:?} has no searchable characters"
            )));
        }
        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn matches(&self, name: &str) -> bool {
        let name_tokens: Vec<String> = tokenize(name).collect();
        self.tokens
            .iter()
            .all(|t| name_tokens.iter().any(|n| n.starts_with(t.as_str())))
    }

    /// RediSearch query string restricted to `field`, e.g. `@name:(gre* app*)`.
    pub fn to_redisearch(&self, field: &str) -> String {
        let prefixes: Vec<String> = self
            .tokens
            .iter()
            .map(|t| format!("{}*", escape_token(t)))
            .collect();
        format!("@{field}:({})", prefixes.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_lowercases_and_splits_on_punctuation() {
        let query = PrefixQuery::parse("  Green-APP ").unwrap();
        assert_eq!(query.tokens(), ["green", "app"]);
    }

    #[test]
    fn parse_rejects_terms_without_tokens() {
        assert!(matches!(PrefixQuery::parse(""), Err(IndexError::Query(_))));
        assert!(matches!(PrefixQuery::parse(" *@ "), Err(IndexError::Query(_))));
    }

    #[test]
    fn matches_prefix_of_any_name_token() {
        let query = PrefixQuery::parse("ap").unwrap();
        assert!(query.matches("Apples"));
        assert!(query.matches("Green Apples"));
        assert!(!query.matches("Pineapple"));
        assert!(!query.matches("Bread"));
    }

    #[test]
    fn every_token_must_match() {
        let query = PrefixQuery::parse("gr ap").unwrap();
        assert!(query.matches("Green Apples"));
        assert!(!query.matches("Apples"));
    }

    #[test]
    fn underscore_stays_inside_a_token() {
        let query = PrefixQuery::parse("bu").unwrap();
        assert!(!query.matches("Peanut_Butter"));
        assert!(query.matches("Peanut Butter"));

        let query = PrefixQuery::parse("Peanut_b").unwrap();
        assert_eq!(query.tokens(), ["peanut_b"]);
        assert!(query.matches("Peanut_Butter"));
        assert_eq!(query.to_redisearch("name"), "@name:(peanut_b*)");
    }

    #[test]
    fn stopword_like_tokens_are_searchable() {
        let query = PrefixQuery::parse("th").unwrap();
        assert!(query.matches("The Bread"));
    }

    #[test]
    fn non_separator_symbols_are_escaped() {
        let query = PrefixQuery::parse("caf\u{e9}\u{2122}").unwrap();
        assert_eq!(query.to_redisearch("name"), "@name:(caf\u{e9}\\\u{2122}*)");
    }

    #[test]
    fn renders_redisearch_prefix_query() {
        let query = PrefixQuery::parse("Gre app").unwrap();
        assert_eq!(query.to_redisearch("name"), "@name:(gre* app*)");
    }
}
