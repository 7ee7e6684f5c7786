//! tokenizer.rs - Splits a Substractor pattern into literal, wildcard and macro tokens.
//!
//! The tokenizer walks the pattern once. `*` and `?` are always wildcards.
//! When macro discovery is enabled, `{name}` becomes a macro token as long as
//! `name` is non-empty and holds no whitespace or nested `{`; any other brace
//! is kept as literal text.
//!
//! License: MIT OR APACHE 2.0

/// A single lexical unit of a Substractor pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A run of literal characters, matched verbatim.
    Literal(String),
    /// `?`: exactly one character.
    AnyOne,
    /// `*`: zero or more characters.
    AnyMany,
    /// `{name}`: a named capture.
    Macro(String),
}

/// Whether `{name}` tokens are recognised or treated as literal braces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenMode {
    /// Wildcards only; braces are literal.
    Wildcards,
    /// Wildcards plus `{name}` macro tokens.
    Macros,
}

/// Tokenizes `pattern`. Adjacent literal characters are merged into one token.
pub fn tokenize(pattern: &str, mode: TokenMode) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut rest = pattern;

    while let Some(c) = rest.chars().next() {
        match c {
            '*' => {
                flush_literal(&mut literal, &mut tokens);
                tokens.push(Token::AnyMany);
            }
            '?' => {
                flush_literal(&mut literal, &mut tokens);
                tokens.push(Token::AnyOne);
            }
            '{' if mode == TokenMode::Macros => {
                if let Some(name) = macro_name(&rest[1..]) {
                    flush_literal(&mut literal, &mut tokens);
                    tokens.push(Token::Macro(name.to_string()));
                    rest = &rest[name.len() + 2..];
                    continue;
                }
                literal.push(c);
            }
            _ => literal.push(c),
        }
        rest = &rest[c.len_utf8()..];
    }

    flush_literal(&mut literal, &mut tokens);
    tokens
}

/// Returns the macro names of `pattern` in left-to-right order, duplicates included.
pub fn macro_names(pattern: &str) -> Vec<String> {
    tokenize(pattern, TokenMode::Macros)
        .into_iter()
        .filter_map(|token| match token {
            Token::Macro(name) => Some(name),
            _ => None,
        })
        .collect()
}

fn macro_name(after_brace: &str) -> Option<&str> {
    let end = after_brace.find('}')?;
    let name = &after_brace[..end];
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '{') {
        return None;
    }
    Some(name)
}

fn flush_literal(literal: &mut String, tokens: &mut Vec<Token>) {
    if !literal.is_empty() {
        tokens.push(Token::Literal(std::mem::take(literal)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Token {
        Token::Literal(s.to_string())
    }

    #[test]
    fn test_wildcards_and_literals() {
        let tokens = tokenize("*.*.??", TokenMode::Wildcards);
        assert_eq!(
            tokens,
            vec![
                Token::AnyMany,
                lit("."),
                Token::AnyMany,
                lit("."),
                Token::AnyOne,
                Token::AnyOne,
            ]
        );
    }

    #[test]
    fn test_braces_are_literal_without_macro_mode() {
        let tokens = tokenize("{a}:*", TokenMode::Wildcards);
        assert_eq!(tokens, vec![lit("{a}:"), Token::AnyMany]);
    }

    #[test]
    fn test_macros_are_recognised() {
        let tokens = tokenize("{a}:{b}", TokenMode::Macros);
        assert_eq!(
            tokens,
            vec![Token::Macro("a".into()), lit(":"), Token::Macro("b".into())]
        );
    }

    #[test]
    fn test_unbalanced_brace_is_literal() {
        assert_eq!(tokenize("x{a", TokenMode::Macros), vec![lit("x{a")]);
        assert_eq!(tokenize("a}b", TokenMode::Macros), vec![lit("a}b")]);
        assert_eq!(tokenize("{}", TokenMode::Macros), vec![lit("{}")]);
        assert_eq!(tokenize("{a b}", TokenMode::Macros), vec![lit("{a b}")]);
    }

    #[test]
    fn test_nested_open_brace_keeps_outer_literal() {
        let tokens = tokenize("{x{y}", TokenMode::Macros);
        assert_eq!(tokens, vec![lit("{x"), Token::Macro("y".into())]);
    }

    #[test]
    fn test_multibyte_literals() {
        let tokens = tokenize("é{ñ}ü", TokenMode::Macros);
        assert_eq!(tokens, vec![lit("é"), Token::Macro("ñ".into()), lit("ü")]);
    }

    #[test]
    fn test_macro_names_keep_order_and_duplicates() {
        assert_eq!(macro_names("{b}-{a}-{b}"), vec!["b", "a", "b"]);
        assert!(macro_names("no macros here").is_empty());
    }
}
