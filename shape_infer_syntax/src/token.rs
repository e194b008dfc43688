//! Token definitions for the function-body lexer.

use logos::Logos;

/// Tokens of the supported Python-like subset.
///
/// `Newline` covers a run of line breaks together with the indentation of
/// the last one; the layout pass in [`crate::lexer`] turns it into
/// `Newline`/`Indent`/`Dedent`, which logos itself never produces.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\f]+")]
#[logos(skip r"\\\r?\n")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    // ==================== Keywords ====================
    #[token("def")]
    KwDef,
    #[token("return")]
    KwReturn,
    #[token("if")]
    KwIf,
    #[token("elif")]
    KwElif,
    #[token("else")]
    KwElse,
    #[token("for")]
    KwFor,
    #[token("in")]
    KwIn,
    #[token("while")]
    KwWhile,
    #[token("try")]
    KwTry,
    #[token("except")]
    KwExcept,
    #[token("finally")]
    KwFinally,
    #[token("raise")]
    KwRaise,
    #[token("assert")]
    KwAssert,
    #[token("del")]
    KwDel,
    #[token("import")]
    KwImport,
    #[token("from")]
    KwFrom,
    #[token("as")]
    KwAs,
    #[token("pass")]
    KwPass,
    #[token("break")]
    KwBreak,
    #[token("continue")]
    KwContinue,
    #[token("with")]
    KwWith,
    #[token("lambda")]
    KwLambda,
    #[token("class")]
    KwClass,
    #[token("global")]
    KwGlobal,
    #[token("nonlocal")]
    KwNonlocal,
    #[token("yield")]
    KwYield,
    #[token("and")]
    KwAnd,
    #[token("or")]
    KwOr,
    #[token("not")]
    KwNot,
    #[token("is")]
    KwIs,
    #[token("None")]
    KwNone,
    #[token("True")]
    KwTrue,
    #[token("False")]
    KwFalse,

    // ==================== Literals ====================
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,
    #[regex(r"[0-9][0-9_]*")]
    IntLiteral,
    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9]+)?")]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9]+)?")]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9]+")]
    FloatLiteral,
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    #[regex(r#"'([^'\\\n]|\\.)*'"#)]
    StringLiteral,
    #[token("\"\"\"", |lex| scan_triple_quoted(lex, b"\"\"\""))]
    #[token("'''", |lex| scan_triple_quoted(lex, b"'''"))]
    TripleStringLiteral,

    // ==================== Layout ====================
    #[regex(r"(\r?\n[ \t]*)+")]
    Newline,
    Indent,
    Dedent,

    // ==================== Delimiters ====================
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,
    #[token("...")]
    Ellipsis,
    #[token("->")]
    Arrow,

    // ==================== Operators ====================
    #[token("=")]
    Assign,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("//=")]
    FloorDivAssign,
    #[token("%=")]
    PercentAssign,
    #[token("**=")]
    PowAssign,
    #[token("@=")]
    AtAssign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("//")]
    FloorDiv,
    #[token("%")]
    Percent,
    #[token("**")]
    Pow,
    #[token("@")]
    At,
    #[token("~")]
    Tilde,
    #[token("&")]
    Ampersand,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("<<")]
    ShiftLeft,
    #[token(">>")]
    ShiftRight,
    #[token("==")]
    Eq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
}

/// Consumes a triple-quoted string body up to and including its delimiter.
fn scan_triple_quoted(lex: &mut logos::Lexer<Token>, delimiter: &[u8]) -> bool {
    let rest = lex.remainder().as_bytes();
    let mut pos = 0;
    while let Some(found) = memchr::memchr(delimiter[0], &rest[pos..]) {
        let at = pos + found;
        if rest[at..].starts_with(delimiter) {
            lex.bump(at + delimiter.len());
            return true;
        }
        pos = at + 1;
    }
    false
}

impl Token {
    /// Opening bracket that suppresses layout tokens until it is closed.
    pub fn opens_bracket(&self) -> bool {
        matches!(self, Token::LParen | Token::LBracket | Token::LBrace)
    }

    pub fn closes_bracket(&self) -> bool {
        matches!(self, Token::RParen | Token::RBracket | Token::RBrace)
    }

    /// Tokens that may begin an expression.
    pub fn starts_expression(&self) -> bool {
        matches!(
            self,
            Token::Identifier
                | Token::IntLiteral
                | Token::FloatLiteral
                | Token::StringLiteral
                | Token::TripleStringLiteral
                | Token::KwNone
                | Token::KwTrue
                | Token::KwFalse
                | Token::KwNot
                | Token::KwLambda
                | Token::LParen
                | Token::LBracket
                | Token::LBrace
                | Token::Minus
                | Token::Plus
                | Token::Tilde
                | Token::Ellipsis
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lex(source: &str) -> Vec<Token> {
        Token::lexer(source).map(|t| t.expect("lex error")).collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            lex("def forward is None"),
            vec![Token::KwDef, Token::Identifier, Token::KwIs, Token::KwNone]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            lex("1 1.5 .5 2e3 1_000"),
            vec![
                Token::IntLiteral,
                Token::FloatLiteral,
                Token::FloatLiteral,
                Token::FloatLiteral,
                Token::IntLiteral
            ]
        );
    }

    #[test]
    fn test_operators_longest_match() {
        assert_eq!(
            lex("a //= b ** c"),
            vec![
                Token::Identifier,
                Token::FloorDivAssign,
                Token::Identifier,
                Token::Pow,
                Token::Identifier
            ]
        );
    }

    #[test]
    fn test_comments_and_continuations_are_skipped() {
        assert_eq!(
            lex("x = 1 # note\\\n"),
            vec![Token::Identifier, Token::Assign, Token::IntLiteral, Token::Newline]
        );
        assert_eq!(
            lex("x = \\\n  1"),
            vec![Token::Identifier, Token::Assign, Token::IntLiteral]
        );
    }

    #[test]
    fn test_triple_quoted_string() {
        let mut lexer = Token::lexer("\"\"\"doc \" string\"\"\" x");
        assert_eq!(lexer.next(), Some(Ok(Token::TripleStringLiteral)));
        assert_eq!(lexer.slice(), "\"\"\"doc \" string\"\"\"");
        assert_eq!(lexer.next(), Some(Ok(Token::Identifier)));
    }
}
