//! Statement splitting for procedure bodies.
//!
//! Procedure source arrives as a whole `CREATE PROCEDURE` definition, often
//! with T-SQL control flow and without statement terminators. These helpers
//! work on sqlparser tokens so that string literals and comments never split
//! a statement.

use sqlparser::tokenizer::{Token, Word};

/// Control-flow words that carry no table references.
const BLOCK_WORDS: &[&str] = &["BEGIN", "END", "ELSE"];

/// Words completing a block word: `BEGIN TRY`, `END CATCH`, `BEGIN TRAN`.
const BLOCK_SUFFIXES: &[&str] = &["TRY", "CATCH", "TRAN", "TRANSACTION"];

/// Words opening a new statement in bodies written without `;`.
const STATEMENT_WORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "MERGE", "TRUNCATE", "CREATE", "ALTER", "DROP", "DECLARE",
    "SET", "EXEC", "EXECUTE", "PRINT", "RETURN", "IF", "WHILE", "COMMIT", "ROLLBACK",
];

fn keyword(token: &Token) -> Option<&str> {
    match token {
        Token::Word(Word {
            value,
            quote_style: None,
            ..
        }) => Some(value),
        _ => None,
    }
}

fn is_keyword(token: &Token, expected: &str) -> bool {
    keyword(token).is_some_and(|word| word.eq_ignore_ascii_case(expected))
}

fn is_trivia(token: &Token) -> bool {
    matches!(token, Token::Whitespace(_))
}

pub(crate) fn is_blank(tokens: &[Token]) -> bool {
    tokens.iter().all(is_trivia)
}

/// Drop a leading `CREATE [OR ALTER] | ALTER PROC[EDURE] name [params] AS`
/// header. Tokens without such a header are returned unchanged.
pub(crate) fn strip_procedure_header(tokens: &[Token]) -> &[Token] {
    let significant: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, token)| !is_trivia(token))
        .map(|(i, _)| i)
        .collect();
    let word_at = |n: usize, expected: &str| {
        significant
            .get(n)
            .is_some_and(|&i| is_keyword(&tokens[i], expected))
    };

    let kind_at = if word_at(0, "ALTER") {
        1
    } else if word_at(0, "CREATE") && word_at(1, "OR") && word_at(2, "ALTER") {
        3
    } else if word_at(0, "CREATE") {
        1
    } else {
        return tokens;
    };
    if !word_at(kind_at, "PROC") && !word_at(kind_at, "PROCEDURE") {
        return tokens;
    }

    let mut depth = 0usize;
    for &i in &significant[kind_at + 1..] {
        match &tokens[i] {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            token if depth == 0 && is_keyword(token, "AS") => return &tokens[i + 1..],
            _ => {}
        }
    }
    tokens
}

/// Split on `;`, skipping empty statements.
pub(crate) fn split_on_semicolons(tokens: &[Token]) -> impl Iterator<Item = &[Token]> {
    tokens
        .split(|token| matches!(token, Token::SemiColon))
        .map(trim_block_words)
        .filter(|chunk| !is_blank(chunk))
}

/// Drop leading `BEGIN`, `END`, `ELSE` and their `TRY`/`CATCH`/`TRAN` suffixes.
pub(crate) fn trim_block_words(tokens: &[Token]) -> &[Token] {
    let mut after_block = false;
    for (i, token) in tokens.iter().enumerate() {
        if is_trivia(token) {
            continue;
        }
        if is_block_word(token, after_block) {
            after_block = true;
            continue;
        }
        return &tokens[i..];
    }
    &[]
}

fn is_block_word(token: &Token, after_block: bool) -> bool {
    let Some(word) = keyword(token) else {
        return false;
    };
    let listed = |words: &[&str]| words.iter().any(|w| word.eq_ignore_ascii_case(w));
    listed(BLOCK_WORDS) || (after_block && listed(BLOCK_SUFFIXES))
}

/// Whether `word` starts a new statement inside a piece led by `leader`.
fn starts_statement(leader: &str, word: &str, update_set_seen: bool) -> bool {
    match (leader, word) {
        // MERGE actions and CTE bodies carry their own INSERT/UPDATE/DELETE.
        ("WITH" | "MERGE", _) => false,
        ("UPDATE", "SET") => update_set_seen,
        ("INSERT", "EXEC" | "EXECUTE") => false,
        ("DROP" | "CREATE" | "ALTER", "IF") => false,
        (leader, "SELECT" | "WITH") => {
            !matches!(leader, "INSERT" | "CREATE" | "ALTER" | "SELECT")
        }
        (_, word) => STATEMENT_WORDS.contains(&word),
    }
}

fn push_piece<'t>(pieces: &mut Vec<&'t [Token]>, piece: &'t [Token]) {
    if !is_blank(piece) {
        pieces.push(piece);
    }
}

/// Split a statement run that lacks `;` terminators at the words that open
/// a new statement. Block words are dropped; nothing inside parentheses or a
/// `CASE` expression splits.
pub(crate) fn split_on_statement_words(tokens: &[Token]) -> Vec<&[Token]> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut leader: Option<String> = None;
    let mut depth = 0usize;
    let mut case_depth = 0usize;
    let mut update_set_seen = false;
    let mut after_block = false;

    for (i, token) in tokens.iter().enumerate() {
        if is_trivia(token) {
            continue;
        }
        let word = match token {
            Token::LParen => {
                depth += 1;
                None
            }
            Token::RParen => {
                depth = depth.saturating_sub(1);
                None
            }
            _ if depth > 0 => None,
            _ => keyword(token).map(str::to_ascii_uppercase),
        };
        let Some(word) = word else {
            after_block = false;
            if leader.is_none() {
                leader = Some(String::new());
            }
            continue;
        };

        if word == "CASE" {
            case_depth += 1;
        } else if word == "END" && case_depth > 0 {
            case_depth -= 1;
        } else if case_depth == 0 && is_block_word(token, after_block) {
            push_piece(&mut pieces, &tokens[start..i]);
            start = i + 1;
            leader = None;
            update_set_seen = false;
            after_block = true;
            continue;
        }
        after_block = false;

        let splits = case_depth == 0
            && leader
                .as_deref()
                .is_some_and(|current| starts_statement(current, &word, update_set_seen));
        if splits {
            push_piece(&mut pieces, &tokens[start..i]);
            start = i;
            leader = Some(word);
            update_set_seen = false;
            continue;
        }
        if leader.is_none() {
            leader = Some(word.clone());
        }
        if leader.as_deref() == Some("UPDATE") && word == "SET" {
            update_set_seen = true;
        }
    }
    push_piece(&mut pieces, &tokens[start..]);
    pieces
}
