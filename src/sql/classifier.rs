//! SQL Write Classification
//!
//! Decides, from a raw SQL string, whether executing it would mutate
//! database state. Classification is total: any input, including garbage,
//! yields an answer and never an error.
//!
//! The decision uses only the first significant token after stripping
//! leading comments (and CTE definitions for `WITH` statements). It is
//! token-based, never substring-based: a column named `delete_flag` must
//! not classify as a write. Full-grammar parsing is explicitly not a goal;
//! avoiding false positives on read statements is.

/// Keywords whose statement position marks a mutation.
const WRITE_KEYWORDS: [&str; 16] = [
    "INSERT", "UPDATE", "DELETE", "REPLACE", "CREATE", "DROP", "ALTER", "TRUNCATE", "VACUUM",
    "REINDEX", "ANALYZE", "ATTACH", "DETACH", "SAVEPOINT", "RELEASE", "ROLLBACK",
];

/// Classify a single SQL statement.
///
/// Empty and whitespace-only strings are reads, as is anything whose
/// leading keyword is not a write keyword.
pub fn is_write(sql: &str) -> bool {
    let rest = skip_leading_trivia(sql);
    let Some(token) = leading_word(rest) else {
        return false;
    };
    let upper = token.to_ascii_uppercase();
    if WRITE_KEYWORDS.contains(&upper.as_str()) {
        return true;
    }
    match upper.as_str() {
        // PRAGMA reads and writes share a keyword; only an assignment
        // mutates. `PRAGMA user_version = 1` writes, `PRAGMA
        // table_info(users)` reads.
        "PRAGMA" => pragma_has_assignment(&rest[token.len()..]),
        // The CTE prelude is not the statement; classify what follows it.
        "WITH" => is_write(strip_cte_prelude(&rest[token.len()..])),
        _ => false,
    }
}

/// Split a multi-statement script into individual statements.
///
/// Splits on `;` outside string literals and comments. Statements that are
/// empty after trimming are dropped.
pub fn split_statements(script: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut scanner = Scanner::new(script);
    while let Some((idx, ch)) = scanner.next_significant() {
        if ch == ';' {
            push_statement(&mut statements, &script[start..idx]);
            start = idx + 1;
        }
    }
    push_statement(&mut statements, &script[start..]);
    statements
}

fn push_statement<'a>(statements: &mut Vec<&'a str>, raw: &'a str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed);
    }
}

/// Skip leading whitespace, `--` line comments and non-nesting `/* */`
/// block comments. An unterminated block comment swallows the rest of the
/// input.
fn skip_leading_trivia(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("--") {
            rest = match after.find('\n') {
                Some(pos) => &after[pos + 1..],
                None => "",
            };
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = match after.find("*/") {
                Some(pos) => &after[pos + 2..],
                None => "",
            };
        } else {
            return rest;
        }
    }
}

/// The leading identifier-shaped token, if any.
fn leading_word(sql: &str) -> Option<&str> {
    let end = sql
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(sql.len());
    if end == 0 {
        None
    } else {
        Some(&sql[..end])
    }
}

/// Whether a keyword appears next (case-insensitively), returning the tail
/// after it.
fn take_keyword<'a>(sql: &'a str, keyword: &str) -> Option<&'a str> {
    let word = leading_word(sql)?;
    if word.eq_ignore_ascii_case(keyword) {
        Some(&sql[word.len()..])
    } else {
        None
    }
}

/// True when the PRAGMA tail contains a raw `=` outside parentheses,
/// string literals and comments.
fn pragma_has_assignment(tail: &str) -> bool {
    let mut depth = 0usize;
    let mut scanner = Scanner::new(tail);
    while let Some((_, ch)) = scanner.next_significant() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '=' if depth == 0 => return true,
            _ => {}
        }
    }
    false
}

/// Strip the `WITH` prelude: every `name [(cols)] AS (body)` definition and
/// the commas between them, leaving the statement the CTEs feed. Malformed
/// preludes return the unconsumed remainder, which then classifies on its
/// own leading keyword.
fn strip_cte_prelude(after_with: &str) -> &str {
    let mut rest = skip_leading_trivia(after_with);
    if let Some(after) = take_keyword(rest, "RECURSIVE") {
        rest = skip_leading_trivia(after);
    }

    loop {
        // CTE name
        let Some(name) = leading_word(rest) else {
            return rest;
        };
        rest = skip_leading_trivia(&rest[name.len()..]);

        // Optional column list
        if rest.starts_with('(') {
            rest = skip_leading_trivia(skip_paren_group(rest));
        }

        // AS, with optional materialization hint
        let Some(after_as) = take_keyword(rest, "AS") else {
            return rest;
        };
        rest = skip_leading_trivia(after_as);
        if let Some(after_not) = take_keyword(rest, "NOT") {
            rest = skip_leading_trivia(after_not);
        }
        if let Some(after_mat) = take_keyword(rest, "MATERIALIZED") {
            rest = skip_leading_trivia(after_mat);
        }

        // CTE body
        if !rest.starts_with('(') {
            return rest;
        }
        rest = skip_leading_trivia(skip_paren_group(rest));

        match rest.strip_prefix(',') {
            Some(after_comma) => rest = skip_leading_trivia(after_comma),
            None => return rest,
        }
    }
}

/// Skip a parenthesized group starting at `(`, respecting nested parens,
/// string literals and comments. An unterminated group consumes the rest.
fn skip_paren_group(sql: &str) -> &str {
    let mut depth = 0usize;
    let mut scanner = Scanner::new(sql);
    while let Some((idx, ch)) = scanner.next_significant() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return &sql[idx + 1..];
                }
            }
            _ => {}
        }
    }
    ""
}

/// Character scanner that yields only characters outside string literals
/// and comments.
struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Scanner<'a> {
    fn new(sql: &'a str) -> Self {
        Self {
            chars: sql.char_indices().peekable(),
        }
    }

    fn next_significant(&mut self) -> Option<(usize, char)> {
        while let Some((idx, ch)) = self.chars.next() {
            match ch {
                '\'' => self.consume_quoted('\''),
                '"' => self.consume_quoted('"'),
                '-' if matches!(self.chars.peek(), Some((_, '-'))) => {
                    self.consume_until(|c| c == '\n');
                }
                '/' if matches!(self.chars.peek(), Some((_, '*'))) => {
                    self.chars.next();
                    self.consume_block_comment();
                }
                _ => return Some((idx, ch)),
            }
        }
        None
    }

    fn consume_quoted(&mut self, quote: char) {
        // SQL escapes a quote by doubling it; a doubled quote closes and
        // immediately reopens, which this loop handles naturally.
        while let Some((_, ch)) = self.chars.next() {
            if ch == quote {
                if matches!(self.chars.peek(), Some((_, next)) if *next == quote) {
                    self.chars.next();
                } else {
                    return;
                }
            }
        }
    }

    fn consume_until(&mut self, stop: impl Fn(char) -> bool) {
        for (_, ch) in self.chars.by_ref() {
            if stop(ch) {
                return;
            }
        }
    }

    fn consume_block_comment(&mut self) {
        while let Some((_, ch)) = self.chars.next() {
            if ch == '*' && matches!(self.chars.peek(), Some((_, '/'))) {
                self.chars.next();
                return;
            }
        }
    }
}
