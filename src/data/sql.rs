//! SQL pretty-printing for the query overlays.
//!
//! The formatter is token based and never fails: text it does not
//! understand is passed through. Keywords are upper-cased, major clauses
//! start their own line with their body indented by two spaces, and
//! subqueries are indented one level deeper than the line that opened
//! them. String literals, quoted identifiers and comments are copied
//! verbatim.

const INDENT: &str = "  ";

/// Clause keywords that start a line and indent their body.
const CLAUSES: &[&str] = &[
    "SELECT",
    "FROM",
    "WHERE",
    "GROUP BY",
    "ORDER BY",
    "HAVING",
    "LIMIT",
    "SET",
    "VALUES",
    "INSERT INTO",
    "REPLACE INTO",
    "UPDATE",
    "DELETE FROM",
];

/// Keywords that break the line inside a clause body.
const LINE_BREAKERS: &[&str] = &[
    "AND",
    "OR",
    "JOIN",
    "LEFT JOIN",
    "RIGHT JOIN",
    "INNER JOIN",
    "CROSS JOIN",
    "NATURAL JOIN",
    "LEFT OUTER JOIN",
    "RIGHT OUTER JOIN",
    "STRAIGHT_JOIN",
];

/// Multi-word keywords, longest first.
const COMPOUNDS: &[&[&str]] = &[
    &["LEFT", "OUTER", "JOIN"],
    &["RIGHT", "OUTER", "JOIN"],
    &["GROUP", "BY"],
    &["ORDER", "BY"],
    &["INSERT", "INTO"],
    &["REPLACE", "INTO"],
    &["DELETE", "FROM"],
    &["UNION", "ALL"],
    &["LEFT", "JOIN"],
    &["RIGHT", "JOIN"],
    &["INNER", "JOIN"],
    &["CROSS", "JOIN"],
    &["NATURAL", "JOIN"],
];

const KEYWORDS: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CROSS", "DELETE", "DESC", "DISTINCT",
    "DIV", "DUPLICATE", "ELSE", "END", "EXISTS", "FALSE", "FOR", "FORCE", "FROM", "GROUP",
    "HAVING", "IGNORE", "IN", "INDEX", "INNER", "INSERT", "INTERVAL", "INTO", "IS", "JOIN", "KEY",
    "LEFT", "LIKE", "LIMIT", "LOCK", "MOD", "NATURAL", "NOT", "NULL", "OFFSET", "ON", "OR",
    "ORDER", "OUTER", "OVER", "PARTITION", "REGEXP", "REPLACE", "RIGHT", "ROLLUP", "SELECT", "SET",
    "SHARE", "SQL_CALC_FOUND_ROWS", "SQL_NO_CACHE", "STRAIGHT_JOIN", "THEN", "TRUE", "UNION",
    "UPDATE", "USE", "USING", "VALUES", "WHEN", "WHERE", "WITH", "XOR",
];

const OPERATOR_CHARS: &str = "<>=!:|&^~";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Word(&'a str),
    Quoted(&'a str),
    Number(&'a str),
    LineComment(&'a str),
    BlockComment(&'a str),
    Punct(&'a str),
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '@'
}

fn scan_while(sql: &str, start: usize, pred: impl Fn(char) -> bool) -> usize {
    sql[start..]
        .char_indices()
        .find(|&(_, c)| !pred(c))
        .map_or(sql.len(), |(i, _)| start + i)
}

/// End of a quoted run starting at `start`. Handles backslash escapes and
/// doubled quotes; an unterminated run extends to the end of input.
fn scan_quoted(sql: &str, start: usize, quote: char) -> usize {
    let mut chars = sql[start..].char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\\' && quote != '`' {
            chars.next();
        } else if c == quote {
            if chars.peek().map(|&(_, next)| next) == Some(quote) {
                chars.next();
            } else {
                return start + i + c.len_utf8();
            }
        }
    }
    sql.len()
}

fn tokenize(sql: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(c) = sql[pos..].chars().next() {
        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }

        let rest = &sql[pos..];
        let end = match c {
            '\'' | '"' | '`' => scan_quoted(sql, pos, c),
            '-' if rest.starts_with("--") => scan_while(sql, pos, |c| c != '\n'),
            '#' => scan_while(sql, pos, |c| c != '\n'),
            '/' if rest.starts_with("/*") => {
                rest[2..].find("*/").map_or(sql.len(), |i| pos + 2 + i + 2)
            }
            c if c.is_ascii_digit() => scan_while(sql, pos, |c| c.is_alphanumeric() || c == '.'),
            c if is_word_char(c) => scan_while(sql, pos, is_word_char),
            c if OPERATOR_CHARS.contains(c) => {
                scan_while(sql, pos, |c| OPERATOR_CHARS.contains(c))
            }
            c => pos + c.len_utf8(),
        };

        let text = &sql[pos..end];
        let token = match c {
            '\'' | '"' | '`' => Token::Quoted(text),
            '#' => Token::LineComment(text),
            '-' if text.starts_with("--") => Token::LineComment(text),
            '/' if text.starts_with("/*") => Token::BlockComment(text),
            c if c.is_ascii_digit() => Token::Number(text),
            c if is_word_char(c) => Token::Word(text),
            _ => Token::Punct(text),
        };
        tokens.push(token);
        pos = end;
    }

    tokens
}

/// Kind of the last thing written, used for spacing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prev {
    LineStart,
    Open,
    Dot,
    Comma,
    /// An identifier; a `(` right after it is a function call.
    Name,
    Keyword,
    Value,
    Operator,
}

#[derive(Debug, Clone, Copy)]
struct Paren {
    block: bool,
    saved_base: usize,
    saved_in_clause: bool,
}

struct Formatter {
    out: String,
    base: usize,
    in_clause: bool,
    parens: Vec<Paren>,
    prev: Prev,
    last_keyword: String,
    between_pending: bool,
    glue: bool,
}

impl Formatter {
    fn new() -> Self {
        Self {
            out: String::new(),
            base: 0,
            in_clause: false,
            parens: Vec::new(),
            prev: Prev::LineStart,
            last_keyword: String::new(),
            between_pending: false,
            glue: false,
        }
    }

    fn content_level(&self) -> usize {
        self.base + usize::from(self.in_clause)
    }

    fn inside_inline_paren(&self) -> bool {
        self.parens.last().is_some_and(|p| !p.block)
    }

    /// Start a new line at `level`. Repeated calls replace the indentation
    /// of an empty line instead of stacking blank lines.
    fn newline(&mut self, level: usize) {
        if self.prev == Prev::LineStart {
            let line_start = self.out.rfind('\n').map_or(0, |i| i + 1);
            self.out.truncate(line_start);
        } else {
            let trimmed = self.out.trim_end_matches(' ').len();
            self.out.truncate(trimmed);
            if !self.out.is_empty() {
                self.out.push('\n');
            }
        }
        for _ in 0..level {
            self.out.push_str(INDENT);
        }
        self.prev = Prev::LineStart;
    }

    fn write(&mut self, text: &str, kind: Prev) {
        let space = !self.glue
            && !matches!(self.prev, Prev::LineStart | Prev::Open | Prev::Dot)
            && !matches!(text, "," | ")" | "." | ";")
            && !(text == "(" && self.prev == Prev::Name);
        if space {
            self.out.push(' ');
        }
        self.out.push_str(text);
        self.prev = kind;
        self.glue = false;
    }

    fn keyword(&mut self, keyword: &str) {
        if CLAUSES.contains(&keyword) && !(keyword == "UPDATE" && self.last_keyword == "FOR") {
            self.newline(self.base);
            self.write(keyword, Prev::Keyword);
            self.in_clause = true;
            self.newline(self.base + 1);
        } else if keyword == "UNION" || keyword == "UNION ALL" {
            self.newline(self.base);
            self.write(keyword, Prev::Keyword);
            self.in_clause = false;
        } else if keyword == "AND" && self.between_pending {
            self.between_pending = false;
            self.write(keyword, Prev::Keyword);
        } else if LINE_BREAKERS.contains(&keyword) && !self.inside_inline_paren() {
            self.newline(self.content_level());
            self.write(keyword, Prev::Keyword);
        } else {
            if keyword == "BETWEEN" {
                self.between_pending = true;
            }
            self.write(keyword, Prev::Keyword);
        }
        self.last_keyword = keyword.to_string();
    }

    fn open_paren(&mut self, block: bool) {
        self.write("(", Prev::Open);
        let level = self.content_level();
        self.parens.push(Paren {
            block,
            saved_base: self.base,
            saved_in_clause: self.in_clause,
        });
        if block {
            self.base = level + 1;
            self.in_clause = false;
            self.newline(self.base);
        }
    }

    fn close_paren(&mut self) {
        if let Some(paren) = self.parens.pop() {
            if paren.block {
                self.base = paren.saved_base;
                self.in_clause = paren.saved_in_clause;
                self.newline(self.content_level());
            }
        }
        self.write(")", Prev::Value);
    }

    fn punct(&mut self, text: &str, next_is_subquery: bool) {
        match text {
            "(" => self.open_paren(next_is_subquery),
            ")" => self.close_paren(),
            "," => {
                self.write(",", Prev::Comma);
                if !self.inside_inline_paren() {
                    self.newline(self.content_level());
                }
            }
            ";" => {
                self.write(";", Prev::Value);
                self.base = 0;
                self.in_clause = false;
                self.parens.clear();
                self.newline(0);
            }
            "." => self.write(".", Prev::Dot),
            "-" | "+"
                if matches!(
                    self.prev,
                    Prev::LineStart | Prev::Open | Prev::Comma | Prev::Operator | Prev::Keyword
                ) =>
            {
                self.write(text, Prev::Operator);
                self.glue = true;
            }
            _ => self.write(text, Prev::Operator),
        }
    }

    fn finish(mut self) -> String {
        let trimmed = self.out.trim_end().len();
        self.out.truncate(trimmed);
        self.out
    }
}

/// Match a multi-word keyword at `tokens[i]`. Returns the keyword and the
/// number of tokens it spans.
fn compound_at(tokens: &[Token<'_>], i: usize) -> Option<(String, usize)> {
    COMPOUNDS.iter().find_map(|words| {
        let matched = words.iter().enumerate().all(|(offset, word)| {
            matches!(tokens.get(i + offset), Some(Token::Word(w)) if w.eq_ignore_ascii_case(word))
        });
        matched.then(|| (words.join(" "), words.len()))
    })
}

fn next_is_subquery(tokens: &[Token<'_>], i: usize) -> bool {
    tokens[i + 1..]
        .iter()
        .find(|t| !matches!(t, Token::LineComment(_) | Token::BlockComment(_)))
        .is_some_and(|t| {
            matches!(t, Token::Word(w) if w.eq_ignore_ascii_case("SELECT") || w.eq_ignore_ascii_case("WITH"))
        })
}

/// Pretty-print a SQL statement.
///
/// ```
/// use slowquery_console::data::format_sql;
///
/// let sql = format_sql("select id, name from users where id = 1");
/// assert_eq!(sql, "SELECT\n  id,\n  name\nFROM\n  users\nWHERE\n  id = 1");
/// ```
pub fn format_sql(sql: &str) -> String {
    let tokens = tokenize(sql);
    let mut f = Formatter::new();
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            Token::Word(word) => {
                if let Some((keyword, span)) = compound_at(&tokens, i) {
                    f.keyword(&keyword);
                    i += span;
                    continue;
                }
                let upper = word.to_ascii_uppercase();
                if KEYWORDS.contains(&upper.as_str()) {
                    f.keyword(&upper);
                } else {
                    f.write(word, Prev::Name);
                }
            }
            Token::Quoted(text) if text.starts_with('`') => f.write(text, Prev::Name),
            Token::Quoted(text) | Token::Number(text) => f.write(text, Prev::Value),
            Token::BlockComment(text) => f.write(text, Prev::Value),
            Token::LineComment(text) => {
                f.write(text, Prev::Value);
                let level = f.content_level();
                f.newline(level);
            }
            Token::Punct(text) => f.punct(text, next_is_subquery(&tokens, i)),
        }
        i += 1;
    }

    f.finish()
}

/// Collapse a statement onto one line for table cells.
pub fn one_line(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clauses_on_their_own_lines() {
        let sql = "select a, b from t where x = 1 and y = 'q' order by a desc limit 10";
        assert_eq!(
            format_sql(sql),
            "SELECT\n  a,\n  b\nFROM\n  t\nWHERE\n  x = 1\n  AND y = 'q'\nORDER BY\n  a DESC\nLIMIT\n  10"
        );
    }

    #[test]
    fn test_strings_and_quoted_identifiers_are_verbatim() {
        let sql = "select `from`, 'select where' from `order` where note = \"it''s\"";
        let formatted = format_sql(sql);
        assert!(formatted.contains("`from`"));
        assert!(formatted.contains("'select where'"));
        assert!(formatted.contains("`order`"));
        assert!(formatted.contains("\"it''s\""));
    }

    #[test]
    fn test_subquery_is_indented() {
        let sql = "select id from t where id in (select id from u)";
        assert_eq!(
            format_sql(sql),
            "SELECT\n  id\nFROM\n  t\nWHERE\n  id IN (\n    SELECT\n      id\n    FROM\n      u\n  )"
        );
    }

    #[test]
    fn test_function_calls_and_lists_stay_inline() {
        let sql = "SELECT count(*), max(o.total) FROM orders o WHERE o.id IN (1, 2, 3) AND o.total > -5";
        assert_eq!(
            format_sql(sql),
            "SELECT\n  count(*),\n  max(o.total)\nFROM\n  orders o\nWHERE\n  o.id IN (1, 2, 3)\n  AND o.total > -5"
        );
    }

    #[test]
    fn test_joins_break_inside_from() {
        let sql = "select * from a left join b on a.id = b.a_id inner join c on c.id = b.c_id";
        assert_eq!(
            format_sql(sql),
            "SELECT\n  *\nFROM\n  a\n  LEFT JOIN b ON a.id = b.a_id\n  INNER JOIN c ON c.id = b.c_id"
        );
    }

    #[test]
    fn test_between_keeps_its_and() {
        let sql = "select a from t where d between 1 and 5 and e = 2";
        assert_eq!(
            format_sql(sql),
            "SELECT\n  a\nFROM\n  t\nWHERE\n  d BETWEEN 1 AND 5\n  AND e = 2"
        );
    }

    #[test]
    fn test_comments_are_preserved() {
        let sql = "select a -- the id\nfrom t /* main */ where a >= 1";
        assert_eq!(
            format_sql(sql),
            "SELECT\n  a -- the id\nFROM\n  t /* main */\nWHERE\n  a >= 1"
        );
    }

    #[test]
    fn test_for_update_is_not_a_clause() {
        let sql = "select a from t where id = 1 for update";
        assert!(format_sql(sql).ends_with("id = 1 FOR UPDATE"));
    }

    #[test]
    fn test_empty_and_one_line() {
        assert_eq!(format_sql("   "), "");
        assert_eq!(one_line("select\n  a\n\tfrom t"), "select a from t");
    }
}
