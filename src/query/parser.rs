//! Default query-string grammar.
//!
//! A query string is a whitespace-separated list of clauses:
//!
//! - `word` matches analyzed text in the default field
//! - `field:word` restricts the clause to one field
//! - `"quick fox"` is a phrase, `/ru.t/` a regular expression
//! - `word~2` allows edits (`~` alone means one), `word^3` boosts
//! - `field:>10`, `>=`, `<`, `<=` compare numbers; a quoted operand such as
//!   `field:>="2024-01-01"` compares dates
//! - a leading `+` makes a clause required and `-` excludes it
//! - `\` escapes the next character
//!
//! Clauses without a prefix are optional. The result is a boolean query
//! whose `must` is a conjunction, `should` a disjunction (at least one must
//! match when nothing is required) and `must_not` a disjunction. An empty
//! string matches nothing.

use super::expand::SyntaxParser;
use super::text::Fuzziness;
use super::{
    BooleanQuery, ConjunctionQuery, DateRangeQuery, DisjunctionQuery, MatchNoneQuery,
    MatchPhraseQuery, MatchQuery, NumericRangeQuery, Query, RegexpQuery,
};
use crate::error::GrammarParseError;

/// The bundled [`SyntaxParser`].
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryStringParser;

impl SyntaxParser for QueryStringParser {
    fn parse(&self, text: &str) -> Result<Query, GrammarParseError> {
        parse_query_string(text)
    }
}

/// Parse query-string text into a query tree.
pub fn parse_query_string(input: &str) -> Result<Query, GrammarParseError> {
    let mut parser = QueryParser::new(input);
    parser.parse()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occur {
    Must,
    Should,
    MustNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
}

struct QueryParser<'a> {
    input: &'a str,
    pos: usize,
    must: Vec<Query>,
    should: Vec<Query>,
    must_not: Vec<Query>,
}

impl<'a> QueryParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            must: Vec::new(),
            should: Vec::new(),
            must_not: Vec::new(),
        }
    }

    fn parse(&mut self) -> Result<Query, GrammarParseError> {
        loop {
            self.skip_whitespace();
            if self.is_eof() {
                break;
            }
            self.parse_clause()?;
        }
        Ok(self.build())
    }

    fn build(&mut self) -> Query {
        if self.must.is_empty() && self.should.is_empty() && self.must_not.is_empty() {
            return Query::from(MatchNoneQuery::default());
        }

        let must = std::mem::take(&mut self.must);
        let should = std::mem::take(&mut self.should);
        let must_not = std::mem::take(&mut self.must_not);
        let has_must = !must.is_empty();

        let boxed = |q: Query| Some(Box::new(q));
        Query::from(BooleanQuery {
            must: (!must.is_empty()).then(|| ConjunctionQuery::new(must).into()).and_then(boxed),
            should: (!should.is_empty())
                .then(|| {
                    let mut d = DisjunctionQuery::new(should);
                    if !has_must {
                        d.min = Some(1);
                    }
                    d.into()
                })
                .and_then(boxed),
            must_not: (!must_not.is_empty())
                .then(|| DisjunctionQuery::new(must_not).into())
                .and_then(boxed),
            boost: None,
        })
    }

    fn parse_clause(&mut self) -> Result<(), GrammarParseError> {
        let start = self.pos;
        let occur = if self.consume_char('+') {
            Occur::Must
        } else if self.consume_char('-') {
            Occur::MustNot
        } else {
            Occur::Should
        };

        if occur != Occur::Should && (self.is_eof() || self.at_whitespace()) {
            return Err(self.error(format!(
                "expected a clause after '{}' at offset {}",
                &self.input[start..self.pos],
                start
            )));
        }

        let mut query = self.parse_atom()?;
        if self.consume_char('^') {
            let boost = self.parse_boost()?;
            if let Some(q) = query.as_boostable_mut() {
                q.set_boost(boost);
            }
        }

        match occur {
            Occur::Must => self.must.push(query),
            Occur::Should => self.should.push(query),
            Occur::MustNot => self.must_not.push(query),
        }
        Ok(())
    }

    fn parse_atom(&mut self) -> Result<Query, GrammarParseError> {
        match self.peek_char() {
            Some('"') => Ok(MatchPhraseQuery::new(self.parse_quoted()?).into()),
            Some('/') => Ok(RegexpQuery::new(self.parse_regex()?).into()),
            _ => {
                let start = self.pos;
                let word = self.parse_word();
                if self.consume_char(':') {
                    if word.is_empty() {
                        return Err(self.error(format!("empty field name at offset {}", start)));
                    }
                    return self.parse_field(word);
                }
                if word.is_empty() {
                    return Err(self.error(format!(
                        "unexpected '{}' at offset {}",
                        self.peek_char().unwrap_or(' '),
                        self.pos
                    )));
                }
                self.parse_match(word)
            }
        }
    }

    fn parse_field(&mut self, field: String) -> Result<Query, GrammarParseError> {
        let value_start = self.pos;
        let mut query = match self.peek_char() {
            None => {
                return Err(self.error(format!(
                    "expected a value after '{}:' at offset {}",
                    field, value_start
                )));
            }
            Some(c) if c.is_whitespace() => {
                return Err(self.error(format!(
                    "expected a value after '{}:' at offset {}",
                    field, value_start
                )));
            }
            Some('"') => MatchPhraseQuery::new(self.parse_quoted()?).into(),
            Some('/') => RegexpQuery::new(self.parse_regex()?).into(),
            Some('>') | Some('<') => self.parse_comparison()?,
            Some(_) => {
                let word = self.parse_word();
                if word.is_empty() {
                    return Err(self.error(format!(
                        "expected a value after '{}:' at offset {}",
                        field, value_start
                    )));
                }
                self.parse_match(word)?
            }
        };

        if let Some(q) = query.as_fieldable_mut() {
            q.set_field(&field);
        }
        Ok(query)
    }

    fn parse_match(&mut self, word: String) -> Result<Query, GrammarParseError> {
        let mut query = MatchQuery::new(word);
        if self.consume_char('~') {
            query.fuzziness = Some(Fuzziness::Edits(self.parse_fuzziness()?));
        }
        Ok(query.into())
    }

    fn parse_comparison(&mut self) -> Result<Query, GrammarParseError> {
        let comparison = if self.consume_char('>') {
            if self.consume_char('=') { Comparison::Gte } else { Comparison::Gt }
        } else {
            self.consume_char('<');
            if self.consume_char('=') { Comparison::Lte } else { Comparison::Lt }
        };

        let inclusive = matches!(comparison, Comparison::Gte | Comparison::Lte);
        let lower = matches!(comparison, Comparison::Gt | Comparison::Gte);

        if self.peek_char() == Some('"') {
            let date = self.parse_quoted()?;
            let mut q = DateRangeQuery::default();
            if lower {
                q.start = Some(date);
                q.inclusive_start = Some(inclusive);
            } else {
                q.end = Some(date);
                q.inclusive_end = Some(inclusive);
            }
            return Ok(q.into());
        }

        let start = self.pos;
        let operand = self.parse_word();
        let number: f64 = operand.parse().map_err(|_| {
            self.error(format!(
                "expected a number or quoted date at offset {}, found '{}'",
                start, operand
            ))
        })?;

        let mut q = NumericRangeQuery::default();
        if lower {
            q.min = Some(number);
            q.inclusive_min = Some(inclusive);
        } else {
            q.max = Some(number);
            q.inclusive_max = Some(inclusive);
        }
        Ok(q.into())
    }

    /// Reads a `"..."` string, unescaping `\"` and `\\`.
    fn parse_quoted(&mut self) -> Result<String, GrammarParseError> {
        let start = self.pos;
        self.consume_char('"');
        let mut text = String::new();

        loop {
            match self.peek_char() {
                None => {
                    return Err(self.error(format!("unterminated phrase starting at offset {}", start)));
                }
                Some('"') => {
                    self.advance();
                    return Ok(text);
                }
                Some('\\') => {
                    self.advance();
                    if let Some(ch) = self.peek_char() {
                        text.push(ch);
                        self.advance();
                    }
                }
                Some(ch) => {
                    text.push(ch);
                    self.advance();
                }
            }
        }
    }

    /// Reads a `/.../` pattern. `\/` is an escaped slash; other escapes are
    /// kept for the regex engine.
    fn parse_regex(&mut self) -> Result<String, GrammarParseError> {
        let start = self.pos;
        self.consume_char('/');
        let mut pattern = String::new();

        loop {
            match self.peek_char() {
                None => {
                    return Err(self.error(format!(
                        "unterminated regexp starting at offset {}",
                        start
                    )));
                }
                Some('/') => {
                    self.advance();
                    return Ok(pattern);
                }
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        Some('/') => pattern.push('/'),
                        Some(ch) => {
                            pattern.push('\\');
                            pattern.push(ch);
                        }
                        None => pattern.push('\\'),
                    }
                    self.advance();
                }
                Some(ch) => {
                    pattern.push(ch);
                    self.advance();
                }
            }
        }
    }

    /// Reads a bare word up to whitespace or an unescaped operator.
    fn parse_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(ch) = self.peek_char() {
            match ch {
                '\\' => {
                    self.advance();
                    if let Some(escaped) = self.peek_char() {
                        word.push(escaped);
                        self.advance();
                    }
                }
                ':' | '^' | '~' | '"' => break,
                c if c.is_whitespace() => break,
                c => {
                    word.push(c);
                    self.advance();
                }
            }
        }
        word
    }

    fn parse_boost(&mut self) -> Result<f64, GrammarParseError> {
        let start = self.pos;
        let digits = self.take_number();
        match digits.parse::<f64>() {
            Ok(boost) if boost.is_finite() && boost >= 0.0 => Ok(boost),
            _ => Err(self.error(format!("invalid boost '{}' at offset {}", digits, start))),
        }
    }

    fn parse_fuzziness(&mut self) -> Result<i64, GrammarParseError> {
        let start = self.pos;
        let digits = self.take_number();
        if digits.is_empty() {
            return Ok(1);
        }
        digits
            .parse::<i64>()
            .map_err(|_| self.error(format!("invalid fuzziness '{}' at offset {}", digits, start)))
    }

    fn take_number(&mut self) -> String {
        let start = self.pos;
        while self
            .peek_char()
            .is_some_and(|c| c.is_ascii_digit() || c == '.')
        {
            self.advance();
        }
        self.input[start..self.pos].to_string()
    }

    fn error(&self, message: String) -> GrammarParseError {
        GrammarParseError::new(self.input, message)
    }

    fn skip_whitespace(&mut self) {
        while self.at_whitespace() {
            self.advance();
        }
    }

    fn at_whitespace(&self) -> bool {
        self.peek_char().is_some_and(char::is_whitespace)
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn consume_char(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek_char() {
            self.pos += ch.len_utf8();
        }
    }
}
