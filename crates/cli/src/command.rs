//! Shell command parsing.
//!
//! A line is split into whitespace-separated words. Double quotes group a
//! value containing spaces (`user_name="Jo Smith"`); inside quotes `\"` and
//! `\\` escape. An unquoted `NULL` (any case) is the null value, a quoted
//! one is the text `NULL`.
//!
//! ```text
//! SELECT  table [WHERE col=value ...]
//! INSERT  table [col=value ...]
//! UPDATE  table col=value ... [WHERE col=value ...]
//! DELETE  table [WHERE col=value ...]
//! TRUNCATE table
//! SCHEMA  table
//! EXIT | QUIT
//! ```
//!
//! Several `WHERE` conditions are ANDed together.

use anyhow::{bail, Result};
use engine::types::{Row, Value};
use engine::Predicate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Select {
        table: String,
        filter: Option<Predicate>,
    },
    Insert {
        table: String,
        values: Row,
    },
    Update {
        table: String,
        changes: Row,
        filter: Option<Predicate>,
    },
    Delete {
        table: String,
        filter: Option<Predicate>,
    },
    Truncate {
        table: String,
    },
    Schema {
        table: String,
    },
    Exit,
}

/// One shell word. `quoted` is set when any part of it was inside quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Word {
    text: String,
    quoted: bool,
}

impl Word {
    fn is_keyword(&self, keyword: &str) -> bool {
        !self.quoted && self.text.eq_ignore_ascii_case(keyword)
    }
}

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>> {
    let words = split_words(line)?;
    let Some((head, rest)) = words.split_first() else {
        return Ok(None);
    };

    let cmd = match head.text.to_ascii_uppercase().as_str() {
        "SELECT" => {
            let (table, rest) = table_arg(rest, "SELECT table [WHERE col=value ...]")?;
            Command::Select {
                table,
                filter: where_clause(rest)?,
            }
        }
        "INSERT" => {
            let (table, rest) = table_arg(rest, "INSERT table [col=value ...]")?;
            Command::Insert {
                table,
                values: assignments(rest)?,
            }
        }
        "UPDATE" => {
            let usage = "UPDATE table col=value ... [WHERE col=value ...]";
            let (table, rest) = table_arg(rest, usage)?;
            let split = rest.iter().position(|w| w.is_keyword("WHERE")).unwrap_or(rest.len());
            let (sets, conds) = rest.split_at(split);
            if sets.is_empty() {
                bail!("usage: {usage}");
            }
            Command::Update {
                table,
                changes: assignments(sets)?,
                filter: where_clause(conds)?,
            }
        }
        "DELETE" => {
            let (table, rest) = table_arg(rest, "DELETE table [WHERE col=value ...]")?;
            Command::Delete {
                table,
                filter: where_clause(rest)?,
            }
        }
        "TRUNCATE" => Command::Truncate {
            table: only_table(rest, "TRUNCATE table")?,
        },
        "SCHEMA" => Command::Schema {
            table: only_table(rest, "SCHEMA table")?,
        },
        "EXIT" | "QUIT" => Command::Exit,
        other => bail!("unknown command: {other}"),
    };
    Ok(Some(cmd))
}

fn table_arg<'a>(words: &'a [Word], usage: &str) -> Result<(String, &'a [Word])> {
    match words.split_first() {
        Some((table, rest)) if !table.quoted => Ok((table.text.clone(), rest)),
        _ => bail!("usage: {usage}"),
    }
}

fn only_table(words: &[Word], usage: &str) -> Result<String> {
    let (table, rest) = table_arg(words, usage)?;
    if !rest.is_empty() {
        bail!("usage: {usage}");
    }
    Ok(table)
}

/// `[WHERE col=value ...]` into an AND of equalities.
fn where_clause(words: &[Word]) -> Result<Option<Predicate>> {
    let Some((head, conds)) = words.split_first() else {
        return Ok(None);
    };
    if !head.is_keyword("WHERE") {
        bail!("expected WHERE, found {:?}", head.text);
    }
    if conds.is_empty() {
        bail!("WHERE needs at least one col=value condition");
    }
    let preds = conds
        .iter()
        .map(|w| assignment(w).map(|(column, value)| Predicate::equal(column, value)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Predicate::all(preds))
}

fn assignments(words: &[Word]) -> Result<Row> {
    let mut row = Row::new();
    for word in words {
        let (column, value) = assignment(word)?;
        if row.insert(column.clone(), value).is_some() {
            bail!("column {column:?} given twice");
        }
    }
    Ok(row)
}

fn assignment(word: &Word) -> Result<(String, Value)> {
    let Some((column, value)) = word.text.split_once('=') else {
        bail!("expected col=value, found {:?}", word.text);
    };
    if column.is_empty() {
        bail!("missing column name in {:?}", word.text);
    }
    let value = if !word.quoted && value.eq_ignore_ascii_case("NULL") {
        Value::Null
    } else {
        Value::Text(value.to_string())
    };
    Ok((column.to_string(), value))
}

fn split_words(line: &str) -> Result<Vec<Word>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut started = false;
    let mut quoted = false;
    let mut in_quotes = false;

    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
                started = true;
            }
            '\\' if in_quotes => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => bail!("unterminated quote"),
            },
            c if c.is_whitespace() && !in_quotes => {
                if started {
                    words.push(Word {
                        text: std::mem::take(&mut current),
                        quoted,
                    });
                    started = false;
                    quoted = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }

    if in_quotes {
        bail!("unterminated quote");
    }
    if started {
        words.push(Word { text: current, quoted });
    }
    Ok(words)
}
