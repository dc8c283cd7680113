//! ASCII table rendering for `SELECT`.
//!
//! ```text
//! +----------+-----------+
//! | user_id* | user_name |
//! +----------+-----------+
//! | 1        | alice     |
//! +----------+-----------+
//! (1 rows)
//! ```
//!
//! Primary-key columns carry a `*` after their name. Blob cells show the
//! payload size rather than the payload.

use engine::types::{Row, Schema, Value};

pub fn render(schema: &Schema, rows: &[Row]) -> String {
    let headers: Vec<String> = schema
        .columns()
        .iter()
        .map(|c| {
            if c.is_primary {
                format!("{}*", c.name)
            } else {
                c.name.clone()
            }
        })
        .collect();

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            schema
                .columns()
                .iter()
                .map(|c| row.get(&c.name).map_or_else(String::new, cell))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            cells
                .iter()
                .map(|line| line[i].chars().count())
                .fold(h.chars().count(), usize::max)
        })
        .collect();

    let rule = {
        let mut s = String::from("+");
        for w in &widths {
            s.push_str(&"-".repeat(w + 2));
            s.push('+');
        }
        s
    };

    let mut out = Vec::with_capacity(cells.len() + 5);
    out.push(rule.clone());
    out.push(line(&headers, &widths));
    out.push(rule.clone());
    for row in &cells {
        out.push(line(row, &widths));
    }
    out.push(rule);
    out.push(format!("({} rows)", rows.len()));
    out.join("\n")
}

fn line(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::from("|");
    for (cell, width) in cells.iter().zip(widths) {
        s.push_str(&format!(" {cell:<width$} |"));
    }
    s
}

fn cell(value: &Value) -> String {
    match value {
        Value::Blob(bytes) => format!("-> {} bytes", bytes.len()),
        other => other.to_string(),
    }
}
