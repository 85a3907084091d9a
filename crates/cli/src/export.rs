//! Writing run results: a delimited file, or an aligned table for the
//! terminal.
//!
//! Columns are `Session ID`, `Start date`, then one column per query in
//! query order. Values are written verbatim.

use convoquery_core::message::{Query, SessionResult};
use std::io::Write;
use std::path::Path;

pub const SESSION_COLUMN: &str = "Session ID";
pub const START_DATE_COLUMN: &str = "Start date";

fn header(queries: &[Query]) -> Vec<&str> {
    [SESSION_COLUMN, START_DATE_COLUMN]
        .into_iter()
        .chain(queries.iter().map(|q| q.name.as_str()))
        .collect()
}

fn row<'a>(result: &'a SessionResult, queries: &[Query]) -> Vec<&'a str> {
    [result.session_id.as_str(), result.start_date.as_str()]
        .into_iter()
        .chain(queries.iter().map(|q| result.answer(&q.name).unwrap_or("")))
        .collect()
}

pub fn write_results<W: Write>(
    out: W,
    results: &[SessionResult],
    queries: &[Query],
    delimiter: u8,
) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(out);

    wtr.write_record(header(queries))?;
    for result in results {
        wtr.write_record(row(result, queries))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_results_to(
    path: &Path,
    results: &[SessionResult],
    queries: &[Query],
    delimiter: u8,
) -> Result<(), csv::Error> {
    let file = std::fs::File::create(path)?;
    write_results(file, results, queries, delimiter)
}

/// Cells wider than this are cut in the terminal table.
const MAX_CELL_WIDTH: usize = 40;

fn fit(cell: &str) -> String {
    let flat: String = cell.chars().map(|c| if c == '\n' { ' ' } else { c }).collect();
    if flat.chars().count() <= MAX_CELL_WIDTH {
        flat
    } else {
        let cut: String = flat.chars().take(MAX_CELL_WIDTH - 3).collect();
        format!("{cut}...")
    }
}

/// Render results as a plain aligned table.
pub fn render_table(results: &[SessionResult], queries: &[Query]) -> String {
    let mut rows: Vec<Vec<String>> = vec![header(queries).into_iter().map(fit).collect()];
    rows.extend(
        results
            .iter()
            .map(|r| row(r, queries).into_iter().map(fit).collect()),
    );

    let columns = rows[0].len();
    let widths: Vec<usize> = (0..columns)
        .map(|c| rows.iter().map(|r| r[c].chars().count()).max().unwrap_or(0))
        .collect();

    let mut out = String::new();
    for (i, r) in rows.iter().enumerate() {
        let line: Vec<String> = r
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{cell:<w$}", w = *w))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
        if i == 0 {
            let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            out.push_str(&rule.join("  "));
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results() -> (Vec<SessionResult>, Vec<Query>) {
        let queries = vec![
            Query::new("Sentiment", "How does the user feel?"),
            Query::new("Topic", "What is discussed?"),
        ];
        let mut a = SessionResult::new("s1", "2024-01-01");
        a.set_answer("Topic", "Refund, late delivery");
        a.set_answer("Sentiment", "negative");
        let mut b = SessionResult::new("s2", "2024-01-02");
        b.set_answer("Sentiment", "positive");
        (vec![a, b], queries)
    }

    #[test]
    fn file_columns_follow_query_order() {
        let (results, queries) = results();
        let mut buf = Vec::new();
        write_results(&mut buf, &results, &queries, b',').unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Session ID,Start date,Sentiment,Topic");
        assert_eq!(lines[1], "s1,2024-01-01,negative,\"Refund, late delivery\"");
        assert_eq!(lines[2], "s2,2024-01-02,positive,");
    }

    #[test]
    fn writes_to_disk_with_delimiter() {
        let (results, queries) = results();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        write_results_to(&path, &results, &queries, b'\t').unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Session ID\tStart date\tSentiment\tTopic\n"));
    }

    #[test]
    fn table_is_aligned_and_cut() {
        let (mut results, queries) = results();
        results[1].set_answer("Topic", "x".repeat(100));
        let table = render_table(&results, &queries);
        let lines: Vec<_> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Session ID  Start date"));
        assert!(lines[1].starts_with("----------"));
        assert!(lines[3].ends_with("..."));
        assert!(lines[3].chars().count() < 100);
    }
}
