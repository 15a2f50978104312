use serde::Serialize;

/// Cells longer than this are cut with an ellipsis. Failure messages from
/// the separation report can run to a full stderr line; the table stays
/// readable and the complete text is still on the ticket and in `--json`.
const MAX_CELL_WIDTH: usize = 60;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    print!("{}", format_table(headers, rows));
}

/// Render an aligned table. Columns whose every cell is numeric (ticket
/// ids, counts) are right-aligned; everything else is left-aligned.
fn format_table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let rows: Vec<Vec<String>> = rows
        .into_iter()
        .map(|row| row.into_iter().map(|cell| truncate(&cell)).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let numeric: Vec<bool> = (0..headers.len())
        .map(|i| {
            let mut cells = rows.iter().filter_map(|row| row.get(i));
            !rows.is_empty() && cells.all(|c| c.parse::<i64>().is_ok() || c == "-")
        })
        .collect();

    let mut out = String::new();
    let push_row = |cells: Vec<String>, out: &mut String| {
        let line: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                if numeric.get(i).copied().unwrap_or(false) {
                    format!("{cell:>w$}")
                } else {
                    format!("{cell:<w$}")
                }
            })
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    };

    push_row(headers.iter().map(|h| h.to_string()).collect(), &mut out);
    push_row(widths.iter().map(|&w| "-".repeat(w)).collect(), &mut out);
    for row in rows {
        push_row(row, &mut out);
    }
    out
}

fn truncate(cell: &str) -> String {
    if cell.chars().count() <= MAX_CELL_WIDTH {
        return cell.to_string();
    }
    let cut: String = cell.chars().take(MAX_CELL_WIDTH - 3).collect();
    format!("{cut}...")
}
