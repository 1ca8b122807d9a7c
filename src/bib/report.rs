use crate::bib::reconcile::CheckRow;
use crate::bib::util::truncate_chars;
use chrono::Local;

pub const REPORT_ALL: &str = "BibCheckResultAll.md";
pub const REPORT_NON_BOOKS: &str = "BibCheckResultNonBooks.md";

const HEADERS: [&str; 10] = [
    "Code", "Category", "Theme", "Type", "t", "B", "D", "P", "Title", "Link",
];

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

fn link_cell(row: &CheckRow) -> String {
    match &row.pdf_path {
        Some(path) => format!("[](<{}>)", path.display()),
        None => String::new(),
    }
}

fn cells(row: &CheckRow, title_max_chars: usize, with_link: bool) -> Vec<String> {
    let mut out = vec![
        row.code.clone(),
        row.category.clone(),
        row.theme.clone(),
        row.entry_type.clone(),
        if row.is_complete() { "t" } else { "" }.to_string(),
        row.bib_count.to_string(),
        row.pdf_count.to_string(),
        row.image_count.to_string(),
        truncate_chars(&row.title, title_max_chars),
    ];
    if with_link {
        out.push(link_cell(row));
    }
    out.into_iter().map(|c| escape_cell(&c)).collect()
}

/// Markdown table padded so it also reads well as plain text.
pub fn render_table<'a>(
    rows: impl IntoIterator<Item = &'a CheckRow>,
    title_max_chars: usize,
    with_link: bool,
) -> String {
    let headers: Vec<&str> = if with_link {
        HEADERS.to_vec()
    } else {
        HEADERS[..HEADERS.len() - 1].to_vec()
    };
    let body: Vec<Vec<String>> = rows
        .into_iter()
        .map(|r| cells(r, title_max_chars, with_link))
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count().max(3)).collect();
    for row in &body {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let pad = |text: &str, width: usize| {
        let len = text.chars().count();
        format!("{text}{}", " ".repeat(width.saturating_sub(len)))
    };

    let mut out = String::new();
    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| pad(h, *w))
        .collect();
    out.push_str(&format!("| {} |\n", header_line.join(" | ")));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("| {} |\n", rule.join(" | ")));
    for row in &body {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(c, w)| pad(c, *w))
            .collect();
        out.push_str(&format!("| {} |\n", line.join(" | ")));
    }
    out
}

pub fn render_report<'a>(
    heading: &str,
    rows: impl IntoIterator<Item = &'a CheckRow>,
    title_max_chars: usize,
) -> String {
    let stamp = Local::now().format("%Y-%m-%d %H:%M");
    format!(
        "# {heading}\n\nGenerated {stamp}\n\n{}",
        render_table(rows, title_max_chars, true)
    )
}
