use std::fmt::Write;

use crate::error::SCHEMA_ERROR_MESSAGE;
use crate::models::Summaries;

pub const OVERALL_HEADING: &str = "Total Attendance Percentage";
pub const RATIO_HEADING: &str = "Operation to Training Ratio";
pub const FORM_BUTTON_LABEL: &str = "Fill out the Attendance Form";

/// Markdown report. `None` means the roster did not have the required
/// columns; only the error message is rendered in that case.
pub fn build_report(title: &str, summaries: Option<&Summaries>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# {}", title);
    let _ = writeln!(output);

    let Some(summaries) = summaries else {
        let _ = writeln!(output, "> {}", SCHEMA_ERROR_MESSAGE);
        return output;
    };

    let _ = writeln!(output, "## {}", OVERALL_HEADING);
    if summaries.overall.is_empty() {
        let _ = writeln!(output, "No attendance recorded.");
    } else {
        let _ = writeln!(output, "| Name | Attendance Count | Total Attendance Percent |");
        let _ = writeln!(output, "|---|---:|---:|");
        for row in summaries.overall.iter() {
            let _ = writeln!(
                output,
                "| {} | {} | {} |",
                markdown_cell(&row.name),
                row.attendance_count,
                row.attendance_percent
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## {}", RATIO_HEADING);
    if summaries.people.is_empty() {
        let _ = writeln!(output, "No attendance recorded.");
    } else {
        let _ = writeln!(output, "| Name | Operation % | Training % |");
        let _ = writeln!(output, "|---|---:|---:|");
        for person in summaries.people.iter() {
            let _ = writeln!(
                output,
                "| {} | {} | {} |",
                markdown_cell(&person.name),
                person.operation_percent,
                person.training_percent
            );
        }
    }

    output
}

fn markdown_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

pub fn render_dashboard(title: &str, form_url: &str, summaries: Option<&Summaries>) -> String {
    let mut body = String::new();

    match summaries {
        None => {
            let _ = write!(
                body,
                r#"<div class="error">{}</div>"#,
                escape_html(SCHEMA_ERROR_MESSAGE)
            );
        }
        Some(summaries) => {
            let _ = write!(body, "<h2>{}</h2>", OVERALL_HEADING);
            body.push_str(&html_table(
                &["Name", "Attendance Count", "Total Attendance Percent"],
                summaries.overall.iter().map(|row| {
                    [
                        row.name.clone(),
                        row.attendance_count.to_string(),
                        row.attendance_percent.to_string(),
                    ]
                }),
            ));

            let _ = write!(body, "<h2>{}</h2>", RATIO_HEADING);
            body.push_str(&html_table(
                &["Name", "Operation %", "Training %"],
                summaries.people.iter().map(|person| {
                    [
                        person.name.clone(),
                        person.operation_percent.to_string(),
                        person.training_percent.to_string(),
                    ]
                }),
            ));
        }
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{css}</style>
</head>
<body>
    <h1>{title}</h1>
    {body}
    <p><a class="button" href="{form_url}" target="_blank" rel="noopener">{button}</a></p>
</body>
</html>
"#,
        title = escape_html(title),
        css = INLINE_CSS,
        body = body,
        form_url = escape_html(form_url),
        button = FORM_BUTTON_LABEL,
    )
}

fn html_table<I>(headers: &[&str; 3], rows: I) -> String
where
    I: Iterator<Item = [String; 3]>,
{
    let mut table = String::from("<table><thead><tr>");
    for header in headers {
        let _ = write!(table, "<th>{}</th>", escape_html(header));
    }
    table.push_str("</tr></thead><tbody>");

    let mut empty = true;
    for row in rows {
        empty = false;
        table.push_str("<tr>");
        for cell in row.iter() {
            let _ = write!(table, "<td>{}</td>", escape_html(cell));
        }
        table.push_str("</tr>");
    }
    if empty {
        table.push_str(r#"<tr><td colspan="3">No attendance recorded.</td></tr>"#);
    }

    table.push_str("</tbody></table>");
    table
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

const INLINE_CSS: &str = "body{font-family:sans-serif;max-width:48rem;margin:2rem auto;padding:0 1rem;color:#222}\
table{border-collapse:collapse;width:100%;margin-bottom:2rem}\
th,td{border:1px solid #ddd;padding:.4rem .6rem;text-align:left}\
th{background:#f4f4f4}\
.error{background:#fdecea;color:#8a1c1c;padding:.8rem;border-radius:4px}\
.button{display:inline-block;background:#ff4b4b;color:#fff;padding:.5rem 1rem;border-radius:4px;text-decoration:none}";
