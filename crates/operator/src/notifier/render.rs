//! Markdown report rendering for email delivery.

use pulldown_cmark::{html, Options, Parser};

/// Convert a markdown report body to an HTML fragment. Tables and fenced
/// code blocks are enabled to match the report format the agent produces.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut html_out = String::new();
    html::push_html(&mut html_out, parser);
    html_out
}

/// Render a full, styled HTML document around the converted report.
pub fn render_report(markdown: &str) -> String {
    REPORT_TEMPLATE.replace("{{ content }}", &markdown_to_html(markdown))
}

const REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Incident Report</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif;
            line-height: 1.6;
            color: #333;
            max-width: 900px;
            margin: 0 auto;
            padding: 20px;
            background-color: #f5f5f5;
        }
        .container {
            background-color: #ffffff;
            border-radius: 8px;
            padding: 30px;
            box-shadow: 0 2px 8px rgba(0,0,0,0.1);
        }
        h1 {
            color: #d32f2f;
            border-bottom: 3px solid #d32f2f;
            padding-bottom: 10px;
            margin-top: 0;
        }
        h2 {
            color: #1976d2;
            border-bottom: 2px solid #1976d2;
            padding-bottom: 8px;
            margin-top: 30px;
        }
        h3 {
            color: #388e3c;
            margin-top: 20px;
        }
        code {
            background-color: #f5f5f5;
            padding: 2px 6px;
            border-radius: 3px;
            font-family: 'Courier New', Courier, monospace;
            font-size: 0.9em;
            color: #d32f2f;
        }
        pre {
            background-color: #263238;
            color: #aed581;
            padding: 16px;
            border-radius: 6px;
            overflow-x: auto;
            border-left: 4px solid #1976d2;
        }
        pre code {
            background-color: transparent;
            color: #aed581;
            padding: 0;
        }
        table {
            width: 100%;
            border-collapse: collapse;
            margin: 20px 0;
        }
        th, td {
            border: 1px solid #e0e0e0;
            padding: 12px;
            text-align: left;
        }
        th {
            background-color: #1976d2;
            color: white;
            font-weight: 600;
        }
        tr:nth-child(even) {
            background-color: #f5f5f5;
        }
        .footer {
            margin-top: 40px;
            padding-top: 20px;
            border-top: 2px solid #e0e0e0;
            text-align: center;
            color: #757575;
            font-size: 0.9em;
        }
    </style>
</head>
<body>
    <div class="container">
        {{ content }}
        <div class="footer">
            <p>This is an automated incident report. Do not reply to this email.</p>
        </div>
    </div>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_headings_and_code_blocks() {
        let markdown = "# Root Cause\n\nRun this:\n\n```bash\nkubectl get pods -n prod\n```\n";
        let html = markdown_to_html(markdown);

        assert!(html.contains("<h1>Root Cause</h1>"));
        assert!(html.contains("<pre><code class=\"language-bash\">kubectl get pods -n prod"));
    }

    #[test]
    fn renders_tables() {
        let markdown = "| Pod | Restarts |\n|-----|----------|\n| api-0 | 7 |\n";
        let html = markdown_to_html(markdown);

        assert!(html.contains("<table>"));
        assert!(html.contains("<th>Pod</th>"));
        assert!(html.contains("<td>api-0</td>"));
    }

    #[test]
    fn report_is_wrapped_in_document_template() {
        let rendered = render_report("# Summary");

        assert!(rendered.starts_with("<!DOCTYPE html>"));
        assert!(rendered.contains("<h1>Summary</h1>"));
        assert!(rendered.contains("automated incident report"));
        assert!(!rendered.contains("{{ content }}"));
    }
}
