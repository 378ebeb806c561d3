//! Standalone HTML page per result group.

use crate::storage::{ConfusionMatrix, TestResult};

const CM_PLACEHOLDER: &str = "<i>Error parsing confusion matrix</i>";

/// Navigation entry for a group page.
#[derive(Debug, Clone)]
pub struct PageLink {
    pub name: String,
    /// File name of the page without the `.html` extension.
    pub stem: String,
}

/// Everything rendered on one group page.
pub struct GroupPage<'a> {
    pub group: &'a str,
    pub group_by: &'a str,
    /// Every group, in report order. Links are rendered for all but `group`.
    pub groups: &'a [PageLink],
    pub rows: &'a [&'a TestResult],
    /// Image file names relative to the page.
    pub images: &'a [String],
}

/// Render a group page.
pub fn render_group_page(page: &GroupPage<'_>) -> String {
    let mut html = String::new();
    let title = format!("{} = {}", page.group_by, page.group);

    html.push_str("<!DOCTYPE html>\n<html lang=\"de\">\n<head>\n");
    html.push_str("<meta charset=\"UTF-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(&title)));
    html.push_str("<style>\n");
    html.push_str(CSS_STYLES);
    html.push_str("</style>\n</head>\n<body>\n");

    // Navigation
    html.push_str("<nav>\n");
    for other in page.groups.iter().filter(|g| g.name != page.group) {
        html.push_str(&format!(
            "<a href=\"{}.html\">{}</a>\n",
            escape_html(&urlencoding::encode(&other.stem)),
            escape_html(&other.name)
        ));
    }
    html.push_str("</nav>\n");

    html.push_str(&format!("<h1>{}</h1>\n", escape_html(&title)));

    // Results
    html.push_str("<table>\n<thead><tr>");
    for header in [
        "modellname",
        "datenname",
        "durchgang",
        "score",
        "f1",
        "dauer",
        "laufzeit",
        "cm",
    ] {
        html.push_str(&format!("<th>{header}</th>"));
    }
    html.push_str("</tr></thead>\n<tbody>\n");
    for row in page.rows {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.2}</td><td>{:.2}</td><td>{:.4}</td><td>{}</td><td>{}</td></tr>\n",
            escape_html(&row.model_name),
            escape_html(&row.dataset_name),
            row.trial,
            row.score,
            row.f1,
            row.duration_secs,
            row.timestamp.format("%Y-%m-%d %H:%M:%S"),
            format_confusion_matrix(row),
        ));
    }
    html.push_str("</tbody>\n</table>\n");

    // Charts
    if !page.images.is_empty() {
        html.push_str("<div class=\"charts\">\n");
        for image in page.images {
            html.push_str(&format!(
                "<figure><img src=\"{0}\" alt=\"{0}\"><figcaption>{0}</figcaption></figure>\n",
                escape_html(image)
            ));
        }
        html.push_str("</div>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// Confusion matrix as a nested table, or a placeholder when the stored text is invalid.
fn format_confusion_matrix(row: &TestResult) -> String {
    match ConfusionMatrix::parse(&row.confusion_matrix) {
        Ok(cm) => {
            let mut out = String::from("<table class=\"cm\">");
            for counts in cm.rows() {
                out.push_str("<tr>");
                for count in counts {
                    out.push_str(&format!("<td>{count}</td>"));
                }
                out.push_str("</tr>");
            }
            out.push_str("</table>");
            out
        }
        Err(e) => {
            tracing::warn!(
                model = %row.model_name,
                dataset = %row.dataset_name,
                trial = row.trial,
                error = %e,
                "Unreadable confusion matrix"
            );
            CM_PLACEHOLDER.to_string()
        }
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const CSS_STYLES: &str = r#"
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 1200px; margin: 0 auto; padding: 20px; color: #333; background: #fafafa; }
nav { margin-bottom: 20px; }
nav a { margin-right: 12px; color: #1976d2; }
h1 { border-bottom: 2px solid #333; padding-bottom: 10px; }
table { border-collapse: collapse; width: 100%; margin: 10px 0; }
th, td { border: 1px solid #ddd; padding: 6px 10px; text-align: left; vertical-align: top; }
th { background: #f5f5f5; }
table.cm { width: auto; margin: 0; }
table.cm td { border: 1px solid #eee; padding: 2px 6px; text-align: right; }
figure { margin: 20px 0; }
img { max-width: 100%; border: 1px solid #ddd; background: white; }
figcaption { color: #666; font-size: 0.9em; }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(cm: &str) -> TestResult {
        TestResult {
            model_name: "KNN".into(),
            dataset_name: "iris <v2>".into(),
            trial: 1,
            score: 90.0,
            f1: 88.5,
            duration_secs: 0.01,
            timestamp: Utc::now(),
            confusion_matrix: cm.into(),
        }
    }

    fn link(name: &str) -> PageLink {
        PageLink {
            name: name.to_string(),
            stem: crate::report::file_stem(name),
        }
    }

    #[test]
    fn test_group_page_structure() {
        let good = row("[[2,1],[0,3]]");
        let groups = vec![link("KNN"), link("Majority")];
        let images = vec!["best_scores_modellname_score.png".to_string()];
        let rows = [&good];
        let html = render_group_page(&GroupPage {
            group: "KNN",
            group_by: "modellname",
            groups: &groups,
            rows: &rows,
            images: &images,
        });
        assert!(html.contains("<a href=\"Majority.html\">Majority</a>"));
        assert!(!html.contains("href=\"KNN.html\""));
        assert!(html.contains("iris &lt;v2&gt;"));
        assert!(html.contains("<td>2</td><td>1</td>"));
        assert!(html.contains("<img src=\"best_scores_modellname_score.png\""));
    }

    #[test]
    fn test_bad_confusion_matrix_placeholder() {
        let bad = row("[[1,2],[3]]");
        let rows = [&bad];
        let html = render_group_page(&GroupPage {
            group: "KNN",
            group_by: "modellname",
            groups: &[],
            rows: &rows,
            images: &[],
        });
        assert!(html.contains(CM_PLACEHOLDER));
    }

    #[test]
    fn test_links_are_percent_encoded() {
        let good = row("[[1]]");
        let rows = [&good];
        let groups = vec![link("KNN"), link("Random Forest #2"), link("50%")];
        let html = render_group_page(&GroupPage {
            group: "KNN",
            group_by: "modellname",
            groups: &groups,
            rows: &rows,
            images: &[],
        });
        assert!(html.contains("<a href=\"Random%20Forest%20%232.html\">Random Forest #2</a>"));
        assert!(html.contains("<a href=\"50%25.html\">50%</a>"));
    }
}
