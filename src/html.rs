//! HTML documents rendered into the report: the material specification,
//! one divider per certificate type and the cover with the table of contents.
//!
//! The markup is plain HTML 4-style tables with inline CSS so both the
//! Chrome renderer and the plain-text renderer produce a usable page. Every
//! document carries a `<title>` naming what it is, which is also how tests
//! tell the documents apart.

use crate::model::{Article, Certificate, Project, TocSection};
use crate::pipeline::marker::MAIN_REPORT_SECTION;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt::Write as _;

pub const MAIN_REPORT_TITLE: &str = "Materialspecifikation";
pub const COVER_TITLE: &str = "Innehållsförteckning";

const GENERATOR: &str = "tracecert";

const REPORT_CSS: &str = r#"<style>
body { font-family: 'Segoe UI', Arial, sans-serif; margin: 20px; color: #333333; }
h1 { color: #0078d4; border-bottom: 2px solid #0078d4; padding-bottom: 10px; }
h2 { color: #106ebe; margin-top: 30px; }
table { width: 100%; border-collapse: collapse; margin: 20px 0; }
th { background-color: #0078d4; color: white; padding: 12px; text-align: left; font-weight: bold; }
td { padding: 10px; border-bottom: 1px solid #e0e0e0; }
.project-info { background-color: #f0f0f0; padding: 15px; border-radius: 6px; margin-bottom: 20px; }
.article-row { page-break-inside: avoid; }
.certificate-list { padding-left: 20px; color: #666666; }
.divider { text-align: center; padding-top: 35%; }
.divider h1 { border-bottom: none; font-size: 32pt; }
.pages { text-align: right; white-space: nowrap; }
.footer { margin-top: 50px; padding-top: 20px; border-top: 1px solid #cccccc; color: #666666; font-size: 9pt; }
.watermark { position: fixed; top: 50%; left: 50%; transform: translate(-50%, -50%) rotate(-45deg);
  font-size: 120px; color: rgba(0, 0, 0, 0.05); z-index: -1; pointer-events: none; }
@media print { body { margin: 0; } }
</style>"#;

/// Escape text for use in element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Table-of-contents label of a section.
pub fn section_title(name: &str) -> &str {
    if name == MAIN_REPORT_SECTION {
        MAIN_REPORT_TITLE
    } else {
        name
    }
}

/// The material specification: project header and one row per article.
pub fn material_specification_html(
    project: &Project,
    articles: &[Article],
    certificates: &[Certificate],
    watermark: Option<&str>,
    generated_at: NaiveDateTime,
) -> String {
    let mut body = String::new();
    if let Some(text) = watermark {
        let _ = writeln!(body, "<div class=\"watermark\">{}</div>", escape_html(text));
    }
    let _ = writeln!(body, "<h1>{MAIN_REPORT_TITLE}</h1>");
    body.push_str(&project_info(project, generated_at));

    body.push_str("<h2>Artiklar</h2>\n<table>\n<thead>\n<tr>");
    for heading in ["Artikelnummer", "Benämning", "Antal", "Nivå", "Överordnad", "Charge", "Certifikat"] {
        let _ = write!(body, "<th>{heading}</th>");
    }
    body.push_str("</tr>\n</thead>\n<tbody>\n");

    for article in articles {
        let types: Vec<&str> = certificates
            .iter()
            .filter(|c| c.article_number == article.article_number)
            .map(|c| c.certificate_type.as_str())
            .collect();
        let cert_info = if types.is_empty() {
            "(Inga)".to_string()
        } else {
            types.join(", ")
        };
        let charge = article
            .charge_number
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or("(Ingen)");
        let parent = article.parent_article.as_deref().unwrap_or("");

        let _ = writeln!(
            body,
            "<tr class=\"article-row\"><td>{}</td><td>{}</td><td>{:.1}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"certificate-list\">{}</td></tr>",
            escape_html(&article.article_number),
            escape_html(&article.description),
            article.quantity,
            escape_html(&article.level),
            escape_html(parent),
            escape_html(charge),
            escape_html(&cert_info),
        );
    }
    body.push_str("</tbody>\n</table>\n");
    body.push_str(&footer(generated_at));

    document(MAIN_REPORT_TITLE, &body)
}

/// A one-page title sheet in front of a certificate-type group.
pub fn divider_html(doc_type: &str, certificate_count: usize) -> String {
    let body = format!(
        "<div class=\"divider\">\n<h1>{}</h1>\n<p>{} certifikat</p>\n</div>\n",
        escape_html(doc_type),
        certificate_count
    );
    document(doc_type, &body)
}

/// The cover: project header, article count, the page ranges of every
/// section and the certificates attached to each article.
pub fn cover_html(
    project: &Project,
    article_count: usize,
    sections: &[TocSection],
    certificates: &[Certificate],
    generated_at: NaiveDateTime,
) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "<h1>{COVER_TITLE}</h1>");
    body.push_str(&project_info(project, generated_at));
    let _ = writeln!(body, "<p>Artiklar: {article_count}</p>");

    if sections.is_empty() {
        body.push_str("<p>(Inga avsnitt)</p>\n");
    } else {
        body.push_str("<table>\n<thead>\n<tr><th>Avsnitt</th><th class=\"pages\">Sidor</th></tr>\n</thead>\n<tbody>\n");
        for section in sections {
            let _ = writeln!(
                body,
                "<tr><td>{}</td><td class=\"pages\">{}</td></tr>",
                escape_html(section_title(&section.name)),
                section.range_label()
            );
        }
        body.push_str("</tbody>\n</table>\n");
    }
    body.push_str("<h2>Certifikat per artikel</h2>\n");
    body.push_str(&certificate_list(certificates));
    body.push_str(&footer(generated_at));

    document(COVER_TITLE, &body)
}

/// Nested list of certificates grouped by article number, articles sorted.
pub fn certificate_list(certificates: &[Certificate]) -> String {
    if certificates.is_empty() {
        return "<p>(Inga certifikat)</p>\n".to_string();
    }
    let mut by_article: BTreeMap<&str, Vec<&Certificate>> = BTreeMap::new();
    for cert in certificates {
        by_article.entry(cert.article_number.as_str()).or_default().push(cert);
    }

    let mut list = String::from("<ul class=\"certificate-toc\">\n");
    for (article, certs) in by_article {
        let _ = writeln!(list, "<li><strong>{}</strong>\n<ul>", escape_html(article));
        for cert in certs {
            let pages = match cert.page_count {
                Some(1) => " (1 sida)".to_string(),
                Some(n) => format!(" ({n} sidor)"),
                None => String::new(),
            };
            let _ = writeln!(
                list,
                "<li>{}: {}{}</li>",
                escape_html(&cert.certificate_type),
                escape_html(&cert.display_name()),
                pages
            );
        }
        list.push_str("</ul>\n</li>\n");
    }
    list.push_str("</ul>\n");
    list
}

fn project_info(project: &Project, generated_at: NaiveDateTime) -> String {
    let mut info = String::from("<div class=\"project-info\">\n");
    let mut row = |label: &str, value: &str| {
        let _ = writeln!(info, "<p><strong>{label}:</strong> {}</p>", escape_html(value));
    };
    row("Projekt", &project.project_name);
    row("Ordernummer", &project.order_number);
    row("Kund", &project.customer);
    if let Some(po) = project.purchase_order_number.as_deref().filter(|p| !p.is_empty()) {
        row("Beställningsnummer", po);
    }
    row("Typ", &project.project_type);
    if !project.created_by.is_empty() {
        row("Skapad av", &project.created_by);
    }
    if let Some(description) = project.description.as_deref().filter(|d| !d.is_empty()) {
        row("Beskrivning", description);
    }
    row("Genererad", &generated_at.format("%Y-%m-%d %H:%M").to_string());
    info.push_str("</div>\n");
    info
}

fn footer(generated_at: NaiveDateTime) -> String {
    format!(
        "<div class=\"footer\">\n<p>Genererad av {GENERATOR}</p>\n<p>Datum: {}</p>\n</div>\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    )
}

fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>{}</title>\n{REPORT_CSS}\n</head>\n<body>\n{body}</body>\n</html>\n",
        escape_html(title)
    )
}
