//! Static HTML rendering of a finished comparison.

use pubcompare_shared::StepContext;

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Render the human-readable report for a run.
///
/// Contains the query and the summary, comparison, fact check and enrichment
/// text, each escaped. Missing outputs render as a `[No ...]` placeholder.
pub fn render_report(ctx: &StepContext) -> String {
    let sections = [
        ("Summary", ctx.summary(), "[No summary]"),
        ("Comparison", ctx.comparison(), "[No comparison]"),
        ("Fact Check", ctx.fact_check(), "[No fact check]"),
        ("Enrichment", ctx.extra_info(), "[No enrichment]"),
    ];

    let mut body = String::new();
    for (title, text, placeholder) in sections {
        let text = text.filter(|t| !t.is_empty()).unwrap_or(placeholder);
        body.push_str(&format!(
            "    <h2>{title}</h2><pre>{}</pre>\n",
            escape_html(text)
        ));
    }

    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head><meta charset=\"UTF-8\"><title>Comparison Report</title></head>\n\
         <body>\n\
         \x20   <h1>Scientific Publication Comparison</h1>\n\
         \x20   <p><strong>Query:</strong> {query}</p>\n\
         \x20   <p><strong>Publications:</strong> {pub1} vs {pub2}</p>\n\
         {body}\
         </body>\n\
         </html>\n",
        query = escape_html(ctx.user_query()),
        pub1 = escape_html(&ctx.pub1_path().display().to_string()),
        pub2 = escape_html(&ctx.pub2_path().display().to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubcompare_shared::{Profile, StageOutput};

    fn finished_ctx(summary: &str) -> StepContext {
        StepContext::new("a.txt", "b.txt", "Tools <&> \"quotes\"")
            .record(StageOutput::Pub1Profile(Profile::Raw("p1".into())))
            .unwrap()
            .record(StageOutput::Pub2Profile(Profile::Raw("p2".into())))
            .unwrap()
            .record(StageOutput::Comparison("cmp".into()))
            .unwrap()
            .record(StageOutput::Trends("trends".into()))
            .unwrap()
            .record(StageOutput::Summary(summary.into()))
            .unwrap()
    }

    #[test]
    fn escapes_special_characters() {
        assert_eq!(
            escape_html(r#"<script>alert('x') & "y"</script>"#),
            "&lt;script&gt;alert(&#x27;x&#x27;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
    }

    #[test]
    fn report_escapes_query_and_outputs() {
        let html = render_report(&finished_ctx("<b>bold</b> claim"));
        assert!(html.contains("Tools &lt;&amp;&gt; &quot;quotes&quot;"));
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt; claim"));
        assert!(!html.contains("<b>bold</b>"));
    }

    #[test]
    fn report_uses_placeholders_for_missing_outputs() {
        let html = render_report(&finished_ctx("done"));
        assert!(html.contains("[No fact check]"));
        assert!(html.contains("[No enrichment]"));
        assert!(!html.contains("[No summary]"));
    }

    #[test]
    fn report_is_parseable_html() {
        let html = render_report(&finished_ctx("a < b"));
        let doc = scraper::Html::parse_document(&html);
        let pre = scraper::Selector::parse("pre").unwrap();
        let texts: Vec<String> = doc
            .select(&pre)
            .map(|el| el.text().collect::<String>())
            .collect();
        assert_eq!(texts.len(), 4);
        assert_eq!(texts[0], "a < b");
        assert_eq!(texts[1], "cmp");
    }
}
