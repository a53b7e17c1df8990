//! Prompt templates, one per stage.
//!
//! Each builder takes exactly the context fields its stage is allowed to read.

use pubcompare_shared::Profile;

/// Profile extraction for one publication.
pub fn profile_extraction(text: &str) -> String {
    format!(
        "You are an expert reviewer of scientific publications.\n\n\
         Read the publication below and extract these attributes as lists of short strings:\n\
         - `tools`: software tools, frameworks and libraries\n\
         - `evaluation_methods`: metrics and evaluation strategies\n\
         - `datasets`: datasets used\n\
         - `task_types`: NLP or ML tasks addressed (e.g. question answering)\n\
         - `results`: quantitative or qualitative findings\n\n\
         Respond with a single JSON object and nothing else, shaped like:\n\
         {{\n  \"tools\": [\"...\"],\n  \"evaluation_methods\": [\"...\"],\n  \
         \"datasets\": [\"...\"],\n  \"task_types\": [\"...\"],\n  \"results\": [\"...\"]\n}}\n\n\
         Publication:\n{text}"
    )
}

/// Side-by-side comparison of the two profiles through the query's lens.
pub fn comparison(query: &str, pub1: &Profile, pub2: &Profile) -> String {
    format!(
        "Compare two research publications on tool usage, evaluation methods, \
         task types, datasets and results.\n\
         Point out similarities, key differences and contradictions. Focus: '{query}'.\n\n\
         Publication 1 attributes:\n{}\n\n\
         Publication 2 attributes:\n{}",
        pub1.render_for_prompt(),
        pub2.render_for_prompt(),
    )
}

/// Trend analysis across both profiles.
pub fn trends(query: &str, pub1: &Profile, pub2: &Profile) -> String {
    format!(
        "Identify research trends in the attributes below that relate to '{query}'.\n\n\
         Publication 1:\n{}\n\n\
         Publication 2:\n{}",
        pub1.render_for_prompt(),
        pub2.render_for_prompt(),
    )
}

pub fn summary(comparison: &str, trends: &str) -> String {
    format!(
        "Summarize the findings of the comparison and trend analysis below.\n\n\
         Comparison:\n{comparison}\n\n\
         Trends:\n{trends}"
    )
}

/// Fact check of the generated text against the source publications.
pub fn fact_check(
    comparison: &str,
    trends: &str,
    summary: &str,
    pub1_text: &str,
    pub2_text: &str,
) -> String {
    format!(
        "Check the comparison, trends and summary against the original publications.\n\
         List each claim as supported or unsupported.\n\n\
         Comparison:\n{comparison}\n\n\
         Trends:\n{trends}\n\n\
         Summary:\n{summary}\n\n\
         Publication 1:\n{pub1_text}\n\n\
         Publication 2:\n{pub2_text}"
    )
}

/// Instruction handed to the enrichment agent. Excerpts are already truncated.
pub fn enrichment(query: &str, pub1_excerpt: &str, pub2_excerpt: &str) -> String {
    format!(
        "Enrich or validate missing insights for query: {query}\n\n\
         Publication 1:\n{pub1_excerpt}\n\n\
         Publication 2:\n{pub2_excerpt}"
    )
}
