//! Reasoning-and-acting enrichment agent.
//!
//! The model is prompted with a tool list and a fixed text protocol
//! (`Thought:` / `Action:` / `Action Input:` / `Final Answer:`). Each turn is
//! parsed, the chosen tool runs, and its output is appended as an
//! `Observation:` before the next turn. Output that does not follow the
//! protocol is fed back as an observation instead of failing the run.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info, instrument, warn};

use pubcompare_shared::{
    Deadline, EnrichmentAgent, GenerativeModel, PubCompareError, Result, SearchTool,
};

use crate::deadline::invoke_with_deadline_blocking;

/// Answer returned when the loop gives up without a final answer.
pub const AGENT_STOPPED: &str = "Agent stopped due to iteration limit or time limit.";

/// Passages returned by the retriever per query.
const RETRIEVER_TOP_K: usize = 3;

/// Keywords returned by the tag extractor.
const MAX_KEYWORDS: usize = 8;

static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "this", "that", "these", "those", "and", "for", "with", "from", "into", "our",
        "are", "was", "were", "has", "have", "had", "its", "not", "but", "can", "also", "which",
        "while", "when", "where", "their", "there", "they", "than", "then", "such", "using",
        "uses", "use", "used", "publication", "paper", "we", "it", "on", "in", "of", "to", "is",
        "be", "by", "as", "an", "or", "at", "all", "more", "most", "other", "some", "any",
    ]
    .into_iter()
    .collect()
});

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z0-9]*(?:[-+.][A-Za-z0-9]+)*").expect("valid regex"));

static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*:(.*?)\n\s*Action\s*\d*\s*Input\s*\d*\s*:(.*)").expect("valid regex")
});

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

/// A capability the agent can call by name.
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn run(&self, input: &str) -> Result<String>;
}

/// Pulls keyword tags out of a text: technical tokens and capitalized terms,
/// ranked by frequency.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordTagExtractor;

impl KeywordTagExtractor {
    pub fn keywords(&self, text: &str) -> Vec<String> {
        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
        for (pos, m) in WORD_RE.find_iter(text).enumerate() {
            let word = m.as_str();
            if word.len() < 3 || STOPWORDS.contains(word.to_lowercase().as_str()) {
                continue;
            }
            if !is_keyword_like(word) {
                continue;
            }
            let entry = counts.entry(word).or_insert((0, pos));
            entry.0 += 1;
        }

        let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.1.cmp(&b.1.1)));
        ranked
            .into_iter()
            .take(MAX_KEYWORDS)
            .map(|(w, _)| w.to_string())
            .collect()
    }
}

fn is_keyword_like(word: &str) -> bool {
    let mut chars = word.chars();
    let first_upper = chars.next().is_some_and(|c| c.is_ascii_uppercase());
    let technical = chars.any(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        || word.contains(['-', '+', '.']);
    first_upper || technical
}

impl AgentTool for KeywordTagExtractor {
    fn name(&self) -> &str {
        "KeywordTagExtractor"
    }

    fn description(&self) -> &str {
        "Extract keywords from a piece of text."
    }

    fn run(&self, input: &str) -> Result<String> {
        let keywords = self.keywords(input);
        if keywords.is_empty() {
            return Ok("Keywords: (none found)".into());
        }
        Ok(format!("Keywords: {}", keywords.join(", ")))
    }
}

/// Retrieves the passages of a fixed corpus that share the most terms with a
/// query.
#[derive(Debug, Clone)]
pub struct RagRetriever {
    passages: Vec<String>,
    top_k: usize,
}

impl RagRetriever {
    /// Index `text`, one passage per blank-line separated block.
    pub fn from_text(text: &str) -> Self {
        let passages = text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
        Self {
            passages,
            top_k: RETRIEVER_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn retrieve(&self, query: &str) -> Vec<&str> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, usize)> = self
            .passages
            .iter()
            .enumerate()
            .filter_map(|(idx, passage)| {
                let lower = passage.to_lowercase();
                let score = terms.iter().filter(|t| lower.contains(t.as_str())).count();
                (score > 0).then_some((idx, score))
            })
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored
            .into_iter()
            .take(self.top_k)
            .map(|(idx, _)| self.passages[idx].as_str())
            .collect()
    }
}

fn query_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    WORD_RE
        .find_iter(query)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| w.len() >= 3 && !STOPWORDS.contains(w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

impl AgentTool for RagRetriever {
    fn name(&self) -> &str {
        "RAGRetriever"
    }

    fn description(&self) -> &str {
        "Retrieve factual passages from the two publications."
    }

    fn run(&self, input: &str) -> Result<String> {
        let hits = self.retrieve(input);
        if hits.is_empty() {
            return Ok(format!("No relevant passages found for: {}", input.trim()));
        }
        Ok(hits.join("\n---\n"))
    }
}

/// Web search through the search port.
#[derive(Clone)]
pub struct WebSearch {
    search: Arc<dyn SearchTool>,
}

impl WebSearch {
    pub fn new(search: Arc<dyn SearchTool>) -> Self {
        Self { search }
    }
}

impl AgentTool for WebSearch {
    fn name(&self) -> &str {
        "WebSearch"
    }

    fn description(&self) -> &str {
        "Search the web for current information."
    }

    fn run(&self, input: &str) -> Result<String> {
        self.search.search(input.trim())
    }
}

// ---------------------------------------------------------------------------
// Protocol parsing
// ---------------------------------------------------------------------------

/// One parsed model turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStep {
    Action { tool: String, input: String },
    Finish(String),
}

/// Parse a model turn. The error text is fed back to the model.
pub fn parse_step(output: &str) -> std::result::Result<AgentStep, String> {
    // The model sometimes invents its own observations; ignore them.
    let output = output
        .split_once("\nObservation:")
        .map_or(output, |(head, _)| head);

    let final_answer = output.split_once("Final Answer:").map(|(_, a)| a.trim());

    match (ACTION_RE.captures(output), final_answer) {
        (Some(_), Some(_)) => Err(
            "Invalid Format: respond with either an Action or a Final Answer, not both.".into(),
        ),
        (Some(caps), None) => {
            let tool = caps[1].trim().trim_matches('`').to_string();
            let input = caps[2].trim().trim_matches('"').to_string();
            if tool.is_empty() {
                return Err("Invalid Format: Missing tool name after 'Action:'.".into());
            }
            Ok(AgentStep::Action { tool, input })
        }
        (None, Some(answer)) => Ok(AgentStep::Finish(answer.to_string())),
        (None, None) if output.contains("Action:") => {
            Err("Invalid Format: Missing 'Action Input:' after 'Action:'.".into())
        }
        (None, None) => Err("Invalid Format: Missing 'Action:' after 'Thought:'.".into()),
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// ReAct loop over a generative model and a set of tools.
///
/// A [`RagRetriever`] over the instruction text is added for every run, so
/// the agent can look up passages of the publication excerpts it was given.
pub struct ReactAgent {
    model: Arc<dyn GenerativeModel>,
    tools: Vec<Arc<dyn AgentTool>>,
    max_iterations: usize,
}

impl ReactAgent {
    pub fn new(model: Arc<dyn GenerativeModel>, max_iterations: usize) -> Self {
        let tools: Vec<Arc<dyn AgentTool>> = vec![Arc::new(KeywordTagExtractor)];
        Self {
            model,
            tools,
            max_iterations,
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn AgentTool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_search(self, search: Arc<dyn SearchTool>) -> Self {
        self.with_tool(Arc::new(WebSearch::new(search)))
    }

    fn prompt(tools: &[Arc<dyn AgentTool>], instruction: &str, scratchpad: &str) -> String {
        let listing: Vec<String> = tools
            .iter()
            .map(|t| format!("{}: {}", t.name(), t.description()))
            .collect();
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();

        format!(
            "Answer the following question as best you can. You have access to these tools:\n\n\
             {}\n\n\
             Use this format:\n\n\
             Question: the input question you must answer\n\
             Thought: what to do next\n\
             Action: the tool to use, one of [{}]\n\
             Action Input: the input to the tool\n\
             Observation: the result of the tool\n\
             ... (Thought/Action/Action Input/Observation can repeat)\n\
             Thought: I now know the final answer\n\
             Final Answer: the final answer to the original question\n\n\
             Begin!\n\n\
             Question: {instruction}\n\
             Thought:{scratchpad}",
            listing.join("\n"),
            names.join(", "),
        )
    }

    fn complete(&self, prompt: String, deadline: &Deadline) -> Option<Result<String>> {
        match deadline.remaining() {
            None => Some(self.model.complete(&prompt)),
            Some(left) if left.is_zero() => None,
            Some(left) => {
                let model = Arc::clone(&self.model);
                invoke_with_deadline_blocking(left, move |_| model.complete(&prompt)).ok()
            }
        }
    }
}

impl EnrichmentAgent for ReactAgent {
    #[instrument(skip_all, fields(max_iterations = self.max_iterations))]
    fn run(&self, instruction: &str, deadline: &Deadline) -> Result<String> {
        let mut tools = self.tools.clone();
        tools.push(Arc::new(RagRetriever::from_text(instruction)));

        let mut scratchpad = String::new();
        for iteration in 1..=self.max_iterations {
            if deadline.is_expired() {
                break;
            }

            let prompt = Self::prompt(&tools, instruction, &scratchpad);
            let Some(output) = self.complete(prompt, deadline) else {
                warn!(iteration, "agent model call ran out of time");
                break;
            };
            let output = output?;
            let turn = output
                .split_once("\nObservation:")
                .map_or(output.as_str(), |(head, _)| head);

            let observation = match parse_step(turn) {
                Ok(AgentStep::Finish(answer)) => {
                    info!(iteration, "agent reached final answer");
                    return Ok(answer);
                }
                Ok(AgentStep::Action { tool, input }) => {
                    match tools.iter().find(|t| t.name() == tool) {
                        Some(t) => {
                            debug!(iteration, tool = %tool, "agent calling tool");
                            t.run(&input).map_err(|e| {
                                PubCompareError::port(format!("agent tool {tool}"), e.to_string())
                            })?
                        }
                        None => {
                            let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
                            format!("{tool} is not a valid tool, try one of [{}].", names.join(", "))
                        }
                    }
                }
                Err(format_error) => {
                    debug!(iteration, error = %format_error, "agent output did not parse");
                    format_error
                }
            };

            scratchpad.push_str(&format!(" {}\nObservation: {observation}\nThought:", turn.trim()));
        }

        warn!("agent stopped without a final answer");
        Ok(AGENT_STOPPED.to_string())
    }
}
