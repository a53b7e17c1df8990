//! Scripted in-memory ports for tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use pubcompare_shared::{
    Deadline, DocumentSource, EnrichmentAgent, GenerativeModel, PubCompareError, Result,
    SearchTool,
};

enum Script {
    Sequence(VecDeque<String>),
    Repeating(String),
    /// First rule whose needle appears in the prompt wins.
    Rules(Vec<(String, String)>),
    Failing(String),
}

/// Generative model that answers from a script and records every prompt.
pub struct ScriptedModel {
    script: Mutex<Script>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    fn with_script(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Answers in order; errors once exhausted.
    pub fn sequence<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_script(Script::Sequence(answers.into_iter().map(Into::into).collect()))
    }

    pub fn repeating(answer: impl Into<String>) -> Self {
        Self::with_script(Script::Repeating(answer.into()))
    }

    /// Answers by prompt content: `(needle, answer)` pairs, checked in order.
    pub fn rules<I, A, B>(rules: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        Self::with_script(Script::Rules(
            rules.into_iter().map(|(a, b)| (a.into(), b.into())).collect(),
        ))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_script(Script::Failing(message.into()))
    }

    /// Sleep before answering prompts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl GenerativeModel for ScriptedModel {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let mut script = self.script.lock().unwrap();
        match &mut *script {
            Script::Sequence(answers) => answers
                .pop_front()
                .ok_or_else(|| PubCompareError::port("generative model", "script exhausted")),
            Script::Repeating(answer) => Ok(answer.clone()),
            Script::Rules(rules) => rules
                .iter()
                .find(|(needle, _)| prompt.contains(needle.as_str()))
                .map(|(_, answer)| answer.clone())
                .ok_or_else(|| PubCompareError::port("generative model", "no rule matched")),
            Script::Failing(message) => Err(PubCompareError::port("generative model", message.clone())),
        }
    }
}

/// Search tool returning a fixed result and recording queries.
pub struct StaticSearch {
    result: String,
    queries: Mutex<Vec<String>>,
}

impl StaticSearch {
    pub fn new(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl SearchTool for StaticSearch {
    fn search(&self, query: &str) -> Result<String> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.result.clone())
    }
}

/// Enrichment agent returning a fixed answer, optionally after a delay.
pub struct ScriptedAgent {
    answer: String,
    delay: Option<Duration>,
    instructions: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            delay: None,
            instructions: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn instructions(&self) -> Vec<String> {
        self.instructions.lock().unwrap().clone()
    }
}

impl EnrichmentAgent for ScriptedAgent {
    fn run(&self, instruction: &str, _deadline: &Deadline) -> Result<String> {
        self.instructions.lock().unwrap().push(instruction.to_string());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        Ok(self.answer.clone())
    }
}

/// Document source backed by a map of path to text.
#[derive(Default)]
pub struct MemoryDocuments {
    docs: HashMap<PathBuf, String>,
}

impl MemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.docs.insert(path.into(), text.into());
        self
    }
}

impl DocumentSource for MemoryDocuments {
    fn read(&self, path: &Path) -> Result<String> {
        self.docs.get(path).cloned().ok_or_else(|| {
            PubCompareError::io(path, std::io::Error::from(std::io::ErrorKind::NotFound))
        })
    }
}
