//! In-memory collaborators for pipeline and controller tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ProblemData, ProblemSource, SubmissionSink};
use crate::task::{Sample, Task, TaskSnapshot};

#[derive(Clone)]
enum Scripted {
    Problem(ProblemData),
    Fail(String),
    Panic,
}

/// Problems keyed by task name.
#[derive(Default)]
pub struct FakeSource {
    tasks: Vec<(String, String)>,
    problems: Mutex<HashMap<String, Scripted>>,
    fetches: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn problem(mut self, name: &str, url: &str, statement: &str, samples: &[(&str, &str)]) -> Self {
        let samples = samples
            .iter()
            .enumerate()
            .map(|(i, (input, output))| Sample::new(i + 1, *input, *output))
            .collect();
        self.tasks.push((name.to_string(), url.to_string()));
        self.problems.lock().unwrap().insert(
            name.to_string(),
            Scripted::Problem(ProblemData {
                statement: statement.to_string(),
                samples,
            }),
        );
        self
    }

    pub fn failing(mut self, name: &str, url: &str, message: &str) -> Self {
        self.tasks.push((name.to_string(), url.to_string()));
        self.problems
            .lock()
            .unwrap()
            .insert(name.to_string(), Scripted::Fail(message.to_string()));
        self
    }

    pub fn panicking(mut self, name: &str, url: &str) -> Self {
        self.tasks.push((name.to_string(), url.to_string()));
        self.problems
            .lock()
            .unwrap()
            .insert(name.to_string(), Scripted::Panic);
        self
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProblemSource for FakeSource {
    async fn list_tasks(&self) -> anyhow::Result<Vec<Task>> {
        self.tasks
            .iter()
            .map(|(name, url)| Task::new(name.as_str(), url.as_str()).map_err(Into::into))
            .collect()
    }

    async fn fetch_problem(&self, task: &TaskSnapshot) -> anyhow::Result<ProblemData> {
        self.fetches.lock().unwrap().push(task.name.clone());
        let scripted = self
            .problems
            .lock()
            .unwrap()
            .get(&task.name)
            .cloned()
            .unwrap_or_else(|| Scripted::Fail(format!("unknown task {}", task.name)));
        match scripted {
            Scripted::Problem(data) => Ok(data),
            Scripted::Fail(message) => Err(anyhow::anyhow!(message)),
            Scripted::Panic => panic!("source exploded on {}", task.name),
        }
    }
}

/// Records submissions; optionally fails every one.
#[derive(Default)]
pub struct RecordingSink {
    submitted: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn submitted(&self) -> Vec<(String, String)> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubmissionSink for RecordingSink {
    async fn submit(&self, task: &TaskSnapshot, source: &str) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("judge rejected the upload");
        }
        self.submitted
            .lock()
            .unwrap()
            .push((task.name.clone(), source.to_string()));
        Ok(())
    }
}
