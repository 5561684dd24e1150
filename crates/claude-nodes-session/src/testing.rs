//! Scripted process runner shared by node tests.

use std::{
    collections::VecDeque,
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use claude_nodes_core::{
    CommandRunner, NodeContext, NodesConfig, ProcessOutput, ProcessRequest, ProgressMsg,
    ProgressStore, RunnerError,
};

type Step = Box<dyn FnOnce(&ProcessRequest) -> Result<ProcessOutput, RunnerError> + Send>;

/// Replays one step per call and records every request.
pub struct ScriptedRunner {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ProcessRequest>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a step that may inspect the request (e.g. write into its working dir).
    pub fn then<F>(self, step: F) -> Self
    where
        F: FnOnce(&ProcessRequest) -> Result<ProcessOutput, RunnerError> + Send + 'static,
    {
        self.steps.lock().unwrap().push_back(Box::new(step));
        self
    }

    /// Queue a fixed output.
    pub fn then_output(self, output: ProcessOutput) -> Self {
        self.then(move |_| Ok(output))
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn requests(&self) -> Vec<ProcessRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, request: ProcessRequest) -> Result<ProcessOutput, RunnerError> {
        let step = self.steps.lock().unwrap().pop_front();
        let result = match step {
            Some(step) => step(&request),
            None => Err(RunnerError::SpawnFailed("no scripted step".into())),
        };
        self.requests.lock().unwrap().push(request);
        result
    }
}

pub fn exited(code: i32, stdout: &str, stderr: &str) -> ProcessOutput {
    ProcessOutput {
        exit_code: code,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

/// Context rooted at `base`, recording progress in a store.
pub fn context(base: &Path) -> (NodeContext, Arc<ProgressStore>) {
    let store = Arc::new(ProgressStore::new());
    let ctx = NodeContext::new(NodesConfig::rooted_at(base), store.clone());
    (ctx, store)
}

/// Progress messages reported so far, in order.
pub fn messages(store: &ProgressStore) -> Vec<String> {
    store
        .get_history()
        .into_iter()
        .filter_map(|msg| match msg {
            ProgressMsg::Update { message, .. } => Some(message),
            ProgressMsg::Finished => None,
        })
        .collect()
}
