use std::sync::Arc;

use crate::agent::Agent;

/// Answer an agent gives when the console output is not asking for anything.
pub const NO_OP_ANSWER: &str = "breba-noop";

pub trait InputProvider: Send + Sync {
    /// Input to feed the shell given the latest console output, or `None`
    /// when the output does not call for any.
    fn get_input(&self, console_output: &str) -> Option<String>;
}

/// Adapts an [`Agent`] to the input-provider interface, translating its
/// no-op answer (or an empty reply) into "no input".
pub struct AgentInputProvider {
    agent: Arc<dyn Agent>,
}

impl AgentInputProvider {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self { agent }
    }
}

impl InputProvider for AgentInputProvider {
    fn get_input(&self, console_output: &str) -> Option<String> {
        let answer = self.agent.provide_input(console_output);
        if answer.is_empty() || answer == NO_OP_ANSWER {
            None
        } else {
            Some(answer)
        }
    }
}
