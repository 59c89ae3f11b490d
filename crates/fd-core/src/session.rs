//! One chat conversation driven through an [`AgentClient`].
//!
//! Each exchange appends the user prompt, sends it, interprets the reply and
//! appends the result. A failed exchange appends a readable notice instead
//! and hands the classified error back; the session stays usable.

use fd_backend::{AgentClient, GatewayError, ResponseInterpreter};
use fd_protocol::ChatMessage;
use log::{debug, warn};

use crate::conversation::ConversationLog;

pub struct ChatSession<A: AgentClient> {
    agent: A,
    interpreter: ResponseInterpreter,
    log: ConversationLog,
    session_id: Option<String>,
}

impl<A: AgentClient> ChatSession<A> {
    pub fn new(agent: A, interpreter: ResponseInterpreter) -> Self {
        Self {
            agent,
            interpreter,
            log: ConversationLog::new(),
            session_id: None,
        }
    }

    /// Run one exchange. Taking `&mut self` keeps a second prompt from
    /// being submitted while one is outstanding.
    ///
    /// An empty prompt is refused before anything is appended.
    pub async fn submit(&mut self, prompt: &str) -> Result<&ChatMessage, GatewayError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(GatewayError::EmptyPrompt);
        }
        self.log.push_user(prompt);

        match self.agent.send(prompt).await {
            Ok(reply) => {
                let interpreted = self.interpreter.interpret(&reply);
                if let Some(id) = &interpreted.session_id {
                    if self.session_id.as_deref() != Some(id.as_str()) {
                        debug!("agent session (id={id})");
                        self.session_id = Some(id.clone());
                    }
                }
                Ok(self.log.push_assistant(interpreted))
            }
            Err(err) => {
                warn!("exchange failed (kind={:?}): {err}", err.kind());
                self.log.push_notice(err.user_message());
                Err(err)
            }
        }
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Session id most recently reported by the agent.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// Start over: drops the log and the agent session id.
    pub fn clear(&mut self) {
        self.log.clear();
        self.session_id = None;
    }
}
