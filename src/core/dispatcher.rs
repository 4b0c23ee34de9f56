/// Operator action dispatch
///
/// Validates the verb, forwards to the matching process manager operation
/// and folds the manager's answer into an `ActionOutcome`.

use std::sync::Arc;
use tracing::{info, warn};

use crate::core::error::DispatchError;
use crate::core::models::{ActionOutcome, ActionRequest, ActionVerb};
use crate::core::pm2::ProcessManager;
use crate::utils::MAX_LOG_LINES;

pub struct ActionDispatcher {
    manager: Arc<dyn ProcessManager>,
}

impl ActionDispatcher {
    pub fn new(manager: Arc<dyn ProcessManager>) -> Self {
        Self { manager }
    }

    /// Dispatch one action. Only caller input errors are returned as `Err`;
    /// manager failures become an unsuccessful outcome carrying its message.
    pub async fn dispatch(&self, request: &ActionRequest) -> Result<ActionOutcome, DispatchError> {
        let verb: ActionVerb = request.action.parse()?;
        let name = request.app_name.trim();
        if name.is_empty() {
            return Err(DispatchError::MissingTarget);
        }

        // No check that `start` targets a new name; pm2 decides what that means
        let result = match verb {
            ActionVerb::Start => self.manager.start(name).await,
            ActionVerb::Stop => self.manager.stop(name).await,
            ActionVerb::Restart => self.manager.restart(name).await,
            ActionVerb::Delete => self.manager.delete(name).await,
            ActionVerb::Logs => {
                return Ok(match self.manager.logs(name, MAX_LOG_LINES).await {
                    Ok(lines) => ActionOutcome::Logs { logs: tail(lines, MAX_LOG_LINES) },
                    Err(e) => {
                        warn!(app = name, error = %e, "log fetch failed");
                        ActionOutcome::failed(e.message())
                    }
                });
            }
        };

        Ok(match result {
            Ok(()) => {
                info!(app = name, action = %verb, "action completed");
                ActionOutcome::succeeded(format!("{} {}", verb.past_tense(), name))
            }
            Err(e) => {
                warn!(app = name, action = %verb, error = %e, "action failed");
                ActionOutcome::failed(e.message())
            }
        })
    }
}

fn tail(mut lines: Vec<String>, max: usize) -> Vec<String> {
    let excess = lines.len().saturating_sub(max);
    lines.drain(..excess);
    lines
}
