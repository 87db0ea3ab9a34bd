//! Turn orchestration: the single entry point tying retrieval, tool
//! execution, assembly, completion, persistence, and compression together.

pub mod orchestrator;

use engram_types::error::CompletionFailure;
use engram_types::tool::ToolCall;
use uuid::Uuid;

pub use orchestrator::{TurnOrchestrator, TurnOutcome};

/// Port for the chat completion model answering a turn.
pub trait ChatModel: Send + Sync {
    /// Produce the assistant response given the assembled context payload
    /// and the raw user text.
    fn complete(
        &self,
        context: &str,
        user_text: &str,
    ) -> impl Future<Output = Result<String, CompletionFailure>> + Send;
}

/// Port for tool execution, owned by the surrounding application.
///
/// Execution is best-effort: implementations report failures as calls
/// with `result: None` rather than erroring, and the orchestrator applies
/// its own deadline on top.
pub trait ToolExecutor: Send + Sync {
    fn execute(
        &self,
        session_id: Uuid,
        user_text: &str,
    ) -> impl Future<Output = Vec<ToolCall>> + Send;
}

/// Tool executor for deployments without tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTools;

impl ToolExecutor for NoTools {
    async fn execute(&self, _session_id: Uuid, _user_text: &str) -> Vec<ToolCall> {
        Vec::new()
    }
}
