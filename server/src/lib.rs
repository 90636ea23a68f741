// The rag-server crate answers questions over HTTP:
// - Context assembly from retrieved records
// - Prompt composition
// - Per-request pipeline orchestration and answer streaming
// - axum HTTP surface used by the rag-daemon binary

pub mod context;
pub mod http_server;
pub mod pipeline;
pub mod prompt;

pub use context::assemble;
pub use pipeline::{AnswerStream, PipelineSettings, RagPipeline, Stage, StageError, StreamOutcome};
pub use prompt::compose;
