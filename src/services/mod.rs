//! External service wrappers and template stores

pub mod elevenlabs;
pub mod julep;
pub mod prompts;
pub mod templates;

pub use elevenlabs::ElevenLabsClient;
pub use julep::{ExecutionStatus, JulepClient, JulepExecution, JulepSession, JulepUser};
pub use prompts::{render_str, PromptStore};
pub use templates::{TaskTemplate, TaskTemplateStore};
