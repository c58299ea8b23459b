//! Business services for vtc-sa

pub mod access;
pub mod analysis_provider;
pub mod analysis_queue;
pub mod conversation_provider;
pub mod demo_cache;
pub mod lifecycle;
pub mod mock_analysis;
pub mod orchestrator;
pub mod session_reader;

pub use access::{Caller, Credentials};
pub use analysis_provider::{AnalysisProvider, ChatCompletionsProvider, ProviderError};
pub use analysis_queue::{AnalysisJob, AnalysisQueue, JobOutcome};
pub use conversation_provider::{ConversationProvider, HttpConversationProvider};
pub use demo_cache::{DemoCache, SharedDemoCache};
pub use lifecycle::SessionLifecycle;
pub use orchestrator::{AnalysisOrchestrator, OrchestratorSettings};
pub use session_reader::SessionReader;
