pub mod chat;
pub mod styling;
pub mod wardrobe;

pub use chat::{
    ChatRequest, ChatResponse, DebugPayload, HistoryMessage, Intent, Role, StageTiming,
    ValidationError,
};
pub use styling::{
    BodyTypeResult, ColorResult, FinalResponse, IntentClassification, Outfit, ReasoningSummary,
    SilhouetteResult,
};
pub use wardrobe::{WardrobeContext, WardrobeItem};
