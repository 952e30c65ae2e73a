// stylist-service-rs/src/lib.rs
// Wardrobe stylist chat service: stage functions, wardrobe client, the
// request pipeline and its HTTP surface.

pub mod pipeline;
pub mod prompts;
pub mod server;
pub mod stages;
pub mod wardrobe;

#[cfg(test)]
mod tests {
    pub mod pipeline_tests;
    pub mod router_tests;
}

pub use pipeline::{PipelineError, PipelineState, StylistPipeline};
pub use server::create_router;
pub use stages::{StageSettings, Stages};
pub use wardrobe::{HttpWardrobeClient, WardrobeClientConfig, WardrobeError, WardrobeSource};
