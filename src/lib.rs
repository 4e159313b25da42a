//! ai-hub library crate.
//!
//! One client for several hosted media backends: video generation through
//! queue, form-upload, long-running-operation and search providers, a
//! script writer with a single fallback hop, Gemini image generation and a
//! streaming assistant chat.

pub mod chat;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod gemini;
pub mod generation;
pub mod image;
pub mod media;
pub mod poller;
pub mod providers;
pub mod transport;

pub use chat::{ChatClient, ChatStream};
pub use config::{Config, ConfigError};
pub use credentials::{Credentials, FileKeyStore, KeyStore, MemoryKeyStore, Service};
pub use dispatch::Dispatcher;
pub use error::GenerationError;
pub use generation::{ChatTurn, Engine, GenerationRequest, GenerationResult, JobHandle, ResultKind};
pub use image::ImageGenerator;
pub use poller::{PollPolicy, RecordingSleeper, Sleeper, TokioSleeper};
