pub mod attachments;
pub mod builtin_providers;
pub mod chat_stream;
pub mod config;
pub mod conversation;
pub mod credentials;
pub mod human_input;
pub mod inline;
pub mod message;
pub mod pipeline;
pub mod profile;
pub mod settings;
pub mod tools;
