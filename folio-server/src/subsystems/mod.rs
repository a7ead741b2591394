pub mod answer;
pub mod index;
pub mod interaction;
pub mod knowledge;
pub mod moderation;
pub mod rag;
pub mod sanitize;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;
