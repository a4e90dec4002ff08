//! Translation between the OpenAI API and the agent service's session protocol.
//!
//! Everything here except [`streaming::emulate`] is pure; the orchestration
//! lives in [`crate::proxy`] and [`crate::providers`].

pub mod backend_types;
pub mod files;
pub mod openai_types;
pub mod request;
pub mod response;
pub mod streaming;
