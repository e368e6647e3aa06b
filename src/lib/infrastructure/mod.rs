//! External services the chatbot talks to.

pub mod model;
