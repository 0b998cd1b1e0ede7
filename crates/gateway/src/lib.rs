pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod selector;
pub mod state;
pub mod tokens;
