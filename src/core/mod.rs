// Core modules implementing path expansion, staging, fetching, and the array model.
pub mod array;
pub mod error;
pub mod fetch;
pub mod inputs;
pub mod paths;
pub mod resolve;
pub mod stage;
