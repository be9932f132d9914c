//! Example grammars and a table-driven driver shared by the integration tests.

pub mod grammars;
pub mod simulate;
