pub mod ast;
pub mod errors;
pub mod semantic;
pub mod span;
pub mod typecheck;
pub mod types;
