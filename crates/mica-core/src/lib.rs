pub mod body;
pub mod env;
pub mod error;
pub mod value;

pub use body::{BinaryOp, Expr, Literal, LogicalOp, Stmt, UnaryOp};
pub use env::Env;
pub use error::MicaError;
pub use value::{BoundMethod, Builtin, Class, Function, Globals, Instance, Value};
