pub mod broadcaster;
pub mod ds;
pub mod eval;
pub mod host;
pub mod plugin;
pub mod processor;
pub mod std_lib;
