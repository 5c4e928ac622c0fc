pub mod abi;
pub mod format;
pub mod inst;
pub mod machine;
pub mod op;
pub mod reg;
