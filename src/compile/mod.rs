//! Compilers that translate an AMEL AST into a target query language
//! instead of evaluating it directly (spec §4.9, §4.10).

pub mod docquery;
pub mod sql;
