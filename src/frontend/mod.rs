//! Frontend module - Lexer, Parser, AST and parent links

pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod father;
