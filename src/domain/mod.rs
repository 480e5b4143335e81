//! Core domain types and logic.

pub mod error;
pub mod value;
pub mod int_math;
pub mod casting;
pub mod lexer;
pub mod preprocess;
pub mod ast;
pub mod parser;
pub mod signatures;
pub mod semantics;
pub mod runtime;
pub mod expression;
pub mod statements;
pub mod builtins;
pub mod market;
pub mod broker;
pub mod account;
pub mod terminal;
pub mod indicator;
pub mod chart;
pub mod metrics;
pub mod backtest;
