//! rxc: semantic front-end for a Rust-like teaching language
//!
//! Source text goes through the lexer and parser, the father-setter pass,
//! two-phase namespace analysis, type checking (with constant evaluation)
//! and trait implementation checking. The result is the AST plus side
//! tables keyed by node id.

pub mod frontend;
pub mod semantic;
pub mod types;
pub mod utils;

use std::collections::HashMap;

use log::info;

use crate::frontend::ast::{NodeId, Program};
use crate::frontend::father::FatherMap;
use crate::frontend::parser::Parser;
use crate::semantic::{
    ConstValue, DeclIndex, NamespaceAnalysis, NamespaceAnalyzer, Resolutions, SymbolTable,
    TraitImplChecker, TypeChecker,
};
use crate::types::Type;
use crate::utils::{Diagnostic, Diagnostics, Error, ErrorMode, LineIndex};

/// Options for one compilation
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    pub mode: ErrorMode,
}

/// A successfully analyzed compilation unit
#[derive(Debug)]
pub struct Analysis {
    pub program: Program,
    pub fathers: FatherMap,
    pub table: SymbolTable,
    pub resolutions: Resolutions,
    /// Type of every expression
    pub types: HashMap<NodeId, Type>,
    /// Loop or function left by each `break`, `continue` and `return`
    pub targets: HashMap<NodeId, NodeId>,
    /// Folded constant expressions
    pub constants: HashMap<NodeId, ConstValue>,
}

impl Analysis {
    pub fn type_of(&self, node: NodeId) -> Option<&Type> {
        self.types.get(&node)
    }
}

/// Parse and analyze one source file.
///
/// Lex and parse errors abort with that single error. Semantic errors follow
/// `options.mode`: the first one in throw mode, all of them in collect mode.
pub fn check_source(source: &str, options: &CompileOptions) -> Result<Analysis, Vec<Error>> {
    let program = Parser::parse_source(source, 0).map_err(|err| vec![err])?;
    info!("parsed {} items", program.items.len());
    analyze(program, options)
}

/// Run every semantic pass over a parsed program
pub fn analyze(program: Program, options: &CompileOptions) -> Result<Analysis, Vec<Error>> {
    let fathers = FatherMap::build(&program);
    let mut diagnostics = Diagnostics::new(options.mode);

    let namespace = NamespaceAnalyzer::analyze(&program, &fathers, &mut diagnostics);
    let NamespaceAnalysis {
        mut table,
        mut resolutions,
        builtins,
    } = match namespace {
        Ok(namespace) if !diagnostics.has_errors() => namespace,
        Ok(_) => return Err(diagnostics.into_errors()),
        Err(err) => return Err(fail(diagnostics, err)),
    };

    let decls = DeclIndex::build(&program);
    let checked = TypeChecker::new(
        &decls,
        &fathers,
        &mut table,
        &mut resolutions,
        &builtins,
        &mut diagnostics,
    )
    .run(&program);
    let tables = match checked {
        Ok(tables) => tables,
        Err(err) => return Err(fail(diagnostics, err)),
    };

    let traits = TraitImplChecker::new(&decls, &table, &resolutions, &mut diagnostics).run();
    if let Err(err) = traits {
        return Err(fail(diagnostics, err));
    }
    if diagnostics.has_errors() {
        let errors = diagnostics.into_errors();
        info!("analysis failed with {} errors", errors.len());
        return Err(errors);
    }

    info!("analysis succeeded: {} typed expressions", tables.types.len());
    Ok(Analysis {
        program,
        fathers,
        table,
        resolutions,
        types: tables.types,
        targets: tables.targets,
        constants: tables.constants,
    })
}

/// Errors collected so far followed by the one that stopped the pass
fn fail(diagnostics: Diagnostics, err: Error) -> Vec<Error> {
    let mut errors = diagnostics.into_errors();
    errors.push(err);
    errors
}

/// Render errors with line and column positions
pub fn render(errors: &[Error], source: &str) -> Vec<Diagnostic> {
    let lines = LineIndex::new(source);
    errors
        .iter()
        .map(|error| Diagnostic::from_error(error, &lines))
        .collect()
}
