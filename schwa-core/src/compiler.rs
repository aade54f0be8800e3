//! Compiler pipeline orchestration.
//!
//! Stages run strictly in order: lex, parse, validate, analyze,
//! format, generate. All of them report through one diagnostics log;
//! after every stage the orchestrator checks the error count and halts
//! on the first stage that recorded an error, so no later stage ever
//! sees a broken intermediate product and no partial artifact escapes.

use log::debug;

use crate::analyzer;
use crate::diagnostic::DiagnosticLog;
use crate::error::CoreError;
use crate::formatter;
use crate::generator;
use crate::lexer;
use crate::parser;
use crate::validator;

/// Everything a successful compilation produces.
#[derive(Debug, PartialEq, Eq)]
pub struct CompilationArtifact {
    /// The finished module bytes.
    pub wasm: Vec<u8>,
    /// Canonical source rendering (the Format stage's side artifact).
    pub formatted: String,
    /// Diagnostic dump of the annotated tree.
    pub tree: String,
}

/// Compiles schwa source to a module.
///
/// Each invocation owns a private diagnostics log; on failure the log's
/// entries are handed back inside [`CoreError::Rejected`].
pub fn compile(source: &str) -> Result<CompilationArtifact, CoreError> {
    let mut log = DiagnosticLog::new();
    compile_with_log(source, &mut log)
}

/// Compiles with a caller-supplied log. The log is cleared on entry;
/// it holds this compilation's diagnostics only.
pub fn compile_with_log(
    source: &str,
    log: &mut DiagnosticLog,
) -> Result<CompilationArtifact, CoreError> {
    log.clear();

    debug!("lexing {} bytes", source.len());
    let tokens = lexer::scan(source, log);
    check_stage(log)?;

    debug!("parsing {} tokens", tokens.len());
    let mut ast = parser::parse(&tokens, log);
    check_stage(log)?;

    debug!("validating {} nodes", ast.len());
    validator::validate(&mut ast, log);
    check_stage(log)?;

    debug!("analyzing");
    let table = analyzer::analyze(&mut ast, log);
    check_stage(log)?;

    debug!("formatting");
    let formatted = formatter::format(&ast);
    check_stage(log)?;

    debug!("generating");
    let wasm = generator::generate(&mut ast, &table, log);
    check_stage(log)?;

    let tree = ast
        .root()
        .map(|root| ast.render(root, 0))
        .unwrap_or_default();

    debug!("emitted {} bytes", wasm.len());
    Ok(CompilationArtifact {
        wasm,
        formatted,
        tree,
    })
}

/// The fail-fast gate run between stages.
fn check_stage(log: &DiagnosticLog) -> Result<(), CoreError> {
    if log.has_errors() {
        return Err(CoreError::Rejected {
            count: log.error_count(),
            diagnostics: log.entries().to_vec(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{Diagnostic, DiagnosticLog};
    use crate::token::Pos;
    use wasmparser::Parser;

    fn run_main(wasm: &[u8]) -> i32 {
        let engine = wasmi::Engine::default();
        let module = wasmi::Module::new(&engine, wasm).expect("module");
        let linker = wasmi::Linker::new(&engine);
        let mut store = wasmi::Store::new(&engine, ());
        let instance = linker
            .instantiate_and_start(&mut store, &module)
            .expect("instantiate");
        let main = instance
            .get_typed_func::<(), i32>(&store, "main")
            .expect("typed func");
        main.call(&mut store, ()).expect("execute main")
    }

    #[test]
    fn builds_a_parseable_module() {
        let artifact =
            compile("export fn main() i32\n    return 6 * 7\n").expect("compile should succeed");
        let mut parser = Parser::new(0);
        let payload = parser
            .parse(artifact.wasm.as_slice(), true)
            .expect("payload");
        assert!(matches!(payload, wasmparser::Chunk::Parsed { .. }));
    }

    #[test]
    fn executes_arithmetic() {
        let artifact =
            compile("export fn main() i32\n    return 4 + (10 - 3) * 2\n").expect("compile");
        assert_eq!(run_main(&artifact.wasm), 18);
    }

    #[test]
    fn executes_locals_calls_and_globals() {
        let source = "\
let base i32 = 40

fn offset(x i32) i32
    return x + 2

export fn main() i32
    let amount i32 = offset(0)
    return base + amount
";
        let artifact = compile(source).expect("compile");
        assert_eq!(run_main(&artifact.wasm), 42);
    }

    #[test]
    fn executes_unary_negation_and_hex() {
        let artifact =
            compile("export fn main() i32\n    return -(1 + 2) * -0xe\n").expect("compile");
        assert_eq!(run_main(&artifact.wasm), 42);
    }

    #[test]
    fn executes_wider_numeric_types() {
        let artifact = compile(
            "export fn main() i64\n    let big i64 = 4294967296\n    return big + 6\n",
        )
        .expect("compile");
        let engine = wasmi::Engine::default();
        let module = wasmi::Module::new(&engine, &artifact.wasm).expect("module");
        let linker = wasmi::Linker::new(&engine);
        let mut store = wasmi::Store::new(&engine, ());
        let instance = linker
            .instantiate_and_start(&mut store, &module)
            .expect("instantiate");
        let main = instance
            .get_typed_func::<(), i64>(&store, "main")
            .expect("typed func");
        assert_eq!(main.call(&mut store, ()).expect("execute"), 4_294_967_302);

        let artifact =
            compile("export fn main() f64\n    return 1.5 * 4.0\n").expect("compile");
        let module = wasmi::Module::new(&engine, &artifact.wasm).expect("module");
        let mut store = wasmi::Store::new(&engine, ());
        let instance = linker
            .instantiate_and_start(&mut store, &module)
            .expect("instantiate");
        let main = instance
            .get_typed_func::<(), f64>(&store, "main")
            .expect("typed func");
        assert_eq!(main.call(&mut store, ()).expect("execute"), 6.0);
    }

    #[test]
    fn executes_control_flow() {
        let source = "\
export fn main() i32
    let total i32 = 0
    let n i32 = 1
    while n <= 10
        total = total + n
        n = n + 1
    if total > 50
        return total
    else
        return 0
";
        let artifact = compile(source).expect("compile");
        assert_eq!(run_main(&artifact.wasm), 55);
    }

    #[test]
    fn executes_struct_field_access() {
        let source = "\
struct Point
    x i32
    y i32

let origin Point

export fn main() i32
    origin.x = 6
    origin.y = 7
    return origin.x * origin.y
";
        let artifact = compile(source).expect("compile");
        assert_eq!(run_main(&artifact.wasm), 42);
    }

    #[test]
    fn links_imported_functions() {
        let source = "\
import fn bump(i32) i32

export fn main() i32
    return bump(41)
";
        let artifact = compile(source).expect("compile");

        let engine = wasmi::Engine::default();
        let module = wasmi::Module::new(&engine, &artifact.wasm).expect("module");
        let mut linker = wasmi::Linker::new(&engine);
        linker
            .func_wrap("env", "bump", |value: i32| -> i32 { value + 1 })
            .expect("link import");
        let mut store = wasmi::Store::new(&engine, ());
        let instance = linker
            .instantiate_and_start(&mut store, &module)
            .expect("instantiate");
        let main = instance
            .get_typed_func::<(), i32>(&store, "main")
            .expect("typed func");
        assert_eq!(main.call(&mut store, ()).expect("execute"), 42);
    }

    #[test]
    fn carries_formatted_source_and_tree() {
        let artifact = compile("export fn main() i32\n    return 1+2\n").expect("compile");
        assert_eq!(
            artifact.formatted,
            "export fn main() i32\n    return 1 + 2\n"
        );
        assert!(artifact.tree.starts_with("program"));
        assert!(artifact.tree.contains("function (identifier \"main\")"));
    }

    #[test]
    fn rejects_with_collected_diagnostics() {
        let err = compile("export fn main() i32\n    return missing\n").unwrap_err();
        match err {
            CoreError::Rejected { count, diagnostics } => {
                assert_eq!(count, 1);
                assert_eq!(diagnostics[0].code, Some("E0301"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn an_error_logged_before_a_stage_stops_the_pipeline() {
        let mut log = DiagnosticLog::new();
        log.push(Diagnostic::error("boom", Pos { row: 1, column: 1 }));
        // The gate refuses to continue once an error is present.
        assert!(check_stage(&log).is_err());

        log.clear();
        assert!(check_stage(&log).is_ok());
    }

    #[test]
    fn failed_compilations_produce_no_artifact() {
        // The analyzer rejects this; format and generate must not run,
        // so the error carries only the analyzer's diagnostics and no
        // module bytes exist anywhere in the result.
        let result = compile("export fn main() i32\n    return 1 + nope\n");
        let err = result.unwrap_err();
        assert!(matches!(err, CoreError::Rejected { .. }));
        assert!(
            err.diagnostics().iter().all(|d| d.code != Some("E0401")),
            "generation stage must never have run"
        );
    }

    #[test]
    fn clears_the_log_between_compilations() {
        let mut log = DiagnosticLog::new();
        assert!(compile_with_log("export fn main() i32\n    return x\n", &mut log).is_err());
        assert!(log.has_errors());

        let artifact = compile_with_log("export fn main() i32\n    return 3\n", &mut log)
            .expect("second compile");
        assert!(log.is_empty());
        assert_eq!(run_main(&artifact.wasm), 3);
    }
}
