use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use schwa_core::{CoreError, compile};
use wasmi::{Engine, Linker, Module, Store};

/// 組み込みのサンプルプログラム (--example で使用)
const EXAMPLE_SOURCE: &str = "\
# compute the answer

fn mul(x i32, y i32) i32
    return x * y

export fn main() i32
    let a i32 = 6
    let b i32 = 7
    return mul(a, b)
";

#[derive(Parser, Debug)]
#[command(version, about = "Compiler for the schwa language", long_about = None)]
struct Cli {
    /// Source file to compile (omit with --example)
    input: Option<PathBuf>,

    #[arg(
        short,
        long,
        value_name = "PATH",
        help = "Output path (defaults to the input basename with .wasm)"
    )]
    output: Option<PathBuf>,

    #[arg(long, help = "Enable debug logging and dump the annotated tree")]
    debug: bool,

    #[arg(long, help = "Compile the built-in example program")]
    example: bool,

    #[arg(long, help = "Run the compiled module's exported main")]
    run: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.debug {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }
    execute(cli)
}

fn execute(cli: Cli) -> Result<()> {
    let source = match (&cli.input, cli.example) {
        (_, true) => EXAMPLE_SOURCE.to_string(),
        (Some(path), false) => fs::read_to_string(path)
            .with_context(|| format!("failed to read input file {}", path.display()))?,
        (None, false) => {
            return Err(anyhow::anyhow!("no input file given (or use --example)"));
        }
    };

    let output = cli.output.clone().unwrap_or_else(|| default_output(&cli));

    let artifact = match compile(&source) {
        Ok(artifact) => artifact,
        Err(CoreError::Rejected { count, diagnostics }) => {
            for diagnostic in &diagnostics {
                eprintln!("{diagnostic}");
            }
            return Err(anyhow::anyhow!("compilation failed with {count} error(s)"));
        }
        Err(other) => return Err(other.into()),
    };

    if cli.debug {
        eprintln!("{}", artifact.tree);
        eprintln!("{}", artifact.formatted);
    }

    write_output(&output, &artifact.wasm)?;
    println!("Wrote {} ({} bytes)", output.display(), artifact.wasm.len());

    if cli.run {
        let result = run_wasm(&artifact.wasm)?;
        println!("Program exited with {result}");
    }

    Ok(())
}

fn default_output(cli: &Cli) -> PathBuf {
    match &cli.input {
        Some(path) => path.with_extension("wasm"),
        None => PathBuf::from("example.wasm"),
    }
}

fn write_output(path: &PathBuf, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, bytes)
        .with_context(|| format!("failed to write output file {}", path.display()))?;
    Ok(())
}

fn run_wasm(wasm: &[u8]) -> Result<i32> {
    let engine = Engine::default();
    let module = Module::new(&engine, wasm).context("failed to load compiled module")?;
    let linker = Linker::new(&engine);
    let mut store = Store::new(&engine, ());
    let instance = linker
        .instantiate(&mut store, &module)
        .context("failed to instantiate module")?
        .start(&mut store)
        .context("failed to start module")?;
    let main = instance
        .get_typed_func::<(), i32>(&store, "main")
        .context("exported main function missing or has wrong type")?;
    let result = main.call(&mut store, ()).context("failed to execute main")?;
    Ok(result)
}
