//! Dynbind - Typed Bindings to Native Modules
//!
//! CLI entry point for probing modules: resolving exported names, checking
//! interface manifests against a module, and listing its exports.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dynbind::{
    BindPolicy, DynbindConfig, InterfaceManifest, Module, ObjectSymbolProvider, Symbol,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dynbind")]
#[command(version)]
#[command(about = "Typed bindings to functions exported by native modules", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: dynbind.toml in this or a parent directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check an interface manifest against a module
    Check {
        /// Module name or path
        module: String,

        /// Interface manifest (TOML)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Fail when any symbol is absent
        #[arg(long)]
        strict: bool,
    },

    /// Resolve exported names and print their addresses
    Resolve {
        /// Module name or path
        module: String,

        /// Exported names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// List a module's exported symbols
    Symbols {
        /// Module name or path
        module: String,

        /// Glob applied to symbol names
        #[arg(short, long)]
        mask: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DynbindConfig::load(path).context("Failed to load config")?,
        None => DynbindConfig::load_from_cwd().context("Failed to load config")?,
    };
    init_logging(cli.verbose, &config);

    match cli.command {
        Commands::Check {
            module,
            manifest,
            strict,
        } => cmd_check(&config, &module, &manifest, strict),
        Commands::Resolve { module, names } => cmd_resolve(&config, &module, &names),
        Commands::Symbols { module, mask } => cmd_symbols(&config, &module, mask.as_deref()),
    }
}

fn init_logging(verbose: bool, config: &DynbindConfig) {
    let filter = if verbose {
        EnvFilter::new("dynbind=debug")
    } else if let Some(directive) = &config.log.filter {
        EnvFilter::new(directive)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dynbind=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn load_module(config: &DynbindConfig, name: &str) -> Result<Module> {
    // Safety: loading a module runs its initialisers; the user asked for
    // this module by name.
    let module = unsafe { config.locator().load(name) }
        .with_context(|| format!("Failed to load module '{}'", name))?;
    tracing::info!(module = %module.path().display(), "loaded");
    Ok(module)
}

fn cmd_resolve(config: &DynbindConfig, module: &str, names: &[String]) -> Result<()> {
    let module = load_module(config, module)?;

    let width = names.iter().map(String::len).max().unwrap_or(0);
    for name in names {
        match module.resolve_address(name) {
            Some(address) => println!("{:width$}  {}", name, address, width = width),
            None => println!("{:width$}  absent", name, width = width),
        }
    }

    module.close().context("Failed to unload module")?;
    Ok(())
}

fn cmd_check(
    config: &DynbindConfig,
    module: &str,
    manifest_path: &PathBuf,
    strict: bool,
) -> Result<()> {
    let manifest = InterfaceManifest::load(manifest_path)
        .with_context(|| format!("Failed to read manifest {}", manifest_path.display()))?;
    let descriptor = manifest.to_descriptor().context("Invalid manifest")?;
    let policy = if strict {
        BindPolicy::Strict
    } else {
        config.binding.policy
    };

    let module = load_module(config, module)?;
    // Resolve leniently so every entry can be reported, then apply the policy.
    let resolved = descriptor
        .resolve(&module, BindPolicy::Lenient)
        .context("Failed to resolve interface")?;

    println!("Interface {} ({} entries)", resolved.name(), resolved.len());
    for binding in resolved.iter() {
        let status = match binding.address {
            Some(address) => address.to_string(),
            None => "absent".to_string(),
        };
        println!(
            "  {:<20} {:<20} {:<40} {}",
            binding.field,
            binding.symbol,
            binding.signature.to_string(),
            status
        );
    }

    let missing: Vec<String> = resolved.missing().into_iter().map(String::from).collect();
    println!(
        "{} resolved, {} absent",
        resolved.len() - missing.len(),
        missing.len()
    );
    policy.enforce(resolved.name(), missing)?;
    Ok(())
}

fn cmd_symbols(config: &DynbindConfig, module: &str, mask: Option<&str>) -> Result<()> {
    let mut module = load_module(config, module)?;
    let mask = mask.unwrap_or(&config.symbols.mask);

    let table = module
        .enumerate_symbols(&ObjectSymbolProvider, mask)
        .context("Failed to enumerate symbols")?;

    let mut symbols: Vec<&Symbol> = table.values().collect();
    symbols.sort_by(|a, b| {
        a.record
            .address
            .cmp(&b.record.address)
            .then_with(|| a.name.cmp(&b.name))
    });

    for symbol in &symbols {
        println!(
            "{:#018x} {:>8} {:<8} {}",
            symbol.record.address,
            symbol.estimated_size,
            format!("{:?}", symbol.record.kind),
            symbol.name
        );
    }
    println!("{} symbols", symbols.len());
    Ok(())
}
