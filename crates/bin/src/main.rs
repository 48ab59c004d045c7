//! EPO CLI binary.
//!
//! Computes Enhanced Portfolio Optimization allocations and shrunk
//! covariance matrices from a file of historical returns.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use epo::data::{ReturnsTable, parse_vector};
use epo::output::{AllocationExport, AllocationSummary, ExportFormat, Exporter};
use epo::risk::{CorrelationShrinkage, SampleMoments};
use epo::{AllocationConfig, EpoAllocator, EpoError, Method, mean_signal, uniform_anchor};
use ndarray::Array2;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "epo")]
#[command(about = "EPO: Enhanced Portfolio Optimization", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compute an allocation from historical returns
    Allocate(AllocateArgs),

    /// Show the sample and shrunk covariance matrices
    Covariance {
        /// Returns file (CSV with a symbol header row, or JSON)
        #[arg(long)]
        returns: PathBuf,

        /// Shrinkage intensity toward the identity correlation
        #[arg(long, default_value_t = 0.0)]
        shrinkage: f64,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Args)]
struct AllocateArgs {
    /// Returns file (CSV with a symbol header row, or JSON)
    #[arg(long)]
    returns: PathBuf,

    /// Expected-return signal, comma separated (default: mean historical return)
    #[arg(long, allow_hyphen_values = true)]
    signal: Option<String>,

    /// Risk aversion λ
    #[arg(long)]
    lambda: Option<f64>,

    /// Allocation method: simple or anchored
    #[arg(long)]
    method: Option<String>,

    /// Shrinkage intensity w in [0, 1]
    #[arg(long)]
    shrinkage: Option<f64>,

    /// Anchor allocation, comma separated
    #[arg(long, allow_hyphen_values = true, conflicts_with = "uniform_anchor")]
    anchor: Option<String>,

    /// Use the equal-weight portfolio as the anchor
    #[arg(long)]
    uniform_anchor: bool,

    /// Keep raw weights instead of rescaling them to sum to one
    #[arg(long)]
    no_normalize: bool,

    /// Scale the anchored signal by 1/λ instead of matching anchor risk
    #[arg(long)]
    exogenous: bool,

    /// JSON allocation config; explicit flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Portfolio name used in the output
    #[arg(long, default_value = "epo")]
    name: String,

    /// As-of date of the returns window (YYYY-MM-DD)
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Csv,
    Json,
}

fn main() {
    init_tracing();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("epo=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Allocate(args) => run_allocation(&args)?,
        Commands::Covariance {
            returns,
            shrinkage,
            format,
        } => show_covariance(&returns, shrinkage, format)?,
    }

    Ok(())
}

/// Load returns from CSV, or JSON when the file has a `.json` extension.
fn load_returns(path: &Path) -> Result<ReturnsTable, Box<dyn std::error::Error>> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let table = if is_json {
        let content = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        ReturnsTable::from_json(&value)?
    } else {
        ReturnsTable::from_csv_path(path)?
    };

    info!(
        path = %path.display(),
        assets = table.n_assets(),
        observations = table.n_observations(),
        "loaded returns"
    );
    Ok(table)
}

/// Merge the optional config file with explicit command-line flags.
fn resolve_config(args: &AllocateArgs) -> Result<AllocationConfig, EpoError> {
    let mut config = args.config.as_ref().map_or_else(
        || Ok(AllocationConfig::default()),
        AllocationConfig::from_json_file,
    )?;

    let endogenous = match config.method {
        Method::Anchored { endogenous } => endogenous && !args.exogenous,
        Method::Simple => !args.exogenous,
    };
    config.method = match (&args.method, config.method) {
        (Some(name), _) => Method::parse(name, endogenous)?,
        (None, Method::Anchored { .. }) => Method::Anchored { endogenous },
        (None, Method::Simple) => Method::Simple,
    };

    if let Some(lambda) = args.lambda {
        config.risk_aversion = lambda;
    }
    if let Some(shrinkage) = args.shrinkage {
        config.shrinkage = shrinkage;
    }
    if args.no_normalize {
        config.normalize = false;
    }

    debug!(?config, "resolved allocation config");
    Ok(config)
}

/// Allocation with its summary, ready to print.
#[derive(Debug)]
struct AllocationReport {
    export: AllocationExport,
    summary: AllocationSummary,
    risk_scale: f64,
    normalized: bool,
}

fn compute_allocation(args: &AllocateArgs) -> Result<AllocationReport, Box<dyn std::error::Error>> {
    let table = load_returns(&args.returns)?;
    let config = resolve_config(args)?;

    let signal = match &args.signal {
        Some(values) => parse_vector(values)?,
        None => mean_signal(table.returns())?,
    };
    let anchor = if args.uniform_anchor {
        Some(uniform_anchor(table.n_assets()))
    } else {
        args.anchor.as_deref().map(parse_vector).transpose()?
    };

    let allocator = EpoAllocator::new(config)?;
    let allocation = allocator.allocate(table.returns(), &signal, anchor.as_ref())?;

    let mut export = allocation.to_export(&args.name, table.symbols())?;
    if let Some(as_of) = args.as_of {
        export = export.with_as_of(as_of);
    }

    let moments = SampleMoments::from_returns(table.returns())?;
    let summary = AllocationSummary::from_export(&export, Some(&moments.covariance))?;

    Ok(AllocationReport {
        export,
        summary,
        risk_scale: allocation.risk_scale,
        normalized: allocation.normalized,
    })
}

fn run_allocation(args: &AllocateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let report = compute_allocation(args)?;

    match args.format {
        OutputFormat::Text => {
            output_allocation_text(&report.export, &report.summary, report.risk_scale);
        }
        OutputFormat::Csv => print!("{}", report.export.export_to_string(ExportFormat::Csv)?),
        OutputFormat::Json => {
            let output = json!({
                "allocation": report.export,
                "risk_scale": report.risk_scale,
                "normalized": report.normalized,
                "summary": report.summary,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn output_allocation_text(export: &AllocationExport, summary: &AllocationSummary, risk_scale: f64) {
    println!("\nEPO Allocation: {}", export.name);
    if let Some(as_of) = export.as_of {
        println!("As of: {}", as_of);
    }
    println!("{}", "=".repeat(60));
    println!("Method:      {}", export.method);
    println!("Shrinkage:   {:.4}", export.shrinkage);
    println!("Risk Scale:  {:.6}", risk_scale);
    println!("{}", "-".repeat(60));

    println!("{:<20} {:>12}", "Symbol", "Weight");
    for holding in &export.holdings {
        println!(
            "{:<20} {:>11.2}%",
            truncate(&holding.symbol, 20),
            holding.weight * 100.0
        );
    }
    println!("{}", "-".repeat(60));
    print!("{}", summary);
}

fn show_covariance(
    path: &Path,
    shrinkage: f64,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let table = load_returns(path)?;
    let shrinkage = CorrelationShrinkage::new(shrinkage)?;
    let moments = SampleMoments::from_returns(table.returns())?;
    let shrunk = shrinkage.shrunk_covariance(&moments);

    match format {
        OutputFormat::Json => {
            let output = json!({
                "symbols": table.symbols(),
                "observations": table.n_observations(),
                "shrinkage": shrinkage.intensity(),
                "sample_covariance": matrix_rows(&moments.covariance),
                "correlation": matrix_rows(&moments.correlation),
                "shrunk_covariance": matrix_rows(&shrunk),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Csv => {
            print_matrix_csv("sample", table.symbols(), &moments.covariance);
            print_matrix_csv("shrunk", table.symbols(), &shrunk);
        }
        OutputFormat::Text => {
            println!(
                "\nCovariance ({} observations, shrinkage {:.4})",
                table.n_observations(),
                shrinkage.intensity()
            );
            println!("{}", "=".repeat(60));
            print_matrix("Sample Covariance", table.symbols(), &moments.covariance);
            print_matrix("Sample Correlation", table.symbols(), &moments.correlation);
            print_matrix("Shrunk Covariance", table.symbols(), &shrunk);
        }
    }

    Ok(())
}

fn matrix_rows(matrix: &Array2<f64>) -> Vec<Vec<f64>> {
    matrix.outer_iter().map(|row| row.to_vec()).collect()
}

fn print_matrix(title: &str, symbols: &[String], matrix: &Array2<f64>) {
    println!("\n{}:", title);
    println!("{}", "-".repeat(60));

    print!("{:<12}", "");
    for symbol in symbols {
        print!("{:>12}", truncate(symbol, 10));
    }
    println!();

    for (symbol, row) in symbols.iter().zip(matrix.outer_iter()) {
        print!("{:<12}", truncate(symbol, 11));
        for value in row {
            print!("{:>12.6}", value);
        }
        println!();
    }
}

/// One CSV block per matrix: `matrix,symbol,<symbols...>`.
fn print_matrix_csv(label: &str, symbols: &[String], matrix: &Array2<f64>) {
    println!("matrix,symbol,{}", symbols.join(","));
    for (symbol, row) in symbols.iter().zip(matrix.outer_iter()) {
        let values: Vec<String> = row.iter().map(f64::to_string).collect();
        println!("{},{},{}", label, symbol, values.join(","));
    }
}

fn truncate(name: &str, width: usize) -> String {
    name.chars().take(width).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    fn allocate_args(extra: &[&str]) -> AllocateArgs {
        allocate_args_for("returns.csv", extra)
    }

    fn allocate_args_for(returns: &str, extra: &[&str]) -> AllocateArgs {
        let mut argv = vec!["epo", "allocate", "--returns", returns];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Allocate(args) => args,
            Commands::Covariance { .. } => panic!("expected allocate"),
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let config = resolve_config(&allocate_args(&[])).unwrap();
        assert_eq!(config, AllocationConfig::default());
    }

    #[rstest]
    #[case(&["--method", "anchored"], Method::Anchored { endogenous: true })]
    #[case(&["--method", "anchored", "--exogenous"], Method::Anchored { endogenous: false })]
    #[case(&["--method", "simple", "--exogenous"], Method::Simple)]
    fn test_method_flags(#[case] extra: &[&str], #[case] expected: Method) {
        let config = resolve_config(&allocate_args(extra)).unwrap();
        assert_eq!(config.method, expected);
    }

    #[test]
    fn test_flag_overrides() {
        let args = allocate_args(&[
            "--lambda",
            "10",
            "--shrinkage",
            "0.5",
            "--no-normalize",
        ]);
        let config = resolve_config(&args).unwrap();

        assert_eq!(config.risk_aversion, 10.0);
        assert_eq!(config.shrinkage, 0.5);
        assert!(!config.normalize);
    }

    #[test]
    fn test_invalid_method() {
        let args = allocate_args(&["--method", "bogus"]);
        assert!(matches!(
            resolve_config(&args),
            Err(EpoError::InvalidMethod(_))
        ));
    }

    #[test]
    fn test_anchor_flags_conflict() {
        let result = Cli::try_parse_from([
            "epo",
            "allocate",
            "--returns",
            "r.csv",
            "--anchor",
            "0.5,0.5",
            "--uniform-anchor",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_signal_values_parse() {
        let args = allocate_args(&["--signal", "-0.01,0.02"]);
        let signal = parse_vector(args.signal.as_deref().unwrap()).unwrap();
        assert_eq!(signal.to_vec(), vec![-0.01, 0.02]);
    }

    /// 30 days of returns for three assets with a symbol header
    fn write_returns_csv(dir: &tempfile::TempDir) -> PathBuf {
        let mut content = String::from("SPY,TLT,GLD\n");
        for t in 0..30 {
            let x = t as f64;
            content.push_str(&format!(
                "{},{},{}\n",
                0.001 + 0.010 * (x * 0.7).sin(),
                0.0005 + 0.006 * (x * 1.3).cos(),
                0.0008 + 0.008 * (x * 0.4 + 1.0).sin()
            ));
        }
        let path = dir.path().join("returns.csv");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[rstest]
    #[case(&["--shrinkage", "0.5"])]
    #[case(&["--method", "anchored", "--uniform-anchor", "--shrinkage", "0.25"])]
    #[case(&["--method", "anchored", "--uniform-anchor", "--exogenous", "--lambda", "10"])]
    fn test_compute_allocation_from_csv(#[case] extra: &[&str]) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_returns_csv(&dir);
        let args = allocate_args_for(path.to_str().unwrap(), extra);

        let report = compute_allocation(&args).unwrap();

        let symbols: Vec<&str> = report
            .export
            .holdings
            .iter()
            .map(|h| h.symbol.as_str())
            .collect();
        assert_eq!(symbols, vec!["SPY", "TLT", "GLD"]);
        assert!(report.normalized);
        assert!((report.export.total_weight() - 1.0).abs() < 1e-10);
        assert_eq!(report.summary.n_assets, 3);
        assert!((report.summary.net_weight - 1.0).abs() < 1e-10);

        let vol = report.summary.ex_ante_volatility.unwrap();
        assert!(vol.is_finite() && vol > 0.0);
    }

    #[test]
    fn test_compute_allocation_missing_anchor() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_returns_csv(&dir);
        let args = allocate_args_for(path.to_str().unwrap(), &["--method", "anchored"]);

        let err = compute_allocation(&args).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EpoError>(),
            Some(EpoError::MissingAnchor)
        ));
    }

    #[test]
    fn test_compute_allocation_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("missing.csv");
        let args = allocate_args_for(missing.to_str().unwrap(), &[]);
        assert!(compute_allocation(&args).is_err());
    }

    #[rstest]
    #[case(OutputFormat::Text)]
    #[case(OutputFormat::Csv)]
    #[case(OutputFormat::Json)]
    fn test_show_covariance_from_csv(#[case] format: OutputFormat) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_returns_csv(&dir);
        assert!(show_covariance(&path, 0.5, format).is_ok());
        assert!(show_covariance(&path, 1.5, format).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("ABCDEFGHIJKL", 4), "ABCD");
        assert_eq!(truncate("AB", 4), "AB");
    }
}
