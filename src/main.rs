use clap::{Parser, Subcommand};
use srcdoc::config::{self, Project};
use srcdoc::process::{self, BuildError, BuildOptions};
use srcdoc::tools::CommandTools;
use srcdoc::{output, scan};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("SRCDOC_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("SRCDOC_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "srcdoc")]
#[command(about = "Documentation site generator for research code repositories")]
#[command(long_about = "\
Documentation site generator for research code repositories

Every source file becomes a page under docs/, each source directory gets an
index, and the README becomes the home page. C sources go through the literate
converter, Python docstrings become prose, notebooks are rendered with a
download link, and shell scripts and Makefiles are shown as code.

Repository structure:

  repo/
  ├── srcdoc.toml                  # Optional config (see gen-config)
  ├── README.md                    # Home page; first plain code block is a tree
  ├── CNAME                        # Public domain for the sitemap
  ├── run.sh                       # Root-level scripts are documented too
  ├── src-local/                   # Local headers, target of include links
  ├── simulationCases/             # Source directory → simulationCases/index.html
  │   ├── drop.c                   # → docs/simulationCases/drop.c.html
  │   └── analysis.ipynb           # Copied next to its page for download
  ├── .github/assets/
  │   └── custom_template.html     # Page template
  └── docs/                        # Output (pages, indexes, sitemap.xml)

Requires pandoc and awk on PATH, plus the literate-c converter and
decl_anchors.awk from a Basilisk checkout.

Run 'srcdoc gen-config' to generate a documented srcdoc.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Repository root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file (defaults to srcdoc.toml in the repository root)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the documentation site
    Build {
        /// Delete every generated page and regenerate all of them
        #[arg(long)]
        force_rebuild: bool,
    },
    /// List the sources that would be documented
    Scan,
    /// Verify tools and files a build needs, without building
    Check,
    /// Print a stock srcdoc.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match cli.command {
        Command::Build { force_rebuild } => {
            let project = Project::load(&cli.root, cli.config.as_deref())?;
            let tools = CommandTools::from_project(&project);
            let missing = tools.missing_binaries();
            if !missing.is_empty() {
                return Err(BuildError::MissingPrerequisite(format!(
                    "not found on PATH: {}",
                    missing.join(", ")
                ))
                .into());
            }

            println!("==> Building {}", project.docs_dir().display());
            init_thread_pool(&project.config.processing);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = process::build(&project, &tools, BuildOptions { force_rebuild }, Some(tx));
            printer.join().ok();
            let summary = result?;

            output::print_build_summary(&summary, &project.docs_dir());
            println!("==> Build complete: {}", project.docs_dir().display());
        }
        Command::Scan => {
            let project = Project::load(&cli.root, cli.config.as_deref())?;
            let files = scan::scan(&project.root, &project.config.source_dirs)?;
            output::print_scan_output(&files);
        }
        Command::Check => {
            let project = Project::load(&cli.root, cli.config.as_deref())?;
            println!("==> Checking {}", project.root.display());

            let mut problems: Vec<String> = CommandTools::from_project(&project)
                .missing_binaries()
                .into_iter()
                .map(|bin| format!("{bin} not found on PATH"))
                .collect();
            if let Err(e) = process::check_prerequisites(&project) {
                problems.push(e.to_string());
            }
            output::print_check_output(&problems);

            let files = scan::scan(&project.root, &project.config.source_dirs)?;
            output::print_scan_output(&files);
            if !problems.is_empty() {
                return Err(format!("{} prerequisite(s) missing", problems.len()).into());
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// `--debug` wins over `RUST_LOG`; otherwise `RUST_LOG`, falling back to info.
fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
