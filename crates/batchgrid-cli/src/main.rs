use clap::{Parser, Subcommand};

mod commands;

use commands::compile::OutputFormat;

#[derive(Parser)]
#[command(
    name = "batchgrid",
    about = "batchgrid: run service functions as batch container jobs",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile batch-annotated functions into template resources.
    ///
    /// Writes resources.json, functions.json, and one submit-job bundle per
    /// annotated function under the output directory.
    Compile {
        /// Service description
        #[arg(short, long, default_value = "batchgrid.toml")]
        config: String,
        /// Output directory
        #[arg(short, long, default_value = ".batchgrid")]
        out: String,
        /// Existing template to merge the resources into (writes template.json)
        #[arg(long)]
        template: Option<String>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Pin the compute environment name suffix for reproducible output
        #[arg(long)]
        pool_suffix: Option<u32>,
    },
    /// Validate the service description without producing anything
    Validate {
        #[arg(short, long, default_value = "batchgrid.toml")]
        config: String,
    },
    /// Render the job image build file
    Dockerfile {
        #[arg(short, long, default_value = "batchgrid.toml")]
        config: String,
        /// Write the build file and its support files into this directory
        /// instead of printing the build file
        #[arg(short, long)]
        out: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "batchgrid=debug" } else { "batchgrid=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(level.parse()?)
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Compile {
            config,
            out,
            template,
            format,
            pool_suffix,
        } => commands::compile::compile(&commands::compile::CompileArgs {
            config,
            out,
            template,
            format,
            pool_suffix,
        }),
        Commands::Validate { config } => commands::validate::validate(&config),
        Commands::Dockerfile { config, out } => {
            commands::dockerfile::dockerfile(&config, out.as_deref())
        }
    }
}
