use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Single-host Docker redeploy pipeline
#[derive(Parser, Debug)]
#[command(
    name = "drydock",
    about = "Single-host Docker redeploy pipeline: build, containerize, deploy, verify, clean up",
    version,
    author,
    long_about = "drydock builds a service artifact, wraps it into a tagged Docker image, \
                  replaces the running instance with one started from that image, verifies \
                  the deployment with an HTTP probe, and reclaims superseded images. \
                  Re-running over an existing instance is always safe: the prior instance \
                  is stopped and removed first."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'c',
        long,
        global = true,
        value_name = "FILE",
        help = "Config file path (defaults to ./drydock.toml when present)"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(
        short = 'v',
        long,
        global = true,
        help = "Increase verbosity (can be used multiple times)"
    )]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Run the full pipeline: build, image, deploy, verify, cleanup",
        long_about = "Runs every stage in order, gating each on the previous one. Fatal \
                      errors abort the run with a non-zero exit code; a failed health \
                      probe downgrades the run to degraded success and keeps exit code 0.\n\n\
                      Examples:\n  \
                      drydock run\n  \
                      drydock run --image svc:1.0 --host-port 9090\n  \
                      drydock run --env SPRING_PROFILES_ACTIVE=prod"
    )]
    Run(RunArgs),

    #[command(
        about = "Build and verify the artifact only",
        long_about = "Runs the configured build command and verifies that exactly one \
                      non-empty artifact exists.\n\n\
                      Examples:\n  \
                      drydock build\n  \
                      drydock build --workdir /srv/estore --format json"
    )]
    Build(BuildArgs),

    #[command(
        about = "Build a tagged image from an existing artifact",
        long_about = "Resolves the artifact glob (which must match exactly one file) and \
                      builds a tagged image from it, replacing any prior image with the \
                      same tag.\n\n\
                      Examples:\n  \
                      drydock image\n  \
                      drydock image --artifact 'target/*.jar' --tag svc:1.0"
    )]
    Image(ImageArgs),

    #[command(
        about = "Replace the running instance with one from an image",
        long_about = "Stops and removes any instance holding the name (tolerating \
                      already-stopped and already-removed), then starts a new detached \
                      instance with the port binding.\n\n\
                      Examples:\n  \
                      drydock deploy\n  \
                      drydock deploy --instance svc --image svc:1.0 --host-port 9090 --container-port 9090"
    )]
    Deploy(DeployArgs),

    #[command(
        about = "Reclaim superseded images and build outputs",
        long_about = "Removes images in the pipeline's repository that neither back the \
                      running instance nor carry the configured tag, and prunes \
                      superseded build outputs. Failures are reported as warnings and \
                      never change the exit code.\n\n\
                      Examples:\n  \
                      drydock cleanup"
    )]
    Cleanup(CleanupArgs),

    #[command(
        about = "Show the most recent deployment record",
        long_about = "Prints the persisted record of the last pipeline run.\n\n\
                      Examples:\n  \
                      drydock status\n  \
                      drydock status --format json"
    )]
    Status(StatusArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, value_name = "NAME", help = "Instance name to (re)deploy")]
    pub instance: Option<String>,

    #[arg(long, value_name = "NAME:TAG", help = "Image reference to build and deploy")]
    pub image: Option<String>,

    #[arg(long, value_name = "PORT", help = "Host port to bind")]
    pub host_port: Option<u16>,

    #[arg(long, value_name = "PORT", help = "Service port inside the container")]
    pub container_port: Option<u16>,

    #[arg(
        long,
        value_name = "SECONDS",
        help = "Seconds to wait before the health probe"
    )]
    pub grace_period: Option<u64>,

    #[arg(long, value_name = "DIR", help = "Source tree to build")]
    pub workdir: Option<PathBuf>,

    #[arg(
        short = 'e',
        long = "env",
        value_name = "KEY=VALUE",
        help = "Environment override passed at instance start (repeatable)"
    )]
    pub env: Vec<String>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    #[arg(long, value_name = "DIR", help = "Source tree to build")]
    pub workdir: Option<PathBuf>,

    #[arg(long, value_name = "GLOB", help = "Glob selecting the built artifact")]
    pub artifact_glob: Option<String>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct ImageArgs {
    #[arg(
        long,
        value_name = "GLOB",
        help = "Artifact glob; must resolve to exactly one file"
    )]
    pub artifact: Option<String>,

    #[arg(short = 't', long, value_name = "NAME:TAG", help = "Tag for the image")]
    pub tag: Option<String>,

    #[arg(long, value_name = "IMAGE", help = "Base image for the runtime layer")]
    pub base_image: Option<String>,

    #[arg(long, value_name = "DIR", help = "Directory the artifact glob resolves in")]
    pub workdir: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct DeployArgs {
    #[arg(long, value_name = "NAME", help = "Instance name to (re)deploy")]
    pub instance: Option<String>,

    #[arg(long, value_name = "NAME:TAG", help = "Image reference to start from")]
    pub image: Option<String>,

    #[arg(long, value_name = "PORT", help = "Host port to bind")]
    pub host_port: Option<u16>,

    #[arg(long, value_name = "PORT", help = "Service port inside the container")]
    pub container_port: Option<u16>,

    #[arg(
        short = 'e',
        long = "env",
        value_name = "KEY=VALUE",
        help = "Environment override passed at instance start (repeatable)"
    )]
    pub env: Vec<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct CleanupArgs {}

#[derive(Parser, Debug, Clone)]
pub struct StatusArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}
