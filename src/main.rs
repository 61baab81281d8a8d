use drydock::cli::commands::{CliArgs, Commands};
use drydock::cli::handlers::{
    handle_build, handle_cleanup, handle_deploy, handle_image, handle_run, handle_status,
};
use drydock::VERSION;

use clap::Parser;
use std::env;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("drydock v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let config_path = args.config.as_deref();
    let exit_code = match &args.command {
        Commands::Run(run_args) => handle_run(run_args, config_path).await,
        Commands::Build(build_args) => handle_build(build_args, config_path).await,
        Commands::Image(image_args) => handle_image(image_args, config_path).await,
        Commands::Deploy(deploy_args) => handle_deploy(deploy_args, config_path).await,
        Commands::Cleanup(cleanup_args) => handle_cleanup(cleanup_args, config_path).await,
        Commands::Status(status_args) => handle_status(status_args, config_path).await,
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let level = if let Some(level_str) = &args.log_level {
            parse_level(level_str)
        } else if args.verbose {
            Level::DEBUG
        } else if args.quiet {
            Level::ERROR
        } else {
            let level_str = env::var("DRYDOCK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
            parse_level(&level_str)
        };

        let mut filter = EnvFilter::from_default_env();

        if env::var("RUST_LOG").is_err() {
            filter = filter
                .add_directive(format!("drydock={}", level).parse().unwrap())
                .add_directive("hyper=warn".parse().unwrap())
                .add_directive("reqwest=warn".parse().unwrap())
                .add_directive("bollard=warn".parse().unwrap());
        }

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    });
}

fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}
