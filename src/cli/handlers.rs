//! Subcommand handlers, each returning the process exit code
//!
//! Exit code policy: non-zero only for fatal errors. Degraded success and
//! cleanup warnings are surfaced in the rendered output, not the exit code.

use super::commands::{BuildArgs, CleanupArgs, DeployArgs, ImageArgs, RunArgs, StatusArgs};
use super::output::{self, OutputFormat};
use crate::artifact::{select_artifact, ArtifactBuilder};
use crate::cleanup::{ArtifactPrune, CleanupAgent};
use crate::config::DrydockConfig;
use crate::image::{ImageBuilder, ImageSpec};
use crate::pipeline::{PipelineOrchestrator, RecordStore};
use crate::progress::LoggingHandler;
use crate::runtime::{DockerEngine, InstanceSpec, Supervisor};
use std::path::Path;

fn load_config(config_path: Option<&Path>) -> Result<DrydockConfig, i32> {
    let config = DrydockConfig::load(config_path).map_err(|e| {
        eprintln!("Error: {}", e);
        1
    })?;
    config.validate().map_err(|e| {
        eprintln!("Error: {}", e);
        1
    })?;
    Ok(config)
}

async fn connect_engine() -> Result<DockerEngine, i32> {
    DockerEngine::connect().await.map_err(|e| {
        eprintln!("Error: {}", e);
        1
    })
}

/// Decorative header for interactive human output only
fn print_header(format: OutputFormat) {
    if format == OutputFormat::Human && atty::is(atty::Stream::Stdout) {
        println!("drydock {}", crate::VERSION);
    }
}

pub async fn handle_run(args: &RunArgs, config_path: Option<&Path>) -> i32 {
    let mut config = match load_config(config_path) {
        Ok(config) => config,
        Err(code) => return code,
    };

    if let Some(instance) = &args.instance {
        config.instance = instance.clone();
    }
    if let Some(image) = &args.image {
        match image.parse() {
            Ok(image) => config.image = image,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    }
    if let Some(port) = args.host_port {
        config.host_port = port;
    }
    if let Some(port) = args.container_port {
        config.container_port = port;
    }
    if let Some(secs) = args.grace_period {
        config.grace_period_secs = secs;
    }
    if let Some(workdir) = &args.workdir {
        config.workdir = workdir.clone();
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return 1;
    }

    let engine = match connect_engine().await {
        Ok(engine) => engine,
        Err(code) => return code,
    };

    let handler = LoggingHandler;
    let report = PipelineOrchestrator::new(&config, &engine)
        .with_progress(&handler)
        .with_env(args.env.clone())
        .execute()
        .await;

    let format = OutputFormat::from(args.format);
    print_header(format);
    print!("{}", output::render_report(&report, format));
    report.exit_code()
}

pub async fn handle_build(args: &BuildArgs, config_path: Option<&Path>) -> i32 {
    let mut config = match load_config(config_path) {
        Ok(config) => config,
        Err(code) => return code,
    };

    if let Some(workdir) = &args.workdir {
        config.workdir = workdir.clone();
    }
    if let Some(glob) = &args.artifact_glob {
        config.artifact_glob = glob.clone();
    }

    let builder = ArtifactBuilder::new(
        config.workdir.clone(),
        config.build_command.clone(),
        config.artifact_glob.clone(),
    );

    match builder.build().await {
        Ok(artifact) => {
            let format = OutputFormat::from(args.format);
            print_header(format);
            print!("{}", output::render_artifact(&artifact, format));
            0
        }
        Err(e) => {
            eprintln!("Build failed: {}", e);
            1
        }
    }
}

pub async fn handle_image(args: &ImageArgs, config_path: Option<&Path>) -> i32 {
    let mut config = match load_config(config_path) {
        Ok(config) => config,
        Err(code) => return code,
    };

    if let Some(workdir) = &args.workdir {
        config.workdir = workdir.clone();
    }
    if let Some(glob) = &args.artifact {
        config.artifact_glob = glob.clone();
    }
    if let Some(tag) = &args.tag {
        match tag.parse() {
            Ok(image) => config.image = image,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    }
    if let Some(base) = &args.base_image {
        config.base_image = base.clone();
    }

    // Resolve the artifact before touching the engine: ambiguous or missing
    // selection fails fast and leaves no image overwritten
    let builder = ArtifactBuilder::new(
        config.workdir.clone(),
        config.build_command.clone(),
        config.artifact_glob.clone(),
    );
    let artifact = match builder.verify().await {
        Ok(artifact) => artifact,
        Err(e) => {
            eprintln!("Image build failed: {}", e);
            return 1;
        }
    };

    let engine = match connect_engine().await {
        Ok(engine) => engine,
        Err(code) => return code,
    };

    let spec = ImageSpec {
        reference: config.image.clone(),
        base_image: config.base_image.clone(),
        expose_port: config.container_port,
        entrypoint: config.entrypoint.clone(),
    };

    match ImageBuilder::new(&engine).build(&spec, &artifact).await {
        Ok(()) => {
            println!("built {}", spec.reference);
            0
        }
        Err(e) => {
            eprintln!("Image build failed: {}", e);
            1
        }
    }
}

pub async fn handle_deploy(args: &DeployArgs, config_path: Option<&Path>) -> i32 {
    let mut config = match load_config(config_path) {
        Ok(config) => config,
        Err(code) => return code,
    };

    if let Some(instance) = &args.instance {
        config.instance = instance.clone();
    }
    if let Some(image) = &args.image {
        match image.parse() {
            Ok(image) => config.image = image,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    }
    if let Some(port) = args.host_port {
        config.host_port = port;
    }
    if let Some(port) = args.container_port {
        config.container_port = port;
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return 1;
    }

    let engine = match connect_engine().await {
        Ok(engine) => engine,
        Err(code) => return code,
    };

    let spec = InstanceSpec {
        name: config.instance.clone(),
        image: config.image.clone(),
        host_port: config.host_port,
        container_port: config.container_port,
        env: args.env.clone(),
    };

    match Supervisor::new(&engine).redeploy(&spec).await {
        Ok(id) => {
            println!("instance {} started ({})", spec.name, id);
            0
        }
        Err(e) => {
            eprintln!("Deploy failed: {}", e);
            1
        }
    }
}

pub async fn handle_cleanup(_args: &CleanupArgs, config_path: Option<&Path>) -> i32 {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(code) => return code,
    };

    let engine = match connect_engine().await {
        Ok(engine) => engine,
        Err(code) => return code,
    };

    // Only prune build outputs when exactly one artifact resolves; an
    // ambiguous tree is left alone rather than guessed at
    let prune = select_artifact(&config.workdir, &config.artifact_glob)
        .ok()
        .map(|keep| ArtifactPrune {
            root: config.workdir.clone(),
            pattern: config.artifact_glob.clone(),
            keep: Some(keep),
        });

    let report = CleanupAgent::new(&engine)
        .run(
            &config.image.name,
            &config.image,
            &config.instance,
            prune.as_ref(),
        )
        .await;

    println!(
        "removed {} image(s), {} artifact(s), {} warning(s)",
        report.removed_images.len(),
        report.removed_artifacts.len(),
        report.warnings.len()
    );
    for warning in &report.warnings {
        eprintln!("warning: {}", warning);
    }
    0
}

pub async fn handle_status(args: &StatusArgs, config_path: Option<&Path>) -> i32 {
    // Status only needs the state directory; a partially-invalid config
    // must not hide the last record
    let config = match DrydockConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let store = RecordStore::new(&config.state_dir);
    match store.load() {
        Ok(Some(report)) => {
            let format = OutputFormat::from(args.format);
            print_header(format);
            print!("{}", output::render_report(&report, format));
            0
        }
        Ok(None) => {
            println!("no deployment recorded");
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}
