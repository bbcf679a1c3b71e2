/// Version injected at compile time via HPCBP_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("HPCBP_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use hpcbp::blueprint::template::{self, GenerateTemplate};
use hpcbp::blueprint::{extract, BlueprintBuilder, StorageConfig, StorageFamily};
use hpcbp::catalog::{CachedCatalog, CatalogProvider, CatalogSnapshot};
use hpcbp::config::Config;
use hpcbp::gcp::http::format_gcp_error;
use hpcbp::gcp::{GcpCatalog, GcpClient};
use hpcbp::region::{self, region_of_zone, ZoneRequirements, KNOWN_ZONES};
use hpcbp::report::{self, Location};
use hpcbp::{parse_blueprint, Blueprint, CostEstimator, Validator};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Validate and price HPC cluster blueprints against the GCP catalog
#[derive(Parser, Debug)]
#[command(name = "hpcbp", version = VERSION, about, long_about = None)]
struct Args {
    /// GCP project to use
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// Answer catalog queries from a JSON snapshot instead of the GCP APIs
    #[arg(long, global = true)]
    catalog_file: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check machine types, accelerators, storage and quota
    Validate(BlueprintArgs),
    /// Estimate the monthly cost
    Cost(BlueprintArgs),
    /// Run only the quota part of validation
    CheckQuota(BlueprintArgs),
    /// List zones offering everything a blueprint (or the given flags) needs
    FindZones(FindZonesArgs),
    /// Write a new blueprint
    Generate(GenerateArgs),
    /// List templates available to `generate --template`
    ListTemplates,
    /// Show or save default project/region/zone
    Configure(LocationArgs),
}

#[derive(ClapArgs, Debug, Default)]
struct LocationArgs {
    /// GCP region (defaults to the blueprint vars, then saved config)
    #[arg(short, long)]
    region: Option<String>,

    /// GCP zone (defaults to the blueprint vars, then saved config)
    #[arg(short, long)]
    zone: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct BlueprintArgs {
    /// Blueprint YAML file
    blueprint: PathBuf,

    #[command(flatten)]
    location: LocationArgs,
}

#[derive(ClapArgs, Debug)]
struct FindZonesArgs {
    /// Derive requirements from a blueprint
    #[arg(long)]
    blueprint: Option<PathBuf>,

    #[arg(long = "machine-type")]
    machine_types: Vec<String>,

    #[arg(long = "gpu-type")]
    gpu_types: Vec<String>,

    #[arg(long, value_parser = parse_storage_family)]
    storage: Vec<StorageFamily>,

    /// Only search these regions
    #[arg(long = "region")]
    regions: Vec<String>,
}

#[derive(ClapArgs, Debug)]
struct GenerateArgs {
    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Template name or YAML file supplying defaults for the options below
    #[arg(long)]
    template: Option<String>,

    /// Blueprint name [default: hpc-cluster]
    #[arg(long)]
    name: Option<String>,

    /// Deployment name [default: hpc-YYYYMMDD]
    #[arg(long)]
    deployment: Option<String>,

    /// [default: n2-standard-2]
    #[arg(long)]
    machine_type: Option<String>,

    /// [default: 2]
    #[arg(long)]
    node_count: Option<u64>,

    #[arg(long)]
    gpu_type: Option<String>,

    /// [default: 1]
    #[arg(long)]
    gpu_count: Option<u64>,

    #[arg(long)]
    tpu_type: Option<String>,

    /// [default: 1]
    #[arg(long)]
    tpu_count: Option<u64>,

    #[arg(long, value_parser = parse_storage_family)]
    storage_type: Option<StorageFamily>,

    /// [default: 1024]
    #[arg(long)]
    storage_capacity: Option<u64>,

    #[command(flatten)]
    location: LocationArgs,
}

fn parse_storage_family(name: &str) -> Result<StorageFamily, String> {
    StorageFamily::parse(name)
        .ok_or_else(|| format!("unknown storage type '{}' (filestore, lustre, parallelstore)", name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Cannot open log file {}: {}", log_path.display(), e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("hpcbp {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("hpcbp").join("hpcbp.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".hpcbp").join("hpcbp.log");
    }
    PathBuf::from("hpcbp.log")
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("Error: {}", format_gcp_error(&err));
            ExitCode::FAILURE
        }
    }
}

/// Region and zone resolved for one run
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    region: String,
    zone: String,
}

impl Target {
    fn location(&self) -> Location<'_> {
        Location {
            region: &self.region,
            zone: &self.zone,
        }
    }
}

/// flag > blueprint vars > saved config > gcloud defaults. A zone alone
/// decides the region; a region alone picks a zone inside it.
fn resolve_target(flags: &LocationArgs, blueprint: Option<&Blueprint>, config: &Config) -> Target {
    let vars = blueprint.map(|b| b.vars());
    let zone = flags
        .zone
        .clone()
        .or_else(|| vars.as_ref().and_then(|v| v.zone()).map(String::from));
    let region = flags
        .region
        .clone()
        .or_else(|| vars.as_ref().and_then(|v| v.region()).map(String::from));

    match (region, zone) {
        (Some(region), Some(zone)) => Target { region, zone },
        (None, Some(zone)) => Target {
            region: region_of_zone(&zone),
            zone,
        },
        (Some(region), None) => Target {
            zone: zone_in_region(&region, config),
            region,
        },
        (None, None) => Target {
            region: config.effective_region(),
            zone: config.effective_zone(),
        },
    }
}

fn zone_in_region(region: &str, config: &Config) -> String {
    let configured = config.effective_zone();
    if region_of_zone(&configured) == region {
        return configured;
    }

    KNOWN_ZONES
        .iter()
        .find(|zone| region_of_zone(zone) == region)
        .map(|zone| zone.to_string())
        .unwrap_or_else(|| format!("{}-a", region))
}

fn read_blueprint(path: &Path) -> Result<Blueprint> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read blueprint {}", path.display()))?;
    let blueprint =
        parse_blueprint(&content).with_context(|| format!("Invalid blueprint {}", path.display()))?;
    tracing::info!("Loaded blueprint {:?}", path);
    Ok(blueprint)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = Config::load();

    let blueprint = match &args.command {
        Command::Validate(a) | Command::Cost(a) | Command::CheckQuota(a) => {
            Some(read_blueprint(&a.blueprint)?)
        }
        Command::FindZones(a) => a.blueprint.as_deref().map(read_blueprint).transpose()?,
        Command::Generate(_) | Command::ListTemplates | Command::Configure(_) => None,
    };

    let project = args
        .project
        .clone()
        .or_else(|| {
            blueprint
                .as_ref()
                .and_then(|b| b.vars().project_id().map(String::from))
        })
        .or_else(|| config.effective_project());

    match &args.command {
        Command::Generate(generate) => {
            let template = load_template(generate.template.as_deref())?;
            let project = args
                .project
                .clone()
                .or_else(|| template.project_id.clone())
                .or(project)
                .context(
                    "No GCP project configured. Set GOOGLE_CLOUD_PROJECT or use --project flag",
                )?;
            run_generate(generate, &template, &project, &config)?;
            return Ok(ExitCode::SUCCESS);
        }
        Command::ListTemplates => {
            run_list_templates();
            return Ok(ExitCode::SUCCESS);
        }
        Command::Configure(location) => {
            run_configure(location, args.project.as_deref(), config)?;
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    if let Some(path) = &args.catalog_file {
        let snapshot = CatalogSnapshot::load(path)?;
        return run_catalog_command(&args, blueprint.as_ref(), &config, &snapshot).await;
    }

    let project = project.context(
        "No GCP project configured. Set GOOGLE_CLOUD_PROJECT, use --project or set vars.project_id",
    )?;
    tracing::info!("Using project: {}", project);

    let client = GcpClient::new(&project).await?;
    let catalog = CachedCatalog::new(GcpCatalog::new(client));
    run_catalog_command(&args, blueprint.as_ref(), &config, &catalog).await
}

async fn run_catalog_command<P: CatalogProvider>(
    args: &Args,
    blueprint: Option<&Blueprint>,
    config: &Config,
    catalog: &P,
) -> Result<ExitCode> {
    match &args.command {
        Command::Validate(a) => {
            let blueprint = blueprint.context("No blueprint loaded")?;
            let target = resolve_target(&a.location, Some(blueprint), config);
            let result = Validator::new(catalog)
                .validate_blueprint(blueprint, &target.region, &target.zone)
                .await;

            match args.format {
                OutputFormat::Json => print_json(&result)?,
                OutputFormat::Text => print!("{}", report::render_validation(&result, target.location())),
            }
            Ok(exit_code(result.passed))
        }
        Command::Cost(a) => {
            let blueprint = blueprint.context("No blueprint loaded")?;
            let target = resolve_target(&a.location, Some(blueprint), config);
            let result = CostEstimator::new(catalog)
                .estimate_blueprint(blueprint, &target.region, &target.zone)
                .await;

            match args.format {
                OutputFormat::Json => print_json(&result)?,
                OutputFormat::Text => print!("{}", report::render_cost(&result, target.location())),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::CheckQuota(a) => {
            let blueprint = blueprint.context("No blueprint loaded")?;
            let target = resolve_target(&a.location, Some(blueprint), config);
            let quota = Validator::new(catalog)
                .check_quota(&extract(blueprint), &target.region, &target.zone)
                .await;

            match args.format {
                OutputFormat::Json => print_json(&quota)?,
                OutputFormat::Text => print!("{}", report::render_quota(&quota, target.location())),
            }
            Ok(exit_code(quota.passed))
        }
        Command::FindZones(a) => {
            let mut requirements = blueprint
                .map(|b| ZoneRequirements::from_resources(&extract(b)))
                .unwrap_or_default();
            requirements.machine_types.extend(a.machine_types.iter().cloned());
            requirements.gpu_types.extend(a.gpu_types.iter().cloned());
            requirements.storage.extend(a.storage.iter().copied());

            if requirements.is_empty() {
                anyhow::bail!("Nothing to search for. Pass --blueprint, --machine-type, --gpu-type or --storage");
            }

            let candidates = region::candidate_zones(catalog, &a.regions).await;
            let zones = region::find_zones(catalog, &requirements, &candidates).await;

            match args.format {
                OutputFormat::Json => print_json(&zones)?,
                OutputFormat::Text => print!("{}", report::render_zones(&zones)),
            }
            Ok(exit_code(!zones.is_empty()))
        }
        Command::Generate(_) | Command::ListTemplates | Command::Configure(_) => {
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn default_deployment_name() -> String {
    format!("hpc-{}", chrono::Local::now().format("%Y%m%d"))
}

fn load_template(name: Option<&str>) -> Result<GenerateTemplate> {
    let Some(name) = name else {
        return Ok(GenerateTemplate::default());
    };

    let dir = template::templates_dir();
    let path = template::resolve_template(name, dir.as_deref())
        .with_context(|| format!("Template '{}' not found", name))?;
    tracing::info!("Using template {}", path.display());
    GenerateTemplate::load(&path)
}

/// Command-line values first, then the template, then built-in defaults
fn generate_builder(
    args: &GenerateArgs,
    template: &GenerateTemplate,
    project: &str,
    config: &Config,
) -> Result<BlueprintBuilder> {
    let location = LocationArgs {
        region: args.location.region.clone().or_else(|| template.region.clone()),
        zone: args.location.zone.clone().or_else(|| template.zone.clone()),
    };
    let target = resolve_target(&location, None, config);

    let name = args
        .name
        .clone()
        .or_else(|| template.blueprint_name.clone())
        .unwrap_or_else(|| "hpc-cluster".to_string());
    let deployment = args
        .deployment
        .clone()
        .or_else(|| template.deployment_name.clone())
        .unwrap_or_else(default_deployment_name);
    let machine_type = args
        .machine_type
        .as_deref()
        .or(template.machine_type.as_deref())
        .unwrap_or("n2-standard-2");
    let node_count = args.node_count.or(template.node_count).unwrap_or(2);

    let mut builder = BlueprintBuilder::new(&name, &deployment, project)
        .location(&target.region, &target.zone)
        .compute(machine_type, node_count);

    if let Some(gpu_type) = args.gpu_type.as_deref().or(template.gpu_type.as_deref()) {
        builder = builder.gpu(gpu_type, args.gpu_count.or(template.gpu_count).unwrap_or(1));
    }
    if let Some(tpu_type) = args.tpu_type.as_deref().or(template.tpu_type.as_deref()) {
        builder = builder.tpu(tpu_type, args.tpu_count.or(template.tpu_count).unwrap_or(1));
    }

    let storage_type = match (args.storage_type, template.storage_type.as_deref()) {
        (Some(family), _) => Some(family),
        (None, Some(name)) => Some(
            template
                .storage_family()
                .with_context(|| format!("Unknown storage type '{}' in template", name))?,
        ),
        (None, None) => None,
    };
    if let Some(storage_type) = storage_type {
        let capacity = args
            .storage_capacity
            .or(template.storage_capacity_gb)
            .unwrap_or(1024);
        builder = builder.storage(StorageConfig::new(storage_type, capacity));
    }

    Ok(builder)
}

fn run_generate(
    args: &GenerateArgs,
    template: &GenerateTemplate,
    project: &str,
    config: &Config,
) -> Result<()> {
    let builder = generate_builder(args, template, project, config)?;

    match &args.output {
        Some(path) => {
            builder.write_to(path)?;
            eprintln!("Wrote blueprint to {}", path.display());
        }
        None => print!("{}", builder.to_yaml()?),
    }
    Ok(())
}

fn run_list_templates() {
    let Some(dir) = template::templates_dir() else {
        println!("No templates found.");
        return;
    };

    let names = template::list_templates(&dir);
    if names.is_empty() {
        println!("No templates found in {}", dir.display());
        return;
    }

    println!("Available templates ({}):", dir.display());
    for name in names {
        println!("  - {}", name);
    }
}

fn run_configure(location: &LocationArgs, project: Option<&str>, mut config: Config) -> Result<()> {
    let changed = project.is_some() || location.region.is_some() || location.zone.is_some();

    if let Some(project) = project {
        config.project_id = Some(project.to_string());
    }
    if let Some(region) = &location.region {
        config.region = Some(region.clone());
    }
    if let Some(zone) = &location.zone {
        config.zone = Some(zone.clone());
    }

    if changed {
        config.save()?;
    }

    println!(
        "project: {}",
        config.effective_project().unwrap_or_else(|| "(not set)".to_string())
    );
    println!("region:  {}", config.effective_region());
    println!("zone:    {}", config.effective_zone());
    Ok(())
}
