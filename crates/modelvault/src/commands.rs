//! modelvault command implementations

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use modelvault_acquire::{ModelAcquisitionPipeline, ModelBundle};
use modelvault_config::paths::{INPUTS_DIR_NAME, TEMP_DIR_NAME, TRANSCRIPTS_DIR_NAME};
use modelvault_config::{self, Config};
use modelvault_storage::{
    profile_from_config, DirectoryProvisioner, TempLifecycleManager, UnrestrictedGate, Warning,
};

/// Provisioner for the profile selected in `config`.
///
/// The CLI runs where the platform never prompts, so the gate grants
/// everything.
fn provisioner_for(config: &Config) -> DirectoryProvisioner {
    DirectoryProvisioner::new(profile_from_config(config, Arc::new(UnrestrictedGate)))
}

fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        println!("  ⚠ {}", warning);
    }
}

/// Create config and the data layout
pub async fn init_command() -> Result<()> {
    println!("◆ Initializing modelvault...");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = modelvault_config::init()
        .await
        .context("failed to initialize config")?;
    let provisioner = provisioner_for(&config);

    let data_root = provisioner.data_path("").await;
    let mut dirs = Vec::new();
    for subdir in [INPUTS_DIR_NAME, TRANSCRIPTS_DIR_NAME, TEMP_DIR_NAME] {
        dirs.push(data_root.join(subdir));
    }
    dirs.push(config.models_root());

    for dir in &dirs {
        let warnings = provisioner
            .ensure_directory(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
        info!("◆ Ready {}", dir.display());
        print_warnings(&warnings);
    }

    let models_root = config.models_root();
    provisioner
        .validate(&models_root)
        .with_context(|| format!("models root {} is outside the sandbox", models_root.display()))?;

    println!("Config:    {}", modelvault_config::config_path().display());
    println!("Data root: {}", data_root.display());
    println!("Models:    {}", models_root.display());
    println!("\n◆ modelvault initialized");
    println!("\nNext steps:");
    println!("  1. Add model sources to ~/.modelvault/config.json");
    println!("  2. Download one: modelvault fetch <code>");

    Ok(())
}

/// Download and install a model bundle
pub async fn fetch_command(code: String, url: Option<String>) -> Result<()> {
    let config = Config::load().await?;

    let url = match url {
        Some(url) => url,
        None => config
            .source_url(&code)
            .with_context(|| format!("no source configured for model '{}'; pass --url", code))?,
    };
    debug!("fetching '{}' from {}", code, url);

    let provisioner = provisioner_for(&config);
    let pipeline = ModelAcquisitionPipeline::from_config(&config, provisioner)?;
    let models_root = config.models_root();

    let report = pipeline
        .acquire(&url, &code, &models_root)
        .await
        .with_context(|| format!("could not acquire model '{}'", code))?;

    print_warnings(&report.warnings);
    if report.reused {
        println!("✓ Model {} already installed", code);
    } else {
        println!(
            "✓ Model {} installed after {} attempt(s)",
            code,
            report.attempts.len()
        );
    }
    println!("  Path: {}", report.bundle.path.display());
    if !report.bundle.is_complete() {
        println!("  ⚠ Missing files:");
        for file in &report.bundle.missing_files {
            println!("    - {}", file);
        }
    }

    Ok(())
}

/// Show storage layout and installed models
pub async fn status_command() -> Result<()> {
    let config_path = modelvault_config::config_path();

    println!("◆ modelvault Status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!(
        "Config:    {} {}",
        config_path.display(),
        if config_path.exists() {
            "[OK]"
        } else {
            "[Missing]"
        }
    );

    let config = Config::load().await?;
    let provisioner = provisioner_for(&config);
    let data_root = provisioner.data_path("").await;
    let models_root = config.models_root();

    println!("Profile:   {}", provisioner.profile().name());
    println!("Data root: {} {}", data_root.display(), exists_tag(&data_root));
    println!("Models:    {} {}", models_root.display(), exists_tag(&models_root));

    let bundles = ModelBundle::list(&models_root)
        .with_context(|| format!("failed to read {}", models_root.display()))?;
    if bundles.is_empty() {
        println!("\nNo models installed");
    } else {
        println!("\nInstalled models:");
        for bundle in &bundles {
            let state = if bundle.is_complete() {
                "complete".to_string()
            } else {
                format!("{} file(s) missing", bundle.missing_files.len())
            };
            println!("  {} ({})", bundle.code, state);
        }
    }

    if !config.models.sources.is_empty() {
        println!("\nConfigured sources:");
        for code in config.models.sources.keys() {
            println!("  {}", code);
        }
    }

    Ok(())
}

fn exists_tag(path: &Path) -> &'static str {
    if path.exists() {
        "[OK]"
    } else {
        "[Missing]"
    }
}

/// Remove orphaned temp directories
pub async fn clean_command() -> Result<()> {
    let config = Config::load().await?;
    let manager = TempLifecycleManager::new(provisioner_for(&config));

    let report = manager
        .reclaim_orphans()
        .await
        .context("failed to reclaim temp directories")?;

    println!("✓ Removed {} temp entries", report.removed.len());
    if !report.is_clean() {
        println!("  ⚠ Could not remove:");
        print_warnings(&report.skipped);
    }

    Ok(())
}

/// Validate a path against the sandbox
pub async fn check_command(path: PathBuf) -> Result<()> {
    let config = Config::load().await?;
    let provisioner = provisioner_for(&config);

    let resolved = provisioner
        .validate(&path)
        .with_context(|| format!("{} is not allowed", path.display()))?;
    println!("✓ {}", resolved);

    Ok(())
}
