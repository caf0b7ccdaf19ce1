use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::{Formatter, get_formatter};
use crate::models::{CONFIG_FILE_NAME, Config, OutputFormat, PROJECT_CONFIG_DIR};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Initialize configuration file")]
    Init {
        #[arg(
            long,
            short = 'g',
            help = "Create global config instead of project config"
        )]
        global: bool,
        #[arg(long, help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show current configuration")]
    Show,
    #[command(about = "Show configuration file paths")]
    Path {
        #[arg(long, help = "Show all possible config paths")]
        all: bool,
    },
    #[command(about = "Edit configuration file")]
    Edit {
        #[arg(
            long,
            short = 'g',
            help = "Edit global config instead of project config"
        )]
        global: bool,
    },
}

pub async fn handle_config(cmd: ConfigCommand, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { global, force } => handle_init(global, force, formatter.as_ref()),
        ConfigCommand::Show => handle_show(format),
        ConfigCommand::Path { all } => handle_path(all),
        ConfigCommand::Edit { global } => handle_edit(global, formatter.as_ref()),
    }
}

fn project_config_path() -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("could not determine project directory")?;
    Ok(cwd.join(PROJECT_CONFIG_DIR).join(CONFIG_FILE_NAME))
}

fn target_path(global: bool) -> Result<PathBuf> {
    if global {
        Config::global_path().ok_or_else(|| anyhow::anyhow!("could not determine home directory"))
    } else {
        project_config_path()
    }
}

fn handle_init(global: bool, force: bool, formatter: &dyn Formatter) -> Result<()> {
    let path = target_path(global)?;
    let scope = if global { "Global" } else { "Project" };

    if path.exists() && !force {
        anyhow::bail!(
            "{scope} config already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    Config::default()
        .save_to(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!(
        "{}",
        formatter.format_message(&format!("Created {} config at: {}", scope.to_lowercase(), path.display()))
    );
    Ok(())
}

fn handle_show(format: OutputFormat) -> Result<()> {
    let resolved = Config::load()?;

    if format == OutputFormat::Json {
        let output = serde_json::json!({
            "config": resolved.config,
            "path": resolved.path,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match &resolved.path {
        Some(path) => println!("# Loaded from: {}", path.display()),
        None => println!("# No config file found; showing defaults"),
    }
    println!();
    print!(
        "{}",
        toml::to_string_pretty(&resolved.config).context("failed to render config")?
    );
    Ok(())
}

fn handle_path(show_all: bool) -> Result<()> {
    let project_path = Config::project_path();
    let global_path = Config::global_path();

    println!("Configuration paths:");
    println!();

    if let Some(ref path) = project_path {
        println!("Project config (active): {}", path.display());
    } else if show_all {
        println!("Project config (would be): {}", project_config_path()?.display());
    }

    if let Some(ref path) = global_path {
        if path.exists() {
            let state = if project_path.is_some() { "shadowed" } else { "active" };
            println!("Global config ({state}): {}", path.display());
        } else if show_all {
            println!("Global config (would be): {}", path.display());
        }
    }

    if show_all {
        let config = Config::load().map(|r| r.config).unwrap_or_default();
        for stage in ["prod", "dev"] {
            let env_path = config.paths.env_dir.join(format!(".env.{stage}"));
            let state = if env_path.exists() { "found" } else { "missing" };
            println!(".env.{stage} ({state}): {}", env_path.display());
        }
    }

    Ok(())
}

fn handle_edit(global: bool, formatter: &dyn Formatter) -> Result<()> {
    let config_path = if global {
        target_path(true)?
    } else {
        match Config::project_path() {
            Some(path) => path,
            None => project_config_path()?,
        }
    };

    if !config_path.exists() {
        Config::default()
            .save_to(&config_path)
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        println!(
            "{}",
            formatter.format_message(&format!("Created config at: {}", config_path.display()))
        );
    }

    let editor = std::env::var("EDITOR")
        .unwrap_or_else(|_| std::env::var("VISUAL").unwrap_or_else(|_| "vim".into()));

    Command::new(&editor)
        .arg(&config_path)
        .status()
        .context(format!("failed to open editor: {}", editor))?;

    Ok(())
}
