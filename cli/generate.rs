use crate::cli_args::Cli;
use crate::output;
use anyhow::{Context, Result};
use ctxmd_core::{
    Config, DocumentSections, EncodingStrategy, SizeSetting, TreeStyle, parse_size,
};
use log;
use std::path::Path;

pub fn handle_generate_command(cli: &Cli, quiet: bool) -> Result<()> {
    let target_dir = Config::determine_target_dir(cli.project.target_dir.as_deref())
        .context("Failed to determine target directory")?;
    log::info!("Target directory determined: {}", target_dir.display());

    let config = load_config_for_command(&target_dir, cli)?;
    let run = config
        .into_run_config(target_dir)
        .context("Failed to resolve run configuration")?;

    log::info!(
        "Starting context generation for: {}",
        run.target_dir.display()
    );
    let (sections, stats) = DocumentSections::from_run_config(&run)
        .context("Failed to build context document")?;
    let document = sections.render();

    output::write_document(&run.output, &document)?;
    log::info!("Context written to {}", run.output.display());

    if !quiet {
        output::print_summary(&run.output, &sections, &stats, &document, cli.output.stats)?;
    }
    Ok(())
}

fn load_config_for_command(target_dir: &Path, cli: &Cli) -> Result<Config> {
    let config_path = Config::resolve_config_path(
        target_dir,
        cli.project.config.as_deref(),
        cli.project.no_config,
    )
    .context("Failed to resolve configuration path")?;

    let config = match &config_path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    merge_config_with_cli_overrides(config, cli)
}

fn merge_config_with_cli_overrides(mut config: Config, cli: &Cli) -> Result<Config> {
    log::trace!("Applying CLI overrides to config...");

    if let Some(path) = &cli.filters.ignore_file {
        config.general.ignore_file = Some(path.clone());
    }
    if let Some(size) = &cli.filters.max_size {
        config.general.max_size = Some(SizeSetting::Bytes(parse_size(size)?));
    }
    if cli.filters.builtin_ignore {
        config.general.builtin_ignore = Some(true);
    }
    if cli.filters.no_builtin_ignore {
        config.general.builtin_ignore = Some(false);
    }
    if let Some(strategy) = &cli.filters.non_utf8 {
        config.source.non_utf8 = Some(strategy.parse::<EncodingStrategy>()?);
    }

    if let Some(path) = &cli.output.output {
        config.general.output = Some(path.clone());
    }
    if let Some(path) = &cli.output.context_file {
        config.general.context_file = Some(path.clone());
    }
    if cli.output.ascii {
        config.tree.style = Some(TreeStyle::Ascii);
    }

    log::trace!("Config after CLI overrides: {:?}", config);
    Ok(config)
}
