//! Command dispatch

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use clap::CommandFactory;
use clap_complete::generate;
use itertools::Itertools;
use tracing::{debug, warn};

use crate::application::hash::short_digest;
use crate::cli::args::{Cli, Commands, ConfigCommands, LineageBy};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, Settings};
use crate::domain::{parse_tag, LinkMethod, MergeReport, TaxonId};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        None => Err(CliError::Usage("no command given, see --help".to_string())),
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Some(Commands::Config { command }) => cmd_config(command, &load_settings(cli)?),
        Some(Commands::Insert { ids, strict }) => cmd_insert(&container(cli)?, ids, *strict),
        Some(Commands::Add {
            file,
            taxon_id,
            name,
            tags,
            method,
            strict,
        }) => cmd_add(
            &container(cli)?,
            file,
            taxon_id.as_deref(),
            name.as_deref(),
            tags,
            method.as_deref(),
            *strict,
        ),
        Some(Commands::Tree { flat }) => cmd_tree(&container(cli)?, *flat),
        Some(Commands::Lineage { id, by }) => cmd_lineage(&container(cli)?, id, *by),
        Some(Commands::Info) => cmd_info(&container(cli)?),
    }
}

fn container(cli: &Cli) -> CliResult<ServiceContainer> {
    Ok(ServiceContainer::new(load_settings(cli)?))
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let settings = Settings::load()?;
    Ok(match &cli.home {
        Some(home) => settings.with_home(home),
        None => settings,
    })
}

fn parse_ids(ids: &[String]) -> CliResult<Vec<TaxonId>> {
    ids.iter()
        .map(|s| s.parse::<TaxonId>().map_err(CliError::from))
        .collect()
}

/// Print conflicts; under `strict` they abort before anything is saved.
fn check_conflicts(report: &MergeReport, strict: bool) -> CliResult<()> {
    for conflict in &report.conflicts {
        output::conflict(conflict, strict);
    }
    if strict {
        report.ensure_no_conflicts()?;
    }
    Ok(())
}

fn cmd_insert(container: &ServiceContainer, ids: &[String], strict: bool) -> CliResult<()> {
    let ids = parse_ids(ids)?;
    let store = container.tree_store();
    let lineages = container.lineage_service()?;

    let mut tree = store.load()?;
    let report = lineages.insert(&mut tree, &ids)?;
    check_conflicts(&report, strict)?;

    if report.is_noop() {
        output::info("nothing new, tree unchanged");
        return Ok(());
    }
    store.save(&tree)?;
    output::merged(&report, tree.len());
    Ok(())
}

fn cmd_add(
    container: &ServiceContainer,
    file: &Path,
    taxon_id: Option<&str>,
    name: Option<&str>,
    tags: &[String],
    method: Option<&str>,
    strict: bool,
) -> CliResult<()> {
    let tags = tags
        .iter()
        .map(|t| parse_tag(t))
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    let method = match method {
        Some(m) => m.parse::<LinkMethod>()?,
        None => container.settings.default_link_method()?,
    };

    let store = container.tree_store();
    let mut tree = store.load()?;

    let mut lineages = None;
    let id = match (taxon_id, name) {
        (Some(raw), _) => raw.parse::<TaxonId>()?,
        (None, Some(name)) => {
            let service = container.lineage_service()?;
            let id = service.resolve_name(name)?;
            lineages = Some(service);
            id
        }
        (None, None) => {
            return Err(CliError::InvalidArgs(
                "either --taxon-id or --name is required".to_string(),
            ))
        }
    };

    if !tree.contains(id) {
        debug!("add: taxon {} not in tree, inserting lineage", id);
        let service = match lineages {
            Some(service) => service,
            None => container.lineage_service()?,
        };
        let report = service.insert(&mut tree, &[id])?;
        check_conflicts(&report, strict)?;
        // lineage is persisted before the file is touched
        store.save(&tree)?;
    }

    let pinned = container
        .data_store()
        .pin(&mut tree, id, file, method, tags)?;
    if let Err(e) = store.save(&tree) {
        warn!("add: tree not saved after storing {}", pinned.digest);
        output::warning(&format!(
            "object {} is stored but not pinned; see `taxlink info`",
            pinned.digest
        ));
        return Err(e.into());
    }

    let taxon = tree
        .get(id)
        .map(|t| t.to_string())
        .unwrap_or_else(|| id.to_string());
    output::action(
        "Pinned",
        &format!(
            "{} -> {} [{}] ({})",
            pinned.file_name,
            taxon,
            short_digest(&pinned.digest),
            pinned.method
        ),
    );
    Ok(())
}

fn cmd_tree(container: &ServiceContainer, flat: bool) -> CliResult<()> {
    let tree = container.tree_store().load()?;
    if flat {
        for (depth, label) in tree.print_tree() {
            output::info(&format!("{}{}", "  ".repeat(depth), label));
        }
    } else {
        output::info(&tree.to_termtree());
    }
    Ok(())
}

fn cmd_lineage(container: &ServiceContainer, id: &str, by: LineageBy) -> CliResult<()> {
    let id = id.parse::<TaxonId>()?;
    let tree = container.tree_store().load()?;
    let labels = tree.lineage(id, by.into())?;
    output::info(&labels.iter().join("; "));
    Ok(())
}

fn cmd_info(container: &ServiceContainer) -> CliResult<()> {
    let settings = &container.settings;
    let tree = container.tree_store().load()?;
    let data_store = container.data_store();
    let objects = data_store.objects()?;
    let orphans = data_store.orphans(&tree)?;
    let pinned: usize = tree.iter().map(|(_, node)| node.taxon.data.len()).sum();

    output::header("taxlink");
    output::field("home", &settings.home.display());
    output::field("tree", &settings.tree_path().display());
    match &settings.taxdump_dir {
        Some(dir) => output::field("taxdump", &dir.display()),
        None => output::field("taxdump", "(not configured)"),
    }
    output::field(
        "taxa",
        &format!(
            "{} (depth {}, {} leaves)",
            tree.len(),
            tree.depth(),
            tree.leaves().len()
        ),
    );
    output::field("objects", &format!("{} ({} pins)", objects.len(), pinned));
    if !orphans.is_empty() {
        output::field("orphans", &orphans.iter().map(|d| short_digest(d)).join(", "));
    }
    Ok(())
}

fn cmd_config(command: &ConfigCommands, settings: &Settings) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Path => match global_config_path() {
            Some(path) => output::info(&path.display()),
            None => {
                return Err(CliError::Usage(
                    "cannot determine config directory".to_string(),
                ))
            }
        },
        ConfigCommands::Init { force } => {
            let path = global_config_path().ok_or_else(|| {
                CliError::Usage("cannot determine config directory".to_string())
            })?;
            if path.exists() && !force {
                output::warning(&format!(
                    "{} exists, use --force to overwrite",
                    path.display()
                ));
                return Ok(());
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| InfraError::io(format!("create {}", parent.display()), e))?;
            }
            std::fs::write(&path, Settings::template())
                .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
            output::action("Created", &path.display());
        }
    }
    Ok(())
}
