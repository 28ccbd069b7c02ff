use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};
use utilities_host_macos::{full_scan, host_compatibility, Settings};
use utilities_report::create_report_bundle;
use utilities_repository::ItemRepository;

#[derive(Debug, Parser)]
#[command(name = "utilities", version, about = "Inventory disks and macOS installer volumes")]
struct Cli {
    #[command(flatten)]
    scan: ScanArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct ScanArgs {
    /// YAML settings file (defaults to $UTILITIES_SETTINGS)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    /// Evaluate eligibility for this model identifier instead of hw.model
    #[arg(long, global = true)]
    model: Option<String>,
    /// Register a synthetic disk when no real disk is found
    #[arg(long, global = true)]
    fake_disk: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan disks, disk images and applications, then print the inventory
    Scan {
        #[arg(long)]
        json: bool,
    },
    /// Print the installable macOS versions for the model
    Compat {
        #[arg(long)]
        json: bool,
    },
    /// Scan and list installer volumes with their eligibility
    Installers {
        #[arg(long)]
        json: bool,
    },
    /// Scan and write an inventory report bundle
    Report {
        #[arg(long, default_value = ".")]
        base: PathBuf,
    },
}

impl ScanArgs {
    fn resolve(&self) -> Result<Settings> {
        let mut settings = match &self.settings {
            Some(path) => {
                let mut settings = Settings::load(path)
                    .with_context(|| format!("load settings {}", path.display()))?;
                settings.apply_overrides(|key| std::env::var(key).ok());
                settings
            }
            None => Settings::from_env()?,
        };
        if let Some(model) = &self.model {
            settings.model_identifier = Some(model.clone());
        }
        if self.fake_disk {
            settings.fake_disk_when_empty = true;
        }
        Ok(settings)
    }
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("utilities=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = cli.scan.resolve()?;
    tracing::debug!(?settings, "resolved settings");

    match cli.command {
        Command::Scan { json } => {
            let repo = ItemRepository::new();
            let summary = full_scan(&repo, &settings)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&repo.snapshot())?);
            } else {
                for disk in repo.get_disks() {
                    println!("{}", disk);
                }
                for volume in repo.get_volumes() {
                    println!("{}", volume);
                }
                for application in repo.get_applications() {
                    println!("{}", application);
                }
                println!(
                    "{} disks, {} volumes, {} installers, {} applications",
                    summary.disks, summary.volumes, summary.installers, summary.applications
                );
            }
            Ok(())
        }
        Command::Compat { json } => {
            let compat = host_compatibility(&settings);
            if json {
                println!("{}", serde_json::to_string_pretty(&compat)?);
            } else {
                println!("model: {}", compat.model_identifier);
                for version in compat.installable_versions() {
                    println!("  {}", version);
                }
            }
            Ok(())
        }
        Command::Installers { json } => {
            let repo = ItemRepository::new();
            full_scan(&repo, &settings)?;
            let installers = repo.get_installers();
            if json {
                println!("{}", serde_json::to_string_pretty(&installers)?);
            } else if installers.is_empty() {
                println!("no installer volumes found");
            } else {
                for installer in installers {
                    println!(
                        "{} ({}) at {} - {}",
                        installer.version_name,
                        installer.version_number,
                        installer.app_path().display(),
                        if installer.can_install { "installable" } else { "not supported" }
                    );
                }
            }
            Ok(())
        }
        Command::Report { base } => {
            let repo = ItemRepository::new();
            let summary = full_scan(&repo, &settings)?;
            let compat = host_compatibility(&settings);
            let meta = serde_json::to_value(&summary)?;
            let logs = format!(
                "model={}\ndisks={}\nvolumes={}\ninstallers={}\napplications={}\nfake_disk={}",
                summary.model_identifier,
                summary.disks,
                summary.volumes,
                summary.installers,
                summary.applications,
                summary.used_fake_disk
            );
            let report = create_report_bundle(base, &repo.snapshot(), &compat, Some(meta), Some(&logs))?;
            println!("report_root: {}", report.root.display());
            println!("inventory: {}", report.inventory_json.display());
            println!("run_json: {}", report.run_json.display());
            println!("logs: {}", report.logs_path.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_settings() {
        let cli = Cli::parse_from(["utilities", "compat", "--model", "iMac18,3", "--fake-disk"]);
        let settings = cli.scan.resolve().unwrap();
        assert_eq!(settings.model_identifier.as_deref(), Some("iMac18,3"));
        assert!(settings.fake_disk_when_empty);
        assert!(matches!(cli.command, Command::Compat { json: false }));
    }
}
