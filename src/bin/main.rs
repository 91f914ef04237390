//! Key Vault Signer CLI
//!
//! Signs PowerShell scripts with a certificate held in Azure Key Vault,
//! verifies embedded signatures, and manages the optional configuration file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand, ValueEnum};
use keyvault_signer::infra::config::ExportFormat;
use keyvault_signer::{
    AzureKeyVaultBackend, ConfigManager, ExitCode, PackageFileMode, ScriptPackage, SignCommand,
    SignCommandArgs,
};
use miette::{IntoDiagnostic, Result};

#[derive(Parser)]
#[command(name = "keyvault-signer")]
#[command(about = "Sign PowerShell scripts with certificates stored in Azure Key Vault")]
#[command(long_about = "
Key Vault Signer - remote-backed code signing for PowerShell scripts

EXAMPLES:
    # Sign with an access token, SHA-256, no timestamp
    keyvault-signer sign deploy.ps1 --kvu https://contoso.vault.azure.net \\
        --kvc release-cert --kva $TOKEN

    # Sign with a service principal and an RFC 3161 timestamp
    keyvault-signer sign module.psm1 --kvu https://contoso.vault.azure.net \\
        --kvc release-cert --kvi $CLIENT_ID --kvs $CLIENT_SECRET \\
        -t http://timestamp.digicert.com --fd sha384

    # Replace an existing signature
    keyvault-signer sign deploy.ps1 --force ...

    # Check embedded signatures
    keyvault-signer verify deploy.ps1

EXIT CODES:
    0   success
    1   invalid or missing options
    2   operation failed (already signed, remote signing, timestamp, I/O)

ENVIRONMENT VARIABLES:
    RUST_LOG        Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the user configuration directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a script with a Key Vault certificate
    Sign(SignArgs),

    /// Verify the signatures embedded in a script
    Verify {
        /// Signed script to verify
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args)]
struct SignArgs {
    /// Script to sign (.ps1, .psm1, .psd1)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// RFC 3161 timestamp server URL
    #[arg(short = 't', long = "timestamp", value_name = "URL")]
    timestamp_url: Option<String>,

    /// Digest algorithm for the timestamp request (default sha256)
    #[arg(long = "timestamp-algorithm", visible_alias = "ta", value_name = "ALGORITHM")]
    timestamp_algorithm: Option<String>,

    /// Digest algorithm for the file (default sha256)
    #[arg(long = "file-digest", visible_alias = "fd", value_name = "ALGORITHM")]
    file_digest: Option<String>,

    /// Replace any existing signature
    #[arg(short, long)]
    force: bool,

    /// Key Vault URL
    #[arg(long = "azure-key-vault-url", visible_alias = "kvu", value_name = "URL")]
    vault_url: Option<String>,

    /// Client ID used to authenticate to Key Vault
    #[arg(long = "azure-key-vault-client-id", visible_alias = "kvi", value_name = "ID")]
    client_id: Option<String>,

    /// Client secret used to authenticate to Key Vault
    #[arg(
        long = "azure-key-vault-client-secret",
        visible_alias = "kvs",
        value_name = "SECRET"
    )]
    client_secret: Option<String>,

    /// Name of the certificate in Key Vault
    #[arg(
        long = "azure-key-vault-certificate",
        visible_alias = "kvc",
        value_name = "NAME"
    )]
    certificate: Option<String>,

    /// Access token used instead of client credentials
    #[arg(
        long = "azure-key-vault-accesstoken",
        visible_alias = "kva",
        value_name = "TOKEN"
    )]
    access_token: Option<String>,
}

impl From<SignArgs> for SignCommandArgs {
    fn from(args: SignArgs) -> Self {
        SignCommandArgs {
            file: args.file,
            timestamp_url: args.timestamp_url,
            timestamp_algorithm: args.timestamp_algorithm,
            file_digest: args.file_digest,
            force: args.force,
            vault_url: args.vault_url,
            client_id: args.client_id,
            client_secret: args.client_secret,
            certificate: args.certificate,
            access_token: args.access_token,
        }
    }
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Create default configuration file
    Init,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },

    /// Export configuration
    Export {
        /// Export format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone)]
enum ExportFormatArg {
    Toml,
    Json,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Toml => ExportFormat::Toml,
            ExportFormatArg::Json => ExportFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::Success,
                _ => ExitCode::InvalidOptions,
            }
            .into();
        }
    };

    let level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config_manager = match &cli.config {
        Some(path) => Ok(ConfigManager::with_path(path)),
        None => ConfigManager::new(),
    };
    let config_manager = match config_manager {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::InvalidOptions.into();
        }
    };

    let code = match cli.command {
        Commands::Sign(args) => handle_sign_command(&config_manager, args.into()).await,
        Commands::Verify { file } => handle_verify_command(&file, cli.verbose),
        Commands::Config(config_cmd) => match handle_config_command(&config_manager, config_cmd) {
            Ok(()) => ExitCode::Success,
            Err(report) => {
                eprintln!("{report:?}");
                ExitCode::InvalidOptions
            }
        },
    };
    code.into()
}

async fn handle_sign_command(config_manager: &ConfigManager, args: SignCommandArgs) -> ExitCode {
    let settings = match config_manager.load_or_default() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return e.exit_code();
        }
    };
    log::debug!("Using configuration {:?}", settings);

    let command = SignCommand::new(Arc::new(AzureKeyVaultBackend::new(settings)));
    let report = command.execute(&args).await;

    if report.exit_code == ExitCode::Success {
        println!("{}", report.message);
    } else {
        eprintln!("{}", report.message);
    }
    report.exit_code
}

fn handle_verify_command(file: &Path, verbose: bool) -> ExitCode {
    let package = match ScriptPackage::open(file, PackageFileMode::Read) {
        Ok(package) => package,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::Failed;
        }
    };

    let results = package.verify_signatures();
    if results.is_empty() {
        eprintln!("{} is not signed.", file.display());
        return ExitCode::Failed;
    }

    let mut all_valid = true;
    for (index, result) in results.iter().enumerate() {
        all_valid &= result.valid;
        let status = if result.valid { "valid" } else { "INVALID" };
        println!("Signature {}: {status}", index + 1);
        println!("  Signer: {}", result.subject);
        if verbose {
            println!("  Thumbprint: {}", result.thumbprint);
            println!("  Signed at (unix): {}", result.signed_at);
        }
        println!(
            "  Timestamped: {}",
            if result.timestamped { "yes" } else { "no" }
        );
        if let Some(reason) = &result.reason {
            println!("  Reason: {reason}");
        }
    }

    if all_valid {
        ExitCode::Success
    } else {
        ExitCode::Failed
    }
}

fn handle_config_command(config_manager: &ConfigManager, config_cmd: ConfigCommands) -> Result<()> {
    match config_cmd {
        ConfigCommands::Show => match config_manager.load() {
            Ok(config) => {
                println!("Current Configuration:");
                println!("  Network timeout: {}s", config.network_timeout_seconds);
                println!("  Key Vault API version: {}", config.key_vault_api_version);
                println!(
                    "  Timestamp retries: {} (delay {}s)",
                    config.timestamp_retry_attempts, config.timestamp_retry_delay_seconds
                );
                println!("  User agent: {}", config.user_agent);
                println!(
                    "  Configuration file: {}",
                    config_manager.config_path().display()
                );
            }
            Err(_) => {
                println!("No configuration file found. Use 'config init' to create one.");
            }
        },

        ConfigCommands::Init => {
            config_manager.load_or_create_default().into_diagnostic()?;
            println!(
                "Configuration initialized: {}",
                config_manager.config_path().display()
            );
        }

        ConfigCommands::Set { key, value } => {
            config_manager
                .update_value(&key, &value)
                .into_diagnostic()?;
            println!("Configuration updated: {key} = {value}");
        }

        ConfigCommands::Export { format, output } => {
            let content = config_manager
                .export_config(format.into())
                .into_diagnostic()?;

            if let Some(output_path) = output {
                std::fs::write(&output_path, content).into_diagnostic()?;
                println!("Configuration exported to: {}", output_path.display());
            } else {
                println!("{content}");
            }
        }
    }

    Ok(())
}
