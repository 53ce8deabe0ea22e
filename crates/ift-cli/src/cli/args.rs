use clap::{Args, Parser, Subcommand};
use ift_registry::RegistryConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ift",
    version,
    about = "Certification registry client: publish audit certificates and manage them"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Exchange the API key for an onboarding token
    Connect(ConnectArgs),
    /// Print the registry document for an audit without sending it
    Map(MapArgs),
    /// Map an audit and create the certificate in the registry
    Put(PutArgs),
    /// Fetch one certificate, or all of them
    Get(GetArgs),
    /// Delete a certificate
    Delete(DeleteArgs),
    Version,
}

/// Registry connection settings. Unset flags fall back to `IFT_*` variables.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    #[arg(long, env = "IFT_ORGANIZATION_ID")]
    pub organization_id: Option<String>,

    #[arg(long, env = "IFT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Certificate API base URL
    #[arg(long, env = "IFT_REGISTRY_URL")]
    pub registry_url: Option<String>,

    /// Persist the onboarding token to this file
    #[arg(long, env = "IFT_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,
}

impl ConnectionArgs {
    pub fn apply(&self, mut config: RegistryConfig) -> RegistryConfig {
        if let Some(org) = &self.organization_id {
            config = config.with_organization_id(org);
        }
        if let Some(key) = &self.api_key {
            config = config.with_api_key(key);
        }
        if let Some(url) = &self.registry_url {
            config = config.with_url(url);
        }
        if let Some(path) = &self.token_file {
            config = config.with_token_file(path);
        }
        config
    }
}

/// Record mapping settings.
#[derive(Args, Debug, Clone, Default)]
pub struct MappingArgs {
    /// Full location prefix (e.g. urn:ibm:ift:location:loc:7457934435.gln)
    #[arg(long, env = "IFT_LOCATION_PREFIX")]
    pub location_prefix: Option<String>,

    /// Company prefix; expands to urn:ibm:ift:location:loc:<prefix>.gln (wins over --location-prefix)
    #[arg(long)]
    pub company_prefix: Option<String>,

    /// Use this location id instead of the one in the records (debugging)
    #[arg(long, env = "IFT_FORCED_LOCATION_ID")]
    pub forced_location_id: Option<String>,

    #[arg(long, env = "IFT_ANALYTICS_URL")]
    pub analytics_url: Option<String>,
}

impl MappingArgs {
    pub fn apply(&self, mut config: RegistryConfig) -> RegistryConfig {
        if let Some(prefix) = &self.location_prefix {
            config = config.with_location_prefix(prefix);
        }
        if let Some(company) = &self.company_prefix {
            config = config.with_location_prefix(format!(
                "{}{}.gln",
                ift_registry::LOCATION_URN_NAMESPACE,
                company
            ));
        }
        if let Some(location) = &self.forced_location_id {
            config = config.with_forced_location_id(location);
        }
        if let Some(url) = &self.analytics_url {
            config = config.with_analytics_url(url);
        }
        config
    }
}

#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug, Clone)]
pub struct MapArgs {
    /// Source audit document (JSON)
    #[arg(long)]
    pub audit: PathBuf,

    /// Source certificate document (JSON); defaults to the audit
    #[arg(long)]
    pub certificate: Option<PathBuf>,

    #[command(flatten)]
    pub mapping: MappingArgs,
}

#[derive(Args, Debug, Clone)]
pub struct PutArgs {
    /// Source audit document (JSON)
    #[arg(long)]
    pub audit: PathBuf,

    /// Source certificate document (JSON); defaults to the audit
    #[arg(long)]
    pub certificate: Option<PathBuf>,

    #[command(flatten)]
    pub mapping: MappingArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug, Clone)]
pub struct GetArgs {
    /// Certification id; omit to list all certificates
    pub id: Option<String>,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Certification id
    pub id: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}
