use ift_registry::{RecordMapper, RegistryConfig};

use super::read_sources;
use crate::cli::args::MapArgs;
use crate::exit_codes::EXIT_SUCCESS;

pub fn run(args: MapArgs) -> anyhow::Result<i32> {
    let config = args.mapping.apply(RegistryConfig::from_env());
    let (audit, certificate) = read_sources(&args.audit, args.certificate.as_deref())?;

    let record = RecordMapper::from_config(&config).map_to_registry_format(
        &audit,
        &certificate,
        config.analytics_url.as_deref(),
    )?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(EXIT_SUCCESS)
}
