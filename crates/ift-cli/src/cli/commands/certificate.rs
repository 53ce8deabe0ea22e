use ift_registry::{RegistryClient, RegistryConfig};
use serde_json::Value;
use tracing::info;

use super::read_sources;
use crate::cli::args::{ConnectArgs, ConnectionArgs, DeleteArgs, GetArgs, PutArgs};
use crate::exit_codes::EXIT_SUCCESS;

fn client(connection: &ConnectionArgs, config: RegistryConfig) -> anyhow::Result<RegistryClient> {
    Ok(RegistryClient::new(connection.apply(config))?)
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn connect(args: ConnectArgs) -> anyhow::Result<i32> {
    let client = client(&args.connection, RegistryConfig::from_env())?;
    client.connect().await?;
    info!("connected");
    Ok(EXIT_SUCCESS)
}

pub async fn put(args: PutArgs) -> anyhow::Result<i32> {
    let config = args.mapping.apply(RegistryConfig::from_env());
    let client = client(&args.connection, config)?;
    let (audit, certificate) = read_sources(&args.audit, args.certificate.as_deref())?;

    let certification_id = client.put_certificate(&audit, &certificate).await?;
    println!("{}", certification_id);
    Ok(EXIT_SUCCESS)
}

pub async fn get(args: GetArgs) -> anyhow::Result<i32> {
    let client = client(&args.connection, RegistryConfig::from_env())?;
    let certificate = client.get_certificate(args.id.as_deref()).await?;
    print_json(&certificate)?;
    Ok(EXIT_SUCCESS)
}

pub async fn delete(args: DeleteArgs) -> anyhow::Result<i32> {
    let client = client(&args.connection, RegistryConfig::from_env())?;
    let response = client.delete_certificate(&args.id).await?;
    if !response.is_null() {
        print_json(&response)?;
    }
    info!(certification_id = %args.id, "certificate deleted");
    Ok(EXIT_SUCCESS)
}
