use serde::Serialize;

use crate::cmd::{connect, finish, ConnectionArgs, HostArgs};
use crate::exit::{station_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct DiscoverOutput {
    request_sent: bool,
}

pub async fn run(args: HostArgs, conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let station = connect(&args.host, conn).await?;
    let result = station
        .discover_devices()
        .await
        .map_err(|err| station_error("discovery request failed", err));
    finish(&station, result).await?;

    print_record(
        "discover",
        &args.host,
        &DiscoverOutput { request_sent: true },
        format,
    );
    Ok(SUCCESS)
}
