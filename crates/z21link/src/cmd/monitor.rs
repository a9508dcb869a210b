use tokio::sync::mpsc;

use crate::cmd::{connect, finish, parse_duration, stream, ConnectionArgs, MonitorArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

pub async fn run(args: MonitorArgs, conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let station = connect(&args.host, conn).await?;

    let (tx, rx) = mpsc::unbounded_channel();
    let poll = station.subscribe_system_state(
        move |state| {
            let _ = tx.send(state);
        },
        1.0 / interval.as_secs_f64(),
    );

    let host = args.host.as_str();
    let result = stream(rx, args.count, |state| {
        print_record("system_state", host, &state, format);
    })
    .await;
    poll.cancel();
    finish(&station, result).await?;
    Ok(SUCCESS)
}
