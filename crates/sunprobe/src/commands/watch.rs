//! `sunprobe watch`: run the scheduler and redraw on every update.

use std::io::IsTerminal;

use sunprobe_core::{DashboardSnapshot, Scheduler};
use tokio_util::sync::CancellationToken;

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::commands::util;
use crate::config;
use crate::error::CliError;
use crate::output;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (_, acquirer) = config::build_acquirer(global, Some(&args.fetch))?;

    let mut policy = acquirer.config().retry;
    if let Some(ref interval) = args.interval {
        policy.update_interval = parse_interval(interval)?;
    }

    let scheduler = Scheduler::new(policy);
    let mut updates = scheduler.subscribe();

    let cancel = CancellationToken::new();
    util::cancel_on_ctrl_c(&cancel);
    let task = tokio::spawn(scheduler.run(acquirer, cancel.clone()));

    let color = output::should_color(&global.color);
    let redraw = matches!(global.output, OutputFormat::Table) && std::io::stdout().is_terminal();
    let mut rendered = 0_u32;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                let out = render(global, &snapshot, args.fetch.all_fields, color);
                if redraw && !global.quiet {
                    print!("{CLEAR_SCREEN}");
                }
                output::print_output(&out, global.quiet);

                rendered += 1;
                if args.count.is_some_and(|n| rendered >= n) {
                    cancel.cancel();
                    break;
                }
            }
        }
    }

    if let Err(e) = task.await {
        tracing::warn!(error = %e, "scheduler task ended abnormally");
    }
    Ok(())
}

fn render(
    global: &GlobalOpts,
    snapshot: &DashboardSnapshot,
    all_fields: bool,
    color: bool,
) -> String {
    output::render_single(
        &global.output,
        snapshot,
        |s| output::format_snapshot(s, all_fields, color),
        |s| {
            let mut lines = Vec::new();
            if let Some(ref record) = s.last_good {
                lines.push(output::record_plain(record));
            }
            if let Some(ref err) = s.last_error {
                lines.push(format!("error={}", err.kind));
                lines.push(format!("retry={}/{}", s.retry_count, s.max_retries));
            }
            lines.join("\n")
        },
    )
}

fn parse_interval(raw: &str) -> Result<std::time::Duration, CliError> {
    let interval = humantime::parse_duration(raw).map_err(|e| CliError::Validation {
        field: "interval".into(),
        reason: format!("{e} (examples: 5m, 90s, 1h)"),
    })?;
    if interval.is_zero() {
        return Err(CliError::Validation {
            field: "interval".into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(interval)
}
