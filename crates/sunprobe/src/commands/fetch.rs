//! `sunprobe fetch`: one acquisition, rendered once.

use tokio_util::sync::CancellationToken;

use crate::cli::{FetchArgs, GlobalOpts};
use crate::commands::util;
use crate::config;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: FetchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (resolved, acquirer) = config::build_acquirer(global, Some(&args))?;

    let cancel = CancellationToken::new();
    util::cancel_on_ctrl_c(&cancel);

    let spinner = util::spinner(global, "Probing portal endpoints...");
    let outcome = acquirer.request_acquisition_with_cancel(&cancel).await;
    spinner.finish_and_clear();

    if cancel.is_cancelled() {
        return Err(CliError::Cancelled);
    }

    let record = outcome
        .into_result()
        .map_err(|e| CliError::from(e).for_profile(&resolved.name))?;

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &record,
        |r| output::format_record(r, args.all_fields, color),
        output::record_plain,
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
