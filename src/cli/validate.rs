//! `buildline validate` - Report problems in a build configuration

use super::FormatArg;
use anyhow::Result;
use buildline::{BuildConfig, StepContext, validate_pipeline_syntax};

pub fn run_validate(
    ctx: &StepContext,
    config: &BuildConfig,
    strict: bool,
    format: FormatArg,
) -> Result<String> {
    let report = validate_pipeline_syntax(ctx, config, false)?;
    let output = report.format(format.into());

    if strict && !report.is_valid() {
        println!("{output}");
        report.into_result()?;
    }

    Ok(output)
}
