//! `dl process`: recompute and write back every group's daily quota.

use anyhow::Result;
use clap::Args;
use deadline_core::batch::{BatchOptions, BatchReport, run_batch};
use deadline_core::host::CollectingNotifier;
use serde::Serialize;
use std::io::Write;

use super::RunContext;
use crate::output::{fail, pretty_rule, render_mode};

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Update quotas without printing the per-group report (startup use).
    #[arg(short, long)]
    pub silent: bool,
}

#[derive(Debug, Serialize)]
struct ProcessOutcome {
    #[serde(flatten)]
    report: BatchReport,
    messages: Vec<String>,
}

pub fn run_process(args: &ProcessArgs, ctx: &RunContext) -> Result<()> {
    let registry = ctx.registry()?;
    let mut collection = ctx.open_collection()?;
    let mut notifier = CollectingNotifier::default();
    let options = BatchOptions {
        profile: ctx.profile.clone(),
        silent: args.silent,
        include_today: ctx.settings.include_today,
        today: ctx.today(),
    };

    let report = run_batch(&registry, &mut collection, &mut notifier, &options)
        .map_err(|err| fail(ctx.output, err))?;

    let outcome = ProcessOutcome {
        report,
        messages: notifier.messages,
    };
    render_mode(ctx.output, &outcome, write_text, write_pretty)?;

    let failed = outcome.report.failures.len();
    if failed > 0 {
        tracing::warn!(failed, "some groups could not be processed");
    }
    Ok(())
}

fn write_text(outcome: &ProcessOutcome, w: &mut dyn Write) -> std::io::Result<()> {
    for message in &outcome.messages {
        writeln!(w, "{message}")?;
        writeln!(w)?;
    }
    Ok(())
}

fn write_pretty(outcome: &ProcessOutcome, w: &mut dyn Write) -> std::io::Result<()> {
    for (i, message) in outcome.messages.iter().enumerate() {
        if i > 0 {
            pretty_rule(w)?;
        }
        writeln!(w, "{message}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_args_parse_silent() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: ProcessArgs,
        }
        assert!(Wrapper::parse_from(["test", "--silent"]).args.silent);
        assert!(!Wrapper::parse_from(["test"]).args.silent);
    }

    #[test]
    fn json_outcome_flattens_report() {
        let outcome = ProcessOutcome {
            report: BatchReport {
                profile: "alice".into(),
                ..BatchReport::default()
            },
            messages: vec!["hello".into()],
        };
        let value = serde_json::to_value(&outcome).expect("json");
        assert_eq!(value["profile"], "alice");
        assert_eq!(value["messages"][0], "hello");
        assert!(value["processed"].as_array().is_some_and(Vec::is_empty));
    }
}
