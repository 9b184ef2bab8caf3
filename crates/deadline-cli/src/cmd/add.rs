//! `dl add`: set a deadline for a group.

use anyhow::Result;
use clap::Args;
use deadline_core::assign;
use deadline_core::model::{format_date, parse_date};
use serde::Serialize;
use std::io::Write;

use super::RunContext;
use crate::output::{fail, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Group (deck) name, e.g. "Lang::Spanish".
    pub group: String,

    /// Target date as YYYY-MM-DD. An empty string records the group with no
    /// deadline.
    pub date: String,

    /// Apply the date to every leaf sub-group of a parent group.
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Debug, Serialize)]
struct AddOutcome {
    profile: String,
    date: Option<String>,
    assigned: Vec<String>,
}

pub fn run_add(args: &AddArgs, ctx: &RunContext) -> Result<()> {
    let date = parse_date(&args.group, &args.date).map_err(|err| fail(ctx.output, err))?;
    let registry = ctx.registry()?;
    let mut collection = ctx.open_collection()?;

    let assigned = assign(
        &registry,
        &mut collection,
        &ctx.profile,
        &args.group,
        date,
        args.recursive,
    )
    .map_err(|err| fail(ctx.output, err))?;

    let outcome = AddOutcome {
        profile: ctx.profile.clone(),
        date: date.map(format_date),
        assigned,
    };
    render_mode(ctx.output, &outcome, write_text, |outcome, w| {
        write_pretty(outcome, &args.group, w)
    })
}

fn write_text(outcome: &AddOutcome, w: &mut dyn Write) -> std::io::Result<()> {
    let date = outcome.date.as_deref().unwrap_or("-");
    for group in &outcome.assigned {
        writeln!(w, "{group}\t{date}")?;
    }
    Ok(())
}

fn write_pretty(outcome: &AddOutcome, requested: &str, w: &mut dyn Write) -> std::io::Result<()> {
    if outcome.assigned.is_empty() {
        writeln!(
            w,
            "! {requested} has sub-groups; nothing assigned. Re-run with --recursive to set each of them."
        )?;
        return Ok(());
    }
    pretty_section(w, &format!("Deadline set ({})", outcome.profile))?;
    let date = outcome.date.as_deref().unwrap_or("none");
    for group in &outcome.assigned {
        pretty_kv(w, group, date)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_args_parse() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: AddArgs,
        }
        let w = Wrapper::parse_from(["test", "Lang", "2026-12-01", "--recursive"]);
        assert_eq!(w.args.group, "Lang");
        assert_eq!(w.args.date, "2026-12-01");
        assert!(w.args.recursive);
    }

    #[test]
    fn pretty_output_explains_skipped_parent() {
        let outcome = AddOutcome {
            profile: "alice".into(),
            date: Some("2026-12-01".into()),
            assigned: Vec::new(),
        };
        let mut buf = Vec::new();
        write_pretty(&outcome, "Lang", &mut buf).expect("write");
        assert!(String::from_utf8_lossy(&buf).contains("--recursive"));
    }
}
