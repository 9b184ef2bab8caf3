use anyhow::Result;
use clap::{Args, Subcommand};
use deadline_core::model::ReportMode;
use serde::Serialize;
use std::io::Write;

use super::RunContext;
use crate::output::{fail, pretty_kv, pretty_section, render_mode, render_success};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Show the resolved settings and stored preferences
    Show,
    /// Choose whether `dl process` reports in one message or one per group
    SetMode(SetModeArgs),
}

#[derive(Args, Debug)]
struct SetModeArgs {
    /// `one` or `many`
    #[arg(value_parser = parse_mode)]
    mode: ReportMode,
}

fn parse_mode(raw: &str) -> Result<ReportMode, String> {
    raw.parse()
}

#[derive(Debug, Serialize)]
struct EffectiveSettings {
    settings_path: Option<String>,
    profile: String,
    registry: Option<String>,
    collection: Option<String>,
    include_today: bool,
    report_mode: String,
    today: String,
}

pub fn run_config(args: &ConfigArgs, ctx: &RunContext) -> Result<()> {
    match &args.command {
        ConfigCommand::Show => run_show(ctx),
        ConfigCommand::SetMode(set) => run_set_mode(set, ctx),
    }
}

fn run_show(ctx: &RunContext) -> Result<()> {
    let registry = ctx.registry()?;
    let mode = registry.report_mode().map_err(|err| fail(ctx.output, err))?;
    let effective = EffectiveSettings {
        settings_path: ctx.settings_path.as_ref().map(|p| p.display().to_string()),
        profile: ctx.profile.clone(),
        registry: ctx.registry_path().map(|p| p.display().to_string()),
        collection: ctx.collection_path().map(|p| p.display().to_string()),
        include_today: ctx.settings.include_today,
        report_mode: mode.to_string(),
        today: ctx.today().to_string(),
    };
    render_mode(ctx.output, &effective, write_text, write_pretty)
}

fn run_set_mode(args: &SetModeArgs, ctx: &RunContext) -> Result<()> {
    let registry = ctx.registry()?;
    registry
        .set_report_mode(args.mode)
        .map_err(|err| fail(ctx.output, err))?;
    render_success(ctx.output, &format!("Report mode set to {}", args.mode))
}

fn rows(settings: &EffectiveSettings) -> [(&'static str, String); 7] {
    let unset = || "-".to_string();
    [
        ("settings", settings.settings_path.clone().unwrap_or_else(unset)),
        ("profile", settings.profile.clone()),
        ("registry", settings.registry.clone().unwrap_or_else(unset)),
        ("collection", settings.collection.clone().unwrap_or_else(unset)),
        ("include_today", settings.include_today.to_string()),
        ("report_mode", settings.report_mode.clone()),
        ("today", settings.today.clone()),
    ]
}

fn write_text(settings: &EffectiveSettings, w: &mut dyn Write) -> std::io::Result<()> {
    for (key, value) in rows(settings) {
        writeln!(w, "{key}\t{value}")?;
    }
    Ok(())
}

fn write_pretty(settings: &EffectiveSettings, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Effective deadline settings")?;
    for (key, value) in rows(settings) {
        pretty_kv(w, key, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: ConfigArgs,
    }

    #[test]
    fn set_mode_accepts_one_and_many() {
        let w = Wrapper::parse_from(["test", "set-mode", "many"]);
        assert!(matches!(
            w.args.command,
            ConfigCommand::SetMode(SetModeArgs {
                mode: ReportMode::Many
            })
        ));
        let w = Wrapper::parse_from(["test", "set-mode", "One"]);
        assert!(matches!(
            w.args.command,
            ConfigCommand::SetMode(SetModeArgs {
                mode: ReportMode::One
            })
        ));
    }

    #[test]
    fn set_mode_rejects_other_values() {
        assert!(Wrapper::try_parse_from(["test", "set-mode", "some"]).is_err());
    }

    #[test]
    fn text_rows_show_unset_values() {
        let settings = EffectiveSettings {
            settings_path: None,
            profile: "alice".into(),
            registry: Some("/data/deadlines.json".into()),
            collection: None,
            include_today: true,
            report_mode: "One".into(),
            today: "2026-10-19".into(),
        };
        let mut buf = Vec::new();
        write_text(&settings, &mut buf).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.starts_with("settings\t-\nprofile\talice\n"));
        assert!(text.contains("collection\t-\n"));
    }
}
