//! `dl list`: show the active profile's deadlines.

use anyhow::Result;
use chrono::NaiveDate;
use deadline_core::calc::days_until;
use deadline_core::model::DeadlineEntry;
use serde::Serialize;
use std::io::Write;

use super::RunContext;
use crate::output::{fail, pretty_section, render_mode};

#[derive(Debug, Serialize)]
struct ListedDeadline {
    group: String,
    date: String,
    /// `None` for groups without a date or with an unreadable one.
    days_left: Option<i64>,
}

impl ListedDeadline {
    fn from_entry(entry: DeadlineEntry, include_today: bool, today: NaiveDate) -> Self {
        let days_left = entry
            .target_date()
            .ok()
            .and_then(|target| days_until(target, include_today, today));
        Self {
            group: entry.group,
            date: entry.date,
            days_left,
        }
    }
}

#[derive(Debug, Serialize)]
struct Listing {
    profile: String,
    deadlines: Vec<ListedDeadline>,
}

pub fn run_list(ctx: &RunContext) -> Result<()> {
    let registry = ctx.registry()?;
    let entries = registry
        .list_for_profile(&ctx.profile)
        .map_err(|err| fail(ctx.output, err))?;

    let listing = Listing {
        profile: ctx.profile.clone(),
        deadlines: entries
            .into_iter()
            .map(|entry| ListedDeadline::from_entry(entry, ctx.settings.include_today, ctx.today()))
            .collect(),
    };
    render_mode(ctx.output, &listing, write_text, write_pretty)
}

fn days_label(days_left: Option<i64>) -> String {
    days_left.map_or_else(|| "-".to_string(), |days| days.to_string())
}

fn write_text(listing: &Listing, w: &mut dyn Write) -> std::io::Result<()> {
    if listing.deadlines.is_empty() {
        return Ok(());
    }
    writeln!(w, "GROUP\tDATE\tDAYS_LEFT")?;
    for item in &listing.deadlines {
        let date = if item.date.is_empty() { "-" } else { item.date.as_str() };
        writeln!(w, "{}\t{date}\t{}", item.group, days_label(item.days_left))?;
    }
    Ok(())
}

fn write_pretty(listing: &Listing, w: &mut dyn Write) -> std::io::Result<()> {
    if listing.deadlines.is_empty() {
        writeln!(w, "No deadlines for profile {}.", listing.profile)?;
        return Ok(());
    }
    pretty_section(w, &format!("Deadlines ({})", listing.profile))?;
    let width = listing
        .deadlines
        .iter()
        .map(|item| item.group.len())
        .max()
        .unwrap_or(0);
    for item in &listing.deadlines {
        let date = if item.date.is_empty() { "none" } else { item.date.as_str() };
        let days = item
            .days_left
            .map_or_else(String::new, |days| format!("  ({days} days left)"));
        writeln!(w, "{:<width$}  {date}{days}", item.group)?;
    }
    Ok(())
}
