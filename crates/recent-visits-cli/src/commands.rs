use std::io::Write;

use anyhow::Context;
use recent_visits::{AddOutcome, Visit, VisitManager};
use tracing::info;

use crate::config::{Cli, Command};

/// Sample data recorded by `demo`
const DEMO_VISITS: [(u32, u32, &str, &str); 4] = [
    (1, 102, "https://google.com", "Google"),
    (2, 103, "https://github.com", "GitHub"),
    (3, 104, "https://stackoverflow.com", "Stack Overflow"),
    (4, 105, "https://example.com", "Example"),
];
const DEMO_USER: u32 = 2;

/// Execute one CLI command, writing human output to `out`
pub fn run(cli: &Cli, out: &mut impl Write) -> anyhow::Result<()> {
    // The demo deletes its snapshot afterwards, so it only runs on a scratch file.
    if matches!(cli.command, Command::Demo { .. }) && cli.file.exists() {
        anyhow::bail!(
            "refusing to run demo on existing file {}",
            cli.file.display()
        );
    }

    let mut manager = VisitManager::open_with_config(cli.manager_config())
        .with_context(|| format!("failed to open {}", cli.file.display()))?;

    match &cli.command {
        Command::Add {
            user_id,
            visit_id,
            url,
            text,
        } => match manager.add_visit(*user_id, *visit_id, url, text)? {
            AddOutcome::Inserted { evicted } => {
                writeln!(out, "Added visit {visit_id} for user {user_id}")?;
                if let Some(old) = evicted {
                    writeln!(out, "Evicted visit {old}")?;
                }
            }
            AddOutcome::Duplicate => {
                writeln!(out, "Visit {visit_id} already recorded for user {user_id}")?;
            }
        },

        Command::Recent { user_id, json } => {
            let visits = manager.recent_visits(*user_id);
            if *json {
                writeln!(out, "{}", serde_json::to_string_pretty(visits)?)?;
            } else {
                print_visits(out, *user_id, visits)?;
            }
        }

        Command::Delete { user_id, visit_ids } => {
            if manager.delete_visits(*user_id, visit_ids)? {
                writeln!(out, "Deleted visits for user {user_id}")?;
            } else {
                writeln!(out, "No matching visits for user {user_id}")?;
            }
        }

        Command::Clear { user_id } => {
            manager.clear(*user_id)?;
            writeln!(out, "Cleared visits for user {user_id}")?;
        }

        Command::Users => {
            let users: Vec<u32> = manager.user_ids().collect();
            if users.is_empty() {
                writeln!(out, "No users")?;
            }
            for user_id in users {
                writeln!(out, "User {user_id}: {} visits", manager.visit_count(user_id))?;
            }
        }

        Command::Demo { keep } => {
            for (user_id, visit_id, url, text) in DEMO_VISITS {
                manager.add_visit(user_id, visit_id, url, text)?;
            }
            info!(users = manager.user_count(), "Recorded demo visits");

            print_visits(out, DEMO_USER, manager.recent_visits(DEMO_USER))?;

            if !*keep {
                let path = manager.path().to_path_buf();
                manager.close();
                std::fs::remove_file(&path)
                    .with_context(|| format!("failed to remove {}", path.display()))?;
            }
            return Ok(());
        }
    }

    manager.close();
    Ok(())
}

fn print_visits(out: &mut impl Write, user_id: u32, visits: &[Visit]) -> anyhow::Result<()> {
    writeln!(out, "User {user_id} has {} visits:", visits.len())?;
    if visits.is_empty() {
        writeln!(out, "  No visits found.")?;
    }
    for visit in visits {
        writeln!(out, "Visit ID: {}", visit.visit_id)?;
        writeln!(out, "Timestamp: {}", visit.timestamp)?;
        writeln!(out, "URL: {}", visit.url)?;
        writeln!(out, "Text: {}", visit.text)?;
        writeln!(out)?;
    }
    Ok(())
}
