use crate::output::print_json;
use clap::Subcommand;
use warmup_core::{WarmupConfig, WarnLevel};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration (defaults, file, env and flags merged)
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(config: &WarmupConfig, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(config, json),
        ConfigSubcommand::Validate => validate(config, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(config: &WarmupConfig, json: bool) -> anyhow::Result<()> {
    let worst_case = config.worst_case_wait().map(|d| d.as_secs());
    if json {
        let value = serde_json::json!({
            "config": config,
            "health_url": config.health_url(),
            "worst_case_wait_secs": worst_case,
        });
        return print_json(&value);
    }

    print!("{}", config.to_yaml()?);
    println!("# {}", budget_line(config));
    Ok(())
}

/// One-line summary of the retry budget, e.g.
/// `probes http://…/api/health every 3000ms, giving up after ~60s`.
fn budget_line(config: &WarmupConfig) -> String {
    match config.worst_case_wait() {
        Some(worst) => format!(
            "probes {} every {}ms, giving up after ~{}s",
            config.health_url(),
            config.dispatch_interval_ms,
            worst.as_secs()
        ),
        None => format!(
            "probes {} every {}ms with no representable upper bound",
            config.health_url(),
            config.dispatch_interval_ms
        ),
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(config: &WarmupConfig, json: bool) -> anyhow::Result<()> {
    let findings = config.validate();
    let errors = findings
        .iter()
        .filter(|w| w.level == WarnLevel::Error)
        .count();

    if json {
        print_json(&serde_json::json!({
            "health_url": config.health_url(),
            "worst_case_wait_secs": config.worst_case_wait().map(|d| d.as_secs()),
            "failure_margin_secs": config.failure_margin_secs,
            "findings": findings,
        }))?;
    } else {
        for finding in &findings {
            let tag = match finding.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{tag}] {}", finding.message);
        }
        if errors == 0 {
            println!(
                "{}; failure view after {}s at the latest.",
                budget_line(config),
                config.failure_margin_secs
            );
        }
        if findings.is_empty() {
            println!("Config is valid. No warnings.");
        }
    }

    if errors > 0 {
        anyhow::bail!("{errors} config error(s); the waiting screen would refuse to mount");
    }
    Ok(())
}
