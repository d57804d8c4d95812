use anyhow::{Context, Result};
use clap::Parser;
use consumer_core::keys::{OPTIONAL_VARS, REQUIRED_VARS, present};
use consumer_core::mask::display_value;
use std::env;
use std::path::Path;
use std::process::ExitCode;

const ENV_FILE: &str = ".env";

#[derive(Debug, Parser)]
#[command(
    name = "check-env",
    version,
    about = "Verify the consumer's .env file and print a masked report"
)]
struct Cli {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum VarStatus {
    Set(String),
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Report {
    required: Vec<(&'static str, VarStatus)>,
    optional: Vec<(&'static str, VarStatus)>,
}

impl Report {
    fn collect<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let status = |name: &'static str, masked: bool| {
            let status = match present(&lookup, name) {
                Some(value) if masked => VarStatus::Set(display_value(name, &value)),
                Some(value) => VarStatus::Set(value),
                None => VarStatus::Missing,
            };
            (name, status)
        };

        Self {
            required: REQUIRED_VARS.iter().map(|name| status(*name, true)).collect(),
            optional: OPTIONAL_VARS.iter().map(|name| status(*name, false)).collect(),
        }
    }

    fn all_required_present(&self) -> bool {
        self.required
            .iter()
            .all(|(_, status)| matches!(status, VarStatus::Set(_)))
    }

    fn render(&self) -> String {
        let mut lines = vec![
            String::new(),
            "Required environment variables:".to_string(),
        ];
        for (name, status) in &self.required {
            lines.push(match status {
                VarStatus::Set(value) => format!("  [ok]      {name}: {value}"),
                VarStatus::Missing => format!("  [missing] {name}: not set"),
            });
        }

        lines.push(String::new());
        lines.push("Optional environment variables:".to_string());
        for (name, status) in &self.optional {
            lines.push(match status {
                VarStatus::Set(value) => format!("  [ok]      {name}: {value}"),
                VarStatus::Missing => format!("  [-]       {name}: not set (optional)"),
            });
        }

        lines.push(String::new());
        if self.all_required_present() {
            lines.push("All required environment variables are configured.".to_string());
            lines.push("Start the consumer with: topic-consumer --env=<name>".to_string());
        } else {
            lines.push("Some required environment variables are missing.".to_string());
            lines.push("Update your .env file and try again.".to_string());
        }
        lines.join("\n")
    }
}

fn main() -> ExitCode {
    let _cli = Cli::parse();

    match check(Path::new(ENV_FILE)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

fn check(env_file: &Path) -> Result<bool> {
    println!("Environment configuration checker");

    if !env_file.is_file() {
        eprintln!("{} file not found", env_file.display());
        eprintln!("Create one from .env.example before starting the consumer.");
        return Ok(false);
    }
    println!("{} file found", env_file.display());

    dotenvy::from_path(env_file)
        .with_context(|| format!("load {}", env_file.display()))?;

    let report = Report::collect(|name| env::var(name).ok());
    println!("{}", report.render());
    Ok(report.all_required_present())
}
