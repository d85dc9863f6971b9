use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Crate whose dependency list is checked.
const DOMAIN_CRATE: &str = "multiworld-domain";

/// Dependencies the domain crate must never pull in.
const FORBIDDEN_DOMAIN_DEPS: &[&str] = &[
    "multiworld-engine",
    "tokio",
    "tokio-util",
    "async-trait",
    "dashmap",
    "tracing-subscriber",
    "dotenvy",
];

#[derive(Debug, Deserialize)]
struct Metadata {
    packages: Vec<Package>,
}

#[derive(Debug, Deserialize)]
struct Package {
    name: String,
    manifest_path: PathBuf,
    dependencies: Vec<Dependency>,
}

#[derive(Debug, Deserialize)]
struct Dependency {
    name: String,
    kind: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("arch-check") => arch_check(),
        Some(cmd) => anyhow::bail!("Unknown xtask command: {cmd}"),
        None => anyhow::bail!("Usage: cargo xtask <command>\n\nCommands:\n  arch-check"),
    }
}

/// Keep the domain crate free of runtime and infrastructure dependencies.
fn arch_check() -> anyhow::Result<()> {
    let output = std::process::Command::new("cargo")
        .args(["metadata", "--format-version", "1", "--no-deps"])
        .output()
        .context("running cargo metadata")?;

    if !output.status.success() {
        anyhow::bail!("cargo metadata failed")
    }

    let metadata: Metadata =
        serde_json::from_slice(&output.stdout).context("parsing cargo metadata")?;
    let domain = metadata
        .packages
        .iter()
        .find(|p| p.name == DOMAIN_CRATE)
        .with_context(|| format!("package {DOMAIN_CRATE} not found in workspace"))?;

    let mut violations = forbidden_dependencies(domain);

    let src = domain
        .manifest_path
        .parent()
        .map(|dir| dir.join("src"))
        .context("domain manifest has no parent directory")?;
    violations.extend(forbidden_paths(&src)?);

    if violations.is_empty() {
        println!("arch-check: {DOMAIN_CRATE} OK");
        return Ok(());
    }
    for v in &violations {
        eprintln!("arch-check: {v}");
    }
    anyhow::bail!("{} architecture violation(s)", violations.len())
}

fn forbidden_dependencies(package: &Package) -> Vec<String> {
    package
        .dependencies
        .iter()
        // Dev-dependencies may use anything.
        .filter(|d| d.kind.as_deref() != Some("dev"))
        .filter(|d| FORBIDDEN_DOMAIN_DEPS.contains(&d.name.as_str()))
        .map(|d| format!("{} depends on {}", package.name, d.name))
        .collect()
}

/// Source-level references to runtime crates, e.g. `tokio::spawn`.
fn forbidden_paths(src: &Path) -> anyhow::Result<Vec<String>> {
    let pattern = regex_lite::Regex::new(r"\b(tokio|tokio_util|dashmap|multiworld_engine)::")
        .context("compiling path pattern")?;

    let mut violations = Vec::new();
    for file in rust_files(src)? {
        let text = std::fs::read_to_string(&file)
            .with_context(|| format!("reading {}", file.display()))?;
        for (line_no, line) in text.lines().enumerate() {
            if let Some(m) = pattern.find(line) {
                violations.push(format!(
                    "{}:{} references {}",
                    file.display(),
                    line_no + 1,
                    m.as_str().trim_end_matches("::")
                ));
            }
        }
    }
    Ok(violations)
}

fn rust_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            files.extend(rust_files(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
