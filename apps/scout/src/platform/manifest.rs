//! Dependency-manifest parsing for the ecosystems we probe.

use std::collections::BTreeSet;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    PackageJson,
    Requirements,
    Pyproject,
    CargoToml,
    GoMod,
    PomXml,
}

/// Probed in order; every file that exists contributes dependencies.
pub const MANIFEST_FILES: &[(&str, ManifestKind)] = &[
    ("package.json", ManifestKind::PackageJson),
    ("requirements.txt", ManifestKind::Requirements),
    ("pyproject.toml", ManifestKind::Pyproject),
    ("Cargo.toml", ManifestKind::CargoToml),
    ("go.mod", ManifestKind::GoMod),
    ("pom.xml", ManifestKind::PomXml),
];

/// Extracts normalised dependency names. Malformed content yields an empty set.
pub fn parse_manifest(kind: ManifestKind, content: &str) -> BTreeSet<String> {
    let names = match kind {
        ManifestKind::PackageJson => parse_package_json(content),
        ManifestKind::Requirements => content.lines().filter_map(requirement_name).collect(),
        ManifestKind::Pyproject => parse_pyproject(content),
        ManifestKind::CargoToml => parse_cargo_toml(content),
        ManifestKind::GoMod => parse_go_mod(content),
        ManifestKind::PomXml => parse_pom(content),
    };

    let mut deps = BTreeSet::new();
    for name in names {
        insert_with_segments(&mut deps, &name);
    }
    deps
}

/// Adds the name plus its scope and last path segment (`@angular/core` → `angular`, `core`).
fn insert_with_segments(deps: &mut BTreeSet<String>, name: &str) {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return;
    }
    if let Some((scope, last)) = name.rsplit_once('/') {
        if !last.is_empty() {
            deps.insert(last.to_string());
        }
        let scope = scope.trim_start_matches('@');
        if !scope.is_empty() && !scope.contains('/') && !scope.contains('.') {
            deps.insert(scope.to_string());
        }
    }
    deps.insert(name);
}

fn parse_package_json(content: &str) -> Vec<String> {
    let Ok(json) = serde_json::from_str::<Value>(content) else {
        return Vec::new();
    };

    ["dependencies", "devDependencies", "peerDependencies"]
        .iter()
        .filter_map(|section| json.get(section).and_then(|v| v.as_object()))
        .flat_map(|deps| deps.keys().cloned())
        .collect()
}

/// PEP 508 requirement line → distribution name.
fn requirement_name(line: &str) -> Option<String> {
    let line = line.split('#').next()?.trim();
    if line.is_empty() || line.starts_with('-') {
        return None;
    }
    let end = line
        .find(|c: char| "=<>!~;[ @(".contains(c))
        .unwrap_or(line.len());
    let name = line[..end].trim();
    (!name.is_empty()).then(|| name.replace('_', "-"))
}

fn parse_pyproject(content: &str) -> Vec<String> {
    let Ok(doc) = content.parse::<toml::Table>() else {
        return Vec::new();
    };

    let mut names = Vec::new();

    if let Some(deps) = doc
        .get("project")
        .and_then(|p| p.get("dependencies"))
        .and_then(|d| d.as_array())
    {
        names.extend(deps.iter().filter_map(|d| d.as_str()).filter_map(requirement_name));
    }

    if let Some(deps) = doc
        .get("tool")
        .and_then(|t| t.get("poetry"))
        .and_then(|p| p.get("dependencies"))
        .and_then(|d| d.as_table())
    {
        names.extend(deps.keys().filter(|k| *k != "python").cloned());
    }

    names
}

fn parse_cargo_toml(content: &str) -> Vec<String> {
    let Ok(doc) = content.parse::<toml::Table>() else {
        return Vec::new();
    };

    let mut names: Vec<String> = ["dependencies", "dev-dependencies", "build-dependencies"]
        .iter()
        .filter_map(|section| doc.get(*section).and_then(|v| v.as_table()))
        .flat_map(|deps| deps.keys().cloned())
        .collect();

    if let Some(deps) = doc
        .get("workspace")
        .and_then(|w| w.get("dependencies"))
        .and_then(|d| d.as_table())
    {
        names.extend(deps.keys().cloned());
    }

    names
}

fn parse_go_mod(content: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut in_block = false;

    for line in content.lines() {
        let line = line.split("//").next().unwrap_or("").trim();
        if in_block {
            if line == ")" {
                in_block = false;
            } else if let Some(path) = line.split_whitespace().next() {
                names.push(path.to_string());
            }
        } else if line.starts_with("require (") || line == "require(" {
            in_block = true;
        } else if let Some(rest) = line.strip_prefix("require ") {
            if let Some(path) = rest.split_whitespace().next() {
                names.push(path.to_string());
            }
        }
    }

    names
}

fn parse_pom(content: &str) -> Vec<String> {
    const OPEN: &str = "<artifactId>";
    const CLOSE: &str = "</artifactId>";

    let mut names = Vec::new();
    let mut rest = content;
    while let Some(start) = rest.find(OPEN) {
        let after = &rest[start + OPEN.len()..];
        let Some(end) = after.find(CLOSE) else {
            break;
        };
        names.push(after[..end].trim().to_string());
        rest = &after[end + CLOSE.len()..];
    }
    names
}
