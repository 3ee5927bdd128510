//! Rendering of procedures, functions, views and triggers.

use crate::catalog::{ModuleDefinition, ObjectKind};
use crate::error::{Result, SyncError};
use regex::Regex;
use std::sync::LazyLock;

static PROCEDURE_RE: LazyLock<Regex> =
    LazyLock::new(|| create_statement(r"PROC(?:EDURE)?"));
static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| create_statement("FUNCTION"));
static VIEW_RE: LazyLock<Regex> = LazyLock::new(|| create_statement("VIEW"));
static TRIGGER_RE: LazyLock<Regex> = LazyLock::new(|| create_statement("TRIGGER"));

/// Whitespace, block comments and line comments between keywords.
const GAP: &str = r"(?:\s|/\*(?s:.*?)\*/|--[^\n]*\n)+";

fn create_statement(keyword: &str) -> Regex {
    let pattern = format!(
        r"(?i)\b(?P<create>CREATE)(?P<alter>{gap}OR{gap}ALTER)?{gap}(?P<kw>{kw})\b",
        gap = GAP,
        kw = keyword
    );
    Regex::new(&pattern).unwrap_or_else(|e| panic!("invalid CREATE pattern {}: {}", pattern, e))
}

fn pattern_for(kind: ObjectKind) -> Option<&'static Regex> {
    match kind {
        ObjectKind::Procedure => Some(&*PROCEDURE_RE),
        ObjectKind::Function => Some(&*FUNCTION_RE),
        ObjectKind::View => Some(&*VIEW_RE),
        ObjectKind::Trigger => Some(&*TRIGGER_RE),
        ObjectKind::Table => None,
    }
}

/// Rewrite the first `CREATE <kind>` of the definition to `CREATE OR ALTER <kind>`.
///
/// The returned text is not normalized.
pub fn render_module(kind: ObjectKind, module: &ModuleDefinition) -> Result<String> {
    let re = pattern_for(kind).ok_or_else(|| {
        SyncError::render(module.name.to_string(), format!("{} is not a module", kind))
    })?;

    let caps = re.captures(&module.definition).ok_or_else(|| {
        SyncError::render(
            module.name.to_string(),
            format!("definition has no CREATE {} statement", kind.as_str().to_uppercase()),
        )
    })?;

    if caps.name("alter").is_some() {
        return Ok(module.definition.clone());
    }

    let (Some(create), Some(keyword)) = (caps.name("create"), caps.name("kw")) else {
        return Ok(module.definition.clone());
    };

    // Comments between CREATE and the keyword are kept; plain whitespace collapses
    let gap = &module.definition[create.end()..keyword.start()];
    let gap = if gap.trim().is_empty() { " " } else { gap };

    let mut out = String::with_capacity(module.definition.len() + 9);
    out.push_str(&module.definition[..create.start()]);
    out.push_str("CREATE OR ALTER");
    out.push_str(gap);
    out.push_str(keyword.as_str());
    out.push_str(&module.definition[keyword.end()..]);
    Ok(out)
}
