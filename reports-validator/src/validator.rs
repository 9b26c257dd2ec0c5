//! Repository validation.
//!
//! Every check appends a human-readable message; nothing short-circuits
//! except an entrypoint that cannot be split into a package path, which
//! skips the rest of that report. Duplicate id lists are sorted.

use std::collections::BTreeMap;
use std::path::Path;

use reports_core::descriptor;
use reports_core::types::{ParameterDefinition, RendererDefinition, ReportDefinition, RepositoryDefinition};
use reports_core::DescriptorError;
use reports_renderer::RendererRegistry;

/// Parameter types that need a list of choices.
pub const CHOICES_PARAM_TYPES: &[&str] = &["checkbox", "choice"];

/// Every accepted parameter type.
pub const ALL_PARAM_TYPES: &[&str] = &[
    "date_range",
    "date",
    "single_line",
    "object",
    "product",
    "marketplace",
    "hub",
    "checkbox",
    "choice",
];

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Validate a whole repository. Returns every problem found.
pub fn validate(registry: &RendererRegistry, repo: &RepositoryDefinition) -> Vec<String> {
    let mut errors = Vec::new();
    if !repo.root_path.join(&repo.readme_file).is_file() {
        errors.push("repository property `readme_file` cannot be resolved to a file.".to_string());
    }

    // Entrypoints too short to name a module have no local id to clash on.
    let mut local_ids = Vec::with_capacity(repo.reports.len());
    for report in &repo.reports {
        local_ids.extend(report.local_id());
        errors.extend(validate_report(registry, report));
    }

    let duplicated = duplicates(local_ids);
    if !duplicated.is_empty() {
        errors.push(format!(
            "Multiple reports within single module found: {}",
            duplicated.join(",")
        ));
    }

    if errors.is_empty() {
        tracing::debug!("repository `{}` is valid", repo.name);
    } else {
        tracing::warn!("repository `{}` has {} validation error(s)", repo.name, errors.len());
    }
    errors
}

/// Load `<root>/reports.json` and validate it.
pub fn validate_repository_at(
    registry: &RendererRegistry,
    root: &Path,
) -> Result<Vec<String>, DescriptorError> {
    let repo = descriptor::load_repository_at(root)?;
    Ok(validate(registry, &repo))
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

pub fn validate_report(registry: &RendererRegistry, report: &ReportDefinition) -> Vec<String> {
    let local_id = report.local_id_or_default();
    let mut errors = Vec::new();

    if !report.root_path.join(&report.readme_file).is_file() {
        errors.push(format!(
            "report `{local_id}` property `readme_file` cannot be resolved to a file."
        ));
    }

    let tokens: Vec<&str> = report.entrypoint.split('.').collect();
    if tokens.len() < 2 {
        errors.push(format!(
            "entrypoint `{}` does not follow the package structure.",
            report.entrypoint
        ));
        return errors;
    }

    let package = report.root_path.join(tokens[0]).join(tokens[1]);
    let module = report.root_path.join(tokens[0]).join(format!("{}.py", tokens[1]));
    if !package.is_dir() && !module.is_file() {
        errors.push(format!(
            "entrypoint `{}` directory structure does not match the package definition.",
            report.entrypoint
        ));
    }

    errors.extend(validate_parameters(local_id, &report.parameters));

    let mut renderer_ids = Vec::with_capacity(report.renderers.len());
    let mut defaults = Vec::new();
    for renderer in &report.renderers {
        renderer_ids.push(renderer.id.as_str());
        if renderer.default {
            defaults.push(renderer.id.as_str());
        }
        errors.extend(validate_renderer(registry, local_id, renderer));
    }

    let duplicated = duplicates(renderer_ids);
    if !duplicated.is_empty() {
        errors.push(format!(
            "report {local_id} has duplicated renderer ids: {}",
            duplicated.join(",")
        ));
    }

    if defaults.len() > 1 {
        defaults.sort_unstable();
        errors.push(format!(
            "report {local_id} has multiple default renderers: {}",
            defaults.join(",")
        ));
    }

    errors
}

// ---------------------------------------------------------------------------
// Parameters and renderers
// ---------------------------------------------------------------------------

pub fn validate_parameters(report_id: &str, parameters: &[ParameterDefinition]) -> Vec<String> {
    let mut errors = Vec::new();
    for param in parameters {
        if !ALL_PARAM_TYPES.contains(&param.kind.as_str()) {
            errors.push(format!(
                "Invalid type for parameter `{}` on report `{report_id}`: `{}`.",
                param.id, param.kind
            ));
        }
        if CHOICES_PARAM_TYPES.contains(&param.kind.as_str()) && param.has_no_choices() {
            errors.push(format!(
                "Missing choices for parameter `{}` on report `{report_id}`.",
                param.id
            ));
        }
    }

    let duplicated = duplicates(parameters.iter().map(|p| p.id.as_str()));
    if !duplicated.is_empty() {
        errors.push(format!(
            "The following parameter ids are duplicated on report `{report_id}`: {}",
            duplicated.join(",")
        ));
    }
    errors
}

/// Unknown types are reported without running the type's own checks.
pub fn validate_renderer(
    registry: &RendererRegistry,
    report_id: &str,
    renderer: &RendererDefinition,
) -> Vec<String> {
    match registry.get_renderer_class(&renderer.kind) {
        Ok(class) => class.validate(renderer),
        Err(_) => vec![format!(
            "renderer `{}` of type `{}` is not known on `{report_id}`.",
            renderer.id, renderer.kind
        )],
    }
}

/// Values seen more than once, sorted.
fn duplicates<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(value, _)| value)
        .collect()
}
