//! Renderer registry — maps a renderer key (`csv`, `xlsx`, …) to the type
//! that produces that format.
//!
//! The registry is an owned value built during set-up and read afterwards.
//! Tests build their own instance; there is no process-wide table.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::{Map, Value};

use reports_core::types::{Account, RendererDefinition, Report};

use crate::base::{Renderer, RendererKind};
use crate::context::RenderContext;
use crate::error::RegistryError;
use crate::renderers::{CsvRenderer, Jinja2Renderer, JsonRenderer, PdfRenderer, XlsxRenderer};

/// Constructor and validation hook of one registered renderer type.
#[derive(Clone, Copy)]
pub struct RendererClass {
    build: fn(RenderContext) -> Box<dyn Renderer>,
    validate: fn(&RendererDefinition) -> Vec<String>,
}

impl RendererClass {
    /// Class descriptor for a concrete renderer type.
    pub fn of<R: RendererKind>() -> Self {
        RendererClass {
            build: |context| Box::new(R::from_context(context)) as Box<dyn Renderer>,
            validate: R::validate,
        }
    }

    pub fn new(
        build: fn(RenderContext) -> Box<dyn Renderer>,
        validate: fn(&RendererDefinition) -> Vec<String>,
    ) -> Self {
        RendererClass { build, validate }
    }

    pub fn instantiate(&self, context: RenderContext) -> Box<dyn Renderer> {
        (self.build)(context)
    }

    pub fn validate(&self, definition: &RendererDefinition) -> Vec<String> {
        (self.validate)(definition)
    }
}

impl std::fmt::Debug for RendererClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererClass").finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct RendererRegistry {
    classes: BTreeMap<String, RendererClass>,
}

impl RendererRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `csv`, `json`, `xlsx`, `jinja2` and `pdf` bound.
    pub fn with_builtins() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register::<CsvRenderer>(CsvRenderer::NAME)?;
        registry.register::<JsonRenderer>(JsonRenderer::NAME)?;
        registry.register::<XlsxRenderer>(XlsxRenderer::NAME)?;
        registry.register::<Jinja2Renderer>(Jinja2Renderer::NAME)?;
        registry.register::<PdfRenderer>(PdfRenderer::NAME)?;
        Ok(registry)
    }

    /// Bind `R` to `name`. An existing binding is kept and reported.
    pub fn register<R: RendererKind>(&mut self, name: &str) -> Result<(), RegistryError> {
        self.register_class(name, RendererClass::of::<R>())
    }

    pub fn register_class(&mut self, name: &str, class: RendererClass) -> Result<(), RegistryError> {
        if self.classes.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered {
                name: name.to_string(),
            });
        }
        tracing::debug!("renderer registered: {name}");
        self.classes.insert(name.to_string(), class);
        Ok(())
    }

    pub fn get_renderer_class(&self, name: &str) -> Result<&RendererClass, RegistryError> {
        self.classes.get(name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_string(),
        })
    }

    /// Instantiate the renderer bound to `name` for one execution.
    #[allow(clippy::too_many_arguments)]
    pub fn get_renderer(
        &self,
        name: &str,
        environment: &str,
        root_dir: impl Into<PathBuf>,
        account: Account,
        report: Report,
        template: Option<&str>,
        args: Map<String, Value>,
    ) -> Result<Box<dyn Renderer>, RegistryError> {
        let class = self.get_renderer_class(name)?;
        let mut context = RenderContext::new(environment, root_dir, account, report).with_args(args);
        if let Some(template) = template {
            context = context.with_template(template);
        }
        Ok(class.instantiate(context))
    }

    /// Instantiate the renderer described by a descriptor entry.
    pub fn get_renderer_for(
        &self,
        definition: &RendererDefinition,
        environment: &str,
        account: Account,
        report: Report,
    ) -> Result<Box<dyn Renderer>, RegistryError> {
        self.get_renderer(
            &definition.kind,
            environment,
            definition.root_path.clone(),
            account,
            report,
            definition.template.as_deref(),
            definition.args.clone().unwrap_or_default(),
        )
    }

    /// Registered keys, sorted.
    pub fn get_renderers(&self) -> Vec<&str> {
        self.classes.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report() -> Report {
        Report {
            id: "R-1".into(),
            name: "report".into(),
            description: String::new(),
            values: vec![],
        }
    }

    #[test]
    fn builtins_are_sorted() {
        let registry = RendererRegistry::with_builtins().expect("builtins");
        assert_eq!(registry.get_renderers(), vec!["csv", "jinja2", "json", "pdf", "xlsx"]);
    }

    #[test]
    fn duplicate_registration_keeps_first_binding() {
        let mut registry = RendererRegistry::new();
        registry.register::<CsvRenderer>("fmt").expect("first");
        let err = registry.register::<XlsxRenderer>("fmt").unwrap_err();
        assert_eq!(err.to_string(), "The renderer fmt is already registered.");

        let renderer = registry
            .get_renderer("fmt", "test", "/repo", Account::new("A", "a"), report(), None, Map::new())
            .expect("renderer");
        assert_eq!(renderer.packaging(), crate::base::Packaging::Zip);
    }

    #[test]
    fn unknown_renderer_is_not_found() {
        let registry = RendererRegistry::new();
        let err = registry.get_renderer_class("docx").unwrap_err();
        assert_eq!(err.to_string(), "The renderer docx does not exist.");
    }

    #[test]
    fn renderer_receives_template_and_args() {
        let registry = RendererRegistry::with_builtins().expect("builtins");
        let mut args = Map::new();
        args.insert("start_row".into(), json!(3));
        let renderer = registry
            .get_renderer(
                "xlsx",
                "production",
                "/repo",
                Account::new("VA-1", "vendor"),
                report(),
                Some("templates/t.xlsx"),
                args,
            )
            .expect("renderer");
        let context = renderer.context();
        assert_eq!(context.environment, "production");
        assert_eq!(context.template.as_deref(), Some("templates/t.xlsx"));
        assert_eq!(context.arg("start_row"), Some(&json!(3)));
    }

    #[test]
    fn class_validate_dispatches_to_renderer_type() {
        let registry = RendererRegistry::with_builtins().expect("builtins");
        let definition = RendererDefinition::new("/nonexistent", "r", "jinja2");
        let errors = registry
            .get_renderer_class("jinja2")
            .expect("class")
            .validate(&definition);
        assert_eq!(errors, vec!["`template` is required for jinja2 renderer."]);
    }
}
