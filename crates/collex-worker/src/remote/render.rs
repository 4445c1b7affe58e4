//! Package description rendering
//!
//! The package description is produced by substituting `{{key}}`
//! placeholders in a template file with values from the model the
//! orchestrator assembles. A placeholder without a model value is an
//! error: shipping a package with a half-rendered description would be
//! worse than failing the finalize step.

use collex_common::{ExportError, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::TemplateRenderer;

/// File-backed `{{key}}` substitution renderer
pub struct FileTemplateRenderer {
    template_path: PathBuf,
    placeholder: Regex,
}

impl FileTemplateRenderer {
    pub fn new(template_path: PathBuf) -> Result<Self> {
        let placeholder = Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}")
            .map_err(|e| ExportError::Render(e.to_string()))?;
        Ok(Self {
            template_path,
            placeholder,
        })
    }
}

impl TemplateRenderer for FileTemplateRenderer {
    fn render(&self, model: &BTreeMap<String, String>) -> Result<String> {
        let template = std::fs::read_to_string(&self.template_path).map_err(|e| {
            ExportError::Render(format!(
                "cannot read template {}: {}",
                self.template_path.display(),
                e
            ))
        })?;

        let mut missing = Vec::new();
        let rendered = self
            .placeholder
            .replace_all(&template, |caps: &regex::Captures<'_>| {
                match model.get(&caps[1]) {
                    Some(value) => value.clone(),
                    None => {
                        missing.push(caps[1].to_string());
                        String::new()
                    },
                }
            })
            .into_owned();

        if missing.is_empty() {
            Ok(rendered)
        } else {
            Err(ExportError::Render(format!(
                "template references unknown model keys: {}",
                missing.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn renderer_for(template: &str) -> (NamedTempFile, FileTemplateRenderer) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(template.as_bytes()).unwrap();
        let renderer = FileTemplateRenderer::new(file.path().to_path_buf()).unwrap();
        (file, renderer)
    }

    #[test]
    fn test_substitutes_placeholders() {
        let (_file, renderer) =
            renderer_for("Export {{ job_id }} from {{source_system}}: {{rows}} rows.");
        let model = BTreeMap::from([
            ("job_id".to_string(), "j-1".to_string()),
            ("source_system".to_string(), "Herbarium".to_string()),
            ("rows".to_string(), "42".to_string()),
        ]);

        let text = renderer.render(&model).unwrap();
        assert_eq!(text, "Export j-1 from Herbarium: 42 rows.");
    }

    #[test]
    fn test_unknown_placeholder_is_render_error() {
        let (_file, renderer) = renderer_for("Export {{nope}}");
        let err = renderer.render(&BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ExportError::Render(_)));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_missing_template_file_is_render_error() {
        let renderer =
            FileTemplateRenderer::new(PathBuf::from("/definitely/not/here.txt")).unwrap();
        let err = renderer.render(&BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ExportError::Render(_)));
    }
}
