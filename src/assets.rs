use crate::assemble::Stylesheet;
use crate::error::ReportError;
use crate::substitute::Template;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const TEMPLATE_FILE: &str = "report_template.md";
pub const STYLESHEET_FILE: &str = "report.css";
pub const SAMPLE_RECORD_FILE: &str = "sample_record.json";

const EMBEDDED_TEMPLATE: &str = include_str!("../assets/report_template.md");
const EMBEDDED_STYLESHEET: &str = include_str!("../assets/report.css");
const EMBEDDED_SAMPLE_RECORD: &str = include_str!("../assets/sample_record.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Template,
    Stylesheet,
    SampleRecord,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Template => "template",
            AssetKind::Stylesheet => "stylesheet",
            AssetKind::SampleRecord => "sample_record",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            AssetKind::Template => TEMPLATE_FILE,
            AssetKind::Stylesheet => STYLESHEET_FILE,
            AssetKind::SampleRecord => SAMPLE_RECORD_FILE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Asset {
    pub name: String,
    pub kind: AssetKind,
    pub text: String,
    pub source: Option<PathBuf>,
}

impl Asset {
    pub fn new(name: impl Into<String>, kind: AssetKind, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            text: text.into(),
            source: None,
        }
    }

    fn read(dir: &Path, kind: AssetKind) -> Result<Self, ReportError> {
        let path = dir.join(kind.file_name());
        let text = std::fs::read_to_string(&path).map_err(|err| {
            ReportError::Asset(format!("{} not found: {} ({err})", kind.as_str(), path.display()))
        })?;
        Ok(Self {
            name: kind.file_name().to_string(),
            kind,
            text,
            source: Some(path),
        })
    }

    pub fn bytes_len(&self) -> usize {
        self.text.len()
    }
}

/// Raw template, stylesheet and sample texts, before validation.
#[derive(Debug, Clone, Default)]
pub struct AssetBundle {
    pub assets: Vec<Asset>,
}

impl AssetBundle {
    /// The defaults compiled into the crate, loaded once per process.
    pub fn embedded() -> &'static AssetBundle {
        static EMBEDDED: OnceLock<AssetBundle> = OnceLock::new();
        EMBEDDED.get_or_init(|| {
            let mut bundle = AssetBundle::default();
            bundle.add(Asset::new(TEMPLATE_FILE, AssetKind::Template, EMBEDDED_TEMPLATE));
            bundle.add(Asset::new(STYLESHEET_FILE, AssetKind::Stylesheet, EMBEDDED_STYLESHEET));
            bundle.add(Asset::new(
                SAMPLE_RECORD_FILE,
                AssetKind::SampleRecord,
                EMBEDDED_SAMPLE_RECORD,
            ));
            bundle
        })
    }

    /// Reads the template and stylesheet from `dir`; a sample record there is optional.
    pub fn from_dir(dir: &Path) -> Result<Self, ReportError> {
        let mut bundle = AssetBundle::default();
        bundle.add(Asset::read(dir, AssetKind::Template)?);
        bundle.add(Asset::read(dir, AssetKind::Stylesheet)?);
        if dir.join(SAMPLE_RECORD_FILE).is_file() {
            bundle.add(Asset::read(dir, AssetKind::SampleRecord)?);
        }
        tracing::debug!(dir = %dir.display(), assets = bundle.assets.len(), "loaded report assets");
        Ok(bundle)
    }

    /// Later additions of the same kind replace earlier ones.
    pub fn add(&mut self, asset: Asset) {
        self.assets.retain(|existing| existing.kind != asset.kind);
        self.assets.push(asset);
    }

    pub fn get(&self, kind: AssetKind) -> Option<&Asset> {
        self.assets.iter().find(|asset| asset.kind == kind)
    }

    fn require(&self, kind: AssetKind) -> Result<&Asset, ReportError> {
        self.get(kind)
            .ok_or_else(|| ReportError::Asset(format!("asset bundle has no {}", kind.as_str())))
    }

    pub fn template(&self) -> Result<Template, ReportError> {
        let asset = self.require(AssetKind::Template)?;
        Ok(Template::new(asset.name.clone(), asset.text.clone()))
    }

    pub fn stylesheet(&self, minify: bool) -> Result<Stylesheet, ReportError> {
        Stylesheet::parse(&self.require(AssetKind::Stylesheet)?.text, minify)
    }

    pub fn sample_record(&self) -> Result<Value, ReportError> {
        let asset = self.require(AssetKind::SampleRecord)?;
        serde_json::from_str(&asset.text)
            .map_err(|err| ReportError::Asset(format!("invalid {}: {err}", asset.name)))
    }
}

/// The sample record shipped with the crate.
pub fn sample_record() -> Result<Value, ReportError> {
    AssetBundle::embedded().sample_record()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_bundle_has_every_default() {
        let bundle = AssetBundle::embedded();
        assert!(bundle.get(AssetKind::Template).is_some());
        assert!(bundle.get(AssetKind::Stylesheet).is_some());
        let sample = bundle.sample_record().expect("sample record");
        assert_eq!(sample["company_name"], "acme corp");
    }

    #[test]
    fn embedded_template_has_twelve_pages() {
        let template = AssetBundle::embedded().template().expect("template");
        let markers = template
            .source()
            .lines()
            .filter(|line| line.trim() == calm_report_contract::PAGE_BREAK_MARKER)
            .count();
        assert_eq!(markers, calm_report_contract::TARGET_PAGE_COUNT - 1);
        assert!(!template.source().to_lowercase().contains("rasci"));
    }

    #[test]
    fn embedded_stylesheet_parses() {
        let sheet = AssetBundle::embedded().stylesheet(false).expect("stylesheet");
        assert!(sheet.source().contains(".teal-accent"));
        assert!(!sheet.source().contains("${"));
    }

    #[test]
    fn from_dir_requires_template_and_stylesheet() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = AssetBundle::from_dir(dir.path()).expect_err("missing template");
        assert!(err.to_string().contains("template not found"));

        std::fs::write(dir.path().join(TEMPLATE_FILE), "# ${company_name}").expect("write");
        std::fs::write(dir.path().join(STYLESHEET_FILE), "p { margin: 0 }").expect("write");
        let bundle = AssetBundle::from_dir(dir.path()).expect("bundle");
        assert_eq!(bundle.assets.len(), 2);
        assert_eq!(
            bundle.template().expect("template").placeholders(),
            vec!["${company_name}"]
        );
        assert!(bundle.sample_record().is_err());
    }

    #[test]
    fn add_replaces_same_kind() {
        let mut bundle = AssetBundle::default();
        bundle.add(Asset::new("a.css", AssetKind::Stylesheet, "a {}"));
        bundle.add(Asset::new("b.css", AssetKind::Stylesheet, "b {}"));
        assert_eq!(bundle.assets.len(), 1);
        assert_eq!(bundle.get(AssetKind::Stylesheet).map(|a| a.name.as_str()), Some("b.css"));
    }
}
