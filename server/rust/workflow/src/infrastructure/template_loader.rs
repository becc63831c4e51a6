use std::path::{Path, PathBuf};

use crate::domain::entity::workflow_template::WorkflowTemplate;

/// TemplateLoader はディスク上の YAML ファイルからワークフローテンプレートを読み込む。
pub struct TemplateLoader {
    template_dir: PathBuf,
}

impl TemplateLoader {
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
        }
    }

    /// ディレクトリ内の全 .yaml/.yml ファイルをファイル名順に読み込む。
    /// ディレクトリが存在しない場合は空のリストを返す。読めないファイルは警告してスキップする。
    pub async fn load_all(&self) -> anyhow::Result<Vec<WorkflowTemplate>> {
        if !self.template_dir.exists() {
            tracing::warn!(
                dir = %self.template_dir.display(),
                "template directory does not exist, returning empty list"
            );
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&self.template_dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() && is_yaml(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut templates = Vec::with_capacity(paths.len());
        for path in paths {
            match self.load_file(&path).await {
                Ok(template) => {
                    tracing::info!(
                        file = %path.display(),
                        template_id = %template.id,
                        steps = template.steps.len(),
                        "loaded workflow template"
                    );
                    templates.push(template);
                }
                Err(e) => {
                    tracing::warn!(
                        file = %path.display(),
                        error = %e,
                        "failed to load workflow template, skipping"
                    );
                }
            }
        }

        Ok(templates)
    }

    pub async fn load_file(&self, path: &Path) -> anyhow::Result<WorkflowTemplate> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to read file {}: {}", path.display(), e))?;
        WorkflowTemplate::from_yaml(&content).map_err(|e| {
            anyhow::anyhow!("failed to parse template from {}: {}", path.display(), e)
        })
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_temp_dir() -> TempDir {
        tempfile::tempdir().expect("failed to create temp dir")
    }

    const REPAIR_YAML: &str = r#"
id: warranty-repair
name: Warranty repair
steps:
  - key: intake
    required_role: clerk
    required_sub_task_keys: [photos-uploaded]
    allowed_next_keys: [diagnosis]
  - key: diagnosis
    required_role: technician
    sla_minutes: 1440
    allowed_next_keys: [closed]
  - key: closed
    required_role: clerk
"#;

    const PARTS_YAML: &str = r#"
id: parts-issuance
name: Parts issuance
steps:
  - key: request
    required_role: technician
"#;

    const BROKEN_GRAPH_YAML: &str = r#"
id: broken
name: Broken
steps:
  - key: intake
    required_role: clerk
    allowed_next_keys: [nowhere]
"#;

    #[tokio::test]
    async fn test_load_file_success() {
        let dir = make_temp_dir();
        let file_path = dir.path().join("repair.yaml");
        fs::write(&file_path, REPAIR_YAML).unwrap();

        let loader = TemplateLoader::new(dir.path());
        let template = loader.load_file(&file_path).await.unwrap();

        assert_eq!(template.id, "warranty-repair");
        assert_eq!(template.steps.len(), 3);
        assert_eq!(template.steps[1].sla_minutes, Some(1440));
    }

    #[tokio::test]
    async fn test_load_file_not_found() {
        let dir = make_temp_dir();
        let loader = TemplateLoader::new(dir.path());
        let msg = loader
            .load_file(&dir.path().join("missing.yaml"))
            .await
            .unwrap_err()
            .to_string();
        assert!(msg.contains("failed to read file"), "unexpected error: {msg}");
    }

    #[tokio::test]
    async fn test_load_file_rejects_invalid_graph() {
        let dir = make_temp_dir();
        let file_path = dir.path().join("broken.yaml");
        fs::write(&file_path, BROKEN_GRAPH_YAML).unwrap();

        let loader = TemplateLoader::new(dir.path());
        let msg = loader.load_file(&file_path).await.unwrap_err().to_string();
        assert!(msg.contains("failed to parse template"), "unexpected error: {msg}");
    }

    #[tokio::test]
    async fn test_load_all_skips_invalid_and_non_yaml() {
        let dir = make_temp_dir();
        fs::write(dir.path().join("b-repair.yaml"), REPAIR_YAML).unwrap();
        fs::write(dir.path().join("a-parts.yml"), PARTS_YAML).unwrap();
        fs::write(dir.path().join("c-broken.yaml"), BROKEN_GRAPH_YAML).unwrap();
        fs::write(dir.path().join("README.md"), "# templates").unwrap();

        let loader = TemplateLoader::new(dir.path());
        let templates = loader.load_all().await.unwrap();

        let ids: Vec<&str> = templates.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["parts-issuance", "warranty-repair"]);
    }

    #[tokio::test]
    async fn test_load_all_missing_dir() {
        let loader = TemplateLoader::new("/nonexistent/claimflow/templates");
        assert!(loader.load_all().await.unwrap().is_empty());
    }
}
