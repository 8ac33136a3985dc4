// ABOUTME: Pipeline file scaffolding for new projects.
// ABOUTME: Writes a halyard.yml modelled on a build-push-deploy pipeline.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::PipelineName;

use super::CONFIG_FILENAME;

pub fn init_config(dir: &Path, pipeline: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let name = PipelineName::new(pipeline.unwrap_or("sample-app"))
        .map_err(|e| Error::InvalidConfig(e.to_string()))?;

    std::fs::write(&config_path, generate_template_yaml(&name)).map_err(|source| {
        Error::CannotCreate {
            path: config_path.clone(),
            source,
        }
    })?;

    Ok(())
}

fn generate_template_yaml(name: &PipelineName) -> String {
    format!(
        r#"pipeline: {name}

values:
  image_repository: registry.example.com/acme/{name}
  # Unique per run; BUILD_NUMBER is used when image_tag is not set at all.
  image_tag: {{ env: BUILD_NUMBER }}
  app_repo_url: https://git.example.com/acme/{name}.git
  chart_repo_url: https://git.example.com/acme/{name}-chart.git

defaults:
  namespace: {name}

settings:
  stage_timeout: 30m

environments:
  git:
    provider: local
  kaniko:
    provider: container
    image: gcr.io/kaniko-project/executor:debug
    shell: /busybox/sh
  tools:
    provider: container
    image: alpine/k8s:1.29.2

stages:
  - name: checkout
    environment: git
    run: [git, clone, --depth, "1", "${{app_repo_url}}", app]

  - name: build
    environment: kaniko
    timeout: 20m
    run:
      - /kaniko/executor
      - --context=/workspace/app
      - "--destination=${{image_repository}}:${{image_tag}}"

  - name: fetch-chart
    environment: git
    run: [git, clone, --depth, "1", "${{chart_repo_url}}", chart]

  - name: deploy
    environment: tools
    run:
      - helm
      - upgrade
      - --install
      - --create-namespace
      - --namespace
      - "${{namespace}}"
      - {name}
      - ./chart
    set:
      image.repository: image_repository
      image.tag: image_tag
"#
    )
}
