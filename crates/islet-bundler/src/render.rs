//! Static template rendering.
//!
//! Compiled server modules are rendered by their template type's renderer in
//! a child Node process. The process reads a JSON job list on stdin and
//! answers with one JSON result per job on stdout. In
//! [`RenderMode::Isolated`] each template gets its own process, so a crash
//! only fails that template; [`RenderMode::Batched`] renders everything in
//! one process.
//!
//! Every result carries the universal components the template rendered. Their
//! client chunks, dependencies first, are injected as `<script>` tags.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use islet_config::{RenderMode, RenderSection};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::entries::Entry;
use crate::manifest::ChunkManifest;
use crate::orchestrator::client_chunk_name;
use crate::{Error, Result};

/// A render process failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("rendering {} failed ({}): {stderr}", .template.display(), describe_exit(.exit_code))]
pub struct RenderError {
    /// Source path of the template.
    pub template: PathBuf,
    /// Exit code of the process; `None` if it never exited on its own or the
    /// failure was reported by the process itself.
    pub exit_code: Option<i32>,
    pub stderr: String,
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code".to_string(),
    }
}

/// One template written to the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPage {
    pub name: String,
    pub template_type: String,
    pub output_path: PathBuf,
    /// Ids of the universal components on the page, in render order.
    pub components: Vec<String>,
}

/// A template and the compiled module that renders it.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub entry: Entry,
    /// Absolute path of the compiled server module.
    pub module_path: PathBuf,
    /// Renderer module registered for the entry's template type.
    pub renderer: String,
}

/// Pages rendered and templates that failed.
#[derive(Debug, Default)]
pub struct RenderReport {
    pub pages: Vec<RenderedPage>,
    pub failures: Vec<Error>,
}

#[derive(Serialize)]
struct RenderRequest<'a> {
    jobs: Vec<JobRequest<'a>>,
}

#[derive(Serialize)]
struct JobRequest<'a> {
    name: &'a str,
    module: String,
    renderer: &'a str,
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    results: Vec<JobResult>,
}

#[derive(Debug, Deserialize)]
struct JobResult {
    name: String,
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    components: Vec<String>,
    #[serde(default)]
    error: Option<JobFailure>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobFailure {
    kind: FailureKind,
    message: String,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum FailureKind {
    MissingDefaultExport,
    Exception,
}

const RENDER_SCRIPT: &str = r#"import { pathToFileURL } from "node:url";

const USED = Symbol.for("islet.usedComponents");
const chunks = [];
for await (const chunk of process.stdin) chunks.push(chunk);
const { jobs } = JSON.parse(Buffer.concat(chunks).toString("utf8"));

const results = [];
for (const job of jobs) {
  try {
    const template = await import(pathToFileURL(job.module).href);
    if (typeof template.default !== "function") {
      results.push({
        name: job.name,
        error: { kind: "missing-default-export", message: "template module has no default export function" },
      });
      continue;
    }
    const renderer = await import(job.renderer);
    const render = renderer.default ?? renderer.render;
    globalThis[USED] = new Set();
    const html = await render(template.default, {});
    results.push({ name: job.name, html: String(html), components: Array.from(globalThis[USED]) });
  } catch (error) {
    results.push({
      name: job.name,
      error: { kind: "exception", message: String((error && error.stack) || error) },
    });
  }
}

process.stdout.write(JSON.stringify({ results }));
"#;

/// Renders compiled templates into `out_dir`.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    section: RenderSection,
    root: PathBuf,
    out_dir: PathBuf,
    public_path: String,
    environment: HashMap<String, String>,
}

impl TemplateRenderer {
    pub fn new(
        section: RenderSection,
        root: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            section,
            root: root.into(),
            out_dir: out_dir.into(),
            public_path: "/".to_string(),
            environment: HashMap::new(),
        }
    }

    pub fn with_public_path(mut self, public_path: impl Into<String>) -> Self {
        self.public_path = public_path.into();
        self
    }

    /// Extra environment variables for render processes.
    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    /// Render every job according to the configured mode.
    ///
    /// Template failures are collected in the report. With
    /// `abort_on_first_error` the first failure is returned instead.
    pub async fn render(
        &self,
        jobs: Vec<RenderJob>,
        manifest: &ChunkManifest,
    ) -> Result<RenderReport> {
        let mut report = RenderReport::default();
        if jobs.is_empty() {
            return Ok(report);
        }

        let batches: Vec<Vec<RenderJob>> = match self.section.mode {
            RenderMode::Off => {
                debug!(templates = jobs.len(), "static rendering disabled");
                return Ok(report);
            }
            RenderMode::Isolated => jobs.into_iter().map(|job| vec![job]).collect(),
            RenderMode::Batched => vec![jobs],
        };

        for batch in batches {
            let outcomes = match self.run_process(&batch).await {
                Ok(mut results) => batch
                    .iter()
                    .map(|job| match take_result(&mut results, &job.entry.name) {
                        Some(result) => Ok((job, result)),
                        None => Err(Error::Render(RenderError {
                            template: job.entry.source_path.clone(),
                            exit_code: Some(0),
                            stderr: "render process returned no result for this template"
                                .to_string(),
                        })),
                    })
                    .collect::<Vec<_>>(),
                Err(failure) => batch
                    .iter()
                    .map(|job| {
                        Err(Error::Render(RenderError {
                            template: job.entry.source_path.clone(),
                            ..failure.clone()
                        }))
                    })
                    .collect(),
            };

            for outcome in outcomes {
                let written = match outcome {
                    Ok((job, result)) => self.finish(job, result, manifest).await,
                    Err(err) => Err(err),
                };
                match written {
                    Ok(page) => report.pages.push(page),
                    Err(err) if self.section.abort_on_first_error => return Err(err),
                    Err(err) => {
                        warn!(error = %err, "template failed to render");
                        report.failures.push(err);
                    }
                }
            }
        }

        info!(
            rendered = report.pages.len(),
            failed = report.failures.len(),
            "static rendering finished"
        );
        Ok(report)
    }

    async fn run_process(
        &self,
        batch: &[RenderJob],
    ) -> std::result::Result<Vec<JobResult>, RenderError> {
        let template = batch
            .first()
            .map(|job| job.entry.source_path.clone())
            .unwrap_or_default();
        let failure = |exit_code: Option<i32>, stderr: String| RenderError {
            template: template.clone(),
            exit_code,
            stderr,
        };

        let request = RenderRequest {
            jobs: batch
                .iter()
                .map(|job| JobRequest {
                    name: &job.entry.name,
                    module: job.module_path.to_string_lossy().to_string(),
                    renderer: &job.renderer,
                })
                .collect(),
        };
        let payload = serde_json::to_vec(&request).map_err(|e| failure(None, e.to_string()))?;

        let mut child = Command::new(&self.section.node_binary)
            .arg("--input-type=module")
            .arg("-e")
            .arg(RENDER_SCRIPT)
            .current_dir(&self.root)
            .envs(&self.environment)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                failure(
                    None,
                    format!("failed to start `{}`: {e}", self.section.node_binary),
                )
            })?;

        debug!(templates = batch.len(), "render process started");
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|e| failure(None, format!("failed to send render jobs: {e}")))?;
        }

        let waited = child.wait_with_output();
        let output = match self.section.timeout_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), waited)
                .await
                .map_err(|_| failure(None, format!("render process timed out after {ms}ms")))?,
            None => waited.await,
        }
        .map_err(|e| failure(None, e.to_string()))?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(failure(output.status.code(), stderr));
        }

        let response: RenderResponse = serde_json::from_slice(&output.stdout).map_err(|e| {
            failure(
                output.status.code(),
                format!("unreadable render output: {e}\n{stderr}"),
            )
        })?;
        Ok(response.results)
    }

    async fn finish(
        &self,
        job: &RenderJob,
        result: JobResult,
        manifest: &ChunkManifest,
    ) -> Result<RenderedPage> {
        let entry = &job.entry;
        if let Some(failure) = result.error {
            return Err(match failure.kind {
                FailureKind::MissingDefaultExport => Error::Generation {
                    path: entry.source_path.clone(),
                    message: failure.message,
                },
                FailureKind::Exception => Error::Render(RenderError {
                    template: entry.source_path.clone(),
                    exit_code: None,
                    stderr: failure.message,
                }),
            });
        }

        let html = result.html.unwrap_or_default();
        let chunk_names: Vec<String> = result
            .components
            .iter()
            .map(|id| client_chunk_name(id))
            .collect();
        let starts: Vec<&str> = chunk_names.iter().map(String::as_str).collect();
        let tags = if starts.is_empty() {
            String::new()
        } else {
            manifest.script_tags_all(&starts, &self.public_path)?
        };

        let relative = PathBuf::from(entry.output_file());
        let path = self.out_dir.join(&relative);
        write_page(&path, &inject_scripts(&html, &tags)).await?;
        debug!(
            template = %entry.name,
            components = result.components.len(),
            path = %path.display(),
            "rendered template"
        );

        Ok(RenderedPage {
            name: entry.name.clone(),
            template_type: entry.template_type.clone(),
            output_path: relative,
            components: result.components,
        })
    }
}

fn take_result(results: &mut Vec<JobResult>, name: &str) -> Option<JobResult> {
    let index = results.iter().position(|result| result.name == name)?;
    Some(results.swap_remove(index))
}

async fn write_page(path: &Path, html: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, html).await?;
    Ok(())
}

/// Place script tags before the last `</body>`, or append them when the
/// document has none.
pub fn inject_scripts(html: &str, tags: &str) -> String {
    if tags.is_empty() {
        return html.to_string();
    }
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(index) => format!("{}{tags}\n{}", &html[..index], &html[index..]),
        None if html.ends_with('\n') || html.is_empty() => format!("{html}{tags}\n"),
        None => format!("{html}\n{tags}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(name: &str) -> RenderJob {
        RenderJob {
            entry: Entry {
                name: name.to_string(),
                template_type: "html".to_string(),
                source_path: PathBuf::from(format!("/site/{name}.html.js")),
            },
            module_path: PathBuf::from(format!("/site/dist/server/{name}.js")),
            renderer: "@islet/render-html".to_string(),
        }
    }

    fn renderer(mode: RenderMode, abort_on_first_error: bool) -> TemplateRenderer {
        let section = RenderSection {
            mode,
            node_binary: "islet-test-no-such-runtime".to_string(),
            abort_on_first_error,
            timeout_ms: Some(5_000),
        };
        TemplateRenderer::new(section, std::env::temp_dir(), std::env::temp_dir())
    }

    #[test]
    fn scripts_go_before_closing_body() {
        let html = "<html><body><p>hi</p></BODY></html>";
        let out = inject_scripts(html, "<script src=\"/a.js\"></script>");
        assert_eq!(
            out,
            "<html><body><p>hi</p><script src=\"/a.js\"></script>\n</BODY></html>"
        );
    }

    #[test]
    fn scripts_are_appended_without_body() {
        let expected = "<p>hi</p>\n<script></script>\n";
        assert_eq!(inject_scripts("<p>hi</p>", "<script></script>"), expected);
        assert_eq!(inject_scripts("<p>hi</p>\n", "<script></script>"), expected);
    }

    #[test]
    fn nothing_to_inject_leaves_html_alone() {
        assert_eq!(inject_scripts("<body></body>", ""), "<body></body>");
    }

    #[test]
    fn failure_kinds_parse() {
        let response: RenderResponse = serde_json::from_str(
            r#"{"results":[
                {"name":"index","html":"<p>x</p>","components":["src_Clock_js"]},
                {"name":"about","error":{"kind":"missing-default-export","message":"no default"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(response.results[0].components, vec!["src_Clock_js"]);
        let failure = response.results[1].error.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::MissingDefaultExport);
    }

    #[test]
    fn render_errors_name_the_template() {
        let err = RenderError {
            template: PathBuf::from("/site/index.html.js"),
            exit_code: Some(1),
            stderr: "ReferenceError: window is not defined".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("/site/index.html.js"));
        assert!(message.contains("exit code 1"));
        assert!(message.contains("window is not defined"));
    }

    #[tokio::test]
    async fn off_mode_renders_nothing() {
        let report = renderer(RenderMode::Off, true)
            .render(vec![job("index")], &ChunkManifest::default())
            .await
            .unwrap();
        assert!(report.pages.is_empty());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn isolated_failures_are_per_template() {
        let report = renderer(RenderMode::Isolated, false)
            .render(vec![job("index"), job("about")], &ChunkManifest::default())
            .await
            .unwrap();
        assert!(report.pages.is_empty());
        assert_eq!(report.failures.len(), 2);
        match &report.failures[1] {
            Error::Render(err) => {
                assert_eq!(err.template, PathBuf::from("/site/about.html.js"));
                assert!(err.stderr.contains("failed to start"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn abort_on_first_error_stops_rendering() {
        let err = renderer(RenderMode::Batched, true)
            .render(vec![job("index"), job("about")], &ChunkManifest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Render(RenderError { ref template, .. })
            if template == Path::new("/site/index.html.js")));
    }
}
