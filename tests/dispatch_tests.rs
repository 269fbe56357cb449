#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use kodegen_devtool::docker::{BuildRequest, RunRequest};
    use kodegen_devtool::error::ProcessError;
    use kodegen_devtool::{ContainerRuntime, DevtoolConfig, Dispatcher, ManifestSource, Result, ToolRequest};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Records requests and keeps built images in memory
    #[derive(Debug, Default)]
    struct SpyRuntime {
        images: Mutex<HashMap<String, String>>,
        builds: Mutex<Vec<BuildRequest>>,
        runs: Mutex<Vec<RunRequest>>,
        exit_code: i32,
    }

    #[async_trait]
    impl ContainerRuntime for SpyRuntime {
        async fn inspect_architecture(&self, image: &str) -> Result<Option<String>> {
            Ok(self.images.lock().expect("lock").get(image).cloned())
        }

        async fn build(&self, request: &BuildRequest) -> Result<()> {
            self.builds.lock().expect("lock").push(request.clone());
            self.images
                .lock()
                .expect("lock")
                .insert(request.image.clone(), request.arch.clone());
            Ok(())
        }

        async fn pull(&self, _image: &str) -> Result<()> {
            Ok(())
        }

        async fn run(&self, request: &RunRequest) -> Result<()> {
            self.runs.lock().expect("lock").push(request.clone());
            if self.exit_code == 0 {
                return Ok(());
            }
            Err(ProcessError::Failed {
                command: format!("docker run {}", request.image),
                code: self.exit_code,
                stdout: String::new(),
                stderr: String::new(),
            }
            .into())
        }
    }

    fn config(empty_path: &std::path::Path, out: &std::path::Path) -> DevtoolConfig {
        DevtoolConfig::default()
            .with_image_base("registry.test/ci")
            .with_host_arch("amd64")
            .with_output_dir(out)
            .with_source_root(out)
            .with_search_path(empty_path.to_string_lossy())
    }

    #[tokio::test]
    async fn test_golangci_lint_falls_back_to_container() {
        let empty = tempfile::tempdir().expect("empty PATH");
        let out = tempfile::tempdir().expect("output dir");
        let runtime = Arc::new(SpyRuntime {
            exit_code: 3,
            ..SpyRuntime::default()
        });
        let devtools = Dispatcher::new(config(empty.path(), out.path()), runtime.clone());

        let err = devtools
            .run("golangci-lint", ToolRequest::new(["run", "./..."]))
            .await
            .expect_err("container exits 3");
        assert_eq!(err.exit_code(), 3);

        let builds = runtime.builds.lock().expect("lock").clone();
        assert_eq!(builds.len(), 1);
        assert_eq!(builds[0].image, "registry.test/ci/golangci-lint-devtool:2.10.1");
        assert_eq!(builds[0].target.as_deref(), Some("golangci-lint"));

        let runs = runtime.runs.lock().expect("lock").clone();
        assert_eq!(runs.len(), 1);
        let run = &runs[0];
        assert_eq!(run.image, "registry.test/ci/golangci-lint-devtool:2.10.1");
        assert_eq!(run.command.as_deref(), Some("golangci-lint"));
        assert_eq!(run.args, ["run", "./..."]);
        assert_eq!(run.workdir.as_deref(), Some("/app"));

        let args = run.docker_args("golangci-lint-devtool-test");
        let image_at = args
            .iter()
            .position(|a| a == &run.image)
            .expect("image in docker args");
        assert_eq!(&args[image_at + 1..], ["golangci-lint", "run", "./..."]);
        assert!(args.contains(&"GOMODCACHE=/go/pkg/mod".to_string()));
    }

    #[tokio::test]
    async fn test_each_call_reuses_built_image() {
        let empty = tempfile::tempdir().expect("empty PATH");
        let out = tempfile::tempdir().expect("output dir");
        let runtime = Arc::new(SpyRuntime::default());
        let devtools = Dispatcher::new(config(empty.path(), out.path()), runtime.clone());

        for _ in 0..2 {
            devtools
                .run("terraform", ToolRequest::new(["fmt", "-check"]).with_workdir("modules/vpc"))
                .await
                .expect("container run");
        }

        assert_eq!(runtime.builds.lock().expect("lock").len(), 1);
        let runs = runtime.runs.lock().expect("lock").clone();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].workdir.as_deref(), Some("/app/modules/vpc"));
        assert_eq!(runs[1].command, None);
    }

    #[tokio::test]
    async fn test_concurrent_dispatches() {
        let empty = tempfile::tempdir().expect("empty PATH");
        let out = tempfile::tempdir().expect("output dir");
        let runtime = Arc::new(SpyRuntime::default());
        let devtools = Dispatcher::new(config(empty.path(), out.path()), runtime.clone());

        let (a, b) = tokio::join!(
            devtools.run("tflint", ToolRequest::new(["--recursive"])),
            devtools.run("trivy", ToolRequest::new(["config", "."])),
        );
        a.expect("tflint");
        b.expect("trivy");

        assert_eq!(runtime.builds.lock().expect("lock").len(), 2);
        assert_eq!(runtime.runs.lock().expect("lock").len(), 2);
    }

    #[tokio::test]
    async fn test_custom_bundled_manifest() {
        let empty = tempfile::tempdir().expect("empty PATH");
        let out = tempfile::tempdir().expect("output dir");
        let runtime = Arc::new(SpyRuntime::default());

        let manifest = ManifestSource::Bundled {
            files: [
                (
                    "tools.Dockerfile".to_string(),
                    "ARG KUBECONFORM_VERSION=0.7.0\nFROM ghcr.io/yannh/kubeconform:v${KUBECONFORM_VERSION} AS kubeconform\n"
                        .to_string(),
                ),
                ("schemas.json".to_string(), "{}".to_string()),
            ]
            .into_iter()
            .collect(),
            entrypoint: "tools.Dockerfile".to_string(),
        };
        let devtools =
            Dispatcher::new(config(empty.path(), out.path()), runtime.clone()).with_manifest(manifest);

        devtools
            .run("kubeconform", ToolRequest::new(["k8s/"]))
            .await
            .expect("container run");

        let builds = runtime.builds.lock().expect("lock").clone();
        assert_eq!(builds[0].image, "registry.test/ci/kubeconform-devtool:0.7.0");
        assert!(builds[0].dockerfile.ends_with("tools.Dockerfile"));
        assert!(!builds[0].context.exists(), "bundle context is cleaned up");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let empty = tempfile::tempdir().expect("empty PATH");
        let out = tempfile::tempdir().expect("output dir");
        let devtools = Dispatcher::new(config(empty.path(), out.path()), Arc::new(SpyRuntime::default()));

        let err = devtools
            .run("helm", ToolRequest::default())
            .await
            .expect_err("not in catalog");
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("helm"));
    }
}
