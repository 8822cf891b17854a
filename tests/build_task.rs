#![cfg(unix)]

use buildkit_task::daemon::LaunchStrategy;
use buildkit_task::request::BuildRequest;
use buildkit_task::{BuildTask, Request, TaskConfig, TaskError};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn script(&self, name: &str, body: &str) -> String {
        let path = self.path(name);
        {
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "#!/bin/sh\n{body}").unwrap();
            file.sync_all().unwrap();
        }
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    /// Fake buildctl: probes succeed, builds record their argv and produce outputs.
    fn buildctl(&self, build_exit: i32) -> String {
        let record = self.path("build-args");
        self.script(
            "buildctl",
            &format!(
                r#"if [ "$2" = "debug" ]; then exit 0; fi
echo "$@" > '{}'
mkdir -p image cache
touch image/image.tar
echo '{{}}' > cache/index.json
exit {build_exit}"#,
                record.display()
            ),
        )
    }

    fn config(&self, buildkitd_body: &str, buildctl: String) -> TaskConfig {
        let work = self.path("work");
        std::fs::create_dir_all(&work).unwrap();
        TaskConfig {
            runtime_dir: Some(self.dir.path().display().to_string()),
            daemon_log: self.path("buildkitd.log"),
            buildkitd: self.script("buildkitd", buildkitd_body),
            buildctl,
            setup_cgroups: None,
            // sh reads the fake daemon script, so nothing execs a freshly written file
            launch: LaunchStrategy::Rootless {
                launcher: "/bin/sh".into(),
            },
            ready_timeout: Some(Duration::from_secs(10)),
            poll_interval: Duration::from_millis(20),
            stop_grace: Duration::from_secs(5),
            workdir: work,
        }
    }

    fn request(&self, config: BuildRequest) -> Request {
        Request {
            response_path: self.path("out.json"),
            config,
        }
    }

    fn recorded_args(&self) -> String {
        std::fs::read_to_string(self.path("build-args")).unwrap()
    }

    fn response(&self) -> serde_json::Value {
        let content = std::fs::read_to_string(self.path("out.json")).unwrap();
        serde_json::from_str(&content).unwrap()
    }
}

fn app_request() -> BuildRequest {
    BuildRequest {
        repository: Some("example/app".into()),
        context_path: Some("/src".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn builds_image_and_writes_response() {
    let h = Harness::new();
    let config = h.config("echo buildkitd up; exec sleep 30", h.buildctl(0));
    let work = config.workdir.clone();

    let manifest = BuildTask::new(config)
        .run(h.request(app_request()))
        .await
        .unwrap();

    assert_eq!(manifest.outputs, vec!["image", "cache"]);
    assert_eq!(h.response(), serde_json::json!({"outputs": ["image", "cache"]}));
    assert!(work.join("image").is_dir());
    assert!(work.join("cache").is_dir());

    let args = h.recorded_args();
    let addr = format!("--addr=unix://{}/buildkitd/buildkitd.sock", h.dir.path().display());
    assert!(args.starts_with(&format!("{addr} build --frontend dockerfile.v0")), "{args}");
    assert!(args.contains("--local context=/src --local dockerfile=/src"), "{args}");
    assert!(args.contains("--output type=docker,name=example/app,dest=image/image.tar"));
    assert!(!args.contains("--import-cache"));

    let log = std::fs::read_to_string(h.path("buildkitd.log")).unwrap();
    assert!(log.contains("buildkitd up"));
}

#[tokio::test]
async fn existing_cache_is_imported() {
    let h = Harness::new();
    let config = h.config("exec sleep 30", h.buildctl(0));
    std::fs::create_dir_all(config.workdir.join("cache")).unwrap();
    std::fs::write(config.workdir.join("cache").join("index.json"), "{}").unwrap();

    BuildTask::new(config)
        .run(h.request(app_request()))
        .await
        .unwrap();

    assert!(h.recorded_args().contains("--import-cache type=local,src=cache"));
}

#[tokio::test]
async fn output_none_skips_image_export() {
    let h = Harness::new();
    let config = h.config("exec sleep 30", h.buildctl(0));
    let request = BuildRequest {
        output_type: Some("none".into()),
        target: Some("test".into()),
        ..app_request()
    };

    BuildTask::new(config).run(h.request(request)).await.unwrap();

    let args = h.recorded_args();
    assert!(!args.contains("--output"), "{args}");
    assert!(args.trim_end().ends_with("--opt target=test"), "{args}");
}

#[tokio::test]
async fn relative_context_ignores_output_workdir() {
    let h = Harness::new();
    let config = h.config("exec sleep 30", h.buildctl(0));
    let request = BuildRequest {
        context_path: Some("src".into()),
        ..app_request()
    };

    BuildTask::new(config).run(h.request(request)).await.unwrap();

    let src = std::env::current_dir().unwrap().join("src");
    let args = h.recorded_args();
    assert!(
        args.contains(&format!("--local context={0} --local dockerfile={0}", src.display())),
        "{args}"
    );
}

#[tokio::test]
async fn missing_repository_fails_before_spawning() {
    let h = Harness::new();
    let config = h.config("exec sleep 30", h.buildctl(0));
    let work = config.workdir.clone();
    let request = BuildRequest {
        repository: None,
        ..app_request()
    };

    let err = BuildTask::new(config)
        .run(h.request(request))
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::Config(_)));
    assert!(!h.path("buildkitd.log").exists());
    assert!(!h.path("out.json").exists());
    assert!(!work.join("image").exists());
}

#[tokio::test]
async fn crashed_daemon_is_reported() {
    let h = Harness::new();
    let buildctl = h.script("buildctl", "exit 1");
    let config = h.config("echo 'permission denied: rootless'; exit 1", buildctl);

    let err = BuildTask::new(config)
        .run(h.request(app_request()))
        .await
        .unwrap_err();

    match err {
        TaskError::DaemonExited { log_tail, .. } => {
            assert!(log_tail.contains("permission denied: rootless"))
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(std::fs::read_to_string(h.path("out.json")).unwrap(), "");
}

#[tokio::test]
async fn failed_build_is_fatal() {
    let h = Harness::new();
    let config = h.config("exec sleep 30", h.buildctl(2));

    let err = BuildTask::new(config)
        .run(h.request(app_request()))
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::CommandFailed { .. }), "{err}");
    assert_eq!(std::fs::read_to_string(h.path("out.json")).unwrap(), "");
}

#[test]
fn tag_file_is_resolved_before_build() {
    let h = Harness::new();
    let tag_file = h.path("tag");
    std::fs::write(&tag_file, "v2\n").unwrap();

    let cfg = BuildRequest {
        tag_file: Some(tag_file.display().to_string()),
        ..app_request()
    }
    .sanitize()
    .unwrap();
    assert_eq!(cfg.tag.as_deref(), Some("v2"));
    assert_eq!(cfg.dockerfile_path, "/src");
}
