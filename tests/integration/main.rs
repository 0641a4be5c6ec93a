//! Integration tests for Keepsake

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::path::Path;
    use std::thread::{self, JoinHandle};
    use tempfile::TempDir;

    /// Command isolated from the user's config, state and cache
    fn keepsake(home: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("keepsake");
        cmd.env("HOME", home)
            .env("XDG_STATE_HOME", home.join("state"))
            .env("KEEPSAKE_CONFIG", home.join("config.toml"))
            .env("KEEPSAKE_CACHE_DIR", home.join("fallback"))
            .env_remove("KEEPSAKE_TOKEN")
            .env_remove("KEEPSAKE_API_HOST")
            .env_remove("KEEPSAKE_PASSPHRASE")
            .env_remove("KEEPSAKE_FALLBACK_PASSPHRASE")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Serve `count` requests with the same JSON body, one per connection
    fn serve(count: usize, body: &'static str) -> (String, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let host = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            for _ in 0..count {
                let (mut stream, _) = listener.accept().unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut buf).unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nETag: \"v1\"\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                stream.write_all(response.as_bytes()).unwrap();
            }
        });
        (host, handle)
    }

    /// An address nothing listens on
    fn dead_host() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let host = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        host
    }

    #[test]
    fn help_displays() {
        let home = TempDir::new().unwrap();
        keepsake(home.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("encrypted offline fallback"));
    }

    #[test]
    fn version_displays() {
        let home = TempDir::new().unwrap();
        keepsake(home.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("keepsake"));
    }

    #[test]
    fn config_path() {
        let home = TempDir::new().unwrap();
        keepsake(home.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let home = TempDir::new().unwrap();
        keepsake(home.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[fallback]"));
    }

    #[test]
    fn completions_generate() {
        let home = TempDir::new().unwrap();
        keepsake(home.path())
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("keepsake"));
    }

    #[test]
    fn paths_lists_files_under_cache_dir() {
        let home = TempDir::new().unwrap();
        let fallback = home.path().join("fallback");
        keepsake(home.path())
            .args(["paths", "--token", "tok", "-p", "backend", "-c", "dev", "-f", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains(fallback.to_string_lossy().to_string()))
            .stdout(predicate::str::contains(".enc"))
            .stdout(predicate::str::contains(".meta"));
    }

    #[test]
    fn missing_token_is_reported() {
        let home = TempDir::new().unwrap();
        keepsake(home.path())
            .args(["download", "--no-file"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("token"));
    }

    #[test]
    fn fallback_only_without_file_fails() {
        let home = TempDir::new().unwrap();
        keepsake(home.path())
            .args(["download", "--token", "tok", "--fallback-only", "--no-file"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Fallback file not found"));
    }

    #[test]
    fn fallback_only_rejects_corrupt_file() {
        let home = TempDir::new().unwrap();
        let output = keepsake(home.path())
            .args(["paths", "--token", "tok", "-f", "plain"])
            .output()
            .unwrap();
        let stdout = String::from_utf8(output.stdout).unwrap();
        let entry = stdout.lines().next().unwrap();
        std::fs::create_dir_all(Path::new(entry).parent().unwrap()).unwrap();
        std::fs::write(entry, b"not an encrypted snapshot").unwrap();

        keepsake(home.path())
            .args(["download", "--token", "tok", "--fallback-only", "--no-file"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("unusable"));
    }

    #[test]
    fn conflicting_fallback_flags_rejected() {
        let home = TempDir::new().unwrap();
        keepsake(home.path())
            .args([
                "download",
                "--token",
                "tok",
                "--fallback-only",
                "--no-fallback",
                "--no-file",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Conflicting options"));
    }

    #[test]
    fn no_fallback_failure_leaves_no_files() {
        let home = TempDir::new().unwrap();
        keepsake(home.path())
            .args(["download", "--token", "tok", "--no-fallback", "--no-file"])
            .args(["--api-host", &dead_host()])
            .assert()
            .failure();

        assert!(!home.path().join("fallback").exists());
    }

    #[test]
    fn fallback_serves_secrets_when_api_goes_away() {
        let home = TempDir::new().unwrap();
        let (host, server) = serve(1, r#"{"DB_URL":"postgres://db","PORT":"5432"}"#);

        keepsake(home.path())
            .args(["download", "--token", "tok", "-p", "backend", "-c", "dev", "--no-file"])
            .args(["--api-host", &host])
            .assert()
            .success()
            .stdout(predicate::str::contains("postgres://db"));
        server.join().unwrap();

        let snapshot = std::fs::read_dir(home.path().join("fallback"))
            .unwrap()
            .filter_map(Result::ok)
            .find(|e| e.path().extension().is_some_and(|ext| ext == "enc"))
            .expect("encrypted snapshot written");
        let raw = std::fs::read(snapshot.path()).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("postgres://db"));

        keepsake(home.path())
            .args(["download", "--token", "tok", "-p", "backend", "-c", "dev", "--no-file"])
            .args(["--api-host", &dead_host()])
            .assert()
            .success()
            .stdout(predicate::str::contains("postgres://db"))
            .stderr(predicate::str::contains("fallback file"));

        // A different config never sees another config's snapshot
        keepsake(home.path())
            .args(["download", "--token", "tok", "-p", "backend", "-c", "prd", "--no-file"])
            .args(["--fallback-only"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Fallback file not found"));
    }

    #[test]
    fn download_writes_encrypted_output_file() {
        let home = TempDir::new().unwrap();
        let (host, server) = serve(1, r#"{"API_KEY":"sk-live-123"}"#);
        let output = home.path().join("secrets.encrypted");

        keepsake(home.path())
            .args(["download", "--token", "tok", "--passphrase", "pw"])
            .args(["--api-host", &host])
            .arg(&output)
            .assert()
            .success()
            .stderr(predicate::str::contains("Downloaded secrets to"));
        server.join().unwrap();

        let raw = std::fs::read(&output).unwrap();
        assert!(raw.starts_with(b"KSKC"));
        assert!(!String::from_utf8_lossy(&raw).contains("sk-live-123"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_fetch_is_audited() {
        let home = TempDir::new().unwrap();
        keepsake(home.path())
            .args(["download", "--token", "tok", "-p", "backend", "--fallback-only", "--no-file"])
            .assert()
            .failure();

        let log = std::fs::read_to_string(home.path().join("state/keepsake/audit.log")).unwrap();
        assert!(log.contains("secrets.fetch_failed"));
        assert!(log.contains("fallback_missing"));
        assert!(!log.contains("\"tok\""));
    }
}
