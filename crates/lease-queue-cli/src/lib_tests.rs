//! Tests for the lease-queue-cli library module.

use super::*;
use lease_queue::{Backend, Credentials, InMemoryTransport, ReceiveErrorPolicy};
use std::io::Write;
use std::sync::Arc;

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn config_file(extension: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(&format!(".{}", extension))
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ============================================================================
// Argument Parsing Tests
// ============================================================================

mod parsing {
    use super::*;

    #[test]
    fn test_claim_parsing() {
        let cli = Cli::try_parse_from(["lease-queue", "--queue", "jobs", "claim", "--lease", "60"])
            .unwrap();

        assert_eq!(cli.queue, "jobs");
        assert_eq!(cli.command, Commands::Claim { lease: 60 });
        assert!(!cli.json_logs);
    }

    #[test]
    fn test_claim_lease_defaults_to_zero() {
        let cli = Cli::try_parse_from(["lease-queue", "-q", "jobs", "claim"]).unwrap();
        assert_eq!(cli.command, Commands::Claim { lease: 0 });
    }

    #[test]
    fn test_extend_requires_handle_and_seconds() {
        let cli = Cli::try_parse_from([
            "lease-queue",
            "-q",
            "jobs",
            "extend",
            "--handle",
            "AQEB-receipt",
            "--seconds",
            "120",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Commands::Extend {
                handle: "AQEB-receipt".to_string(),
                seconds: 120,
            }
        );

        let missing = Cli::try_parse_from(["lease-queue", "-q", "jobs", "extend", "--handle", "h"]);
        assert!(missing.is_err());
    }

    #[test]
    fn test_delete_queue_flag() {
        let cli = Cli::try_parse_from(["lease-queue", "-q", "jobs", "delete-queue"]).unwrap();
        assert_eq!(cli.command, Commands::DeleteQueue { yes: false });

        let cli =
            Cli::try_parse_from(["lease-queue", "-q", "jobs", "delete-queue", "--yes"]).unwrap();
        assert_eq!(cli.command, Commands::DeleteQueue { yes: true });
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::try_parse_from([
            "lease-queue",
            "--config",
            "/tmp/queue.toml",
            "--queue",
            "jobs",
            "--log-level",
            "debug",
            "--json-logs",
            "count",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/queue.toml")));
        assert_eq!(cli.log_level, "debug");
        assert!(cli.json_logs);
        assert_eq!(cli.command, Commands::Count);
    }

    #[test]
    fn test_payload_parsing() {
        assert_eq!(
            parse_payload(r#"{"id":42,"tags":["a","b"]}"#),
            serde_json::json!({"id": 42, "tags": ["a", "b"]})
        );
        assert_eq!(parse_payload("17"), serde_json::json!(17));
        assert_eq!(parse_payload("resize image"), serde_json::json!("resize image"));
    }
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_load_from_toml_file() {
        let file = config_file(
            "toml",
            r#"
region = "eu-west-1"
default_wait_time_seconds = 10
queue_name_prefix = "staging"
receive_error_policy = "timeout_as_empty"

[credentials]
access_key_id = "AKIDEXAMPLE"
secret_access_key = "secret"
"#,
        );

        let config = load_config_with_env(Some(file.path()), Some(HashMap::new())).unwrap();

        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.default_wait_time_seconds, 10);
        assert_eq!(config.default_visibility_timeout_seconds, 30);
        assert_eq!(config.queue_name_prefix, "staging");
        assert_eq!(config.receive_error_policy, ReceiveErrorPolicy::TimeoutAsEmpty);
        assert_eq!(
            config.credentials.unwrap().access_key_id,
            "AKIDEXAMPLE"
        );
    }

    #[test]
    fn test_load_from_yaml_file() {
        let file = config_file(
            "yaml",
            r#"
backend: in_memory
credentials:
  access_key_id: local
  secret_access_key: local
"#,
        );

        let config = load_config_with_env(Some(file.path()), Some(HashMap::new())).unwrap();
        assert_eq!(config.backend, Backend::InMemory);
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = config_file(
            "toml",
            r#"
region = "eu-west-1"

[credentials]
access_key_id = "from-file"
secret_access_key = "secret"
"#,
        );
        let overrides = env(&[
            ("LEASE_QUEUE__REGION", "ap-southeast-2"),
            ("LEASE_QUEUE__DEFAULT_WAIT_TIME_SECONDS", "20"),
            ("LEASE_QUEUE__CREDENTIALS__ACCESS_KEY_ID", "from-env"),
        ]);

        let config = load_config_with_env(Some(file.path()), Some(overrides)).unwrap();

        assert_eq!(config.region, "ap-southeast-2");
        assert_eq!(config.default_wait_time_seconds, 20);
        assert_eq!(config.credentials.unwrap().access_key_id, "from-env");
    }

    #[test]
    fn test_environment_only_configuration() {
        let overrides = env(&[
            ("LEASE_QUEUE__ENDPOINT", "http://localhost:4566"),
            ("LEASE_QUEUE__CREDENTIALS__ACCESS_KEY_ID", "test"),
            ("LEASE_QUEUE__CREDENTIALS__SECRET_ACCESS_KEY", "test"),
        ]);

        let config = load_config_with_env(None, Some(overrides)).unwrap();
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:4566"));
    }

    #[test]
    fn test_missing_credentials_is_configuration_error() {
        let result = load_config_with_env(None, Some(HashMap::new()));

        let error = result.unwrap_err();
        assert!(matches!(error, CliError::Configuration { .. }));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let overrides = env(&[
            ("LEASE_QUEUE__DEFAULT_WAIT_TIME_SECONDS", "21"),
            ("LEASE_QUEUE__CREDENTIALS__ACCESS_KEY_ID", "test"),
            ("LEASE_QUEUE__CREDENTIALS__SECRET_ACCESS_KEY", "test"),
        ]);

        let result = load_config_with_env(None, Some(overrides));
        assert!(matches!(result, Err(CliError::Configuration { .. })));
    }

    #[test]
    fn test_missing_explicit_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");

        let result = load_config_with_env(Some(&missing), Some(HashMap::new()));
        assert!(matches!(result, Err(CliError::Configuration { .. })));
    }
}

// ============================================================================
// Command Execution Tests
// ============================================================================

mod execution {
    use super::*;

    fn memory_client(name: &str) -> QueueClient {
        let config = QueueConfig {
            credentials: Some(Credentials::new("test", "test")),
            backend: Backend::InMemory,
            ..QueueConfig::default()
        };
        QueueClient::new(name, config, Arc::new(InMemoryTransport::new())).unwrap()
    }

    #[tokio::test]
    async fn test_url_before_creation_prints_null() {
        let client = memory_client("jobs");

        let output = execute(&client, Commands::Url).await.unwrap();
        assert_eq!(output, vec!["null".to_string()]);
    }

    #[tokio::test]
    async fn test_send_claim_delete_flow() {
        let client = memory_client("jobs");

        let created = execute(&client, Commands::CreateQueue).await.unwrap();
        assert_eq!(created, vec!["memory://jobs".to_string()]);

        let sent = execute(
            &client,
            Commands::Send {
                payload: r#"{"id":42}"#.to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(sent, vec!["true".to_string()]);

        let claimed = execute(&client, Commands::Claim { lease: 60 }).await.unwrap();
        let item: Value = serde_json::from_str(&claimed[0]).unwrap();
        assert_eq!(item["data"], serde_json::json!({"id": 42}));
        let handle = item["handle"].as_str().unwrap().to_string();

        let counts = execute(&client, Commands::Count).await.unwrap();
        assert_eq!(counts, vec![r#"{"available":0,"claimed":1}"#.to_string()]);

        execute(&client, Commands::Delete { handle }).await.unwrap();

        let empty = execute(&client, Commands::Claim { lease: 1 }).await.unwrap();
        assert_eq!(empty, vec!["null".to_string()]);
    }

    #[tokio::test]
    async fn test_release_by_handle() {
        let client = memory_client("jobs");
        execute(
            &client,
            Commands::Send {
                payload: "plain text".to_string(),
            },
        )
        .await
        .unwrap();

        let claimed = execute(&client, Commands::Claim { lease: 300 }).await.unwrap();
        let item: Value = serde_json::from_str(&claimed[0]).unwrap();
        assert_eq!(item["data"], serde_json::json!("plain text"));

        let released = execute(
            &client,
            Commands::Release {
                handle: item["handle"].as_str().unwrap().to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(released, vec!["true".to_string()]);

        let counts = execute(&client, Commands::Count).await.unwrap();
        assert_eq!(counts, vec![r#"{"available":1,"claimed":0}"#.to_string()]);
    }

    #[tokio::test]
    async fn test_delete_missing_queue_fails() {
        let client = memory_client("ghost");

        let result = execute(&client, Commands::DeleteQueue { yes: true }).await;
        let error = result.unwrap_err();
        assert!(matches!(error, CliError::QueueMissing { .. }));
        assert_eq!(error.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_delete_queue_requires_confirmation() {
        let cli = Cli::try_parse_from(["lease-queue", "-q", "jobs", "delete-queue"]).unwrap();

        let error = run(cli).await.unwrap_err();
        assert_eq!(exit_code_for(&error), 2);
        assert!(error.to_string().contains("--yes"));
    }
}
